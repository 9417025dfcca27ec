// src/data_loader/cache_dataset.rs
//
// Cache-backed dataset over a file list and a transform pipeline.
//
// The first `floor(len * cache_rate)` records are loaded and run through the
// deterministic part of the pipeline up front, in parallel on a rayon pool.
// Everything else is prepared on demand on tokio's blocking pool. Random ops
// always run at fetch time.

use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::constants::{DEFAULT_NUM_WORKERS, DEFAULT_SEED};
use crate::data_loader::dataset::{Dataset, DatasetError};
use crate::datasets::filenames::FileRecord;
use crate::datasets::transforms::{Compose, Sample, TransformError};
use crate::progress::CacheProgress;

/// Where a dataset's file list came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    /// Name the file list was enumerated under
    pub name: String,
    /// Directory the samples live in
    pub dir: PathBuf,
}

impl DataSource {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheOptions {
    /// Fraction of records cached up front, clamped to [0, 1].
    pub cache_rate: f64,
    /// Threads used to fill the cache (at least 1, at most the CPU count).
    pub num_workers: usize,
    /// Draw a progress bar while filling.
    pub progress: bool,
    /// Seed for random transforms.
    pub seed: u64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            cache_rate: 1.0,
            num_workers: DEFAULT_NUM_WORKERS,
            progress: false,
            seed: DEFAULT_SEED,
        }
    }
}

impl CacheOptions {
    pub fn cache_rate(mut self, rate: f64) -> Self {
        self.cache_rate = rate;
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn progress(mut self, on: bool) -> Self {
        self.progress = on;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Number of records cached for a list of `len` at `rate`.
pub fn cache_count(len: usize, rate: f64) -> usize {
    // NaN and non-positive rates cache nothing
    if rate.is_nan() || rate <= 0.0 {
        return 0;
    }
    ((len as f64 * rate.min(1.0)).floor() as usize).min(len)
}

pub struct CacheDataset {
    source: DataSource,
    records: Vec<FileRecord>,
    transform: Arc<Compose>,
    cache: Vec<Sample>,
    seed: u64,
    draws: AtomicU64,
}

impl CacheDataset {
    /// Build the dataset and fill its cache.
    ///
    /// Fails if any cached record cannot be loaded or transformed.
    pub fn new(
        source: DataSource,
        records: Vec<FileRecord>,
        transform: Compose,
        opts: &CacheOptions,
    ) -> Result<Self, DatasetError> {
        let cache_num = cache_count(records.len(), opts.cache_rate);
        let cache = if cache_num == 0 {
            Vec::new()
        } else {
            fill_cache(&records[..cache_num], &transform, opts)?
        };

        info!(
            "{} dataset from `{}`: {} records, {} cached",
            transform.name(),
            source.name,
            records.len(),
            cache.len()
        );

        Ok(Self {
            source,
            records,
            transform: Arc::new(transform),
            cache,
            seed: opts.seed,
            draws: AtomicU64::new(0),
        })
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    pub fn source_dir(&self) -> &Path {
        &self.source.dir
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn transform(&self) -> &Compose {
        &self.transform
    }

    pub fn transform_name(&self) -> &str {
        self.transform.name()
    }

    /// Number of samples held in memory.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn next_rng(&self) -> ChaCha20Rng {
        let draw = self.draws.fetch_add(1, Ordering::Relaxed);
        ChaCha20Rng::seed_from_u64(self.seed ^ draw.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}

fn fill_cache(
    records: &[FileRecord],
    transform: &Compose,
    opts: &CacheOptions,
) -> Result<Vec<Sample>, DatasetError> {
    let threads = opts.num_workers.clamp(1, num_cpus::get().max(1));
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("sade-cache-{i}"))
        .build()
        .map_err(|e| DatasetError::Backend(e.into()))?;

    let progress = if opts.progress {
        CacheProgress::new(transform.name(), records.len() as u64)
    } else {
        CacheProgress::hidden()
    };

    debug!("caching {} samples on {} threads", records.len(), threads);
    let start = Instant::now();
    let cached: Result<Vec<Sample>, TransformError> = pool.install(|| {
        records
            .par_iter()
            .map(|record| {
                let sample = transform.prepare(record);
                progress.sample_cached();
                sample
            })
            .collect()
    });
    let cached = cached?;
    progress.finish(transform.name(), cached.len(), start.elapsed());
    Ok(cached)
}

#[async_trait]
impl Dataset for CacheDataset {
    type Item = Sample;

    fn len(&self) -> usize {
        self.records.len()
    }

    async fn get(&self, index: usize) -> Result<Sample, DatasetError> {
        let record = self
            .records
            .get(index)
            .ok_or(DatasetError::IndexOutOfRange(index))?;

        let sample = match self.cache.get(index) {
            Some(hit) => hit.clone(),
            None => {
                let transform = Arc::clone(&self.transform);
                let record = record.clone();
                tokio::task::spawn_blocking(move || transform.prepare(&record))
                    .await
                    .map_err(|e| DatasetError::Backend(e.into()))??
            }
        };

        if !self.transform.has_random() {
            return Ok(sample);
        }
        let mut rng = self.next_rng();
        Ok(self.transform.randomize(sample, &mut rng)?)
    }
}

impl std::fmt::Debug for CacheDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheDataset")
            .field("source", &self.source)
            .field("transform", &self.transform.name())
            .field("len", &self.records.len())
            .field("cached", &self.cache.len())
            .finish()
    }
}
