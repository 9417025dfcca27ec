// src/datasets/loaders.rs
//
// Training / evaluation / OOD-evaluation datasets and loaders built from a
// configuration.
//
// Flow: validate names -> resolve file lists and pipelines per mode ->
// cache-backed datasets -> batching loaders.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, InlierSplit};
use crate::constants::{DEFAULT_NUM_WORKERS, EVAL_PREFETCH_DEPTH, OOD_LESION_ROOT, TRAIN_PREFETCH_DEPTH};
use crate::data_loader::cache_dataset::{CacheDataset, CacheOptions, DataSource};
use crate::data_loader::dataloader::DataLoader;
use crate::data_loader::dataset::DatasetError;
use crate::data_loader::options::LoaderOptions;
use crate::datasets::filenames::{FileListError, FileLister, FileRecord, SplitFileLister};
use crate::datasets::names::{validate_names, NameError, OodKind};
use crate::datasets::transforms::TransformKind;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Name(#[from] NameError),

    #[error("OOD sample directory {0} does not exist")]
    MissingOodDirectory(PathBuf),

    #[error("resolved {0} file list is empty")]
    EmptySplit(&'static str),

    #[error(transparent)]
    FileList(#[from] FileListError),

    #[error("failed to build {split} dataset: {source}")]
    Dataset {
        split: &'static str,
        #[source]
        source: DatasetError,
    },
}

/// What the loaders are for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Train / val / test splits of the configured dataset
    #[default]
    Training,
    /// Val / test splits only
    Evaluation,
    /// Inlier split versus an out-of-distribution test set
    OodEvaluation,
}

impl RunMode {
    /// Map the two boolean flags onto a mode; `ood_eval` wins when both are set.
    pub fn from_flags(evaluation: bool, ood_eval: bool) -> Self {
        match (evaluation, ood_eval) {
            (true, true) => {
                warn!("both evaluation and ood_eval requested; running OOD evaluation");
                RunMode::OodEvaluation
            }
            (false, true) => RunMode::OodEvaluation,
            (true, false) => RunMode::Evaluation,
            (false, false) => RunMode::Training,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub mode: RunMode,
    /// Workers for cache filling and concurrent fetches
    pub num_workers: usize,
    /// Replace every loader's sampler with infinite sampling with replacement
    pub infinite_sampler: bool,
    /// Show cache-filling progress bars
    pub progress: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            mode: RunMode::Training,
            num_workers: DEFAULT_NUM_WORKERS,
            infinite_sampler: false,
            progress: true,
        }
    }
}

impl BuildOptions {
    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn infinite_sampler(mut self, on: bool) -> Self {
        self.infinite_sampler = on;
        self
    }

    pub fn progress(mut self, on: bool) -> Self {
        self.progress = on;
        self
    }
}

/// One resolved split: its files, where they came from, and its pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitPlan {
    pub records: Vec<FileRecord>,
    pub source: DataSource,
    pub transform: TransformKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSplits {
    pub train: Option<SplitPlan>,
    pub val: SplitPlan,
    pub test: SplitPlan,
}

/// `<data_dir>/../slicer_lesions/<ood_name>/<dataset_name>`, made absolute
/// and with `..` folded away.
pub fn ood_lesion_dir(data_dir: &Path, ood_name: &str, dataset_name: &str) -> PathBuf {
    let data_dir = std::path::absolute(data_dir).unwrap_or_else(|_| data_dir.to_path_buf());
    normalize(&data_dir.join(".."))
        .join(OOD_LESION_ROOT)
        .join(ood_name)
        .join(dataset_name)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(comp);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Resolve file lists and pipelines for `mode`.
///
/// Both configured names are validated before `lister` is consulted. The
/// resolved val and test lists must be non-empty.
pub fn resolve_splits<L>(config: &Config, mode: RunMode, lister: &L) -> Result<ResolvedSplits, LoaderError>
where
    L: FileLister + ?Sized,
{
    let (_family, ood) = validate_names(&config.data)?;
    let data = &config.data;
    let dataset_name = data.dataset.as_str();
    let id_source = DataSource::new(dataset_name, &data.dir_path);
    let plan = |records, transform| SplitPlan {
        records,
        source: id_source.clone(),
        transform,
    };

    let resolved = match mode {
        RunMode::Training => {
            let files = lister.image_files(dataset_name, &data.dir_path, &data.splits_dir)?;
            if files.train.is_empty() {
                warn!("{}: training file list is empty", dataset_name);
            }
            ResolvedSplits {
                train: Some(plan(files.train, TransformKind::Train)),
                val: plan(files.val, TransformKind::Validation),
                test: plan(files.test, TransformKind::Validation),
            }
        }
        RunMode::Evaluation => {
            let files = lister.image_files(dataset_name, &data.dir_path, &data.splits_dir)?;
            ResolvedSplits {
                train: None,
                val: plan(files.val, TransformKind::Validation),
                test: plan(files.test, TransformKind::Validation),
            }
        }
        RunMode::OodEvaluation => {
            let lesion = match &ood {
                OodKind::Lesion { name } => {
                    let dir = ood_lesion_dir(&data.dir_path, name, dataset_name);
                    info!("Loading ood samples from {}", dir.display());
                    if !dir.exists() {
                        return Err(LoaderError::MissingOodDirectory(dir));
                    }
                    let files = lister.image_files(name, &dir, &data.splits_dir)?;
                    Some(SplitPlan {
                        records: files.test,
                        source: DataSource::new(name.as_str(), dir),
                        transform: TransformKind::Lesion,
                    })
                }
                OodKind::Tumor | OodKind::ImageOnly { .. } => None,
            };

            let files = lister.image_files(dataset_name, &data.dir_path, &data.splits_dir)?;
            let inliers = match data.ood_inlier_split {
                InlierSplit::Val => files.val,
                InlierSplit::Test => files.test.clone(),
            };
            let test = match lesion {
                Some(plan) => plan,
                None => plan(files.test, ood.transform_kind()),
            };
            ResolvedSplits {
                train: None,
                val: plan(inliers, TransformKind::Validation),
                test,
            }
        }
    };

    if resolved.val.records.is_empty() {
        return Err(LoaderError::EmptySplit("val"));
    }
    if resolved.test.records.is_empty() {
        return Err(LoaderError::EmptySplit("test"));
    }
    Ok(resolved)
}

/// Options for the training loader.
pub fn train_loader_options(config: &Config, opts: &BuildOptions) -> LoaderOptions {
    let base = LoaderOptions::default()
        .with_batch_size(config.training.batch_size)
        .num_workers(opts.num_workers)
        .pin_memory(true)
        .prefetch(TRAIN_PREFETCH_DEPTH)
        .persistent_workers(opts.num_workers > 0)
        .seed(config.seed);
    if opts.infinite_sampler {
        base.infinite_sampling()
    } else {
        base.shuffle(true, config.seed)
    }
}

/// Options for the evaluation and test loaders. Never shuffled.
pub fn eval_loader_options(config: &Config, opts: &BuildOptions) -> LoaderOptions {
    let workers = opts.num_workers;
    let base = LoaderOptions::default()
        .with_batch_size(config.eval.batch_size)
        .num_workers(workers)
        .pin_memory(workers > 0)
        .prefetch(if workers > 0 { EVAL_PREFETCH_DEPTH } else { 0 })
        .shuffle(false, config.seed)
        .seed(config.seed);
    if opts.infinite_sampler {
        base.infinite_sampling()
    } else {
        base
    }
}

/// Loaders returned by [`get_dataloaders`]. `train` is absent outside training.
#[derive(Debug)]
pub struct DataLoaders {
    pub train: Option<DataLoader<CacheDataset>>,
    pub eval: DataLoader<CacheDataset>,
    /// Out-of-distribution set in OOD-evaluation mode
    pub test: DataLoader<CacheDataset>,
}

/// Datasets behind [`DataLoaders`], shared with them.
#[derive(Debug, Clone)]
pub struct Datasets {
    pub train: Option<Arc<CacheDataset>>,
    pub eval: Arc<CacheDataset>,
    pub test: Arc<CacheDataset>,
}

/// Build loaders and datasets from split files on disk.
pub fn get_dataloaders(config: &Config, opts: &BuildOptions) -> Result<(DataLoaders, Datasets), LoaderError> {
    get_dataloaders_with(config, opts, &SplitFileLister)
}

/// Build loaders and datasets with a custom file enumerator.
pub fn get_dataloaders_with<L>(
    config: &Config,
    opts: &BuildOptions,
    lister: &L,
) -> Result<(DataLoaders, Datasets), LoaderError>
where
    L: FileLister + ?Sized,
{
    let splits = resolve_splits(config, opts.mode, lister)?;

    let cache = CacheOptions::default()
        .cache_rate(config.data.cache_rate)
        .num_workers(opts.num_workers)
        .progress(opts.progress)
        .seed(config.seed);

    let train_ds = splits
        .train
        .map(|plan| build_dataset("train", plan, config, &cache))
        .transpose()?;
    let eval_ds = build_dataset("val", splits.val, config, &cache)?;
    let test_ds = build_dataset("test", splits.test, config, &cache)?;

    let train_opts = train_loader_options(config, opts);
    let eval_opts = eval_loader_options(config, opts);

    let loaders = DataLoaders {
        train: train_ds
            .as_ref()
            .map(|ds| DataLoader::from_arc(Arc::clone(ds), train_opts)),
        eval: DataLoader::from_arc(Arc::clone(&eval_ds), eval_opts.clone()),
        test: DataLoader::from_arc(Arc::clone(&test_ds), eval_opts),
    };
    let datasets = Datasets {
        train: train_ds,
        eval: eval_ds,
        test: test_ds,
    };
    Ok((loaders, datasets))
}

fn build_dataset(
    split: &'static str,
    plan: SplitPlan,
    config: &Config,
    cache: &CacheOptions,
) -> Result<Arc<CacheDataset>, LoaderError> {
    let transform = plan.transform.build(config);
    CacheDataset::new(plan.source, plan.records, transform, cache)
        .map(Arc::new)
        .map_err(|source| LoaderError::Dataset { split, source })
}
