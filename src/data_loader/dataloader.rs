//! Batching `DataLoader`.
//!
//! * Re‑iterable: every call to [`DataLoader::stream`] starts a new epoch.
//! * The sampler comes from [`LoaderOptions`] (sequential, shuffled, random,
//!   or infinite with replacement).
//! * `num_workers` bounds concurrent sample fetches; batches keep sampler order.
//! * `prefetch > 0` moves batch assembly onto a spawned task with a bounded
//!   read‑ahead queue.

use crate::data_loader::dataset::{Dataset, DatasetError};
use crate::data_loader::options::LoaderOptions;
use crate::data_loader::prefetch::spawn_prefetch;
use crate::data_loader::sampler::sampler_for;

use async_stream::try_stream;
use futures_core::stream::Stream;
use futures_util::{stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Boxed stream of batches produced by a loader.
pub type BatchStream<T> =
    Pin<Box<dyn Stream<Item = Result<Vec<T>, DatasetError>> + Send + 'static>>;

/// High‑level iterator that produces batched samples from a dataset.
pub struct DataLoader<D>
where
    D: Dataset,
{
    dataset: Arc<D>,
    opts: LoaderOptions,
    epoch: AtomicU64,
}

impl<D> DataLoader<D>
where
    D: Dataset,
{
    /// Create a new loader.
    pub fn new(dataset: D, opts: LoaderOptions) -> Self {
        Self::from_arc(Arc::new(dataset), opts)
    }

    /// Create a loader over a dataset that is shared with the caller.
    pub fn from_arc(dataset: Arc<D>, opts: LoaderOptions) -> Self {
        Self {
            dataset,
            opts,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn dataset(&self) -> &Arc<D> {
        &self.dataset
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.opts
    }

    pub fn batch_size(&self) -> usize {
        self.opts.batch_size
    }

    pub fn num_workers(&self) -> usize {
        self.opts.num_workers
    }

    pub fn pin_memory(&self) -> bool {
        self.opts.pin_memory
    }

    /// Number of epochs started so far.
    pub fn epochs_started(&self) -> u64 {
        self.epoch.load(Ordering::Relaxed)
    }

    /// Batches per epoch, or `None` when sampling never ends.
    pub fn num_batches(&self) -> Option<usize> {
        if self.opts.is_infinite() {
            return None;
        }
        let n = self.dataset.len();
        let bs = self.opts.batch_size.max(1);
        Some(if self.opts.drop_last { n / bs } else { n.div_ceil(bs) })
    }

    /// Return an **async stream** over one epoch of batches.
    ///
    /// With an infinite sampler the stream never ends; the caller decides
    /// when to stop pulling.
    ///
    /// ```ignore
    /// # use sade::{DataLoader, LoaderOptions};
    /// # async fn demo<D: sade::Dataset>(ds: D) -> anyhow::Result<()> {
    /// let loader = DataLoader::new(ds, LoaderOptions::default());
    /// let mut batches = loader.stream();
    /// while let Some(batch) = batches.next().await {
    ///     let data = batch?; // Vec<D::Item>
    ///     // training step ...
    /// }
    /// # Ok(()) }
    /// ```
    pub fn stream(&self) -> BatchStream<D::Item> {
        let epoch = self.epoch.fetch_add(1, Ordering::Relaxed);
        let ds = Arc::clone(&self.dataset);
        let mut sampler = sampler_for(&self.opts, ds.len(), epoch);
        let workers = self.opts.num_workers.max(1);

        let samples = stream::iter(std::iter::from_fn(move || sampler.next_index()))
            .map(move |index| {
                let ds = Arc::clone(&ds);
                async move { ds.get(index).await }
            })
            .buffered(workers);

        let batches = batched(samples, self.opts.batch_size.max(1), self.opts.drop_last);

        if self.opts.prefetch > 0 {
            Box::pin(spawn_prefetch(self.opts.prefetch, batches))
        } else {
            Box::pin(batches)
        }
    }
}

/// Group a stream of samples into batches of `bs`.
fn batched<S, T>(
    samples: S,
    bs: usize,
    drop_last: bool,
) -> impl Stream<Item = Result<Vec<T>, DatasetError>> + Send + 'static
where
    S: Stream<Item = Result<T, DatasetError>> + Send + 'static,
    T: Send + 'static,
{
    try_stream! {
        let mut samples = Box::pin(samples);
        let mut acc = Vec::with_capacity(bs);
        while let Some(item) = samples.next().await {
            acc.push(item?);
            if acc.len() == bs {
                yield std::mem::take(&mut acc);
            }
        }
        if !acc.is_empty() && !drop_last {
            yield acc;
        }
    }
}

impl<D> std::fmt::Debug for DataLoader<D>
where
    D: Dataset,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataLoader")
            .field("batch_size", &self.opts.batch_size)
            .field("num_workers", &self.opts.num_workers)
            .field("pin_memory", &self.opts.pin_memory)
            .field("sampler", &self.opts.sampler_type)
            .finish()
    }
}
