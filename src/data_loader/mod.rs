// src/data_loader/mod.rs

//! Datasets, sampling and the batching loader.
pub mod cache_dataset;

/// expose the `dataloader` module (file dataloader.rs)
pub mod dataloader;

/// expose the `dataset` module (file dataset.rs)
pub mod dataset;

/// expose the `options` module (file options.rs)
pub mod options;

pub mod prefetch;
pub mod sampler;

// Re‐export the key types at this level:
pub use cache_dataset::{CacheDataset, CacheOptions, DataSource};
pub use dataloader::{BatchStream, DataLoader};
pub use dataset::{Dataset, DatasetError};
pub use options::{LoaderOptions, SamplerType};
