// src/lib.rs
//
// Crate root: configuration, datasets and loaders for normalizing-flow
// anomaly detection on 3D brain MRI volumes.

pub mod config;
pub mod constants;
pub mod data_loader;
pub mod datasets;
pub mod progress;

// Convenience re-exports
pub use config::{flow_v2, get_default_config, Config, ConfigError};
pub use data_loader::{
    dataset, CacheDataset, CacheOptions, DataLoader, Dataset, DatasetError, LoaderOptions,
    SamplerType,
};
pub use datasets::{
    get_dataloaders, get_dataloaders_with, BuildOptions, DataLoaders, Datasets, LoaderError,
    RunMode,
};
