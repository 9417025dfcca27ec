//! Core dataset abstraction for sade’s data loader.
//!
//! Every dataset here is **map‑style**: it knows its length and serves
//! samples by index.  Shuffling, infinite sampling, parallel fetches and
//! prefetching live in the loader, not in the dataset.

use async_trait::async_trait;
use thiserror::Error;
use anyhow::Error as AnyError;

use crate::datasets::transforms::TransformError;

/// Item‑level error type for dataset & loader operations.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("index out of range: {0}")]
    IndexOutOfRange(usize),

    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Worker pool or task failures.
    #[error(transparent)]
    Backend(#[from] AnyError),
}

impl From<String> for DatasetError {
    fn from(s: String) -> Self {
        DatasetError::Backend(AnyError::msg(s))
    }
}

impl From<&str> for DatasetError {
    fn from(s: &str) -> Self {
        DatasetError::Backend(AnyError::msg(s.to_string()))
    }
}

/// A logical, indexable collection of **samples**.
#[async_trait]
pub trait Dataset: Send + Sync + 'static {
    /// Concrete type produced for each sample.
    type Item: Send + 'static;

    /// Total number of samples.
    fn len(&self) -> usize;

    /// Retrieve a sample by zero‑based index.
    async fn get(&self, index: usize) -> Result<Self::Item, DatasetError>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
