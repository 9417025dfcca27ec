// src/data_loader/options.rs
//!
//! Options for the batching `DataLoader`.
//!
//! Builder helpers are provided so callers can write a fluent style:
//!
//! let opts = LoaderOptions::default()
//!     .with_batch_size(64)
//!     .shuffle(true, 42)
//!     .num_workers(6)
//!     .prefetch(2)
//!     .pin_memory(true)
//!     .persistent_workers(true)
//!     .infinite_sampling();
//!

use crate::constants::DEFAULT_LOADER_BATCH_SIZE;

/// Sampling strategy for dataset iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplerType {
    /// Indices in order, or a per-epoch shuffle when `shuffle` is set
    #[default]
    Sequential,
    /// One epoch of `len` random draws, with or without replacement
    Random { replacement: bool },
    /// Draws with replacement forever; the stream never ends
    InfiniteRandom,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoaderOptions {
    /// Number of samples per batch.
    pub batch_size: usize,
    /// Whether to drop the final, possibly incomplete batch.
    pub drop_last: bool,
    /// If true, the sequential sampler is replaced by a seeded shuffle.
    pub shuffle: bool,
    /// RNG seed for shuffling and random sampling.
    pub seed: u64,
    /// Concurrent sample fetches. `0` fetches inline, one at a time.
    pub num_workers: usize,
    /// Batches buffered ahead of the consumer. `0` disables prefetching.
    pub prefetch: usize,
    /// Batches are destined for page-locked host memory.
    pub pin_memory: bool,
    /// Keep workers alive between epochs.
    pub persistent_workers: bool,
    /// Sampling strategy for dataset iteration
    pub sampler_type: SamplerType,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_LOADER_BATCH_SIZE,
            drop_last: false,
            shuffle: false,
            seed: 0,
            num_workers: 0,
            prefetch: 0,
            pin_memory: false,
            persistent_workers: false,
            sampler_type: SamplerType::default(),
        }
    }
}

impl LoaderOptions {
    /// Builder-style helper: change the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Builder-style helper: set `drop_last`.
    pub fn drop_last(mut self, yes: bool) -> Self {
        self.drop_last = yes;
        self
    }

    /// Enable/disable shuffling and set seed.
    ///
    /// When `on` is false, the seed is left unchanged but ignored.
    pub fn shuffle(mut self, on: bool, seed: u64) -> Self {
        self.shuffle = on;
        if on {
            self.seed = seed;
        }
        self
    }

    /// Set the seed without touching `shuffle`.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of concurrent sample fetches.
    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    /// Set the number of batches buffered ahead of the consumer.
    ///
    /// `0` disables prefetching.
    pub fn prefetch(mut self, n: usize) -> Self {
        self.prefetch = n;
        self
    }

    /// Enable/disable memory pinning for faster CPU→GPU transfers
    pub fn pin_memory(mut self, pin: bool) -> Self {
        self.pin_memory = pin;
        self
    }

    /// Enable/disable persistent workers (keep workers alive between epochs)
    pub fn persistent_workers(mut self, persistent: bool) -> Self {
        self.persistent_workers = persistent;
        self
    }

    /// Set sampling strategy
    pub fn sampler_type(mut self, sampler: SamplerType) -> Self {
        self.sampler_type = sampler;
        self
    }

    /// Use random sampling over one epoch
    pub fn random_sampling(mut self, replacement: bool) -> Self {
        self.sampler_type = SamplerType::Random { replacement };
        self
    }

    /// Sample with replacement forever
    pub fn infinite_sampling(mut self) -> Self {
        self.sampler_type = SamplerType::InfiniteRandom;
        self
    }

    /// True when iteration never ends on its own.
    pub fn is_infinite(&self) -> bool {
        self.sampler_type == SamplerType::InfiniteRandom
    }
}
