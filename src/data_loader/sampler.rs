//! src/data_loader/sampler.rs
//! Samplers for the data loader.
//!
//! A `Sampler` produces a stream of indices into a map-style dataset.
//!  * `SequentialSampler`     – yields 0..end in order.
//!  * `ShuffleSampler`        – yields 0..len in a deterministic shuffled order.
//!  * `ReplacementSampler`    – `len` draws with replacement, then stops.
//!  * `InfiniteRandomSampler` – draws with replacement and never stops.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::data_loader::options::{LoaderOptions, SamplerType};

/// Trait for index producers.
pub trait Sampler: Send {
    /// Return the next index to fetch, or `None` when exhausted.
    fn next_index(&mut self) -> Option<usize>;
    /// Remaining items hint; `None` for unbounded samplers.
    fn remaining(&self) -> Option<usize> {
        None
    }
}

/// Yields `0, 1, 2, …, end-1` once.
#[derive(Debug, Clone)]
pub struct SequentialSampler {
    curr: usize,
    end: usize,
}

impl SequentialSampler {
    /// Create a sequential sampler over `[0, end)`.
    pub fn new(end: usize) -> Self {
        Self { curr: 0, end }
    }
}

impl Sampler for SequentialSampler {
    fn next_index(&mut self) -> Option<usize> {
        if self.curr < self.end {
            let i = self.curr;
            self.curr += 1;
            Some(i)
        } else {
            None
        }
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.end.saturating_sub(self.curr))
    }
}

/// Yields all indices `0..len` in a deterministic shuffled order.
#[derive(Debug, Clone)]
pub struct ShuffleSampler {
    indices: Vec<usize>,
    pos: usize,
}

impl ShuffleSampler {
    /// Create a shuffled sampler for `len` items, using `seed`.
    pub fn new(len: usize, seed: u64) -> Self {
        let mut indices: Vec<usize> = (0..len).collect();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
        Self { indices, pos: 0 }
    }
}

impl Sampler for ShuffleSampler {
    fn next_index(&mut self) -> Option<usize> {
        let i = *self.indices.get(self.pos)?;
        self.pos += 1;
        Some(i)
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.indices.len().saturating_sub(self.pos))
    }
}

/// `num_samples` uniform draws from `0..len`, with replacement.
#[derive(Debug, Clone)]
pub struct ReplacementSampler {
    len: usize,
    left: usize,
    rng: ChaCha20Rng,
}

impl ReplacementSampler {
    pub fn new(len: usize, num_samples: usize, seed: u64) -> Self {
        Self {
            len,
            left: if len == 0 { 0 } else { num_samples },
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl Sampler for ReplacementSampler {
    fn next_index(&mut self) -> Option<usize> {
        if self.left == 0 {
            return None;
        }
        self.left -= 1;
        Some(self.rng.random_range(0..self.len))
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.left)
    }
}

/// Uniform draws from `0..len` with replacement, forever.
///
/// An empty dataset yields nothing rather than spinning.
#[derive(Debug, Clone)]
pub struct InfiniteRandomSampler {
    len: usize,
    rng: ChaCha20Rng,
}

impl InfiniteRandomSampler {
    pub fn new(len: usize, seed: u64) -> Self {
        Self {
            len,
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl Sampler for InfiniteRandomSampler {
    fn next_index(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        Some(self.rng.random_range(0..self.len))
    }
}

/// Pick the sampler described by `opts` for one epoch over `len` items.
///
/// The seed is offset by `epoch` so shuffled orders differ between epochs
/// while staying reproducible.
pub fn sampler_for(opts: &LoaderOptions, len: usize, epoch: u64) -> Box<dyn Sampler> {
    let seed = opts.seed.wrapping_add(epoch);
    match opts.sampler_type {
        SamplerType::Sequential if opts.shuffle => Box::new(ShuffleSampler::new(len, seed)),
        SamplerType::Sequential => Box::new(SequentialSampler::new(len)),
        SamplerType::Random { replacement: false } => Box::new(ShuffleSampler::new(len, seed)),
        SamplerType::Random { replacement: true } => {
            Box::new(ReplacementSampler::new(len, len, seed))
        }
        SamplerType::InfiniteRandom => Box::new(InfiniteRandomSampler::new(len, seed)),
    }
}
