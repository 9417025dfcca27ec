// src/constants.rs
//
// Centralized constants for sade to avoid hardcoded values throughout the codebase

/// Default number of preprocessing workers used by the loader builder
pub const DEFAULT_NUM_WORKERS: usize = 6;

/// Batches prepared ahead of consumption by the training loader
pub const TRAIN_PREFETCH_DEPTH: usize = 2;

/// Read-ahead depth for evaluation loaders when workers are enabled
pub const EVAL_PREFETCH_DEPTH: usize = 2;

/// Default batch size for a bare `LoaderOptions`
pub const DEFAULT_LOADER_BATCH_SIZE: usize = 32;

/// Directory, next to the primary data directory, that holds lesion OOD samples
pub const OOD_LESION_ROOT: &str = "slicer_lesions";

/// Extension of the split files read by `SplitFileLister`
pub const SPLIT_FILE_EXTENSION: &str = "txt";

/// Names of the three splits, in the order they are returned
pub const SPLIT_NAMES: [&str; 3] = ["train", "val", "test"];

/// Seed used when the configuration does not provide one
pub const DEFAULT_SEED: u64 = 42;

/// Probability that each random training augmentation fires
pub const DEFAULT_AUGMENT_PROB: f64 = 0.5;

/// Radius range (voxels) of synthetic tumors injected by the tumor transform
pub const SYNTHETIC_TUMOR_RADIUS: (usize, usize) = (4, 12);

/// Intensity written inside a synthetic tumor (in the [0, 1] scaled domain)
pub const SYNTHETIC_TUMOR_INTENSITY: f32 = 0.9;
