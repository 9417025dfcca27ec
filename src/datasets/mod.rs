// src/datasets/mod.rs

//! Split enumeration, transform pipelines and loader construction for the
//! ABCD / IBIS volumes.
pub mod filenames;
pub mod loaders;
pub mod names;
pub mod transforms;

pub use filenames::{FileListError, FileLister, FileRecord, SplitFileLister, SplitFiles};
pub use loaders::{
    get_dataloaders, get_dataloaders_with, BuildOptions, DataLoaders, Datasets, LoaderError,
    RunMode,
};
pub use names::{validate_names, DatasetFamily, NameError, OodKind};
pub use transforms::{Compose, Sample, TransformError, TransformKind};
