// src/datasets/filenames.rs
//
// File enumeration: turn a dataset name plus data/splits directories into
// train/val/test lists of file records.

use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::constants::{SPLIT_FILE_EXTENSION, SPLIT_NAMES};

/// One sample on disk: an image volume and, for lesion sets, its mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub image: PathBuf,
    pub label: Option<PathBuf>,
}

impl FileRecord {
    pub fn image<P: Into<PathBuf>>(image: P) -> Self {
        Self {
            image: image.into(),
            label: None,
        }
    }

    pub fn with_label<P: Into<PathBuf>, Q: Into<PathBuf>>(image: P, label: Q) -> Self {
        Self {
            image: image.into(),
            label: Some(label.into()),
        }
    }
}

/// File lists for the three splits of one dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitFiles {
    pub train: Vec<FileRecord>,
    pub val: Vec<FileRecord>,
    pub test: Vec<FileRecord>,
}

#[derive(Debug, Error)]
pub enum FileListError {
    #[error("failed to read split file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: expected `image [label]`, got `{entry}`")]
    Malformed {
        path: PathBuf,
        line: usize,
        entry: String,
    },
}

/// Enumerates the files of a dataset.
///
/// `dataset_name` selects the split files, `data_dir` is where the samples
/// live and `splits_dir` is where the split files live.
pub trait FileLister: Send + Sync {
    fn image_files(
        &self,
        dataset_name: &str,
        data_dir: &Path,
        splits_dir: &Path,
    ) -> Result<SplitFiles, FileListError>;
}

/// Reads `<splits_dir>/<dataset>_<split>.txt`, one sample per line.
///
/// Each line holds an image path and an optional label path separated by
/// whitespace; relative paths are resolved against the data directory.
/// Blank lines and `#` comments are skipped. A split without a file is empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitFileLister;

impl SplitFileLister {
    pub fn split_file(splits_dir: &Path, dataset_name: &str, split: &str) -> PathBuf {
        splits_dir.join(format!(
            "{}_{}.{}",
            dataset_name.to_lowercase(),
            split,
            SPLIT_FILE_EXTENSION
        ))
    }

    fn read_split(path: &Path, data_dir: &Path) -> Result<Vec<FileRecord>, FileListError> {
        match std::fs::read_to_string(path) {
            Ok(text) => parse_split(&text, path, data_dir),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no split file at {}, treating split as empty", path.display());
                Ok(Vec::new())
            }
            Err(source) => Err(FileListError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl FileLister for SplitFileLister {
    fn image_files(
        &self,
        dataset_name: &str,
        data_dir: &Path,
        splits_dir: &Path,
    ) -> Result<SplitFiles, FileListError> {
        let [train, val, test] = SPLIT_NAMES
            .map(|split| Self::read_split(&Self::split_file(splits_dir, dataset_name, split), data_dir));

        let files = SplitFiles {
            train: train?,
            val: val?,
            test: test?,
        };
        debug!(
            "{}: {} train / {} val / {} test files under {}",
            dataset_name,
            files.train.len(),
            files.val.len(),
            files.test.len(),
            data_dir.display()
        );
        Ok(files)
    }
}

/// Parse the contents of one split file.
pub fn parse_split(text: &str, path: &Path, data_dir: &Path) -> Result<Vec<FileRecord>, FileListError> {
    let mut records = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cols: Vec<&str> = line.split_whitespace().collect();
        let record = match cols.as_slice() {
            [image] => FileRecord::image(data_dir.join(image)),
            [image, label] => FileRecord::with_label(data_dir.join(image), data_dir.join(label)),
            _ => {
                return Err(FileListError::Malformed {
                    path: path.to_path_buf(),
                    line: n + 1,
                    entry: line.to_string(),
                })
            }
        };
        records.push(record);
    }
    Ok(records)
}
