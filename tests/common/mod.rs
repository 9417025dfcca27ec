// tests/common/mod.rs
//
// Shared fixtures: a temporary data tree with small `.npy` volumes and split
// files, plus a file lister that counts how often it is asked.
#![allow(dead_code)]

use ndarray::Array3;
use ndarray_npy::write_npy;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

use sade::config::{get_default_config, Config};
use sade::datasets::{FileListError, FileLister, FileRecord, SplitFiles};

/// Edge length of the volumes written to disk
pub const VOLUME_EDGE: usize = 6;

/// Temporary `<root>/processed` data dir and `<root>/splits` split dir.
pub struct DataTree {
    pub root: TempDir,
    pub data_dir: PathBuf,
    pub splits_dir: PathBuf,
}

impl DataTree {
    pub fn new() -> Self {
        let root = TempDir::new().expect("tempdir");
        let data_dir = root.path().join("processed");
        let splits_dir = root.path().join("splits");
        fs::create_dir_all(&data_dir).unwrap();
        fs::create_dir_all(&splits_dir).unwrap();
        Self {
            root,
            data_dir,
            splits_dir,
        }
    }

    /// Write `n` volumes for `split` of `dataset` and list them in its split file.
    pub fn add_split(&self, dataset: &str, split: &str, n: usize) -> Vec<String> {
        let names: Vec<String> = (0..n).map(|i| format!("{dataset}-{split}-{i}.npy")).collect();
        for (i, name) in names.iter().enumerate() {
            write_volume(&self.data_dir.join(name), i as f32);
        }
        fs::write(
            self.splits_dir.join(format!("{}_{}.txt", dataset.to_lowercase(), split)),
            names.join("\n"),
        )
        .unwrap();
        names
    }

    /// Train / val / test for `dataset`.
    pub fn add_dataset(&self, dataset: &str, train: usize, val: usize, test: usize) {
        self.add_split(dataset, "train", train);
        self.add_split(dataset, "val", val);
        self.add_split(dataset, "test", test);
    }

    /// `<root>/slicer_lesions/<ood>/<dataset>`, without creating it.
    pub fn lesion_dir(&self, ood: &str, dataset: &str) -> PathBuf {
        self.root
            .path()
            .join("slicer_lesions")
            .join(ood)
            .join(dataset)
    }

    /// Lesion images with masks under the lesion dir, listed in `<ood>_test.txt`.
    pub fn add_lesions(&self, ood: &str, dataset: &str, n: usize) -> PathBuf {
        let dir = self.lesion_dir(ood, dataset);
        fs::create_dir_all(&dir).unwrap();
        let mut lines = Vec::new();
        for i in 0..n {
            let image = format!("lesion-{i}.npy");
            let mask = format!("lesion-{i}-mask.npy");
            write_volume(&dir.join(&image), i as f32);
            let m = Array3::from_shape_fn((VOLUME_EDGE, VOLUME_EDGE, VOLUME_EDGE), |(a, _, _)| {
                if a < VOLUME_EDGE / 2 { 1.0f32 } else { 0.0 }
            });
            write_npy(dir.join(&mask), &m).unwrap();
            lines.push(format!("{image} {mask}"));
        }
        fs::write(self.splits_dir.join(format!("{ood}_test.txt")), lines.join("\n")).unwrap();
        dir
    }

    /// Default config pointed at this tree, with tiny volumes.
    pub fn config(&self, dataset: &str, ood_ds: &str) -> Config {
        let mut cfg = get_default_config();
        cfg.data.dataset = dataset.to_string();
        cfg.data.ood_ds = ood_ds.to_string();
        cfg.data.dir_path = self.data_dir.clone();
        cfg.data.splits_dir = self.splits_dir.clone();
        cfg.data.image_size = [4, 4, 4];
        cfg.data.cache_rate = 1.0;
        cfg.training.batch_size = 2;
        cfg.eval.batch_size = 3;
        cfg
    }
}

pub fn write_volume(path: &Path, offset: f32) {
    let vol = Array3::from_shape_fn((VOLUME_EDGE, VOLUME_EDGE, VOLUME_EDGE), |(a, b, c)| {
        (a + 2 * b + 3 * c) as f32 + offset
    });
    write_npy(path, &vol).unwrap();
}

/// In-memory lister recording every call.
#[derive(Default)]
pub struct CountingLister {
    pub files: SplitFiles,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<(String, PathBuf)>>,
}

impl CountingLister {
    pub fn new(train: usize, val: usize, test: usize) -> Self {
        let records = |split: &str, n: usize| -> Vec<FileRecord> {
            (0..n)
                .map(|i| FileRecord::image(format!("/nowhere/{split}-{i}.npy")))
                .collect()
        };
        Self {
            files: SplitFiles {
                train: records("train", train),
                val: records("val", val),
                test: records("test", test),
            },
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<(String, PathBuf)> {
        self.seen.lock().unwrap().clone()
    }
}

impl FileLister for CountingLister {
    fn image_files(
        &self,
        dataset_name: &str,
        data_dir: &Path,
        _splits_dir: &Path,
    ) -> Result<SplitFiles, FileListError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((dataset_name.to_string(), data_dir.to_path_buf()));
        Ok(self.files.clone())
    }
}
