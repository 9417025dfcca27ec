// src/datasets/transforms.rs
//
// Per-sample preprocessing pipelines for 3-D brain volumes.
//
// A `Compose` loads a record's `.npy` volume (and mask, when the pipeline
// needs one) and runs an ordered list of ops. Ops before the first random op
// form the cacheable prefix; the rest run on every fetch.

use ndarray::{s, Array3, Axis, Zip};
use ndarray_npy::{read_npy, ReadNpyError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::Config;
use crate::constants::{DEFAULT_AUGMENT_PROB, SYNTHETIC_TUMOR_INTENSITY, SYNTHETIC_TUMOR_RADIUS};
use crate::datasets::filenames::FileRecord;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("failed to read volume {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ReadNpyError,
    },

    #[error("pipeline `{pipeline}` needs a label mask but {image} has none")]
    MissingLabel { pipeline: String, image: PathBuf },

    #[error("label shape {label:?} does not match image shape {image:?} for {path}")]
    ShapeMismatch {
        path: PathBuf,
        image: Vec<usize>,
        label: Vec<usize>,
    },
}

/// A loaded sample flowing through a pipeline.
#[derive(Debug, Clone)]
pub struct Sample {
    pub record: FileRecord,
    pub image: Array3<f32>,
    pub label: Option<Array3<f32>>,
}

/// Whether a pipeline loads the record's label mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelPolicy {
    Ignore,
    Required,
}

/// One preprocessing step.
pub trait Transform: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Random ops end the cacheable prefix of a pipeline.
    fn is_random(&self) -> bool {
        false
    }

    fn apply(&self, sample: Sample, rng: &mut ChaCha20Rng) -> Result<Sample, TransformError>;
}

/// Named, ordered pipeline.
#[derive(Debug)]
pub struct Compose {
    name: String,
    label: LabelPolicy,
    ops: Vec<Box<dyn Transform>>,
}

impl Compose {
    pub fn new(name: impl Into<String>, label: LabelPolicy) -> Self {
        Self {
            name: name.into(),
            label,
            ops: Vec::new(),
        }
    }

    /// Append an op.
    pub fn then<T: Transform + 'static>(mut self, op: T) -> Self {
        self.ops.push(Box::new(op));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requires_label(&self) -> bool {
        self.label == LabelPolicy::Required
    }

    pub fn op_names(&self) -> Vec<&'static str> {
        self.ops.iter().map(|op| op.name()).collect()
    }

    fn first_random(&self) -> usize {
        self.ops
            .iter()
            .position(|op| op.is_random())
            .unwrap_or(self.ops.len())
    }

    pub fn has_random(&self) -> bool {
        self.first_random() < self.ops.len()
    }

    /// Read the volumes named by `record`.
    pub fn load(&self, record: &FileRecord) -> Result<Sample, TransformError> {
        let image = read_volume(&record.image)?;
        let label = match (self.label, &record.label) {
            (LabelPolicy::Ignore, _) => None,
            (LabelPolicy::Required, None) => {
                return Err(TransformError::MissingLabel {
                    pipeline: self.name.clone(),
                    image: record.image.clone(),
                })
            }
            (LabelPolicy::Required, Some(path)) => {
                let label = read_volume(path)?;
                if label.shape() != image.shape() {
                    return Err(TransformError::ShapeMismatch {
                        path: path.clone(),
                        image: image.shape().to_vec(),
                        label: label.shape().to_vec(),
                    });
                }
                Some(label)
            }
        };
        Ok(Sample {
            record: record.clone(),
            image,
            label,
        })
    }

    /// Load and run the deterministic prefix. The result is safe to cache.
    pub fn prepare(&self, record: &FileRecord) -> Result<Sample, TransformError> {
        let mut sample = self.load(record)?;
        // deterministic ops never draw from it
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        for op in &self.ops[..self.first_random()] {
            sample = op.apply(sample, &mut rng)?;
        }
        Ok(sample)
    }

    /// Run the remaining ops on a prepared sample.
    pub fn randomize(&self, mut sample: Sample, rng: &mut ChaCha20Rng) -> Result<Sample, TransformError> {
        for op in &self.ops[self.first_random()..] {
            sample = op.apply(sample, rng)?;
        }
        Ok(sample)
    }

    /// Full pipeline on one record.
    pub fn apply(&self, record: &FileRecord, rng: &mut ChaCha20Rng) -> Result<Sample, TransformError> {
        let sample = self.prepare(record)?;
        self.randomize(sample, rng)
    }
}

fn read_volume(path: &Path) -> Result<Array3<f32>, TransformError> {
    read_npy(path).map_err(|source| TransformError::Read {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Ops
// ---------------------------------------------------------------------------

/// Min-max scale the image to [0, 1]. Constant volumes become zeros.
#[derive(Debug, Clone, Copy)]
pub struct ScaleIntensity;

impl Transform for ScaleIntensity {
    fn name(&self) -> &'static str {
        "scale_intensity"
    }

    fn apply(&self, mut sample: Sample, _rng: &mut ChaCha20Rng) -> Result<Sample, TransformError> {
        let (lo, hi) = sample
            .image
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if hi > lo {
            let range = hi - lo;
            sample.image.mapv_inplace(|v| (v - lo) / range);
        } else {
            sample.image.fill(0.0);
        }
        Ok(sample)
    }
}

/// Center-crop or zero-pad image and label to a fixed spatial size.
#[derive(Debug, Clone, Copy)]
pub struct ResizeWithPadOrCrop {
    pub size: [usize; 3],
}

impl Transform for ResizeWithPadOrCrop {
    fn name(&self) -> &'static str {
        "resize_with_pad_or_crop"
    }

    fn apply(&self, mut sample: Sample, _rng: &mut ChaCha20Rng) -> Result<Sample, TransformError> {
        sample.image = pad_or_crop(&sample.image, self.size);
        sample.label = sample.label.map(|l| pad_or_crop(&l, self.size));
        Ok(sample)
    }
}

fn pad_or_crop(src: &Array3<f32>, size: [usize; 3]) -> Array3<f32> {
    let mut src_at = [0usize; 3];
    let mut dst_at = [0usize; 3];
    let mut len = [0usize; 3];
    for ax in 0..3 {
        let (have, want) = (src.shape()[ax], size[ax]);
        len[ax] = have.min(want);
        src_at[ax] = (have - len[ax]) / 2;
        dst_at[ax] = (want - len[ax]) / 2;
    }

    let mut out = Array3::zeros((size[0], size[1], size[2]));
    out.slice_mut(s![
        dst_at[0]..dst_at[0] + len[0],
        dst_at[1]..dst_at[1] + len[1],
        dst_at[2]..dst_at[2] + len[2]
    ])
    .assign(&src.slice(s![
        src_at[0]..src_at[0] + len[0],
        src_at[1]..src_at[1] + len[1],
        src_at[2]..src_at[2] + len[2]
    ]));
    out
}

/// Map [0, 1] intensities to [-1, 1].
#[derive(Debug, Clone, Copy)]
pub struct CenterIntensity;

impl Transform for CenterIntensity {
    fn name(&self) -> &'static str {
        "center_intensity"
    }

    fn apply(&self, mut sample: Sample, _rng: &mut ChaCha20Rng) -> Result<Sample, TransformError> {
        sample.image.mapv_inplace(|v| v * 2.0 - 1.0);
        Ok(sample)
    }
}

/// Threshold the label mask to {0, 1}.
#[derive(Debug, Clone, Copy)]
pub struct BinarizeLabel {
    pub threshold: f32,
}

impl Transform for BinarizeLabel {
    fn name(&self) -> &'static str {
        "binarize_label"
    }

    fn apply(&self, mut sample: Sample, _rng: &mut ChaCha20Rng) -> Result<Sample, TransformError> {
        let t = self.threshold;
        if let Some(label) = sample.label.as_mut() {
            label.mapv_inplace(|v| if v > t { 1.0 } else { 0.0 });
        }
        Ok(sample)
    }
}

/// Flip image and label along `axis` with probability `prob`.
#[derive(Debug, Clone, Copy)]
pub struct RandFlip {
    pub axis: usize,
    pub prob: f64,
}

impl Transform for RandFlip {
    fn name(&self) -> &'static str {
        "rand_flip"
    }

    fn is_random(&self) -> bool {
        true
    }

    fn apply(&self, mut sample: Sample, rng: &mut ChaCha20Rng) -> Result<Sample, TransformError> {
        if rng.random_bool(self.prob) {
            sample.image.invert_axis(Axis(self.axis));
            if let Some(label) = sample.label.as_mut() {
                label.invert_axis(Axis(self.axis));
            }
        }
        Ok(sample)
    }
}

/// Add a uniform offset in `[-offset, offset]` with probability `prob`.
#[derive(Debug, Clone, Copy)]
pub struct RandShiftIntensity {
    pub offset: f32,
    pub prob: f64,
}

impl Transform for RandShiftIntensity {
    fn name(&self) -> &'static str {
        "rand_shift_intensity"
    }

    fn is_random(&self) -> bool {
        true
    }

    fn apply(&self, mut sample: Sample, rng: &mut ChaCha20Rng) -> Result<Sample, TransformError> {
        if rng.random_bool(self.prob) {
            let delta = rng.random_range(-self.offset..=self.offset);
            sample.image.mapv_inplace(|v| v + delta);
        }
        Ok(sample)
    }
}

/// Paint a spherical synthetic tumor into the image and mark it in the label.
///
/// Expects intensities in [0, 1]. The radius is clamped to half the smallest
/// spatial dimension.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticTumor {
    pub radius: (usize, usize),
    pub intensity: f32,
}

impl Transform for SyntheticTumor {
    fn name(&self) -> &'static str {
        "synthetic_tumor"
    }

    fn is_random(&self) -> bool {
        true
    }

    fn apply(&self, mut sample: Sample, rng: &mut ChaCha20Rng) -> Result<Sample, TransformError> {
        let dims = sample.image.dim();
        let max_r = dims.0.min(dims.1).min(dims.2) / 2;
        let mut label = sample
            .label
            .take()
            .unwrap_or_else(|| Array3::zeros(dims));
        if max_r == 0 {
            sample.label = Some(label);
            return Ok(sample);
        }

        let (lo, hi) = (self.radius.0.min(self.radius.1), self.radius.0.max(self.radius.1));
        let r = rng.random_range(lo..=hi).clamp(1, max_r);
        let c = (
            rng.random_range(r..=dims.0 - r),
            rng.random_range(r..=dims.1 - r),
            rng.random_range(r..=dims.2 - r),
        );
        let r2 = (r * r) as isize;
        let intensity = self.intensity;

        Zip::indexed(&mut sample.image)
            .and(&mut label)
            .for_each(|(i, j, k), v, l| {
                let d = (i as isize - c.0 as isize).pow(2)
                    + (j as isize - c.1 as isize).pow(2)
                    + (k as isize - c.2 as isize).pow(2);
                if d <= r2 {
                    *v = intensity;
                    *l = 1.0;
                }
            });

        sample.label = Some(label);
        Ok(sample)
    }
}

// ---------------------------------------------------------------------------
// Named pipelines
// ---------------------------------------------------------------------------

/// The four pipelines the loader builder chooses between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Train,
    Validation,
    Tumor,
    Lesion,
}

impl TransformKind {
    pub fn name(self) -> &'static str {
        match self {
            TransformKind::Train => "train",
            TransformKind::Validation => "validation",
            TransformKind::Tumor => "tumor",
            TransformKind::Lesion => "lesion",
        }
    }

    pub fn build(self, config: &Config) -> Compose {
        match self {
            TransformKind::Train => get_train_transform(config),
            TransformKind::Validation => get_val_transform(config),
            TransformKind::Tumor => get_tumor_transform(config),
            TransformKind::Lesion => get_lesion_transform(config),
        }
    }
}

fn centered(pipeline: Compose, config: &Config) -> Compose {
    if config.data.centered {
        pipeline.then(CenterIntensity)
    } else {
        pipeline
    }
}

pub fn get_train_transform(config: &Config) -> Compose {
    let base = Compose::new(TransformKind::Train.name(), LabelPolicy::Ignore)
        .then(ScaleIntensity)
        .then(ResizeWithPadOrCrop { size: config.data.image_size });
    centered(base, config)
        .then(RandFlip { axis: 0, prob: DEFAULT_AUGMENT_PROB })
        .then(RandShiftIntensity { offset: 0.05, prob: DEFAULT_AUGMENT_PROB })
}

pub fn get_val_transform(config: &Config) -> Compose {
    let base = Compose::new(TransformKind::Validation.name(), LabelPolicy::Ignore)
        .then(ScaleIntensity)
        .then(ResizeWithPadOrCrop { size: config.data.image_size });
    centered(base, config)
}

pub fn get_tumor_transform(config: &Config) -> Compose {
    let base = Compose::new(TransformKind::Tumor.name(), LabelPolicy::Ignore)
        .then(ScaleIntensity)
        .then(ResizeWithPadOrCrop { size: config.data.image_size })
        .then(SyntheticTumor {
            radius: SYNTHETIC_TUMOR_RADIUS,
            intensity: SYNTHETIC_TUMOR_INTENSITY,
        });
    centered(base, config)
}

/// Lesion samples are loaded together with their masks.
pub fn get_lesion_transform(config: &Config) -> Compose {
    let base = Compose::new(TransformKind::Lesion.name(), LabelPolicy::Required)
        .then(ScaleIntensity)
        .then(ResizeWithPadOrCrop { size: config.data.image_size })
        .then(BinarizeLabel { threshold: 0.5 });
    centered(base, config)
}
