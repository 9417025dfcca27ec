// src/config/mod.rs
//
// Hyperparameter configuration: typed nested sections, JSON patches on top of
// a known-good base, and `key=value` overrides for the CLI.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod default;
pub mod flow_v2;
pub mod merge;

pub use default::get_default_config;
pub use merge::merge_patch;

/// Errors raised while reading or patching a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid override `{0}`: expected dotted.key=value")]
    Override(String),
}

/// Full configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub training: TrainingConfig,
    pub eval: EvalConfig,
    pub data: DataConfig,
    pub model: ModelConfig,
    pub optim: OptimConfig,
    pub flow: FlowConfig,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainingConfig {
    pub batch_size: usize,
    pub n_iters: u64,
    pub log_freq: u64,
    pub eval_freq: u64,
    pub snapshot_freq: u64,
    /// Mixed-precision training
    pub use_fp16: bool,
    pub sde: String,
    pub continuous: bool,
    pub reduce_mean: bool,
    pub likelihood_weighting: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvalConfig {
    pub batch_size: usize,
    pub sample_size: usize,
    pub checkpoint_num: i64,
}

/// Which in-distribution split serves as the inlier set during OOD evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InlierSplit {
    #[default]
    Val,
    Test,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// In-distribution dataset name (`abcd*` or `ibis*`)
    pub dataset: String,
    /// Out-of-distribution sample set (`tumor`, `lesion*`, `ds-sa*`)
    pub ood_ds: String,
    /// Directory holding the data samples
    pub dir_path: PathBuf,
    /// Directory holding the train/val/test split files
    pub splits_dir: PathBuf,
    /// Fraction of each split cached in memory after preprocessing
    pub cache_rate: f64,
    pub image_size: [usize; 3],
    pub spacing: f64,
    /// Map intensities to [-1, 1] instead of [0, 1]
    pub centered: bool,
    #[serde(default)]
    pub ood_inlier_split: InlierSplit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub name: String,
    pub ema_rate: f64,
    pub nf: usize,
    pub ch_mult: Vec<usize>,
    pub num_res_blocks: usize,
    pub dropout: f64,
    pub sigma_min: f64,
    pub sigma_max: f64,
    pub num_scales: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptimConfig {
    pub optimizer: String,
    pub lr: f64,
    pub beta1: f64,
    pub eps: f64,
    pub weight_decay: f64,
    pub warmup: u64,
    pub grad_clip: f64,
}

/// Base distribution of the normalizing flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseDistribution {
    GaussianMixture,
    MultivariateNormal,
}

/// Kernel geometry of one patch-extraction scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchConfig {
    pub kernel_size: usize,
    pub padding: usize,
    pub stride: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlowConfig {
    pub base_distribution: BaseDistribution,
    pub gmm_components: usize,
    pub num_blocks: usize,
    pub context_embedding_size: usize,
    pub use_global_context: bool,
    pub global_embedding_size: usize,
    pub input_norm: bool,
    pub dropout: f64,
    pub lr: f64,
    pub patch_batch_size: usize,
    pub patches_per_train_step: usize,
    pub training_kimg: usize,
    /// Local receptive field
    pub local_patch_config: PatchConfig,
    /// Larger receptive field producing the global context
    pub global_patch_config: PatchConfig,
}

impl Config {
    /// Load a complete configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Config, ConfigError> {
        let tree = read_patch_file(path)?;
        Ok(serde_json::from_value(tree)?)
    }

    /// Return a copy of `self` with `patch` merged in.
    ///
    /// The patch is a nested JSON object mirroring the config layout; only the
    /// keys it names are replaced. Unknown keys are rejected.
    pub fn apply_patch(&self, patch: &Value) -> Result<Config, ConfigError> {
        let mut tree = serde_json::to_value(self)?;
        merge_patch(&mut tree, patch);
        Ok(serde_json::from_value(tree)?)
    }

    /// Apply a list of `dotted.key=value` overrides in order.
    pub fn apply_overrides<S: AsRef<str>>(&self, overrides: &[S]) -> Result<Config, ConfigError> {
        let mut patch = Value::Object(Default::default());
        for item in overrides {
            merge_patch(&mut patch, &parse_override(item.as_ref())?);
        }
        self.apply_patch(&patch)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Read a JSON patch file.
pub fn read_patch_file(path: &Path) -> Result<Value, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// Turn `data.cache_rate=0.5` into `{"data": {"cache_rate": 0.5}}`.
///
/// The value is parsed as JSON; anything that is not valid JSON is taken as a
/// plain string, so `data.dataset=ibis` works without quoting.
pub fn parse_override(item: &str) -> Result<Value, ConfigError> {
    let (key, raw) = item
        .split_once('=')
        .ok_or_else(|| ConfigError::Override(item.to_string()))?;

    let parts: Vec<&str> = key.trim().split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::Override(item.to_string()));
    }

    let raw = raw.trim();
    let mut value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    for part in parts.iter().rev() {
        let mut obj = serde_json::Map::new();
        obj.insert((*part).to_string(), value);
        value = Value::Object(obj);
    }
    Ok(value)
}
