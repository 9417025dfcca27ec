// src/datasets/names.rs
//
// Validation of configured dataset names and resolution of the OOD kind.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::config::DataConfig;
use crate::datasets::transforms::TransformKind;

static DATASET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(abcd|ibis)").expect("dataset pattern is valid"));
static OOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(tumor|lesion|ds-sa)").expect("ood pattern is valid"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("unsupported dataset `{0}`: expected a name starting with abcd or ibis")]
    Dataset(String),

    #[error("unsupported OOD dataset `{0}`: expected a name starting with tumor, lesion or ds-sa")]
    Ood(String),
}

/// In-distribution dataset families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFamily {
    Abcd,
    Ibis,
}

impl DatasetFamily {
    /// Case-insensitive match on the start of `name`.
    pub fn parse(name: &str) -> Result<Self, NameError> {
        let lower = name.to_lowercase();
        match DATASET_RE.captures(&lower).and_then(|c| c.get(1)).map(|m| m.as_str()) {
            Some("abcd") => Ok(DatasetFamily::Abcd),
            Some("ibis") => Ok(DatasetFamily::Ibis),
            _ => Err(NameError::Dataset(name.to_string())),
        }
    }
}

/// How the out-of-distribution test set is assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OodKind {
    /// Lesion samples with masks, stored next to the primary data directory
    Lesion { name: String },
    /// The primary dataset with synthetic tumors painted in
    Tumor,
    /// An image-only OOD set read from the primary dataset's files
    ImageOnly { name: String },
}

impl OodKind {
    /// Resolve from the configured name, once.
    ///
    /// The name is lowercased; anything containing `lesion` is a lesion set,
    /// exactly `tumor` is the tumor set, any other accepted name is image-only.
    pub fn parse(ood_ds: &str) -> Result<Self, NameError> {
        let name = ood_ds.to_lowercase();
        if !OOD_RE.is_match(&name) {
            return Err(NameError::Ood(ood_ds.to_string()));
        }
        Ok(if name.contains("lesion") {
            OodKind::Lesion { name }
        } else if name == "tumor" {
            OodKind::Tumor
        } else {
            OodKind::ImageOnly { name }
        })
    }

    pub fn name(&self) -> &str {
        match self {
            OodKind::Lesion { name } | OodKind::ImageOnly { name } => name,
            OodKind::Tumor => "tumor",
        }
    }

    /// Pipeline used for the OOD test split.
    pub fn transform_kind(&self) -> TransformKind {
        match self {
            OodKind::Lesion { .. } => TransformKind::Lesion,
            OodKind::Tumor => TransformKind::Tumor,
            OodKind::ImageOnly { .. } => TransformKind::Validation,
        }
    }
}

/// Check both configured names. Nothing is read from disk.
pub fn validate_names(data: &DataConfig) -> Result<(DatasetFamily, OodKind), NameError> {
    let family = DatasetFamily::parse(&data.dataset)?;
    let ood = OodKind::parse(&data.ood_ds)?;
    Ok((family, ood))
}
