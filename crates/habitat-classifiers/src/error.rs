use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the habitat pipeline.
///
/// Structural problems (`Configuration`, `SchemaMismatch`) are detected before
/// any model is trained. Per-row missing values are never reported here: they
/// are dropped during training-set cleaning and masked during inference.
#[derive(Error, Debug)]
pub enum HabitatError {
    /// Misaligned, absent or otherwise unusable raster layers.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A future scenario's feature schema diverges from the present one.
    #[error("schema mismatch for scenario '{scenario}': {detail}")]
    SchemaMismatch { scenario: String, detail: String },

    /// Too few usable training rows after missing-value cleaning.
    #[error("insufficient training data: {0}")]
    InsufficientData(String),

    /// The classifier rejected the (cleaned) training data.
    #[error("failed to fit '{classifier}': {reason}")]
    ModelFit { classifier: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raster decode/encode failure for a specific file.
    #[error("raster error in {path}: {reason}")]
    Raster { path: PathBuf, reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl HabitatError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        HabitatError::Configuration(msg.into())
    }

    pub fn model_fit(classifier: impl Into<String>, reason: impl Into<String>) -> Self {
        HabitatError::ModelFit {
            classifier: classifier.into(),
            reason: reason.into(),
        }
    }

    pub fn raster(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        HabitatError::Raster {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the errors that must abort a species before any training.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            HabitatError::Configuration(_) | HabitatError::SchemaMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, HabitatError>;
