use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

pub type Result<T, E = StyleError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum StyleError {
    /// Weight file missing, unreadable, corrupt, or lacking a parameter.
    #[error("failed to load model weights from {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    #[error("shape mismatch for `{name}`: expected {expected:?}, found {actual:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("unsupported image format for {}: {reason}", path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("unknown style `{0}`")]
    UnknownStyle(String),

    #[error("duplicate style `{0}` in catalog")]
    DuplicateStyle(String),

    #[error("invalid style catalog {}: {reason}", path.display())]
    Catalog { path: PathBuf, reason: String },

    #[error("invalid product id `{0}`")]
    InvalidProductId(String),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("deadline exceeded after {elapsed:?}")]
    DeadlineExceeded { elapsed: Duration },

    #[error(transparent)]
    Tensor(#[from] candle_core::Error),
}

impl StyleError {
    pub(crate) fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub(crate) fn model_load(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::ModelLoad {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unsupported_format(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::UnsupportedFormat {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }
}
