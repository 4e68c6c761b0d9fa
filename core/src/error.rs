use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, IndexError>;

/// Failures surfaced by the index and its persistence layer.
///
/// `NotFound` and `Corrupt` are kept apart so callers can decide between
/// rebuilding from source records and aborting.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// `search` was called before any successful `fit` or `load`.
    #[error("index has not been fitted yet")]
    NotFitted,

    #[error("index file not found at {}", path.display())]
    NotFound { path: PathBuf },

    /// The blob exists but could not be decoded or failed validation.
    #[error("index file at {} is corrupt: {detail}", path.display())]
    Corrupt { path: PathBuf, detail: String },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Corrupt { path: path.into(), detail: detail.into() }
    }
}
