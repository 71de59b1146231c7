use std::path::PathBuf;

use thiserror::Error;

/// Why a single clip could not be turned into PCM.
///
/// Load errors are per item: the loader logs them and keeps going, and the
/// failed position ends up as a silent clip after normalization.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("failed to decode samples: {0}")]
    Decode(#[from] hound::Error),

    #[error("unsupported sample format: {bits}-bit {format}")]
    UnsupportedFormat { bits: u16, format: &'static str },

    #[error("invalid sample layout: {0}")]
    InvalidLayout(String),
}
