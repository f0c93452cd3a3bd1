//! Error Types

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the cache, the index and the store
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cache file {path} is corrupt: {reason}")]
    CacheCorrupt { path: PathBuf, reason: String },

    #[error("Image not found: {0}")]
    ImageNotFound(PathBuf),

    #[error("Failed to decode image {path}: {reason}")]
    ImageDecode { path: PathBuf, reason: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("top-k query requires k >= 1")]
    InvalidTopK,

    #[error("No labels configured")]
    NoLabels,

    #[error("Dataset root does not exist: {0}")]
    DatasetRootMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by an [`Encoder`](crate::encoder::Encoder).
///
/// Wraps the encoder's own error untouched; reach it through
/// [`std::error::Error::source`] or [`EncoderError::into_inner`].
pub struct EncoderError(Box<dyn std::error::Error + Send + Sync + 'static>);

impl EncoderError {
    pub fn new<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self(err.into())
    }

    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self.0
    }
}

impl fmt::Debug for EncoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for EncoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for EncoderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}
