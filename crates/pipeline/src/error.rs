use bundle::{BundleError, MediaError};
use cache::CacheError;
use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Conversion failed ({status}): {message}")]
    ConversionFailed { status: u16, message: String },

    #[error("Failed to write output archive: {0}")]
    Archive(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl PipelineError {
    /// Network failure, as opposed to a reported build failure.
    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, PipelineError::Remote(RemoteError::Unavailable { .. }))
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(e: tokio::task::JoinError) -> Self {
        PipelineError::Task(e.to_string())
    }
}

impl From<zip::result::ZipError> for PipelineError {
    fn from(e: zip::result::ZipError) -> Self {
        PipelineError::Archive(e.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Archive(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
