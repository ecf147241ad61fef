//! Error taxonomy for setup-time and export failures.
//!
//! Per-image analysis failures never surface through this type during a batch; they are
//! recorded in [`BatchResult::failed`](crate::BatchResult::failed) instead.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisageError {
    /// Bad folder path, empty action set or unknown action name.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The analyzer ran but found no face.
    #[error("no face detected")]
    NoFaceDetected,

    /// The analyzer itself failed.
    #[error("inference failed: {0}")]
    Inference(String),

    #[error("unsupported export format '{0}' (expected csv or json)")]
    UnsupportedFormat(String),

    #[error("camera error: {0}")]
    Camera(String),

    #[error("worker pool error: {0}")]
    WorkerPool(String),

    #[error("failed to encode {format} export: {message}")]
    Serialization {
        format: &'static str,
        message: String,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl VisageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = VisageError> = std::result::Result<T, E>;
