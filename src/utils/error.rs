//! Error types and handling
//!
//! Crate-wide error type wrapping the per-module errors.

use crate::capture::CaptureError;
use crate::encoder::EncoderError;
use crate::recorder::{BufferError, SessionError, StopAllError};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error(transparent)]
    StopAll(#[from] StopAllError),
}

impl AppError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Capture(_) => "CAPTURE_ERROR",
            AppError::Encoder(_) => "ENCODER_ERROR",
            AppError::Buffer(_) => "BUFFER_STATE_ERROR",
            AppError::Session(SessionError::Lifecycle { .. }) => "LIFECYCLE_ERROR",
            AppError::Session(_) => "SESSION_ERROR",
            AppError::StopAll(_) => "STOP_ALL_ERROR",
        }
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
