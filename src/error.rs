use thiserror::Error;

use crate::capture::CameraSelector;

/// Camera and capture-loop failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The device could not be opened. Fatal to a start attempt.
    #[error("camera {index} unavailable: {reason}")]
    DeviceUnavailable { index: CameraSelector, reason: String },

    /// A single frame read failed. Transient; the loop keeps going.
    #[error("frame read failed: {0}")]
    ReadFailed(String),
}

impl CaptureError {
    pub fn unavailable(index: CameraSelector, reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            index,
            reason: reason.into(),
        }
    }

    /// Per-frame errors the capture loop absorbs
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ReadFailed(_))
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("buffer holds {actual} bytes, expected {expected} for {width}x{height}")]
    Length {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
    },

    #[error("jpeg decode failed: {0}")]
    Jpeg(#[from] jpeg_decoder::Error),

    #[error("unsupported pixel layout: {0}")]
    Unsupported(String),
}

impl From<DecodeError> for CaptureError {
    fn from(e: DecodeError) -> Self {
        CaptureError::ReadFailed(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("frame rejected by detector: {0}")]
    InvalidFrame(String),

    #[error("detector failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("sink failed: {0}")]
    Sink(String),
}
