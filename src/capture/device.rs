//! Camera device seam between the capture loop and concrete backends

use std::time::Duration;

use super::frame::{CameraSelector, Frame};
use crate::error::CaptureError;

/// An opened camera, exclusively owned by one capture worker.
///
/// The device is released when the handle is dropped.
pub trait CameraDevice: Send {
    /// Block for the next frame, at most `timeout`.
    ///
    /// Frames are returned as BGR24. A timeout or a bad buffer is
    /// `CaptureError::ReadFailed`.
    fn read(&mut self, timeout: Duration) -> Result<Frame, CaptureError>;

    fn selector(&self) -> CameraSelector;
}

/// Opens camera devices by index
pub trait CameraBackend: Send + Sync {
    /// Fails with `CaptureError::DeviceUnavailable` if the device does not
    /// exist, cannot be configured, or is held by another worker.
    fn open(&self, index: CameraSelector) -> Result<Box<dyn CameraDevice>, CaptureError>;

    fn name(&self) -> &'static str;
}
