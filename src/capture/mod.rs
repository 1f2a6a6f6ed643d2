pub mod decoder;
pub mod device;
pub mod frame;
pub mod synthetic;
#[cfg(feature = "v4l2")]
pub mod v4l2;

use std::sync::Arc;

pub use device::{CameraBackend, CameraDevice};
pub use frame::{CameraSelector, Frame, FrameMetadata, PixelFormat};
pub use synthetic::SyntheticBackend;
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Backend;

use crate::error::ConfigError;
use crate::{CameraBackendKind, CaptureConfig};

/// Build the camera backend named in the configuration
pub fn backend_from_config(config: &CaptureConfig) -> Result<Arc<dyn CameraBackend>, ConfigError> {
    match config.backend {
        CameraBackendKind::Synthetic => Ok(Arc::new(SyntheticBackend::new(
            config.synthetic_devices,
            config.width,
            config.height,
            config.fps,
        ))),
        #[cfg(feature = "v4l2")]
        CameraBackendKind::V4l2 => Ok(Arc::new(V4l2Backend::new(config.clone()))),
        #[cfg(not(feature = "v4l2"))]
        CameraBackendKind::V4l2 => Err(ConfigError::Invalid(
            "v4l2 backend requested but vigil was built without the `v4l2` feature".into(),
        )),
    }
}
