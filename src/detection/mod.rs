//! Contract with the drowsiness detection stage.
//!
//! The detector itself is an external collaborator; the pipeline only needs a
//! synchronous, deterministic `process` over one BGR frame.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::capture::frame::PixelFormat;
use crate::capture::Frame;
use crate::error::DetectionError;
use crate::DetectionConfig;

/// Per-frame drowsiness verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DrowsinessStatus {
    #[default]
    Alert,
    DrowsyWarning,
}

impl DrowsinessStatus {
    pub fn label(self) -> &'static str {
        match self {
            DrowsinessStatus::Alert => "Alert",
            DrowsinessStatus::DrowsyWarning => "Drowsiness Detected",
        }
    }

    /// Border color in BGR order
    pub fn color(self) -> [u8; 3] {
        match self {
            DrowsinessStatus::Alert => [0, 200, 0],
            DrowsinessStatus::DrowsyWarning => [0, 0, 230],
        }
    }
}

impl fmt::Display for DrowsinessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Annotated frame plus verdict
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub frame: Frame,
    pub status: DrowsinessStatus,
}

/// The detection stage.
///
/// Must not share mutable state with the capture worker.
pub trait Detector: Send + Sync {
    fn process(&self, frame: Frame) -> Result<DetectionResult, DetectionError>;
}

impl<F> Detector for F
where
    F: Fn(Frame) -> Result<DetectionResult, DetectionError> + Send + Sync,
{
    fn process(&self, frame: Frame) -> Result<DetectionResult, DetectionError> {
        self(frame)
    }
}

/// Stand-in detector: always `Alert`, optionally framing the image
pub struct PassthroughDetector {
    config: DetectionConfig,
}

impl PassthroughDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }
}

impl Detector for PassthroughDetector {
    fn process(&self, frame: Frame) -> Result<DetectionResult, DetectionError> {
        if frame.meta.format != PixelFormat::Bgr24 {
            return Err(DetectionError::InvalidFrame(format!(
                "expected Bgr24, got {:?}",
                frame.meta.format
            )));
        }

        let status = DrowsinessStatus::Alert;
        let frame = if self.config.annotate {
            annotate_border(&frame, status, self.config.border_px)
        } else {
            frame
        };

        Ok(DetectionResult { frame, status })
    }
}

/// Copy of `frame` with a status-colored border `width` pixels thick
pub fn annotate_border(frame: &Frame, status: DrowsinessStatus, width: u32) -> Frame {
    let (w, h) = (frame.width(), frame.height());
    let stride = frame.meta.stride as usize;
    let color = status.color();
    let mut data = frame.data.to_vec();

    for y in 0..h {
        for x in 0..w {
            let edge = x < width
                || y < width
                || x.saturating_add(width) >= w
                || y.saturating_add(width) >= h;
            if edge {
                let idx = y as usize * stride + x as usize * 3;
                data[idx..idx + 3].copy_from_slice(&color);
            }
        }
    }

    Frame {
        data: Bytes::from(data),
        meta: frame.meta.clone(),
        timestamp: frame.timestamp,
    }
}
