use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::DecodeError;

/// Opaque index of a physical camera, fixed for the duration of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraSelector(pub u32);

impl fmt::Display for CameraSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for CameraSelector {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

/// Frame data with zero-copy semantics.
///
/// Pixels past the capture stage are always interleaved BGR24, the layout the
/// detector expects; conversion to RGB happens only at render time.
#[derive(Clone)]
pub struct Frame {
    /// Immutable frame data - can be shared across threads without copying
    pub data: Bytes,

    /// Frame metadata
    pub meta: Arc<FrameMetadata>,

    /// Capture timestamp for latency tracking
    pub timestamp: Instant,
}

/// Frame metadata
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMetadata {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    /// Bytes per row
    pub stride: u32,
    pub format: PixelFormat,
    pub device_timestamp: Option<Duration>, // Hardware timestamp if available
}

/// Pixel formats we support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Yuyv4,
    Mjpeg,
    Nv12,
}

impl PixelFormat {
    /// Expected buffer size for an uncompressed frame
    pub fn frame_len(self, width: u32, height: u32) -> Option<usize> {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => Some(pixels * 3),
            PixelFormat::Yuyv4 => Some(pixels * 2),
            PixelFormat::Nv12 => Some(pixels + pixels / 2),
            PixelFormat::Mjpeg => None,
        }
    }

    /// V4L2 four-character code
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            PixelFormat::Rgb24 => *b"RGB3",
            PixelFormat::Bgr24 => *b"BGR3",
            PixelFormat::Yuyv4 => *b"YUYV",
            PixelFormat::Mjpeg => *b"MJPG",
            PixelFormat::Nv12 => *b"NV12",
        }
    }

    pub fn from_fourcc(code: [u8; 4]) -> Option<Self> {
        match &code {
            b"RGB3" => Some(PixelFormat::Rgb24),
            b"BGR3" => Some(PixelFormat::Bgr24),
            b"YUYV" => Some(PixelFormat::Yuyv4),
            b"MJPG" => Some(PixelFormat::Mjpeg),
            b"NV12" => Some(PixelFormat::Nv12),
            _ => None,
        }
    }
}

/// Fill color of the placeholder shown when no frame is available (dark gray)
pub const PLACEHOLDER_BGR: [u8; 3] = [0xA9, 0xA9, 0xA9];

impl Frame {
    /// Wrap an interleaved BGR24 buffer
    pub fn bgr(data: impl Into<Bytes>, width: u32, height: u32, sequence: u64) -> Result<Self, DecodeError> {
        let data = data.into();
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(DecodeError::Length {
                expected,
                actual: data.len(),
                width,
                height,
            });
        }

        Ok(Self {
            data,
            meta: Arc::new(FrameMetadata {
                sequence,
                width,
                height,
                stride: width * 3,
                format: PixelFormat::Bgr24,
                device_timestamp: None,
            }),
            timestamp: Instant::now(),
        })
    }

    /// Solid dark-gray frame
    pub fn placeholder(width: u32, height: u32) -> Self {
        let data: Vec<u8> = PLACEHOLDER_BGR
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();

        Self {
            data: Bytes::from(data),
            meta: Arc::new(FrameMetadata {
                sequence: 0,
                width,
                height,
                stride: width * 3,
                format: PixelFormat::Bgr24,
                device_timestamp: None,
            }),
            timestamp: Instant::now(),
        }
    }

    pub fn with_device_timestamp(mut self, ts: Duration) -> Self {
        Arc::make_mut(&mut self.meta).device_timestamp = Some(ts);
        self
    }

    pub fn width(&self) -> u32 {
        self.meta.width
    }

    pub fn height(&self) -> u32 {
        self.meta.height
    }

    pub fn sequence(&self) -> u64 {
        self.meta.sequence
    }

    /// BGR pixel at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.meta.width || y >= self.meta.height {
            return None;
        }
        let idx = y as usize * self.meta.stride as usize + x as usize * 3;
        self.data.get(idx..idx + 3).map(|p| [p[0], p[1], p[2]])
    }

    /// Copy out as interleaved RGB24 for rendering
    pub fn to_rgb(&self) -> Vec<u8> {
        let mut rgb = Vec::with_capacity(self.data.len());
        for px in self.data.chunks_exact(3) {
            rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }
        rgb
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.meta.sequence)
            .field("width", &self.meta.width)
            .field("height", &self.meta.height)
            .field("format", &self.meta.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_rejects_wrong_length() {
        let err = Frame::bgr(vec![0u8; 10], 2, 2, 1).unwrap_err();
        assert!(matches!(err, DecodeError::Length { expected: 12, actual: 10, .. }));
    }

    #[test]
    fn to_rgb_swaps_channel_order() {
        let frame = Frame::bgr(vec![1, 2, 3, 4, 5, 6], 2, 1, 1).unwrap();
        assert_eq!(frame.to_rgb(), vec![3, 2, 1, 6, 5, 4]);
        assert_eq!(frame.pixel(1, 0), Some([4, 5, 6]));
        assert_eq!(frame.pixel(2, 0), None);
    }

    #[test]
    fn placeholder_is_dark_gray() {
        let frame = Frame::placeholder(4, 3);
        assert_eq!(frame.data.len(), 4 * 3 * 3);
        assert!(frame.data.chunks(3).all(|px| px == PLACEHOLDER_BGR));
        assert_eq!(frame.meta.format, PixelFormat::Bgr24);
    }

    #[test]
    fn fourcc_codes_map_back() {
        assert_eq!(PixelFormat::Mjpeg.fourcc(), *b"MJPG");
        assert_eq!(PixelFormat::from_fourcc(*b"YUYV"), Some(PixelFormat::Yuyv4));
        assert_eq!(PixelFormat::from_fourcc(*b"H264"), None);
    }
}
