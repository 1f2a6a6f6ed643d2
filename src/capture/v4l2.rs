//! V4L2 camera backend with memory-mapped streaming

use std::io::ErrorKind;
use std::time::Duration;

use tracing::{info, instrument};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use super::decoder::decode_to_bgr;
use super::device::{CameraBackend, CameraDevice};
use super::frame::{CameraSelector, Frame, PixelFormat};
use crate::error::CaptureError;
use crate::CaptureConfig;

/// Opens `/dev/video{index}`
pub struct V4l2Backend {
    config: CaptureConfig,
}

impl V4l2Backend {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }
}

impl CameraBackend for V4l2Backend {
    #[instrument(skip(self))]
    fn open(&self, index: CameraSelector) -> Result<Box<dyn CameraDevice>, CaptureError> {
        let unavailable = |e: std::io::Error| CaptureError::unavailable(index, e.to_string());

        let device = Device::new(index.0 as usize).map_err(unavailable)?;

        let caps = device.query_caps().map_err(unavailable)?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(CaptureError::unavailable(index, "device doesn't support video capture"));
        }

        let mut fmt = device.format().map_err(unavailable)?;
        fmt.width = self.config.width;
        fmt.height = self.config.height;
        fmt.fourcc = FourCC::new(&self.config.format.fourcc());

        // The driver may round the size; keep what it actually chose
        let fmt = device.set_format(&fmt).map_err(unavailable)?;

        // Drivers fall back silently when a format is unsupported
        if PixelFormat::from_fourcc(fmt.fourcc.repr) != Some(self.config.format) {
            return Err(CaptureError::unavailable(
                index,
                format!(
                    "driver negotiated {} instead of {}",
                    fmt.fourcc,
                    FourCC::new(&self.config.format.fourcc())
                ),
            ));
        }

        let mut stream =
            MmapStream::with_buffers(&device, Type::VideoCapture, self.config.buffer_count)
                .map_err(unavailable)?;
        let timeout = Duration::from_millis(self.config.read_timeout_ms);
        stream.set_timeout(timeout);

        info!(
            "Capture stream started: {}x{} with {} buffers",
            fmt.width, fmt.height, self.config.buffer_count
        );

        Ok(Box::new(V4l2Camera {
            stream,
            _device: device,
            selector: index,
            width: fmt.width,
            height: fmt.height,
            format: self.config.format,
            timeout,
            sequence: 0,
        }))
    }

    fn name(&self) -> &'static str {
        "v4l2"
    }
}

struct V4l2Camera {
    // Dropped before the device so buffers are unmapped first
    stream: MmapStream<'static>,
    _device: Device,
    selector: CameraSelector,
    width: u32,
    height: u32,
    format: PixelFormat,
    timeout: Duration,
    sequence: u64,
}

impl CameraDevice for V4l2Camera {
    fn read(&mut self, timeout: Duration) -> Result<Frame, CaptureError> {
        if timeout != self.timeout {
            self.stream.set_timeout(timeout);
            self.timeout = timeout;
        }

        let (buf, meta) = self.stream.next().map_err(|e| match e.kind() {
            ErrorKind::TimedOut => CaptureError::ReadFailed("read timed out".into()),
            _ => CaptureError::ReadFailed(e.to_string()),
        })?;

        let used = (meta.bytesused as usize).min(buf.len());
        let decoded = decode_to_bgr(&buf[..used], self.format, self.width, self.height)?;

        self.sequence += 1;
        let frame = Frame::bgr(decoded.data, decoded.width, decoded.height, self.sequence)?;

        Ok(frame.with_device_timestamp(
            Duration::from_secs(meta.timestamp.sec as u64)
                + Duration::from_micros(meta.timestamp.usec as u64),
        ))
    }

    fn selector(&self) -> CameraSelector {
        self.selector
    }
}
