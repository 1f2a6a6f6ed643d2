//! Test-pattern cameras for running the pipeline without hardware

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use super::device::{CameraBackend, CameraDevice};
use super::frame::{CameraSelector, Frame};
use crate::error::CaptureError;

/// Backend exposing `devices` virtual cameras with indexes `0..devices`
pub struct SyntheticBackend {
    devices: u32,
    width: u32,
    height: u32,
    frame_interval: Duration,
    fail_every: Option<u64>,
    held: Arc<Mutex<HashSet<u32>>>,
    opens: AtomicUsize,
}

impl SyntheticBackend {
    pub fn new(devices: u32, width: u32, height: u32, fps: u32) -> Self {
        Self {
            devices,
            width,
            height,
            frame_interval: Duration::from_millis(1000 / fps.max(1) as u64),
            fail_every: None,
            held: Arc::new(Mutex::new(HashSet::new())),
            opens: AtomicUsize::new(0),
        }
    }

    /// Every `n`th read fails with a transient error
    pub fn with_failure_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    /// Number of successful opens so far
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn is_held(&self, index: CameraSelector) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&index.0)
    }
}

impl CameraBackend for SyntheticBackend {
    fn open(&self, index: CameraSelector) -> Result<Box<dyn CameraDevice>, CaptureError> {
        if index.0 >= self.devices {
            return Err(CaptureError::unavailable(index, "no such device"));
        }

        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(index.0) {
            return Err(CaptureError::unavailable(index, "device busy"));
        }
        drop(held);

        self.opens.fetch_add(1, Ordering::SeqCst);
        debug!("Opened synthetic camera {}", index);

        Ok(Box::new(SyntheticCamera {
            selector: index,
            width: self.width,
            height: self.height,
            frame_interval: self.frame_interval,
            next_due: Instant::now(),
            reads: 0,
            sequence: 0,
            fail_every: self.fail_every,
            held: Arc::clone(&self.held),
        }))
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}

struct SyntheticCamera {
    selector: CameraSelector,
    width: u32,
    height: u32,
    frame_interval: Duration,
    next_due: Instant,
    reads: u64,
    sequence: u64,
    fail_every: Option<u64>,
    held: Arc<Mutex<HashSet<u32>>>,
}

impl SyntheticCamera {
    fn pattern(&self) -> Vec<u8> {
        let shift = self.sequence as usize;
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                data.push((x + shift) as u8); // B
                data.push(y as u8); // G
                data.push((shift * 2) as u8); // R
            }
        }
        data
    }
}

impl CameraDevice for SyntheticCamera {
    fn read(&mut self, timeout: Duration) -> Result<Frame, CaptureError> {
        let now = Instant::now();
        let wait = self.next_due.saturating_duration_since(now);
        if wait > timeout {
            std::thread::sleep(timeout);
            return Err(CaptureError::ReadFailed("read timed out".into()));
        }
        std::thread::sleep(wait);
        self.next_due = Instant::now() + self.frame_interval;

        self.reads += 1;
        if let Some(n) = self.fail_every {
            if self.reads % n == 0 {
                return Err(CaptureError::ReadFailed(format!(
                    "synthetic failure on read {}",
                    self.reads
                )));
            }
        }

        self.sequence += 1;
        Frame::bgr(self.pattern(), self.width, self.height, self.sequence).map_err(Into::into)
    }

    fn selector(&self) -> CameraSelector {
        self.selector
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.selector.0);
        debug!("Released synthetic camera {}", self.selector);
    }
}
