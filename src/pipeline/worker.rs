//! Frame acquisition loop on a dedicated thread

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::channel::FrameChannel;
use crate::capture::{CameraBackend, CameraDevice, CameraSelector};
use crate::detection::{Detector, DrowsinessStatus};
use crate::error::CaptureError;
use crate::session::{self, SessionEvent};

/// Log the first transient read failure, then every Nth in a row
const READ_ERROR_LOG_EVERY: u64 = 100;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Bound on a single device read; cancellation is checked at least this often
    pub read_timeout: Duration,
    pub cpu_affinity: Option<usize>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(200),
            cpu_affinity: None,
        }
    }
}

/// Owns one camera for its lifetime and feeds detection results into a
/// `FrameChannel`.
///
/// `stop` only raises a flag. The thread exits after its current iteration
/// and releases the device when it does.
pub struct CaptureWorker {
    selector: CameraSelector,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    /// Open the camera on the calling thread, then spawn the loop.
    ///
    /// Open failures come back synchronously as `DeviceUnavailable`.
    pub fn start(
        backend: &dyn CameraBackend,
        selector: CameraSelector,
        detector: Arc<dyn Detector>,
        channel: Arc<FrameChannel>,
        events: flume::Sender<SessionEvent>,
        settings: WorkerSettings,
    ) -> Result<Self, CaptureError> {
        let device = backend.open(selector)?;
        info!("Opened camera {} via {}", selector, backend.name());

        let cancel = Arc::new(AtomicBool::new(false));
        let ctx = LoopContext {
            device,
            detector,
            channel,
            events,
            cancel: Arc::clone(&cancel),
            settings,
        };

        // The device moves into the closure, so a failed spawn drops and releases it
        let handle = std::thread::Builder::new()
            .name(format!("capture-{}", selector.0))
            .spawn(move || ctx.run())
            .map_err(|e| CaptureError::unavailable(selector, format!("spawn failed: {}", e)))?;

        Ok(Self {
            selector,
            cancel,
            handle: Some(handle),
        })
    }

    /// Ask the loop to exit. Idempotent, never blocks.
    pub fn stop(&self) {
        if !self.cancel.swap(true, Ordering::AcqRel) {
            debug!("Stop requested for camera {}", self.selector);
        }
    }

    pub fn selector(&self) -> CameraSelector {
        self.selector
    }

    /// True once the thread has exited and the device is released
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait up to `timeout` for the thread to exit. Returns whether it did.
    pub fn join_timeout(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Capture thread for camera {} panicked", self.selector);
            }
        }
        true
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

struct LoopContext {
    device: Box<dyn CameraDevice>,
    detector: Arc<dyn Detector>,
    channel: Arc<FrameChannel>,
    events: flume::Sender<SessionEvent>,
    cancel: Arc<AtomicBool>,
    settings: WorkerSettings,
}

impl LoopContext {
    fn run(self) {
        let selector = self.device.selector();
        pin_to_core(self.settings.cpu_affinity);
        info!("Capture loop running for camera {}", selector);

        let LoopContext {
            mut device,
            detector,
            channel,
            events,
            cancel,
            settings,
        } = self;

        let mut last_status = DrowsinessStatus::Alert;
        let mut consecutive_failures = 0u64;

        while !cancel.load(Ordering::Acquire) {
            let frame = match device.read(settings.read_timeout) {
                Ok(frame) => {
                    consecutive_failures = 0;
                    frame
                }
                Err(e) => {
                    consecutive_failures += 1;
                    metrics::counter!("vigil_capture_read_errors").increment(1);
                    if consecutive_failures == 1 || consecutive_failures % READ_ERROR_LOG_EVERY == 0 {
                        warn!(
                            "Camera {} read error ({} in a row): {}",
                            selector, consecutive_failures, e
                        );
                    }
                    continue;
                }
            };
            metrics::counter!("vigil_frames_captured").increment(1);

            let detect_start = Instant::now();
            let result = match detector.process(frame) {
                Ok(result) => result,
                Err(e) => {
                    metrics::counter!("vigil_detection_errors").increment(1);
                    warn!("Detection failed, skipping frame: {}", e);
                    continue;
                }
            };
            metrics::histogram!("vigil_detection_time_us")
                .record(detect_start.elapsed().as_micros() as f64);

            // A stop that landed during detection wins over this frame
            if cancel.load(Ordering::Acquire) {
                break;
            }

            if result.status != last_status {
                last_status = result.status;
                debug!("Camera {} status changed: {}", selector, last_status);
                session::emit(&events, SessionEvent::StatusChanged(last_status));
            }

            channel.publish(result);
        }

        drop(device);
        info!("Capture loop for camera {} exited, device released", selector);
    }
}

fn pin_to_core(core: Option<usize>) {
    let Some(wanted) = core else {
        return;
    };

    let core_id = core_affinity::get_core_ids()
        .and_then(|ids| ids.into_iter().find(|c| c.id == wanted));

    match core_id {
        Some(id) if core_affinity::set_for_current(id) => debug!("Capture thread pinned to core {}", wanted),
        _ => warn!("Could not pin capture thread to core {}", wanted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Frame, SyntheticBackend};
    use crate::detection::DetectionResult;
    use crate::error::DetectionError;
    use crate::pipeline::Latest;

    fn alert_detector() -> Arc<dyn Detector> {
        Arc::new(|frame: Frame| {
            Ok::<_, DetectionError>(DetectionResult {
                frame,
                status: DrowsinessStatus::Alert,
            })
        })
    }

    fn settings() -> WorkerSettings {
        WorkerSettings {
            read_timeout: Duration::from_millis(50),
            cpu_affinity: None,
        }
    }

    fn wait_for_frame(channel: &FrameChannel) -> Latest {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let latest = channel.take_latest();
            if !latest.is_placeholder() || Instant::now() > deadline {
                return latest;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn publishes_frames_until_stopped() {
        let backend = SyntheticBackend::new(1, 8, 8, 200);
        let channel = Arc::new(FrameChannel::new());
        let (tx, _rx) = flume::unbounded();

        let mut worker = CaptureWorker::start(
            &backend,
            CameraSelector(0),
            alert_detector(),
            Arc::clone(&channel),
            tx,
            settings(),
        )
        .unwrap();

        assert!(!wait_for_frame(&channel).is_placeholder());
        assert!(backend.is_held(CameraSelector(0)));

        worker.stop();
        worker.stop();
        assert!(worker.join_timeout(Duration::from_secs(2)));
        assert!(!backend.is_held(CameraSelector(0)));
    }

    #[test]
    fn open_failure_is_synchronous() {
        let backend = SyntheticBackend::new(1, 8, 8, 200);
        let (tx, _rx) = flume::unbounded();
        let err = CaptureWorker::start(
            &backend,
            CameraSelector(3),
            alert_detector(),
            Arc::new(FrameChannel::new()),
            tx,
            settings(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, CaptureError::DeviceUnavailable { .. }));
    }

    #[test]
    fn read_failures_do_not_end_the_loop() {
        let backend = SyntheticBackend::new(1, 4, 4, 500).with_failure_every(2);
        let channel = Arc::new(FrameChannel::new());
        let (tx, _rx) = flume::unbounded();
        let mut worker = CaptureWorker::start(
            &backend,
            CameraSelector(0),
            alert_detector(),
            Arc::clone(&channel),
            tx,
            settings(),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while channel.stats().published < 5 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(channel.stats().published >= 5);
        assert!(!worker.is_finished());

        worker.stop();
        assert!(worker.join_timeout(Duration::from_secs(2)));
    }

    #[test]
    fn detection_failures_skip_the_frame() {
        let backend = SyntheticBackend::new(1, 4, 4, 500);
        let channel = Arc::new(FrameChannel::new());
        let (tx, _rx) = flume::unbounded();
        let failing: Arc<dyn Detector> = Arc::new(|frame: Frame| {
            if frame.sequence() % 2 == 0 {
                Err(DetectionError::Failed("odd lighting".into()))
            } else {
                Ok(DetectionResult {
                    frame,
                    status: DrowsinessStatus::Alert,
                })
            }
        });

        let mut worker = CaptureWorker::start(
            &backend,
            CameraSelector(0),
            failing,
            Arc::clone(&channel),
            tx,
            settings(),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while channel.stats().published < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        worker.stop();
        assert!(worker.join_timeout(Duration::from_secs(2)));

        if let Latest::Frame(r) = channel.take_latest() {
            assert_eq!(r.frame.sequence() % 2, 1);
        } else {
            panic!("expected a published frame");
        }
    }

    #[test]
    fn status_changes_are_reported_once() {
        let backend = SyntheticBackend::new(1, 4, 4, 500);
        let channel = Arc::new(FrameChannel::new());
        let (tx, rx) = flume::unbounded();
        let drowsy: Arc<dyn Detector> = Arc::new(|frame: Frame| {
            Ok::<_, DetectionError>(DetectionResult {
                frame,
                status: DrowsinessStatus::DrowsyWarning,
            })
        });

        let mut worker =
            CaptureWorker::start(&backend, CameraSelector(0), drowsy, Arc::clone(&channel), tx, settings())
                .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while channel.stats().published < 3 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        worker.stop();
        assert!(worker.join_timeout(Duration::from_secs(2)));

        let events: Vec<_> = rx.drain().collect();
        assert_eq!(
            events,
            vec![SessionEvent::StatusChanged(DrowsinessStatus::DrowsyWarning)]
        );
    }
}
