//! Idle/Running session over one capture worker and the session clock

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{info, instrument, warn};

use super::clock::{ElapsedTime, SessionClock};
use super::{emit, SessionEvent, SessionState};
use crate::capture::{CameraBackend, CameraSelector};
use crate::detection::Detector;
use crate::error::CaptureError;
use crate::pipeline::channel::ChannelStats;
use crate::pipeline::worker::{CaptureWorker, WorkerSettings};
use crate::pipeline::{FrameChannel, Latest};
use crate::SharedConfig;

/// The only handle presentation code talks to.
///
/// All methods take `&self`. The internal lock is never held across device
/// I/O, so queries and ticks stay responsive while a camera opens or a
/// previous worker winds down.
pub struct SessionController {
    backend: Arc<dyn CameraBackend>,
    detector: Arc<dyn Detector>,
    config: SharedConfig,
    inner: Mutex<Inner>,
    events_tx: flume::Sender<SessionEvent>,
    events_rx: flume::Receiver<SessionEvent>,
}

struct Inner {
    state: SessionState,
    /// A `start` is opening its camera outside the lock
    starting: bool,
    /// `stop` arrived while `starting`
    start_cancelled: bool,
    camera: Option<CameraSelector>,
    worker: Option<CaptureWorker>,
    /// Stopped workers that may still be releasing their device
    retiring: Vec<CaptureWorker>,
    channel: Arc<FrameChannel>,
    clock: SessionClock,
}

impl SessionController {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        detector: Arc<dyn Detector>,
        config: SharedConfig,
    ) -> Self {
        let (events_tx, events_rx) = flume::bounded(config.load().session.event_queue_capacity);
        Self {
            backend,
            detector,
            config,
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                starting: false,
                start_cancelled: false,
                camera: None,
                worker: None,
                retiring: Vec::new(),
                channel: Arc::new(FrameChannel::new()),
                clock: SessionClock::new(),
            }),
            events_tx,
            events_rx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin monitoring `camera`. No-op while already running.
    ///
    /// Fails with `DeviceUnavailable` if the camera cannot be opened, if the
    /// previous session's worker has not released it within
    /// `capture.release_timeout_ms`, or if another `start` is still opening.
    #[instrument(skip(self))]
    pub fn start(&self, camera: CameraSelector) -> Result<(), CaptureError> {
        // Claim the start, then give the lock back for the slow part
        let mut previous = {
            let mut inner = self.lock();
            if inner.state == SessionState::Running {
                return Ok(());
            }
            if inner.starting {
                return Err(CaptureError::unavailable(camera, "another start is in progress"));
            }
            inner.starting = true;
            inner.start_cancelled = false;

            let retiring = std::mem::take(&mut inner.retiring);
            let (same, others): (Vec<_>, Vec<_>) = retiring
                .into_iter()
                .filter(|w| !w.is_finished())
                .partition(|w| w.selector() == camera);
            inner.retiring = others;
            same
        };

        let (release_timeout, settings) = {
            let config = self.config.load();
            (
                Duration::from_millis(config.capture.release_timeout_ms),
                WorkerSettings {
                    read_timeout: Duration::from_millis(config.capture.read_timeout_ms),
                    cpu_affinity: config.capture.cpu_affinity,
                },
            )
        };

        // A worker from the previous session may still hold this camera
        if !previous.iter_mut().all(|w| w.join_timeout(release_timeout)) {
            warn!("Camera {} still held by the previous session", camera);
            let mut inner = self.lock();
            inner.starting = false;
            inner.retiring.extend(previous.into_iter().filter(|w| !w.is_finished()));
            return Err(CaptureError::unavailable(
                camera,
                "previous session has not released the device",
            ));
        }
        drop(previous);

        // Fresh slot per session so a late frame from an old worker is never shown
        let channel = Arc::new(FrameChannel::new());
        let opened = CaptureWorker::start(
            self.backend.as_ref(),
            camera,
            Arc::clone(&self.detector),
            Arc::clone(&channel),
            self.events_tx.clone(),
            settings,
        );

        let mut inner = self.lock();
        inner.starting = false;
        let worker = match opened {
            Ok(worker) => worker,
            Err(e) => {
                warn!("Session start failed: {}", e);
                return Err(e);
            }
        };

        if inner.start_cancelled {
            info!("Start on camera {} cancelled by stop", camera);
            worker.stop();
            inner.retiring.push(worker);
            return Ok(());
        }

        inner.worker = Some(worker);
        inner.channel = channel;
        inner.camera = Some(camera);
        inner.clock.reset();
        inner.clock.start();
        inner.state = SessionState::Running;

        info!("Session started on camera {}", camera);
        emit(&self.events_tx, SessionEvent::Started { camera });
        Ok(())
    }

    /// End the session. No-op while idle, except that it cancels a `start`
    /// still opening its camera. Returns without waiting for the camera to
    /// be released.
    #[instrument(skip(self))]
    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.state == SessionState::Idle {
            if inner.starting {
                inner.start_cancelled = true;
            }
            return;
        }

        if let Some(worker) = inner.worker.take() {
            worker.stop();
            inner.retiring.push(worker);
        }
        inner.clock.reset();
        inner.channel.clear();
        inner.camera = None;
        inner.state = SessionState::Idle;

        info!("Session stopped");
        emit(&self.events_tx, SessionEvent::Stopped);
    }

    /// Stop and wait up to `timeout` for every worker to release its device
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.stop();
        let mut retiring = std::mem::take(&mut self.lock().retiring);
        let mut released = true;
        for worker in retiring.iter_mut() {
            released &= worker.join_timeout(timeout);
        }
        retiring.retain(|w| !w.is_finished());
        self.lock().retiring.extend(retiring);
        released
    }

    pub fn is_running(&self) -> bool {
        self.lock().state == SessionState::Running
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn camera(&self) -> Option<CameraSelector> {
        self.lock().camera
    }

    /// Timer entry point, once per second. Ignored while idle.
    pub fn tick(&self) -> ElapsedTime {
        let mut inner = self.lock();
        if inner.state == SessionState::Running {
            inner.clock.tick();
        }
        inner.clock.elapsed()
    }

    pub fn elapsed(&self) -> ElapsedTime {
        self.lock().clock.elapsed()
    }

    /// Latest detection result, or the placeholder while idle
    pub fn latest(&self) -> Latest {
        let inner = self.lock();
        match inner.state {
            SessionState::Running => inner.channel.take_latest(),
            SessionState::Idle => Latest::Placeholder,
        }
    }

    pub fn channel_stats(&self) -> ChannelStats {
        self.lock().channel.stats()
    }

    /// Session events, at most `session.event_queue_capacity` unread; newer
    /// events are dropped while the queue is full. Meant for a single consumer.
    pub fn events(&self) -> flume::Receiver<SessionEvent> {
        self.events_rx.clone()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.stop();
    }
}
