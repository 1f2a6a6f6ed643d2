//! Headless presentation: a tracing-backed sink and the async loop that feeds it

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use super::{prepare_for_display, PresentationSink};
use crate::capture::Frame;
use crate::detection::DrowsinessStatus;
use crate::error::DisplayError;
use crate::pipeline::event_log::{EventLog, LogEntry};
use crate::pipeline::Latest;
use crate::session::{SessionController, SessionEvent, SessionState};
use crate::{DisplayConfig, SharedConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shown {
    Nothing,
    Placeholder,
    Frame(u64),
}

/// Sink that prepares frames for a `width` x `height` surface and reports
/// everything through `tracing`
pub struct TracingSink {
    config: DisplayConfig,
    placeholder: Frame,
    frames_rendered: u64,
    shown: Shown,
    last_status: Option<DrowsinessStatus>,
    elapsed: String,
    state: SessionState,
}

impl TracingSink {
    pub fn new(config: DisplayConfig) -> Self {
        Self {
            placeholder: Frame::placeholder(config.width, config.height),
            config,
            frames_rendered: 0,
            shown: Shown::Nothing,
            last_status: None,
            elapsed: String::from("00 : 00 : 00"),
            state: SessionState::Idle,
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn elapsed(&self) -> &str {
        &self.elapsed
    }

    pub fn state(&self) -> SessionState {
        self.state
    }
}

impl PresentationSink for TracingSink {
    fn render(&mut self, latest: &Latest) -> Result<(), DisplayError> {
        let (frame, status, shown) = match latest {
            Latest::Frame(result) => (
                &result.frame,
                Some(result.status),
                Shown::Frame(result.frame.sequence()),
            ),
            Latest::Placeholder => (&self.placeholder, None, Shown::Placeholder),
        };

        // Polled again before anything new arrived
        if shown == self.shown {
            return Ok(());
        }

        let image = prepare_for_display(frame, self.config.width, self.config.height)?;
        self.frames_rendered += 1;
        self.shown = shown;
        debug!(
            "Rendered frame {} at {}x{}",
            frame.sequence(),
            image.width(),
            image.height()
        );

        if let Some(status) = status.filter(|s| Some(*s) != self.last_status) {
            info!("Activity: {}", status);
        }
        self.last_status = status;
        Ok(())
    }

    fn show_elapsed(&mut self, elapsed: &str) {
        if self.elapsed != elapsed {
            self.elapsed = elapsed.to_owned();
            debug!("Duration: {}", elapsed);
        }
    }

    fn session_state_changed(&mut self, state: SessionState) {
        self.state = state;
        let action = match state {
            SessionState::Running => "STOP",
            SessionState::Idle => "START",
        };
        info!("Session {:?}, control shows {}", state, action);
    }

    fn log_entry(&mut self, entry: &LogEntry) {
        info!("{}", entry);
    }

    fn log_opened(&mut self, title: &str) {
        info!("{}", title);
    }
}

/// Presentation-side scheduler: drives the session clock, polls the latest
/// frame and keeps the session log
pub struct Presenter<S> {
    controller: Arc<SessionController>,
    sink: S,
    log: EventLog,
    config: SharedConfig,
}

impl<S: PresentationSink> Presenter<S> {
    pub fn new(controller: Arc<SessionController>, sink: S, config: SharedConfig) -> Self {
        let log = EventLog::new(config.load().log.capacity);
        Self {
            controller,
            sink,
            log,
            config,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Returns true if the tick schedule should restart from now
    pub fn handle_event(&mut self, event: SessionEvent) -> bool {
        match event {
            SessionEvent::Started { camera } => {
                self.log.clear();
                self.sink.log_opened(&self.log.title());
                self.record(format!("Session started on camera {}", camera));
                self.sink.session_state_changed(SessionState::Running);
                self.sink.show_elapsed(&self.controller.elapsed().to_string());
                true
            }
            SessionEvent::Stopped => {
                self.record("Session stopped".to_owned());
                self.sink.session_state_changed(SessionState::Idle);
                self.sink.show_elapsed(&self.controller.elapsed().to_string());
                if let Err(e) = self.sink.render(&Latest::Placeholder) {
                    error!("Display error: {}", e);
                }
                false
            }
            SessionEvent::StatusChanged(status) => {
                self.record(status.label().to_owned());
                false
            }
        }
    }

    fn record(&mut self, message: String) {
        let entry = LogEntry::now(message);
        self.sink.log_entry(&entry);
        self.log.push(entry);
    }

    /// Run until `shutdown` resolves, then stop the session
    #[instrument(skip_all)]
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let (tick_period, frame_period) = {
            let config = self.config.load();
            (
                Duration::from_millis(config.session.tick_interval_ms),
                Duration::from_millis(config.display.frame_interval_ms),
            )
        };

        // First tick one period from now, not immediately
        let mut ticks = interval_at(Instant::now() + tick_period, tick_period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut frames = interval(frame_period);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let events = self.controller.events();
        tokio::pin!(shutdown);

        info!("Presentation loop started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Ok(event) = events.recv_async() => {
                    if self.handle_event(event) {
                        ticks.reset();
                    }
                }
                _ = ticks.tick() => {
                    if self.controller.is_running() {
                        let elapsed = self.controller.tick();
                        self.sink.show_elapsed(&elapsed.to_string());
                    }
                }
                _ = frames.tick() => {
                    let latest = self.controller.latest();
                    if let Err(e) = self.sink.render(&latest) {
                        error!("Display error: {}", e);
                    }
                }
            }
        }

        self.controller.stop();
        for event in events.drain() {
            self.handle_event(event);
        }
        info!("Presentation loop finished");
    }
}
