pub mod clock;
pub mod controller;

pub use clock::{ClockState, ElapsedTime, SessionClock};
pub use controller::SessionController;

use tracing::debug;

use crate::capture::CameraSelector;
use crate::detection::DrowsinessStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
}

/// Notifications for the presentation side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Started { camera: CameraSelector },
    Stopped,
    /// The detector's verdict differs from the previous frame's
    StatusChanged(DrowsinessStatus),
}

/// Queue `event` without blocking; dropped if the consumer has fallen behind
pub(crate) fn emit(events: &flume::Sender<SessionEvent>, event: SessionEvent) {
    if let Err(flume::TrySendError::Full(event)) = events.try_send(event) {
        metrics::counter!("vigil_events_dropped").increment(1);
        debug!("Event queue full, dropped {:?}", event);
    }
}
