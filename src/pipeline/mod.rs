pub mod channel;
pub mod event_log;
pub mod worker;

pub use channel::{ChannelStats, FrameChannel, Latest};
pub use event_log::{EventLog, LogEntry};
pub use worker::{CaptureWorker, WorkerSettings};
