pub mod capture;
pub mod detection;
pub mod display;
pub mod error;
pub mod pipeline;
pub mod session;

use std::path::Path;

use arc_swap::ArcSwap;
use config::builder::DefaultState;
use config::ConfigBuilder;
use capture::frame::PixelFormat;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use capture::{CameraSelector, Frame};
pub use detection::{DetectionResult, Detector, DrowsinessStatus};
pub use error::{CaptureError, ConfigError};
pub use pipeline::{FrameChannel, Latest};
pub use session::{ElapsedTime, SessionClock, SessionController, SessionEvent, SessionState};

/// Configuration shared with the presentation side; swapped atomically at runtime
pub type SharedConfig = std::sync::Arc<ArcSwap<Config>>;

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub detection: DetectionConfig,
    pub display: DisplayConfig,
    pub session: SessionConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendKind {
    Synthetic,
    V4l2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub backend: CameraBackendKind,
    pub camera_index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
    pub buffer_count: u32,
    /// Upper bound on a single device read, so cancellation is never starved
    pub read_timeout_ms: u64,
    /// How long `start` waits for a previous worker to release its device
    pub release_timeout_ms: u64,
    pub cpu_affinity: Option<usize>,
    /// Number of virtual cameras the synthetic backend exposes
    pub synthetic_devices: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub annotate: bool,
    pub border_px: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub frame_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub tick_interval_ms: u64,
    pub auto_start: bool,
    /// Session events beyond this many unread are dropped
    pub event_queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            backend: CameraBackendKind::Synthetic,
            camera_index: 0,
            width: 640,
            height: 480,
            fps: 30,
            format: PixelFormat::Mjpeg,
            buffer_count: 4,
            read_timeout_ms: 200,
            release_timeout_ms: 1000,
            cpu_affinity: None,
            synthetic_devices: 1,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            annotate: true,
            border_px: 4,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 400,
            frame_interval_ms: 33, // ~30fps
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            auto_start: true,
            event_queue_capacity: 64,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

impl Config {
    /// Layer defaults, an optional TOML file and `VIGIL__*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                config::File::from(path).required(true)
            }
            None => config::File::with_name("vigil").required(false),
        };

        let builder = Self::defaults()?.add_source(file).add_source(
            config::Environment::with_prefix("VIGIL")
                .prefix_separator("__")
                .separator("__"),
        );
        Self::from_builder(builder)
    }

    /// Builder seeded with the compiled-in defaults
    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(config::Config::builder().add_source(config::Config::try_from(&Config::default())?))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings = builder.build()?.try_deserialize::<Config>()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("session.tick_interval_ms must be > 0".into()));
        }
        if self.display.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid("display.frame_interval_ms must be > 0".into()));
        }
        if self.display.width == 0 || self.display.height == 0 {
            return Err(ConfigError::Invalid("display size must be non-zero".into()));
        }
        if self.session.event_queue_capacity == 0 {
            return Err(ConfigError::Invalid("session.event_queue_capacity must be > 0".into()));
        }
        if self.log.capacity == 0 {
            return Err(ConfigError::Invalid("log.capacity must be > 0".into()));
        }
        Ok(())
    }

    pub fn shared(self) -> SharedConfig {
        std::sync::Arc::new(ArcSwap::from_pointee(self))
    }
}
