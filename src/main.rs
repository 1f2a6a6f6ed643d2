//! Vigil drowsiness monitor: runs one monitoring session until Ctrl-C

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vigil::capture::{self, CameraSelector};
use vigil::detection::PassthroughDetector;
use vigil::display::{Presenter, TracingSink};
use vigil::{Config, SessionController};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vigil=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Vigil Launching...");

    // Load configuration
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;
    let shared = config.clone().shared();

    let backend = capture::backend_from_config(&config.capture)?;
    info!("Using {} camera backend", backend.name());

    let detector = Arc::new(PassthroughDetector::new(config.detection.clone()));
    let controller = Arc::new(SessionController::new(backend, detector, shared.clone()));

    let sink = TracingSink::new(config.display.clone());
    let mut presenter = Presenter::new(Arc::clone(&controller), sink, shared);

    if config.session.auto_start {
        // DeviceUnavailable ends the program with the report; nothing is retried
        controller.start(CameraSelector(config.capture.camera_index))?;
    }

    presenter
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                return;
            }
            info!("Ctrl-C received");
        })
        .await;

    let stats = controller.channel_stats();
    info!(
        "Frames published: {}, displayed: {}, dropped: {}",
        stats.published, stats.observed, stats.overwritten
    );

    if !controller.shutdown(Duration::from_millis(config.capture.release_timeout_ms)) {
        warn!("Camera not released before timeout");
    }

    info!("Vigil shutting down");
    Ok(())
}
