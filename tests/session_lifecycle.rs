use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use vigil::capture::{CameraSelector, Frame, SyntheticBackend};
use vigil::detection::{DetectionResult, Detector, DrowsinessStatus, PassthroughDetector};
use vigil::error::DetectionError;
use vigil::{CaptureError, Config, DetectionConfig, Latest, SessionController, SessionEvent};

fn session(backend: Arc<SyntheticBackend>, detector: Arc<dyn Detector>) -> SessionController {
    let mut config = Config::default();
    config.capture.read_timeout_ms = 50;
    SessionController::new(backend, detector, config.shared())
}

fn passthrough() -> Arc<dyn Detector> {
    Arc::new(PassthroughDetector::new(DetectionConfig::default()))
}

fn wait_for<T>(mut probe: impl FnMut() -> Option<T>) -> Option<T> {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if let Some(v) = probe() {
            return Some(v);
        }
        thread::sleep(Duration::from_millis(5));
    }
    None
}

#[test]
fn working_camera_session() {
    let backend = Arc::new(SyntheticBackend::new(1, 32, 24, 60));
    let controller = session(Arc::clone(&backend), passthrough());

    controller.start(CameraSelector(0)).unwrap();
    assert!(controller.is_running());

    for s in 1..=5 {
        let elapsed = controller.tick();
        assert_eq!(elapsed.to_string(), format!("00 : 00 : 0{}", s));
    }

    let frame = wait_for(|| controller.latest().result().map(|r| r.frame.clone()));
    let frame = frame.expect("no frame published");
    assert_eq!((frame.width(), frame.height()), (32, 24));

    controller.stop();
    assert!(!controller.is_running());
    assert_eq!(controller.elapsed().to_string(), "00 : 00 : 00");
    assert!(controller.latest().is_placeholder());

    assert!(controller.shutdown(Duration::from_secs(2)));
    assert!(!backend.is_held(CameraSelector(0)));
}

#[test]
fn missing_camera_fails_to_start() {
    let controller = session(Arc::new(SyntheticBackend::new(1, 8, 8, 60)), passthrough());

    match controller.start(CameraSelector(7)) {
        Err(CaptureError::DeviceUnavailable { index, .. }) => assert_eq!(index, CameraSelector(7)),
        other => panic!("expected DeviceUnavailable, got {:?}", other),
    }
    assert!(!controller.is_running());
    assert!(controller.events().try_recv().is_err());
}

#[test]
fn flaky_camera_keeps_session_alive() {
    let backend = Arc::new(SyntheticBackend::new(1, 8, 8, 200).with_failure_every(3));
    let controller = session(backend, passthrough());
    controller.start(CameraSelector(0)).unwrap();

    let published = wait_for(|| {
        let stats = controller.channel_stats();
        (stats.published >= 10).then_some(stats.published)
    });
    assert!(published.is_some());
    assert!(controller.is_running());

    assert!(controller.shutdown(Duration::from_secs(2)));
}

#[test]
fn drowsiness_reaches_the_event_stream() {
    let drowsy: Arc<dyn Detector> = Arc::new(|frame: Frame| {
        let status = if frame.sequence() >= 3 {
            DrowsinessStatus::DrowsyWarning
        } else {
            DrowsinessStatus::Alert
        };
        Ok::<_, DetectionError>(DetectionResult { frame, status })
    });

    let controller = session(Arc::new(SyntheticBackend::new(1, 8, 8, 200)), drowsy);
    let events = controller.events();
    controller.start(CameraSelector(0)).unwrap();

    let warned = wait_for(|| {
        events
            .try_iter()
            .find(|e| *e == SessionEvent::StatusChanged(DrowsinessStatus::DrowsyWarning))
    });
    assert!(warned.is_some());

    // The event goes out just before the frame that caused it is published
    let shown = wait_for(|| match controller.latest() {
        Latest::Frame(r) if r.status == DrowsinessStatus::DrowsyWarning => Some(r.frame.sequence()),
        _ => None,
    });
    assert!(shown.unwrap_or(0) >= 3);

    assert!(controller.shutdown(Duration::from_secs(2)));
}

#[test]
fn concurrent_start_stop_is_safe() {
    let backend = Arc::new(SyntheticBackend::new(1, 8, 8, 200));
    let controller = Arc::new(session(Arc::clone(&backend), passthrough()));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                for n in 0..20 {
                    if (i + n) % 2 == 0 {
                        // Busy device after a fast restart is an acceptable outcome
                        let _ = controller.start(CameraSelector(0));
                    } else {
                        controller.stop();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(controller.shutdown(Duration::from_secs(3)));
    assert!(!controller.is_running());
    assert!(!backend.is_held(CameraSelector(0)));
}
