pub mod console;

pub use console::{Presenter, TracingSink};

use image::imageops::FilterType;
use image::RgbImage;

use crate::capture::Frame;
use crate::error::{DecodeError, DisplayError};
use crate::pipeline::event_log::LogEntry;
use crate::pipeline::Latest;
use crate::session::SessionState;

/// Where the presentation side sends what it has to show
pub trait PresentationSink {
    /// Latest detection result, or the placeholder
    fn render(&mut self, latest: &Latest) -> Result<(), DisplayError>;

    /// Session duration as `HH : MM : SS`
    fn show_elapsed(&mut self, elapsed: &str);

    /// Update control affordances (start/stop toggle)
    fn session_state_changed(&mut self, state: SessionState);

    fn log_entry(&mut self, entry: &LogEntry);

    /// A new session log was opened
    fn log_opened(&mut self, _title: &str) {}
}

/// Convert a BGR frame to RGB and scale it to fit `max_width` x `max_height`,
/// keeping its aspect ratio
pub fn prepare_for_display(frame: &Frame, max_width: u32, max_height: u32) -> Result<RgbImage, DecodeError> {
    let (w, h) = (frame.width(), frame.height());
    let img = RgbImage::from_raw(w, h, frame.to_rgb()).ok_or(DecodeError::Length {
        expected: w as usize * h as usize * 3,
        actual: frame.data.len(),
        width: w,
        height: h,
    })?;

    let (tw, th) = fit_within(w, h, max_width, max_height);
    if (tw, th) == (w, h) {
        return Ok(img);
    }
    Ok(image::imageops::resize(&img, tw, th, FilterType::Triangle))
}

/// Largest size with the source aspect ratio that fits the bounds
pub fn fit_within(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if w == 0 || h == 0 {
        return (0, 0);
    }
    let scale = (max_w as f64 / w as f64).min(max_h as f64 / h as f64);
    let tw = ((w as f64 * scale).round() as u32).clamp(1, max_w);
    let th = ((h as f64 * scale).round() as u32).clamp(1, max_h);
    (tw, th)
}
