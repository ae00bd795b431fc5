//! Primary-display capture via `xcap`.

use super::{Frame, FrameSource};
use anyhow::{anyhow, Context, Result};

/// Captures the full primary monitor at native resolution. Falls back to the
/// first monitor when none is flagged primary (some virtual displays).
pub struct PrimaryDisplay;

impl PrimaryDisplay {
    pub fn new() -> Self {
        PrimaryDisplay
    }
}

impl Default for PrimaryDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for PrimaryDisplay {
    fn capture(&mut self) -> Result<Frame> {
        let monitors = xcap::Monitor::all().context("failed to enumerate monitors")?;
        let monitor = monitors
            .into_iter()
            .find(|monitor| monitor.is_primary())
            .or_else(|| xcap::Monitor::all().ok()?.into_iter().next())
            .ok_or_else(|| anyhow!("no monitors found"))?;
        let captured = monitor.capture_image().context("screen capture failed")?;
        let (width, height) = (captured.width(), captured.height());
        Frame::from_raw(width, height, captured.into_raw())
            .ok_or_else(|| anyhow!("captured frame had an unexpected pixel layout"))
    }
}
