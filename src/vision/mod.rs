//! Frames, reference images, and template matching.
//!
//! A frame is an RGBA capture of the full primary display at native
//! resolution. Reference images are matched against it with normalized
//! cross-correlation on grayscale; there is no scale or rotation search, so
//! references must share the capture's pixel geometry.

use anyhow::Result;

mod library;
mod matcher;
mod screen;

pub use library::{ReferenceLibrary, ReferenceRecord, VolumeRefs};
pub use matcher::{match_all, match_single, MatchResult, ReferenceImage};
pub use screen::PrimaryDisplay;

/// A captured screen frame. Opaque pixel data as far as the watcher is
/// concerned; only the matcher looks inside.
pub type Frame = image::RgbaImage;

/// Supplies frames of the primary display. The production implementation
/// captures the screen; tests script frames from memory.
pub trait FrameSource {
    fn capture(&mut self) -> Result<Frame>;
}
