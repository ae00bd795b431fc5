//! Default and bound constants for the CLI configuration surface.
//!
//! Read once at startup; there is no runtime reconfiguration. The bounds
//! here back the checks in [`super::validation`].

/// Default directory holding the `ads/` and `volume/` reference images.
pub const DEFAULT_IMAGES_DIR: &str = "images";

/// Default target process whose audio session is muted.
pub const DEFAULT_PROCESS: &str = "spotify";

/// Default template-match confidence treated as a positive.
pub const DEFAULT_CONFIDENCE: f32 = 0.9;

/// Lowest operator-tunable confidence threshold.
pub const MIN_CONFIDENCE: f32 = 0.5;

/// Default poll interval while an ad is on screen (milliseconds).
pub const DEFAULT_FAST_POLL_MS: u64 = 500;

/// Default poll interval during normal playback (milliseconds).
pub const DEFAULT_SLOW_POLL_MS: u64 = 5000;

/// Smallest accepted poll interval (milliseconds).
pub const MIN_POLL_MS: u64 = 100;

/// Largest accepted poll interval (milliseconds).
pub const MAX_POLL_MS: u64 = 60000;

/// Maximum length of a bare process name, in bytes.
pub const MAX_PROCESS_NAME_BYTES: usize = 128;
