//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

pub use defaults::{
    DEFAULT_CONFIDENCE, DEFAULT_FAST_POLL_MS, DEFAULT_IMAGES_DIR, DEFAULT_PROCESS,
    DEFAULT_SLOW_POLL_MS, MAX_POLL_MS, MAX_PROCESS_NAME_BYTES, MIN_CONFIDENCE, MIN_POLL_MS,
};

/// CLI options for the AdHush watcher. Read once at startup; there is no
/// runtime reconfiguration.
#[derive(Debug, Parser, Clone)]
#[command(about = "AdHush: mutes a player's audio while on-screen ads play", author, version)]
pub struct AppConfig {
    /// Directory holding the `ads/` and `volume/` reference images
    #[arg(long = "images-dir", env = "ADHUSH_IMAGES", default_value = DEFAULT_IMAGES_DIR)]
    pub images_dir: PathBuf,

    /// Process whose audio session is muted (direct method)
    #[arg(long, env = "ADHUSH_PROCESS", default_value = DEFAULT_PROCESS)]
    pub process: String,

    /// How the mute control is driven
    #[arg(long = "mute-method", value_enum, default_value_t = MuteMethod::Direct)]
    pub mute_method: MuteMethod,

    /// Minimum template-match confidence treated as a positive
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    pub confidence: f32,

    /// Poll interval while an ad is on screen (milliseconds)
    #[arg(long = "fast-poll-ms", default_value_t = DEFAULT_FAST_POLL_MS)]
    pub fast_poll_ms: u64,

    /// Poll interval during normal playback (milliseconds)
    #[arg(long = "slow-poll-ms", default_value_t = DEFAULT_SLOW_POLL_MS)]
    pub slow_poll_ms: u64,

    /// Start watching immediately without the interactive menu
    #[arg(long = "no-menu", env = "ADHUSH_NO_MENU", default_value_t = false)]
    pub no_menu: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "ADHUSH_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "ADHUSH_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Print a one-shot diagnostics report and exit
    #[arg(long = "doctor", default_value_t = false)]
    pub doctor: bool,

    /// Render the doctor report as JSON instead of text
    #[arg(long = "doctor-json", default_value_t = false)]
    pub doctor_json: bool,
}

/// The two interchangeable mute actuators. Selected once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MuteMethod {
    /// Set the mute flag on the target's OS audio session directly.
    Direct,
    /// Click the on-screen volume icon found by template matching.
    Click,
}

impl MuteMethod {
    pub fn label(self) -> &'static str {
        match self {
            MuteMethod::Direct => "audio session",
            MuteMethod::Click => "icon click",
        }
    }
}

/// Immutable snapshot of the watcher-relevant settings, handed to the
/// control loop at construction.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub process: String,
    pub mute_method: MuteMethod,
    pub confidence: f32,
    pub fast_poll: Duration,
    pub slow_poll: Duration,
}
