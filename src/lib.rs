pub mod actuate;
pub mod config;
pub mod detect;
pub mod doctor;
pub mod logging;
pub mod telemetry;
pub mod terminal_restore;
pub mod vision;
pub mod watcher;

pub use logging::{crash_log_path, init_logging, log_debug, log_file_path};
pub use watcher::{spawn_watcher, WatchMetrics, Watcher, WatcherEvent, WatcherHandle};
