use super::defaults::{MAX_POLL_MS, MAX_PROCESS_NAME_BYTES, MIN_CONFIDENCE, MIN_POLL_MS};
use super::{AppConfig, WatcherConfig};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::time::Duration;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize the images directory.
    pub fn validate(&mut self) -> Result<()> {
        if !(MIN_CONFIDENCE..=1.0).contains(&self.confidence) {
            bail!(
                "--confidence must be between {MIN_CONFIDENCE} and 1.0, got {}",
                self.confidence
            );
        }
        if !(MIN_POLL_MS..=MAX_POLL_MS).contains(&self.fast_poll_ms) {
            bail!(
                "--fast-poll-ms must be between {MIN_POLL_MS} and {MAX_POLL_MS}, got {}",
                self.fast_poll_ms
            );
        }
        if !(MIN_POLL_MS..=MAX_POLL_MS).contains(&self.slow_poll_ms) {
            bail!(
                "--slow-poll-ms must be between {MIN_POLL_MS} and {MAX_POLL_MS}, got {}",
                self.slow_poll_ms
            );
        }
        if self.fast_poll_ms > self.slow_poll_ms {
            bail!(
                "--fast-poll-ms ({}) cannot exceed --slow-poll-ms ({})",
                self.fast_poll_ms,
                self.slow_poll_ms
            );
        }

        let process = self.process.trim();
        if process.is_empty() {
            bail!("--process must not be empty");
        }
        if process.len() > MAX_PROCESS_NAME_BYTES {
            bail!("--process must be at most {MAX_PROCESS_NAME_BYTES} bytes");
        }
        if process
            .chars()
            .any(|ch| ch.is_control() || ch == '/' || ch == '\\')
        {
            bail!("--process must be a bare process name, not a path");
        }
        self.process = process.to_string();

        // An absent images directory is allowed; when present, pin it to an
        // absolute path.
        if self.images_dir.exists() {
            self.images_dir = self.images_dir.canonicalize().with_context(|| {
                format!(
                    "failed to canonicalize images directory '{}'",
                    self.images_dir.display()
                )
            })?;
        }

        Ok(())
    }

    /// Snapshot the watcher-relevant settings for the control loop.
    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            process: self.process.clone(),
            mute_method: self.mute_method,
            confidence: self.confidence,
            fast_poll: Duration::from_millis(self.fast_poll_ms),
            slow_poll: Duration::from_millis(self.slow_poll_ms),
        }
    }
}
