//! Mute actuators: two interchangeable ways to drive the target's mute
//! control behind one capability.
//!
//! The watcher only ever calls `set_muted`; which strategy is behind it is a
//! fixed configuration choice made once at startup. Failures are reported,
//! never fatal: the watcher logs them and tries again at the next
//! ad-presence edge.

mod pointer;
mod session;
#[cfg(test)]
mod tests;

pub use pointer::{EnigoPointer, IconClickActuator, PointerInput};
pub use session::{platform_backend, SessionBackend, SessionHandle, SessionMuteActuator};

use crate::config::{MuteMethod, WatcherConfig};
use crate::detect::MuteStateReader;
use crate::vision::{FrameSource, ReferenceLibrary};
use anyhow::Result;
use std::sync::{Arc, Mutex};

/// The single capability the control loop depends on.
pub trait MuteActuator: Send {
    /// Drive the target's mute control toward `target`. Implementations are
    /// idempotent: repeating a call for an already-reached target has no
    /// extra observable effect.
    fn set_muted(&mut self, target: bool) -> Result<()>;

    /// Release any lazily acquired OS handles. Called once when the watcher
    /// stops; the actuator must remain usable afterwards.
    fn release(&mut self) {}

    fn label(&self) -> &'static str;
}

/// Build the configured actuator variant.
pub fn build_actuator(
    config: &WatcherConfig,
    library: Arc<ReferenceLibrary>,
    source: Arc<Mutex<dyn FrameSource + Send>>,
) -> Box<dyn MuteActuator> {
    match config.mute_method {
        MuteMethod::Direct => Box::new(SessionMuteActuator::new(
            platform_backend(),
            config.process.clone(),
        )),
        MuteMethod::Click => Box::new(IconClickActuator::new(
            MuteStateReader::new(library, config.confidence),
            source,
            Box::new(EnigoPointer),
        )),
    }
}
