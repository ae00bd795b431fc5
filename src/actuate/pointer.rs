//! Mute control by clicking the target's on-screen volume icon.
//!
//! Useful where direct session control cannot reach the target's audio, for
//! example over a remote desktop where the OS mixer only affects the local
//! session. Reads the current on-screen state first and no-ops when the
//! target state is already showing, so a repeated trigger never toggles the
//! control back.

use super::MuteActuator;
use crate::detect::{AudioState, MuteStateReader};
use crate::log_debug;
use crate::vision::FrameSource;
use anyhow::{anyhow, bail, Context, Result};
use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};
use std::sync::{Arc, Mutex, PoisonError};

/// Pointer injection seam. Production clicks via enigo; tests record calls.
pub trait PointerInput: Send {
    fn click(&mut self, x: u32, y: u32) -> Result<()>;
}

/// Left-click at absolute screen coordinates.
pub struct EnigoPointer;

impl PointerInput for EnigoPointer {
    fn click(&mut self, x: u32, y: u32) -> Result<()> {
        let mut enigo = Enigo::new(&Settings::default())
            .map_err(|err| anyhow!("pointer input unavailable: {err}"))?;
        enigo
            .move_mouse(x as i32, y as i32, Coordinate::Abs)
            .map_err(|err| anyhow!("pointer move failed: {err}"))?;
        enigo
            .button(Button::Left, Direction::Click)
            .map_err(|err| anyhow!("click failed: {err}"))?;
        Ok(())
    }
}

/// `MuteActuator` that toggles the on-screen volume icon.
pub struct IconClickActuator {
    reader: MuteStateReader,
    source: Arc<Mutex<dyn FrameSource + Send>>,
    pointer: Box<dyn PointerInput>,
}

impl IconClickActuator {
    pub fn new(
        reader: MuteStateReader,
        source: Arc<Mutex<dyn FrameSource + Send>>,
        pointer: Box<dyn PointerInput>,
    ) -> Self {
        Self {
            reader,
            source,
            pointer,
        }
    }
}

impl MuteActuator for IconClickActuator {
    fn set_muted(&mut self, target: bool) -> Result<()> {
        let frame = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capture()
            .context("could not capture the screen to locate the volume icon")?;
        let observation = self.reader.observe(&frame);

        if observation.state == AudioState::from_muted(target) {
            log_debug(&format!(
                "volume icon already shows {}; leaving it alone",
                observation.state.label()
            ));
            return Ok(());
        }
        let Some((x, y)) = observation.location else {
            bail!(
                "cannot {}: volume icon not found on screen",
                if target { "mute" } else { "unmute" }
            );
        };
        self.pointer.click(x, y)?;
        log_debug(&format!(
            "{} by clicking the volume icon at ({x}, {y})",
            if target { "muted" } else { "unmuted" }
        ));
        Ok(())
    }

    fn label(&self) -> &'static str {
        "icon click"
    }
}
