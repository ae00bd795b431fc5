//! SIGINT flag for headless mode, checked once per drain pass.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

pub(crate) fn install_interrupt_handler() -> Result<()> {
    imp::install()
}

pub(crate) fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

#[cfg(unix)]
mod imp {
    use anyhow::{bail, Result};
    use std::sync::atomic::Ordering;

    extern "C" fn handle_sigint(_: libc::c_int) {
        super::INTERRUPTED.store(true, Ordering::SeqCst);
    }

    pub(super) fn install() -> Result<()> {
        // SAFETY: handle_sigint is an extern "C" signal handler that only
        // stores to an atomic flag.
        unsafe {
            let handler = handle_sigint as *const () as libc::sighandler_t;
            if libc::signal(libc::SIGINT, handler) == libc::SIG_ERR {
                bail!("failed to install SIGINT handler");
            }
        }
        Ok(())
    }
}

#[cfg(not(unix))]
mod imp {
    use anyhow::Result;

    // The console host tears the process down on Ctrl+C; the flag stays
    // unset and the drain loop runs until then.
    pub(super) fn install() -> Result<()> {
        Ok(())
    }
}
