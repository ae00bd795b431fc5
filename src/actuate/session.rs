//! Direct mute control over the target process's OS audio session.
//!
//! The session handle is acquired lazily on the first mute attempt and
//! dropped on release or after a failed call, so a target that starts or
//! restarts mid-run is picked up again at the next ad edge.

use super::MuteActuator;
use crate::log_debug;
use anyhow::{bail, Context, Result};

/// Identifies one process's audio session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub pid: u32,
    pub name: String,
}

/// OS audio subsystem seam. The production backend talks to the platform
/// mixer; tests substitute a scripted one.
pub trait SessionBackend: Send {
    /// Locate the audio session belonging to `process`, if any.
    fn find_session(&mut self, process: &str) -> Result<Option<SessionHandle>>;

    /// Set the mute flag on a previously located session.
    fn set_muted(&mut self, session: &SessionHandle, muted: bool) -> Result<()>;

    /// Names of all processes with an active audio session, for diagnostics.
    fn session_names(&mut self) -> Result<Vec<String>>;

    /// Drop any cached OS resources.
    fn release(&mut self) {}
}

/// The platform's session backend. On non-Windows hosts direct session
/// control is unavailable and every mute attempt reports "no session".
pub fn platform_backend() -> Box<dyn SessionBackend> {
    Box::new(platform::Backend::new())
}

/// `MuteActuator` over a [`SessionBackend`].
pub struct SessionMuteActuator {
    backend: Box<dyn SessionBackend>,
    process: String,
    session: Option<SessionHandle>,
}

impl SessionMuteActuator {
    pub fn new(backend: Box<dyn SessionBackend>, process: String) -> Self {
        Self {
            backend,
            process,
            session: None,
        }
    }
}

impl MuteActuator for SessionMuteActuator {
    fn set_muted(&mut self, target: bool) -> Result<()> {
        if self.session.is_none() {
            self.session = self
                .backend
                .find_session(&self.process)
                .with_context(|| format!("audio session lookup failed for '{}'", self.process))?;
        }
        let Some(session) = self.session.clone() else {
            bail!("no audio session found for '{}'", self.process);
        };
        match self.backend.set_muted(&session, target) {
            Ok(()) => {
                log_debug(&format!(
                    "{} '{}' via audio session (pid {})",
                    if target { "muted" } else { "unmuted" },
                    session.name,
                    session.pid
                ));
                Ok(())
            }
            Err(err) => {
                // The session may have ended; drop the handle so the next
                // edge re-resolves it.
                self.session = None;
                Err(err)
            }
        }
    }

    fn release(&mut self) {
        self.session = None;
        self.backend.release();
    }

    fn label(&self) -> &'static str {
        "audio session"
    }
}

/// Case-insensitive process-name match, tolerant of a trailing `.exe` on
/// either side.
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn process_matches(candidate: &str, target: &str) -> bool {
    let strip = |name: &str| {
        let lower = name.to_ascii_lowercase();
        lower
            .strip_suffix(".exe")
            .map(str::to_string)
            .unwrap_or(lower)
    };
    strip(candidate) == strip(target)
}

#[cfg(windows)]
mod platform {
    use super::{process_matches, SessionBackend, SessionHandle};
    use anyhow::{anyhow, Context, Result};
    use std::path::Path;
    use windows::core::{Interface, PWSTR};
    use windows::Win32::Foundation::{CloseHandle, BOOL};
    use windows::Win32::Media::Audio::{
        eMultimedia, eRender, IAudioSessionControl, IAudioSessionControl2,
        IAudioSessionManager2, IMMDeviceEnumerator, ISimpleAudioVolume, MMDeviceEnumerator,
    };
    use windows::Win32::System::Com::{
        CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_ALL, COINIT_MULTITHREADED,
    };
    use windows::Win32::System::Threading::{
        OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
        PROCESS_QUERY_LIMITED_INFORMATION,
    };

    pub(super) struct Backend {
        com_ready: bool,
        cached: Option<(u32, ISimpleAudioVolume)>,
    }

    impl Backend {
        pub(super) fn new() -> Self {
            Self {
                com_ready: false,
                cached: None,
            }
        }

        fn ensure_com(&mut self) -> Result<()> {
            if !self.com_ready {
                unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) }
                    .ok()
                    .context("COM initialization failed")?;
                self.com_ready = true;
            }
            Ok(())
        }

        fn sessions(&mut self) -> Result<Vec<(u32, String, IAudioSessionControl)>> {
            self.ensure_com()?;
            unsafe {
                let enumerator: IMMDeviceEnumerator =
                    CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                        .context("audio device enumerator unavailable")?;
                let device = enumerator
                    .GetDefaultAudioEndpoint(eRender, eMultimedia)
                    .context("no default audio render endpoint")?;
                let manager: IAudioSessionManager2 = device
                    .Activate(CLSCTX_ALL, None)
                    .context("audio session manager activation failed")?;
                let list = manager
                    .GetSessionEnumerator()
                    .context("audio session enumeration failed")?;
                let count = list.GetCount().context("audio session count failed")?;
                let mut sessions = Vec::new();
                for index in 0..count {
                    let Ok(control) = list.GetSession(index) else {
                        continue;
                    };
                    let Ok(control2) = control.cast::<IAudioSessionControl2>() else {
                        continue;
                    };
                    let Ok(pid) = control2.GetProcessId() else {
                        continue;
                    };
                    if pid == 0 {
                        continue;
                    }
                    let Some(name) = process_image_name(pid) else {
                        continue;
                    };
                    sessions.push((pid, name, control));
                }
                Ok(sessions)
            }
        }

        fn volume_for(&mut self, session: &SessionHandle) -> Result<ISimpleAudioVolume> {
            if let Some((pid, volume)) = self.cached.as_ref() {
                if *pid == session.pid {
                    return Ok(volume.clone());
                }
            }
            let sessions = self.sessions()?;
            let control = sessions
                .into_iter()
                .find(|(pid, _, _)| *pid == session.pid)
                .map(|(_, _, control)| control)
                .ok_or_else(|| {
                    anyhow!(
                        "audio session for '{}' (pid {}) is gone",
                        session.name,
                        session.pid
                    )
                })?;
            let volume: ISimpleAudioVolume = control
                .cast()
                .context("audio session does not expose volume control")?;
            self.cached = Some((session.pid, volume.clone()));
            Ok(volume)
        }
    }

    impl SessionBackend for Backend {
        fn find_session(&mut self, process: &str) -> Result<Option<SessionHandle>> {
            let handle = self
                .sessions()?
                .into_iter()
                .find(|(_, name, _)| process_matches(name, process))
                .map(|(pid, name, _)| SessionHandle { pid, name });
            Ok(handle)
        }

        fn set_muted(&mut self, session: &SessionHandle, muted: bool) -> Result<()> {
            let volume = self.volume_for(session)?;
            unsafe { volume.SetMute(BOOL::from(muted), std::ptr::null()) }
                .with_context(|| format!("failed to set mute on '{}'", session.name))
        }

        fn session_names(&mut self) -> Result<Vec<String>> {
            Ok(self
                .sessions()?
                .into_iter()
                .map(|(_, name, _)| name)
                .collect())
        }

        fn release(&mut self) {
            self.cached = None;
        }
    }

    impl Drop for Backend {
        fn drop(&mut self) {
            self.cached = None;
            if self.com_ready {
                unsafe { CoUninitialize() };
            }
        }
    }

    fn process_image_name(pid: u32) -> Option<String> {
        unsafe {
            let handle =
                OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, BOOL::from(false), pid).ok()?;
            let mut buf = [0u16; 512];
            let mut len = buf.len() as u32;
            let result =
                QueryFullProcessImageNameW(handle, PROCESS_NAME_WIN32, PWSTR(buf.as_mut_ptr()), &mut len);
            let _ = CloseHandle(handle);
            result.ok()?;
            let full = String::from_utf16_lossy(&buf[..len as usize]);
            Path::new(&full)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        }
    }
}

#[cfg(not(windows))]
mod platform {
    use super::{SessionBackend, SessionHandle};
    use anyhow::{bail, Result};

    pub(super) struct Backend;

    impl Backend {
        pub(super) fn new() -> Self {
            Backend
        }
    }

    impl SessionBackend for Backend {
        fn find_session(&mut self, _process: &str) -> Result<Option<SessionHandle>> {
            Ok(None)
        }

        fn set_muted(&mut self, session: &SessionHandle, _muted: bool) -> Result<()> {
            bail!(
                "direct audio session control is not available on this platform (session '{}')",
                session.name
            );
        }

        fn session_names(&mut self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }
}
