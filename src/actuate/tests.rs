use super::pointer::{IconClickActuator, PointerInput};
use super::session::{process_matches, SessionBackend, SessionHandle, SessionMuteActuator};
use super::MuteActuator;
use crate::detect::MuteStateReader;
use crate::vision::{Frame, FrameSource, ReferenceImage, ReferenceLibrary};
use anyhow::{bail, Result};
use image::Rgba;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct BackendState {
    session: Option<SessionHandle>,
    muted: bool,
    transitions: usize,
    find_calls: usize,
    set_calls: usize,
    fail_set: bool,
}

#[derive(Clone)]
struct FakeBackend(Arc<Mutex<BackendState>>);

impl FakeBackend {
    fn with_session(pid: u32) -> Self {
        let state = BackendState {
            session: Some(SessionHandle {
                pid,
                name: "spotify.exe".to_string(),
            }),
            ..BackendState::default()
        };
        FakeBackend(Arc::new(Mutex::new(state)))
    }

    fn without_session() -> Self {
        FakeBackend(Arc::new(Mutex::new(BackendState::default())))
    }

    fn state(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.0.lock().unwrap()
    }
}

impl SessionBackend for FakeBackend {
    fn find_session(&mut self, _process: &str) -> Result<Option<SessionHandle>> {
        let mut state = self.0.lock().unwrap();
        state.find_calls += 1;
        Ok(state.session.clone())
    }

    fn set_muted(&mut self, _session: &SessionHandle, muted: bool) -> Result<()> {
        let mut state = self.0.lock().unwrap();
        state.set_calls += 1;
        if state.fail_set {
            bail!("session is gone");
        }
        if state.muted != muted {
            state.muted = muted;
            state.transitions += 1;
        }
        Ok(())
    }

    fn session_names(&mut self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[test]
fn direct_mute_is_idempotent() {
    let backend = FakeBackend::with_session(42);
    let mut actuator = SessionMuteActuator::new(Box::new(backend.clone()), "spotify".to_string());

    actuator.set_muted(true).unwrap();
    actuator.set_muted(true).unwrap();

    let state = backend.state();
    assert!(state.muted);
    assert_eq!(state.set_calls, 2);
    assert_eq!(state.transitions, 1, "repeat command must not re-toggle");
}

#[test]
fn session_lookup_is_lazy() {
    let backend = FakeBackend::with_session(42);
    let actuator = SessionMuteActuator::new(Box::new(backend.clone()), "spotify".to_string());

    assert_eq!(backend.state().find_calls, 0);
    drop(actuator);
}

#[test]
fn missing_session_is_reported_and_retried() {
    let backend = FakeBackend::without_session();
    let mut actuator = SessionMuteActuator::new(Box::new(backend.clone()), "spotify".to_string());

    assert!(actuator.set_muted(true).is_err());
    assert!(actuator.set_muted(true).is_err());
    let state = backend.state();
    assert_eq!(state.find_calls, 2, "every attempt should look again");
    assert_eq!(state.set_calls, 0);
}

#[test]
fn release_drops_the_session_handle() {
    let backend = FakeBackend::with_session(42);
    let mut actuator = SessionMuteActuator::new(Box::new(backend.clone()), "spotify".to_string());

    actuator.set_muted(true).unwrap();
    assert_eq!(backend.state().find_calls, 1);

    actuator.release();
    actuator.set_muted(false).unwrap();
    assert_eq!(backend.state().find_calls, 2);
}

#[test]
fn failed_set_drops_the_stale_handle() {
    let backend = FakeBackend::with_session(42);
    let mut actuator = SessionMuteActuator::new(Box::new(backend.clone()), "spotify".to_string());

    actuator.set_muted(true).unwrap();
    backend.state().fail_set = true;
    assert!(actuator.set_muted(false).is_err());

    backend.state().fail_set = false;
    actuator.set_muted(false).unwrap();
    assert_eq!(backend.state().find_calls, 2);
}

#[test]
fn process_names_match_loosely() {
    assert!(process_matches("Spotify.exe", "spotify"));
    assert!(process_matches("spotify", "SPOTIFY.EXE"));
    assert!(!process_matches("spotify-helper.exe", "spotify"));
}

fn pattern(width: u32, height: u32, seed: u32) -> Frame {
    Frame::from_fn(width, height, |x, y| {
        let mut v = x
            .wrapping_mul(31)
            .wrapping_add(y.wrapping_mul(17))
            .wrapping_add(seed.wrapping_mul(101));
        v ^= v >> 3;
        v = v.wrapping_mul(2_654_435_761);
        let b = (v >> 8) as u8;
        Rgba([b, b ^ 0x3C, b.wrapping_add(41), 255])
    })
}

fn gradient(width: u32, height: u32) -> Frame {
    Frame::from_fn(width, height, |x, y| {
        let v = ((x * 2 + y * 3) % 256) as u8;
        Rgba([v, v, v, 255])
    })
}

fn frame_with_patch(patch: &Frame, ox: u32, oy: u32) -> Frame {
    let mut frame = gradient(64, 48);
    for (x, y, pixel) in patch.enumerate_pixels() {
        frame.put_pixel(ox + x, oy + y, *pixel);
    }
    frame
}

struct ScriptedSource {
    frames: VecDeque<Frame>,
}

impl FrameSource for ScriptedSource {
    fn capture(&mut self) -> Result<Frame> {
        match self.frames.pop_front() {
            Some(frame) => Ok(frame),
            None => bail!("no more frames scripted"),
        }
    }
}

fn scripted(frames: Vec<Frame>) -> Arc<Mutex<dyn FrameSource + Send>> {
    Arc::new(Mutex::new(ScriptedSource {
        frames: frames.into(),
    }))
}

#[derive(Clone, Default)]
struct FakePointer(Arc<Mutex<Vec<(u32, u32)>>>);

impl PointerInput for FakePointer {
    fn click(&mut self, x: u32, y: u32) -> Result<()> {
        self.0.lock().unwrap().push((x, y));
        Ok(())
    }
}

fn icon_library() -> Arc<ReferenceLibrary> {
    Arc::new(ReferenceLibrary::from_parts(
        Vec::new(),
        Some(ReferenceImage::from_image("volume", &pattern(8, 8, 20))),
        Some(ReferenceImage::from_image("mute", &pattern(8, 8, 30))),
    ))
}

fn click_actuator(
    frames: Vec<Frame>,
    pointer: FakePointer,
) -> IconClickActuator {
    IconClickActuator::new(
        MuteStateReader::new(icon_library(), 0.9),
        scripted(frames),
        Box::new(pointer),
    )
}

#[test]
fn clicks_the_visible_icon_to_toggle() {
    // Unmuted icon showing at (16, 12); muting should click its center.
    let unmuted_icon = pattern(8, 8, 20);
    let pointer = FakePointer::default();
    let mut actuator = click_actuator(
        vec![frame_with_patch(&unmuted_icon, 16, 12)],
        pointer.clone(),
    );

    actuator.set_muted(true).unwrap();
    assert_eq!(*pointer.0.lock().unwrap(), vec![(20, 16)]);
}

#[test]
fn does_not_click_when_state_already_matches() {
    let muted_icon = pattern(8, 8, 30);
    let pointer = FakePointer::default();
    let mut actuator =
        click_actuator(vec![frame_with_patch(&muted_icon, 16, 12)], pointer.clone());

    actuator.set_muted(true).unwrap();
    assert!(pointer.0.lock().unwrap().is_empty(), "repeat trigger must not re-toggle");
}

#[test]
fn fails_when_no_icon_is_visible() {
    let pointer = FakePointer::default();
    let mut actuator = click_actuator(vec![gradient(64, 48)], pointer.clone());

    assert!(actuator.set_muted(true).is_err());
    assert!(pointer.0.lock().unwrap().is_empty());
}

#[test]
fn fails_when_capture_is_unavailable() {
    let pointer = FakePointer::default();
    let mut actuator = click_actuator(Vec::new(), pointer.clone());

    assert!(actuator.set_muted(true).is_err());
    assert!(pointer.0.lock().unwrap().is_empty());
}
