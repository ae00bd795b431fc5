use super::{spawn_watcher, WatchState, Watcher, WatcherEvent};
use crate::actuate::MuteActuator;
use crate::config::{MuteMethod, WatcherConfig};
use crate::detect::AudioState;
use crate::vision::{Frame, FrameSource, ReferenceImage, ReferenceLibrary};
use anyhow::{bail, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use image::Rgba;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const FAST: Duration = Duration::from_millis(500);
const SLOW: Duration = Duration::from_millis(5_000);

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

fn ad_patch() -> Frame {
    pattern(8, 8, 5)
}

fn ad_frame() -> Frame {
    let mut frame = gradient(48, 32);
    for (x, y, pixel) in ad_patch().enumerate_pixels() {
        frame.put_pixel(12 + x, 8 + y, *pixel);
    }
    frame
}

fn idle_frame() -> Frame {
    gradient(48, 32)
}

fn test_library() -> Arc<ReferenceLibrary> {
    Arc::new(ReferenceLibrary::from_parts(
        vec![ReferenceImage::from_image("banner", &ad_patch())],
        None,
        None,
    ))
}

fn test_config(fast: Duration, slow: Duration) -> WatcherConfig {
    WatcherConfig {
        process: "spotify".to_string(),
        mute_method: MuteMethod::Direct,
        confidence: 0.9,
        fast_poll: fast,
        slow_poll: slow,
    }
}

/// Scripted capture: `Some(frame)` is returned as-is, `None` fails.
struct ScriptedSource {
    frames: VecDeque<Option<Frame>>,
}

impl FrameSource for ScriptedSource {
    fn capture(&mut self) -> Result<Frame> {
        match self.frames.pop_front() {
            Some(Some(frame)) => Ok(frame),
            Some(None) => bail!("capture lost the display"),
            None => bail!("no more frames scripted"),
        }
    }
}

/// Hands out the same frame forever, for thread tests.
struct RepeatSource(Frame);

impl FrameSource for RepeatSource {
    fn capture(&mut self) -> Result<Frame> {
        Ok(self.0.clone())
    }
}

#[derive(Clone, Default)]
struct RecordingActuator {
    calls: Arc<Mutex<Vec<bool>>>,
    fail: bool,
}

impl MuteActuator for RecordingActuator {
    fn set_muted(&mut self, target: bool) -> Result<()> {
        self.calls.lock().unwrap().push(target);
        if self.fail {
            bail!("actuator offline");
        }
        Ok(())
    }

    fn label(&self) -> &'static str {
        "recording"
    }
}

fn watcher_over(
    frames: Vec<Option<Frame>>,
    actuator: RecordingActuator,
) -> (Watcher, Receiver<WatcherEvent>) {
    let (tx, rx): (Sender<WatcherEvent>, Receiver<WatcherEvent>) = bounded(64);
    let source: Arc<Mutex<dyn FrameSource + Send>> = Arc::new(Mutex::new(ScriptedSource {
        frames: frames.into(),
    }));
    let watcher = Watcher::new(
        &test_config(FAST, SLOW),
        test_library(),
        source,
        Box::new(actuator),
        tx,
    );
    (watcher, rx)
}

#[test]
fn actuates_exactly_on_ad_edges() {
    let actuator = RecordingActuator::default();
    let frames = vec![
        Some(idle_frame()),
        Some(idle_frame()),
        Some(ad_frame()),
        Some(ad_frame()),
        Some(idle_frame()),
    ];
    let (mut watcher, _rx) = watcher_over(frames, actuator.clone());

    for _ in 0..5 {
        watcher.cycle();
    }

    assert_eq!(*actuator.calls.lock().unwrap(), vec![true, false]);
    assert_eq!(watcher.metrics().cycles, 5);
    assert_eq!(watcher.metrics().ad_edges, 2);
}

#[test]
fn poll_interval_adapts_to_ad_state() {
    let actuator = RecordingActuator::default();
    let frames = vec![
        Some(idle_frame()),
        Some(ad_frame()),
        Some(idle_frame()),
        Some(idle_frame()),
    ];
    let (mut watcher, _rx) = watcher_over(frames, actuator);

    assert_eq!(watcher.cycle(), SLOW);
    assert_eq!(watcher.cycle(), FAST);
    assert_eq!(watcher.cycle(), SLOW);
    assert_eq!(watcher.cycle(), SLOW);
}

#[test]
fn capture_failure_skips_the_cycle() {
    let actuator = RecordingActuator::default();
    let frames = vec![Some(ad_frame()), None, Some(ad_frame())];
    let (mut watcher, _rx) = watcher_over(frames, actuator.clone());

    assert_eq!(watcher.cycle(), FAST);
    // Failed capture: no state change, keep the current cadence.
    assert_eq!(watcher.cycle(), FAST);
    assert!(watcher.state().ad_visible());
    assert_eq!(watcher.metrics().capture_failures, 1);

    // The ad is still showing; no new edge, no extra actuation.
    watcher.cycle();
    assert_eq!(*actuator.calls.lock().unwrap(), vec![true]);
}

#[test]
fn empty_frame_counts_as_capture_failure() {
    let actuator = RecordingActuator::default();
    let frames = vec![Some(Frame::new(0, 0))];
    let (mut watcher, _rx) = watcher_over(frames, actuator.clone());

    watcher.cycle();
    assert_eq!(watcher.metrics().capture_failures, 1);
    assert!(actuator.calls.lock().unwrap().is_empty());
}

#[test]
fn actuator_failure_waits_for_the_next_edge() {
    let actuator = RecordingActuator {
        fail: true,
        ..RecordingActuator::default()
    };
    let frames = vec![Some(idle_frame()), Some(ad_frame()), Some(ad_frame())];
    let (mut watcher, _rx) = watcher_over(frames, actuator.clone());

    for _ in 0..3 {
        watcher.cycle();
    }

    // One attempt at the edge, none while the ad persists.
    assert_eq!(*actuator.calls.lock().unwrap(), vec![true]);
    assert_eq!(watcher.metrics().actuation_failures, 1);
    assert!(watcher.state().desired_mute());
}

#[test]
fn events_narrate_the_edges() {
    let actuator = RecordingActuator::default();
    let frames = vec![Some(idle_frame()), Some(ad_frame()), Some(idle_frame())];
    let (mut watcher, rx) = watcher_over(frames, actuator);

    for _ in 0..3 {
        watcher.cycle();
    }

    let events: Vec<WatcherEvent> = rx.try_iter().collect();
    assert!(events.contains(&WatcherEvent::AdStarted {
        reference: "banner".to_string()
    }));
    assert!(events.contains(&WatcherEvent::AdEnded));
    assert!(events.contains(&WatcherEvent::Actuated { muted: true }));
    assert!(events.contains(&WatcherEvent::Actuated { muted: false }));
}

#[test]
fn watch_state_reports_edges_only() {
    let mut state = WatchState::new(FAST, SLOW);
    assert_eq!(state.observe_ad(false), None);
    assert_eq!(state.observe_ad(true), Some(true));
    assert_eq!(state.observe_ad(true), None);
    assert_eq!(state.observe_ad(false), Some(false));
    assert_eq!(state.observe_ad(false), None);
}

#[test]
fn watch_state_tracks_observation_changes() {
    let mut state = WatchState::new(FAST, SLOW);
    assert!(!state.record_observation(AudioState::Unknown));
    assert!(state.record_observation(AudioState::Muted));
    assert!(!state.record_observation(AudioState::Muted));
}

#[test]
fn stop_restores_audio_and_releases() {
    let actuator = RecordingActuator::default();
    let calls = actuator.calls.clone();
    let source: Arc<Mutex<dyn FrameSource + Send>> =
        Arc::new(Mutex::new(RepeatSource(ad_frame())));
    let config = test_config(Duration::from_millis(1), Duration::from_millis(1));

    let handle = spawn_watcher(&config, test_library(), source, Box::new(actuator));

    // Wait for the mute edge to land, then stop.
    let deadline = Instant::now() + Duration::from_secs(5);
    while calls.lock().unwrap().is_empty() {
        assert!(Instant::now() < deadline, "watcher never actuated");
        std::thread::sleep(Duration::from_millis(5));
    }
    let metrics = handle.join().expect("watcher thread should join cleanly");

    let calls = calls.lock().unwrap();
    assert_eq!(calls.first(), Some(&true));
    assert_eq!(calls.last(), Some(&false), "stop must restore audio");
    assert!(metrics.cycles >= 1);
    assert_eq!(metrics.ad_edges, 1);
}
