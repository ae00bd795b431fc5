//! The detection-and-control loop.
//!
//! One sequential polling cycle: capture a frame, check for ads, actuate the
//! mute control on ad-presence edges, read the on-screen mute state back for
//! reconciliation logging, then sleep at a cadence that adapts to what was
//! seen. Everything runs in-line on the watcher thread; the only cross-thread
//! state is the stop channel and the outgoing event stream.
//!
//! Actuation is edge-triggered, never level-triggered: the actuator fires
//! once per ad-presence transition, and a manual mute toggle between edges
//! is left alone.

use crate::actuate::MuteActuator;
use crate::config::WatcherConfig;
use crate::detect::{AdDetector, AudioState, MuteStateReader};
use crate::log_debug;
use crate::vision::{FrameSource, ReferenceLibrary};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

#[cfg(test)]
mod tests;

/// Counters collected while the watcher runs, for the UI and diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchMetrics {
    pub cycles: u64,
    pub ad_edges: u64,
    pub capture_failures: u64,
    pub actuation_failures: u64,
}

/// Progress events from the watcher thread to the front-end. Advisory; a
/// slow consumer loses events rather than stalling the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum WatcherEvent {
    AdStarted { reference: String },
    AdEnded,
    Actuated { muted: bool },
    ActuatorFailed { message: String },
    CaptureFailed,
    ObservedState { state: AudioState },
    Stopped { metrics: WatchMetrics },
}

/// The loop's own belief, mutated only on the watcher thread.
///
/// `desired_mute` tracks ad presence in lockstep: it flips exactly when an
/// ad-presence edge is seen, and nowhere else. The observed on-screen state
/// is recorded alongside but never feeds back into the intent.
#[derive(Debug, Clone)]
pub(crate) struct WatchState {
    ad_visible: bool,
    desired_mute: bool,
    last_observed: AudioState,
    fast_poll: Duration,
    slow_poll: Duration,
}

impl WatchState {
    pub(crate) fn new(fast_poll: Duration, slow_poll: Duration) -> Self {
        Self {
            ad_visible: false,
            desired_mute: false,
            last_observed: AudioState::Unknown,
            fast_poll,
            slow_poll,
        }
    }

    /// Fold one ad-visibility reading into the state. Returns the mute
    /// command to issue when the reading is an edge, `None` otherwise.
    pub(crate) fn observe_ad(&mut self, ad_visible: bool) -> Option<bool> {
        if ad_visible == self.ad_visible {
            return None;
        }
        self.ad_visible = ad_visible;
        self.desired_mute = ad_visible;
        Some(ad_visible)
    }

    /// Record the on-screen state read. Returns true when it changed.
    pub(crate) fn record_observation(&mut self, state: AudioState) -> bool {
        let changed = state != self.last_observed;
        self.last_observed = state;
        changed
    }

    pub(crate) fn next_interval(&self) -> Duration {
        if self.ad_visible {
            self.fast_poll
        } else {
            self.slow_poll
        }
    }

    pub(crate) fn ad_visible(&self) -> bool {
        self.ad_visible
    }

    pub(crate) fn desired_mute(&self) -> bool {
        self.desired_mute
    }
}

/// Owns the collaborators and runs the polling cycles.
pub struct Watcher {
    source: Arc<Mutex<dyn FrameSource + Send>>,
    detector: AdDetector,
    reader: MuteStateReader,
    actuator: Box<dyn MuteActuator>,
    state: WatchState,
    metrics: WatchMetrics,
    events: Sender<WatcherEvent>,
}

impl Watcher {
    pub fn new(
        config: &WatcherConfig,
        library: Arc<ReferenceLibrary>,
        source: Arc<Mutex<dyn FrameSource + Send>>,
        actuator: Box<dyn MuteActuator>,
        events: Sender<WatcherEvent>,
    ) -> Self {
        Self {
            source,
            detector: AdDetector::new(library.clone(), config.confidence),
            reader: MuteStateReader::new(library, config.confidence),
            actuator,
            state: WatchState::new(config.fast_poll, config.slow_poll),
            metrics: WatchMetrics::default(),
            events,
        }
    }

    /// Run one poll cycle and return how long to sleep before the next.
    pub(crate) fn cycle(&mut self) -> Duration {
        self.metrics.cycles += 1;

        let captured = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capture();
        let frame = match captured {
            Ok(frame) if frame.width() > 0 && frame.height() > 0 => frame,
            Ok(_) => return self.capture_failed("screen capture returned an empty frame"),
            Err(err) => return self.capture_failed(&format!("screen capture failed: {err:#}")),
        };

        let hit = self.detector.best_match(&frame);
        if let Some(desired) = self.state.observe_ad(hit.is_some()) {
            self.metrics.ad_edges += 1;
            match &hit {
                Some(hit) => {
                    log_debug(&format!(
                        "ad detected via '{}' (confidence {:.2}); muting",
                        hit.name, hit.confidence
                    ));
                    tracing::info!(
                        reference = hit.name.as_str(),
                        confidence = f64::from(hit.confidence),
                        "ad started"
                    );
                    let _ = self.events.try_send(WatcherEvent::AdStarted {
                        reference: hit.name.clone(),
                    });
                }
                None => {
                    log_debug("ad gone; unmuting");
                    tracing::info!("ad ended");
                    let _ = self.events.try_send(WatcherEvent::AdEnded);
                }
            }
            match self.actuator.set_muted(desired) {
                Ok(()) => {
                    let _ = self.events.try_send(WatcherEvent::Actuated { muted: desired });
                }
                Err(err) => {
                    self.metrics.actuation_failures += 1;
                    log_debug(&format!("mute actuation failed: {err:#}"));
                    tracing::warn!(error = %err, "mute actuation failed");
                    let _ = self.events.try_send(WatcherEvent::ActuatorFailed {
                        message: format!("{err:#}"),
                    });
                }
            }
        }

        let observed = self.reader.read_mute_state(&frame);
        if self.state.record_observation(observed) {
            let _ = self.events.try_send(WatcherEvent::ObservedState { state: observed });
        }
        if let Some(actually_muted) = observed.as_muted() {
            if actually_muted != self.state.desired_mute() {
                log_debug(&format!(
                    "on-screen state is {} but the last command was {}; leaving it (manual override?)",
                    observed.label(),
                    if self.state.desired_mute() { "mute" } else { "unmute" }
                ));
            }
        }

        self.state.next_interval()
    }

    fn capture_failed(&mut self, message: &str) -> Duration {
        self.metrics.capture_failures += 1;
        log_debug(message);
        let _ = self.events.try_send(WatcherEvent::CaptureFailed);
        self.state.next_interval()
    }

    /// Poll until a stop request arrives. The stop channel doubles as the
    /// sleep timer so a stop wakes the thread instead of waiting out the
    /// current interval; it is still only honored at cycle boundaries.
    pub fn run(mut self, stop: Receiver<()>) -> WatchMetrics {
        log_debug("watcher started");
        loop {
            match stop.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }
            let interval = self.cycle();
            match stop.recv_timeout(interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
        self.shutdown()
    }

    fn shutdown(mut self) -> WatchMetrics {
        if self.state.desired_mute() {
            log_debug("stopping while muted; restoring audio");
            if let Err(err) = self.actuator.set_muted(false) {
                log_debug(&format!("final unmute failed: {err:#}"));
            }
        }
        self.actuator.release();
        log_debug(&format!(
            "watcher stopped after {} cycle(s), {} edge(s)",
            self.metrics.cycles, self.metrics.ad_edges
        ));
        let metrics = self.metrics.clone();
        let _ = self.events.try_send(WatcherEvent::Stopped {
            metrics: metrics.clone(),
        });
        metrics
    }

    #[cfg(test)]
    pub(crate) fn metrics(&self) -> &WatchMetrics {
        &self.metrics
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &WatchState {
        &self.state
    }
}

/// Handle the front-end uses to follow and stop the watcher thread.
pub struct WatcherHandle {
    stop_tx: Sender<()>,
    events: Receiver<WatcherEvent>,
    handle: Option<thread::JoinHandle<WatchMetrics>>,
}

impl WatcherHandle {
    /// Ask the watcher to stop after its current cycle.
    pub fn request_stop(&self) {
        let _ = self.stop_tx.try_send(());
    }

    /// Drain one pending event, if any.
    pub fn try_event(&self) -> Option<WatcherEvent> {
        self.events.try_recv().ok()
    }

    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(true, thread::JoinHandle::is_finished)
    }

    /// Stop the watcher and wait for its final metrics.
    pub fn join(mut self) -> Option<WatchMetrics> {
        self.request_stop();
        self.handle.take().and_then(|handle| handle.join().ok())
    }
}

/// Spawn the watcher on its own thread.
pub fn spawn_watcher(
    config: &WatcherConfig,
    library: Arc<ReferenceLibrary>,
    source: Arc<Mutex<dyn FrameSource + Send>>,
    actuator: Box<dyn MuteActuator>,
) -> WatcherHandle {
    let (event_tx, event_rx) = bounded(64);
    let (stop_tx, stop_rx) = bounded(1);
    let watcher = Watcher::new(config, library, source, actuator, event_tx);
    let handle = thread::spawn(move || watcher.run(stop_rx));
    WatcherHandle {
        stop_tx,
        events: event_rx,
        handle: Some(handle),
    }
}
