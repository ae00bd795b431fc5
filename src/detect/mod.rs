//! Ad detection and on-screen mute-state classification.
//!
//! Both readers run the template matcher over the shared reference library
//! and are stateless across calls. Ad detection uses OR semantics: any
//! reference matching at or above the threshold counts. The mute-state read
//! is advisory ground truth only; it never feeds back into ad detection or
//! the watcher's mute intent.

use crate::vision::{match_all, match_single, Frame, MatchResult, ReferenceLibrary};
use std::sync::Arc;


/// Mute state as read back from the screen.
///
/// `Unknown` means the read was ambiguous (icon obscured, target window not
/// visible, or both icons matching at once) and the caller must not guess.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AudioState {
    Unmuted,
    Muted,
    Unknown,
}

impl AudioState {
    pub fn label(self) -> &'static str {
        match self {
            AudioState::Unmuted => "unmuted",
            AudioState::Muted => "muted",
            AudioState::Unknown => "unknown",
        }
    }

    pub fn from_muted(muted: bool) -> Self {
        if muted {
            AudioState::Muted
        } else {
            AudioState::Unmuted
        }
    }

    /// The boolean mute flag this state corresponds to, if unambiguous.
    pub fn as_muted(self) -> Option<bool> {
        match self {
            AudioState::Muted => Some(true),
            AudioState::Unmuted => Some(false),
            AudioState::Unknown => None,
        }
    }
}

/// Checks whether any ad reference is currently visible on screen.
#[derive(Clone)]
pub struct AdDetector {
    library: Arc<ReferenceLibrary>,
    threshold: f32,
}

impl AdDetector {
    pub fn new(library: Arc<ReferenceLibrary>, threshold: f32) -> Self {
        Self { library, threshold }
    }

    /// The first ad reference that matches, in library order. Multiple
    /// simultaneous matches are equivalent to one.
    pub fn best_match(&self, frame: &Frame) -> Option<MatchResult> {
        match_all(frame, self.library.ads(), self.threshold)
            .into_iter()
            .find(MatchResult::matched)
    }

    pub fn is_ad_visible(&self, frame: &Frame) -> bool {
        self.best_match(frame).is_some()
    }
}

/// One mute-state read: the classification plus, when a single icon matched,
/// the screen center of that icon (used by the click actuator).
#[derive(Debug, Clone, PartialEq)]
pub struct MuteObservation {
    pub state: AudioState,
    pub location: Option<(u32, u32)>,
}

/// Classifies the on-screen mute state from the two volume icon references.
#[derive(Clone)]
pub struct MuteStateReader {
    library: Arc<ReferenceLibrary>,
    threshold: f32,
}

impl MuteStateReader {
    pub fn new(library: Arc<ReferenceLibrary>, threshold: f32) -> Self {
        Self { library, threshold }
    }

    pub fn read_mute_state(&self, frame: &Frame) -> AudioState {
        self.observe(frame).state
    }

    /// Match both icons and classify. A missing reference contributes
    /// confidence 0.0, so with neither icon loaded the state is permanently
    /// `Unknown`.
    pub fn observe(&self, frame: &Frame) -> MuteObservation {
        let volume = self.library.volume();
        let muted = volume
            .muted()
            .map(|reference| match_single(frame, reference, self.threshold));
        let unmuted = volume
            .unmuted()
            .map(|reference| match_single(frame, reference, self.threshold));

        let muted_conf = muted.as_ref().map_or(0.0, |result| result.confidence);
        let unmuted_conf = unmuted.as_ref().map_or(0.0, |result| result.confidence);
        let state = classify(muted_conf, unmuted_conf, self.threshold);
        let location = match state {
            AudioState::Muted => muted.and_then(|result| result.location),
            AudioState::Unmuted => unmuted.and_then(|result| result.location),
            AudioState::Unknown => None,
        };
        MuteObservation { state, location }
    }
}

/// Decision rule: exactly one icon above threshold names the state; both or
/// neither is ambiguous.
pub(crate) fn classify(muted_conf: f32, unmuted_conf: f32, threshold: f32) -> AudioState {
    let muted_hit = muted_conf >= threshold;
    let unmuted_hit = unmuted_conf >= threshold;
    match (muted_hit, unmuted_hit) {
        (true, false) => AudioState::Muted,
        (false, true) => AudioState::Unmuted,
        _ => AudioState::Unknown,
    }
}
