//! Playback strategy abstraction
//!
//! The controller drives every backend through [`PlaybackBackend`] and hears
//! back from it through a single typed event channel. Whatever callback
//! wiring a platform needs (utterance callbacks, a waiter thread, an audio
//! sink watcher) stays inside the backend; all it hands the controller is a
//! [`PlaybackEvent`] stamped with the epoch the unit was started under.

use crate::speech::voices::Voice;
use crate::Result;
use log::debug;
use std::sync::mpsc::Sender;

/// Which playback strategy a session is using
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Platform voice synthesis
    Local,
    /// Remote text-to-speech audio stream
    Remote,
}

/// Why a playback unit did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The unit was cancelled on purpose
    Interrupted,
    /// The backend could not render the unit
    Playback(String),
}

/// Result of one playback unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Failed(FailureReason),
}

/// Outcome of a playback unit, tagged with the epoch it was started under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackEvent {
    pub epoch: u64,
    pub outcome: PlaybackOutcome,
}

/// Handle a backend uses to report the outcome of one unit
///
/// The epoch is fixed when the notifier is created; the controller discards
/// events whose epoch is no longer current.
#[derive(Debug, Clone)]
pub struct Notifier {
    epoch: u64,
    tx: Sender<PlaybackEvent>,
}

impl Notifier {
    pub fn new(epoch: u64, tx: Sender<PlaybackEvent>) -> Self {
        Self { epoch, tx }
    }

    /// Epoch this notifier was created for
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The unit played to the end
    pub fn completed(&self) {
        self.send(PlaybackOutcome::Completed);
    }

    /// The unit failed to play
    pub fn failed(&self, reason: impl Into<String>) {
        self.send(PlaybackOutcome::Failed(FailureReason::Playback(reason.into())));
    }

    /// The unit was cancelled
    pub fn interrupted(&self) {
        self.send(PlaybackOutcome::Failed(FailureReason::Interrupted));
    }

    fn send(&self, outcome: PlaybackOutcome) {
        let event = PlaybackEvent {
            epoch: self.epoch,
            outcome,
        };
        if self.tx.send(event).is_err() {
            debug!("Controller dropped, discarding playback event");
        }
    }
}

/// One chunk handed to a backend
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRequest {
    pub text: String,
    /// Requested language tag
    pub lang: String,
    /// Rate multiplier (1.0 is normal speed)
    pub rate: f32,
    /// Voice chosen for the session, if any
    pub voice: Option<Voice>,
}

/// Playback strategy
///
/// Implementations play one unit at a time. `play` returns once the unit has
/// been started; its outcome arrives later through the notifier. `cancel`
/// must be safe to call when nothing is playing.
pub trait PlaybackBackend: Send {
    /// Longest chunk this backend accepts, in characters
    fn max_chunk_chars(&self) -> usize;

    /// Voices this backend can speak with
    fn voices(&self) -> Result<Vec<Voice>> {
        Ok(Vec::new())
    }

    /// Start playing a chunk
    fn play(&mut self, request: &ChunkRequest, notifier: Notifier) -> Result<()>;

    /// Pause the live unit in place
    fn pause(&mut self) -> Result<()>;

    /// Continue the paused unit
    fn resume(&mut self) -> Result<()>;

    /// Abandon the live unit, if any
    fn cancel(&mut self) -> Result<()>;

    /// Change the rate of the live unit and later ones
    fn set_rate(&mut self, rate: f32) -> Result<()>;
}
