//! Playback controller
//!
//! The controller is the only thing allowed to touch the speech backends. It
//! owns the session, picks a backend for each `speak()`, feeds chunks one at
//! a time, and reacts to the outcome events backends send back.
//!
//! Nothing here blocks. `speak`, `pause`, `resume` and `stop` return right
//! away; progress happens when the host hands queued backend events to
//! [`PlaybackController::process_events`] (or [`PlaybackController::wait_event`])
//! from its own loop, so every state change happens on the host's thread.

use crate::config::EngineSettings;
use crate::lang::{is_english, DEFAULT_LANG};
use crate::speech::backend::{
    BackendKind, ChunkRequest, FailureReason, Notifier, PlaybackBackend, PlaybackEvent,
    PlaybackOutcome,
};
use crate::speech::backends::{
    create_synthesizer, LocalSynthesisBackend, RemoteAudioBackend, StreamingPlayer,
};
use crate::speech::chunker::chunk;
use crate::speech::input::SpeechInput;
use crate::speech::session::{PlaybackSession, PlaybackStatus};
use crate::speech::voices::{pick_best_voice, Voice};
use crate::ReadaloudError;
use log::{debug, error, info, warn};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

/// Slowest accepted rate multiplier
pub const MIN_RATE: f32 = 0.1;
/// Fastest accepted rate multiplier
pub const MAX_RATE: f32 = 10.0;

/// Per-call options for [`PlaybackController::speak`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeakOptions {
    /// Language tag; defaults to en-US
    pub lang: Option<String>,
}

impl SpeakOptions {
    pub fn lang(tag: &str) -> Self {
        Self {
            lang: Some(tag.to_string()),
        }
    }
}

/// Chunk-by-chunk playback across a local and a remote backend
pub struct PlaybackController {
    /// Platform synthesis; `None` when the platform has no speech support
    local: Option<Box<dyn PlaybackBackend>>,
    remote: Box<dyn PlaybackBackend>,
    session: PlaybackSession,
    rate: f32,
    /// Reason of the last fatal playback failure
    last_failure: Option<String>,
    events_tx: Sender<PlaybackEvent>,
    events_rx: Receiver<PlaybackEvent>,
}

impl PlaybackController {
    /// Create a controller over the given backends
    pub fn new(
        local: Option<Box<dyn PlaybackBackend>>,
        remote: Box<dyn PlaybackBackend>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            local,
            remote,
            session: PlaybackSession::new(),
            rate: 1.0,
            last_failure: None,
            events_tx,
            events_rx,
        }
    }

    /// Create a controller on the platform's synthesizer and the default
    /// remote stream player
    pub fn from_settings(settings: &EngineSettings) -> Self {
        let local: Option<Box<dyn PlaybackBackend>> = match create_synthesizer() {
            Ok(synth) => Some(Box::new(LocalSynthesisBackend::new(
                synth,
                settings.local_max_chars,
            ))),
            Err(e) => {
                warn!("Local speech unavailable: {}", e);
                None
            }
        };

        let remote = RemoteAudioBackend::new(
            &settings.remote_endpoint,
            settings.remote_max_chars,
            Box::new(StreamingPlayer::new()),
        );

        let mut controller = Self::new(local, Box::new(remote));
        controller.set_rate(settings.rate);
        controller
    }

    /// Whether the platform can speak at all
    pub fn is_supported(&self) -> bool {
        self.local.is_some()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.session.status()
    }

    /// Read-only view of the current session
    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Reason the last session ended in failure, if it did
    ///
    /// Cleared by the next `speak()`.
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    /// Voices the platform synthesizer offers
    pub fn voices(&self) -> Vec<Voice> {
        let Some(local) = self.local.as_ref() else {
            return Vec::new();
        };
        match local.voices() {
            Ok(voices) => voices,
            Err(e) => {
                warn!("Failed to list voices: {}", e);
                Vec::new()
            }
        }
    }

    /// Start speaking `input`, replacing whatever is playing
    ///
    /// Returns false when the platform cannot speak or the input has no
    /// speakable text.
    pub fn speak(&mut self, input: impl Into<SpeechInput>, options: SpeakOptions) -> bool {
        if !self.is_supported() {
            warn!("Speech is not supported on this platform");
            return false;
        }

        let input = input.into();
        self.stop();
        self.last_failure = None;

        let lang = options
            .lang
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .unwrap_or_else(|| DEFAULT_LANG.to_string());

        let voices = self.voices();
        let voice = pick_best_voice(&voices, &lang).cloned();
        let backend = if !is_english(&lang) && voice.is_none() {
            info!("No local voice for {}, using remote audio", lang);
            BackendKind::Remote
        } else {
            BackendKind::Local
        };

        let queue = chunk(&input, self.max_chunk_chars(backend));
        if queue.is_empty() {
            debug!("Nothing to speak");
            return false;
        }

        let epoch = self.session.begin(queue, &lang, backend, voice);
        info!(
            "Speaking {} chunks via {:?} backend (lang {}, epoch {})",
            self.session.queue().len(),
            backend,
            lang,
            epoch
        );

        self.play_current();
        true
    }

    /// Pause the live unit; no-op unless speaking
    pub fn pause(&mut self) {
        if !self.session.pause() {
            return;
        }

        let kind = self.session.backend();
        debug!("Pausing {:?} playback", kind);
        if let Some(backend) = self.backend_mut(kind) {
            if let Err(e) = backend.pause() {
                warn!("Failed to pause {:?} backend: {}", kind, e);
            }
        }
    }

    /// Continue after `pause()`; no-op unless paused
    pub fn resume(&mut self) {
        if !self.session.resume() {
            return;
        }

        if self.session.take_start_pending() {
            self.play_current();
            return;
        }

        let kind = self.session.backend();
        debug!("Resuming {:?} playback", kind);
        let result = match self.backend_mut(kind) {
            Some(backend) => backend.resume(),
            None => Err(ReadaloudError::Backend(format!("{:?} backend unavailable", kind))),
        };
        if let Err(e) = result {
            self.handle_failure(e.to_string());
        }
    }

    /// Stop playback and drop the session; no-op when idle
    pub fn stop(&mut self) {
        if self.session.status() == PlaybackStatus::Idle {
            return;
        }

        let kind = self.session.backend();
        let epoch = self.session.clear();
        self.cancel_backend(kind);
        debug!("Playback stopped (epoch now {})", epoch);
    }

    /// Set the rate multiplier for the live unit and everything after it
    ///
    /// Values are clamped to [`MIN_RATE`]..=[`MAX_RATE`]; non-finite or
    /// non-positive values are ignored.
    pub fn set_rate(&mut self, value: f32) {
        if !value.is_finite() || value <= 0.0 {
            warn!("Ignoring invalid speech rate {}", value);
            return;
        }

        self.rate = value.clamp(MIN_RATE, MAX_RATE);
        debug!("Speech rate set to {}", self.rate);

        if self.session.status() == PlaybackStatus::Idle {
            return;
        }
        let kind = self.session.backend();
        let rate = self.rate;
        if let Some(backend) = self.backend_mut(kind) {
            if let Err(e) = backend.set_rate(rate) {
                warn!("Failed to apply rate to {:?} backend: {}", kind, e);
            }
        }
    }

    /// Handle every backend event queued so far; returns how many there were
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for one backend event and handle it
    pub fn wait_event(&mut self, timeout: Duration) -> bool {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.handle_event(event);
                true
            }
            Err(_) => false,
        }
    }

    /// Apply one backend event to the session
    pub fn handle_event(&mut self, event: PlaybackEvent) {
        if !self.session.is_current(event.epoch) {
            debug!(
                "Ignoring stale playback event from epoch {} (current {})",
                event.epoch,
                self.session.epoch()
            );
            return;
        }

        match event.outcome {
            PlaybackOutcome::Completed => self.chunk_completed(),
            // Our own cancels always move the epoch first, so a current-epoch
            // interrupt came from outside and the unit will never complete
            PlaybackOutcome::Failed(FailureReason::Interrupted) => {
                self.handle_failure("playback interrupted by another client".to_string());
            }
            PlaybackOutcome::Failed(FailureReason::Playback(reason)) => {
                self.handle_failure(reason);
            }
        }
    }

    fn chunk_completed(&mut self) {
        let status = self.session.status();
        if status == PlaybackStatus::Idle {
            return;
        }

        debug!(
            "Chunk {}/{} finished",
            self.session.cursor() + 1,
            self.session.queue().len()
        );

        if !self.session.advance() {
            self.session.finish();
            info!("Playback finished");
            return;
        }

        if status == PlaybackStatus::Paused {
            self.session.set_start_pending(true);
        } else {
            self.play_current();
        }
    }

    /// Start the chunk under the cursor on the session's backend
    fn play_current(&mut self) {
        let Some(text) = self.session.current_chunk().map(str::to_string) else {
            self.session.finish();
            return;
        };

        let kind = self.session.backend();
        let request = ChunkRequest {
            text,
            lang: self.session.lang().to_string(),
            rate: self.rate,
            voice: self.session.voice().cloned(),
        };
        let notifier = Notifier::new(self.session.epoch(), self.events_tx.clone());

        debug!(
            "Playing chunk {}/{} via {:?}",
            self.session.cursor() + 1,
            self.session.queue().len(),
            kind
        );

        let result = match self.backend_mut(kind) {
            Some(backend) => backend.play(&request, notifier),
            None => Err(ReadaloudError::Backend(format!("{:?} backend unavailable", kind))),
        };
        if let Err(e) = result {
            self.handle_failure(e.to_string());
        }
    }

    /// Escalate a non-English local failure to remote, otherwise give up
    fn handle_failure(&mut self, reason: String) {
        if self.session.status() == PlaybackStatus::Idle {
            return;
        }

        let kind = self.session.backend();
        if kind == BackendKind::Local && !is_english(self.session.lang()) {
            warn!(
                "Local playback failed ({}), retrying chunk {} on remote audio",
                reason,
                self.session.cursor() + 1
            );
            self.cancel_backend(BackendKind::Local);
            self.session.escalate();

            if self.session.status() == PlaybackStatus::Paused {
                self.session.set_start_pending(true);
            } else {
                self.play_current();
            }
            return;
        }

        error!("Playback failed on {:?} backend: {}", kind, reason);
        self.last_failure = Some(reason);
        self.stop();
    }

    fn cancel_backend(&mut self, kind: BackendKind) {
        if let Some(backend) = self.backend_mut(kind) {
            if let Err(e) = backend.cancel() {
                warn!("Failed to cancel {:?} backend: {}", kind, e);
            }
        }
    }

    fn max_chunk_chars(&self, kind: BackendKind) -> usize {
        match kind {
            BackendKind::Local => self
                .local
                .as_ref()
                .map(|b| b.max_chunk_chars())
                .unwrap_or_else(|| self.remote.max_chunk_chars()),
            BackendKind::Remote => self.remote.max_chunk_chars(),
        }
    }

    fn backend_mut(&mut self, kind: BackendKind) -> Option<&mut (dyn PlaybackBackend + 'static)> {
        match kind {
            BackendKind::Local => self.local.as_deref_mut(),
            BackendKind::Remote => Some(self.remote.as_mut()),
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.stop();
    }
}
