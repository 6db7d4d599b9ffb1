//! Native Rust TTS backend using the tts crate
//!
//! This backend uses the `tts` crate which provides a unified interface to:
//! - Speech Dispatcher on Linux (via native bindings)
//! - AVFoundation on macOS/iOS (via native bindings)
//! - WinRT on Windows
//!
//! Completion is reported through the crate's utterance callbacks, so only
//! platforms that support them are accepted. The crate has no pause; pausing
//! stops the utterance and resuming speaks it again. On Linux the
//! Speech Dispatcher backend is preferred because it pauses in place.

use crate::speech::backend::Notifier;
use crate::speech::backends::local::Synthesizer;
use crate::speech::backends::tracker::UtteranceTracker;
use crate::speech::controller::{MAX_RATE, MIN_RATE};
use crate::speech::voices::Voice;
use crate::{ReadaloudError, Result};
use log::{debug, error, warn};
use tts::{Tts, UtteranceId};

/// Utterance silenced by `pause()`, replayed by `resume()`
struct PausedUtterance {
    text: String,
    voice: Option<Voice>,
    notifier: Notifier,
}

/// Native TTS synthesizer
pub struct NativeSynthesizer {
    tts: Tts,

    /// Shared with the utterance callbacks
    tracker: UtteranceTracker<UtteranceId>,

    /// Text and voice of the last utterance, kept for pause
    current: Option<(String, Option<Voice>)>,

    paused: Option<PausedUtterance>,

    supports_rate: bool,
    supports_voice: bool,
}

impl NativeSynthesizer {
    /// Create a new native TTS synthesizer
    ///
    /// Fails if the platform backend cannot be initialized or cannot report
    /// when an utterance ends.
    pub fn new() -> Result<Self> {
        debug!("Creating native TTS backend");

        let tts = Tts::default()
            .map_err(|e| ReadaloudError::Speech(format!("Failed to initialize TTS: {}", e)))?;

        let features = tts.supported_features();
        if !features.utterance_callbacks {
            return Err(ReadaloudError::Speech(
                "Platform TTS does not report utterance completion".to_string(),
            ));
        }

        let tracker = UtteranceTracker::new();

        let ended = tracker.clone();
        tts.on_utterance_end(Some(Box::new(move |id| ended.finished(id, true))))
            .map_err(|e| ReadaloudError::Speech(format!("Failed to register callback: {}", e)))?;

        let stopped = tracker.clone();
        tts.on_utterance_stop(Some(Box::new(move |id| stopped.finished(id, false))))
        .map_err(|e| ReadaloudError::Speech(format!("Failed to register callback: {}", e)))?;

        debug!("Native TTS backend created successfully");

        Ok(Self {
            tts,
            tracker,
            current: None,
            paused: None,
            supports_rate: features.rate,
            supports_voice: features.voice,
        })
    }

    fn apply_voice(&mut self, voice: &Voice) -> Result<()> {
        if !self.supports_voice {
            return Ok(());
        }

        let voices = self
            .tts
            .voices()
            .map_err(|e| ReadaloudError::Speech(format!("Failed to get voices: {}", e)))?;

        match voices.iter().find(|v| v.id() == voice.id) {
            Some(platform_voice) => self
                .tts
                .set_voice(platform_voice)
                .map(|_| ())
                .map_err(|e| ReadaloudError::Speech(format!("Failed to set voice: {}", e))),
            None => {
                warn!("Voice {} is no longer installed", voice.name);
                Ok(())
            }
        }
    }

    fn apply_rate(&mut self, rate: f32) -> Result<()> {
        if !self.supports_rate {
            warn!("Rate control not supported on this platform");
            return Ok(());
        }

        let converted = scale_rate(
            rate,
            self.tts.min_rate(),
            self.tts.normal_rate(),
            self.tts.max_rate(),
        );
        self.tts
            .set_rate(converted)
            .map_err(|e| ReadaloudError::Speech(format!("Failed to set rate: {}", e)))?;
        Ok(())
    }

    /// Hand `text` to the platform and record the utterance as ours
    fn start_utterance(&mut self, text: &str, notifier: Notifier) -> Result<()> {
        self.tracker.begin(notifier)?;
        match self.tts.speak(text, false) {
            Ok(id) => self.tracker.started(id),
            Err(e) => {
                self.tracker.abandon()?;
                error!("Failed to speak: {}", e);
                Err(ReadaloudError::Speech(format!("Speak failed: {}", e)))
            }
        }
    }

    /// Forget the active utterance and silence the platform
    fn silence(&mut self) -> Result<Option<Notifier>> {
        let active = self.tracker.abandon()?;
        self.tts.stop().map_err(|e| {
            error!("Failed to cancel speech: {}", e);
            ReadaloudError::Speech(format!("Cancel failed: {}", e))
        })?;
        Ok(active)
    }
}

/// Map a rate multiplier onto the platform's rate range
///
/// 1.0 lands on the platform's normal rate; [`MIN_RATE`] and [`MAX_RATE`]
/// land on its minimum and maximum.
pub(crate) fn scale_rate(rate: f32, min: f32, normal: f32, max: f32) -> f32 {
    let rate = rate.clamp(MIN_RATE, MAX_RATE);
    if rate >= 1.0 {
        normal + (max - normal) * (rate - 1.0) / (MAX_RATE - 1.0)
    } else {
        normal - (normal - min) * (1.0 - rate) / (1.0 - MIN_RATE)
    }
}

impl Synthesizer for NativeSynthesizer {
    fn name(&self) -> &str {
        "native"
    }

    fn voices(&self) -> Result<Vec<Voice>> {
        let voices = self
            .tts
            .voices()
            .map_err(|e| ReadaloudError::Speech(format!("Failed to get voices: {}", e)))?;

        Ok(voices
            .iter()
            .map(|v| Voice::new(&v.id(), &v.name(), &v.language().to_string(), true))
            .collect())
    }

    fn speak(
        &mut self,
        text: &str,
        _lang: &str,
        voice: Option<&Voice>,
        rate: f32,
        notifier: Notifier,
    ) -> Result<()> {
        if text.is_empty() {
            notifier.completed();
            return Ok(());
        }

        self.paused = None;
        if let Some(voice) = voice {
            self.apply_voice(voice)?;
        }
        self.apply_rate(rate)?;

        debug!("Speaking: {}", text);
        self.current = Some((text.to_string(), voice.cloned()));
        self.start_utterance(text, notifier)
    }

    fn pause(&mut self) -> Result<()> {
        let Some(active) = self.silence()? else {
            return Ok(());
        };
        if let Some((text, voice)) = self.current.clone() {
            debug!("Paused utterance will be spoken again on resume");
            self.paused = Some(PausedUtterance {
                text,
                voice,
                notifier: active,
            });
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        let Some(paused) = self.paused.take() else {
            return Ok(());
        };
        if let Some(voice) = paused.voice.as_ref() {
            self.apply_voice(voice)?;
        }
        self.start_utterance(&paused.text, paused.notifier)
    }

    fn cancel(&mut self) -> Result<()> {
        debug!("Canceling speech");
        self.paused = None;
        self.current = None;
        self.silence()?;
        Ok(())
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        debug!("Setting rate to {}", rate);
        self.apply_rate(rate)
    }
}
