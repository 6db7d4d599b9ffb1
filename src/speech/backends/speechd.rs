//! Speech Dispatcher backend (Linux)
//!
//! Talks to speech-dispatcher directly instead of through the tts crate, so
//! pause and resume hold the utterance on the server and continue it from
//! where it stopped. Utterances are sent at message priority: they queue
//! behind other clients' text and can be paused, which important-priority
//! messages cannot.

use crate::lang::primary_subtag;
use crate::speech::backend::Notifier;
use crate::speech::backends::local::Synthesizer;
use crate::speech::backends::native::scale_rate;
use crate::speech::backends::tracker::UtteranceTracker;
use crate::speech::voices::Voice;
use crate::{ReadaloudError, Result, APP_NAME};
use log::{debug, error, warn};
use speech_dispatcher::{Connection, Mode, Priority};

/// Speech Dispatcher's rate scale
const SPD_MIN_RATE: f32 = -100.0;
const SPD_NORMAL_RATE: f32 = 0.0;
const SPD_MAX_RATE: f32 = 100.0;

fn spd_error(action: &str, e: speech_dispatcher::Error) -> ReadaloudError {
    ReadaloudError::Speech(format!("Speech Dispatcher failed to {}: {}", action, e))
}

/// Map a rate multiplier onto Speech Dispatcher's -100..=100 scale
fn spd_rate(rate: f32) -> i32 {
    scale_rate(rate, SPD_MIN_RATE, SPD_NORMAL_RATE, SPD_MAX_RATE).round() as i32
}

/// Text as the C API accepts it
fn c_text(text: &str) -> String {
    text.replace('\0', "")
}

/// Speech Dispatcher synthesizer with in-place pause
pub struct SpeechdSynthesizer {
    connection: Connection,
    tracker: UtteranceTracker<u64>,
    paused: bool,
}

impl SpeechdSynthesizer {
    /// Connect to the Speech Dispatcher server
    pub fn new() -> Result<Self> {
        debug!("Creating Speech Dispatcher backend");

        let connection = Connection::open(APP_NAME, "playback", APP_NAME, Mode::Threaded)
            .map_err(|e| spd_error("connect", e))?;

        let tracker = UtteranceTracker::new();
        let ended = tracker.clone();
        connection.on_end(Some(Box::new(move |msg_id, _client| {
            ended.finished(msg_id as u64, true)
        })));
        let cancelled = tracker.clone();
        connection.on_cancel(Some(Box::new(move |msg_id, _client| {
            cancelled.finished(msg_id as u64, false)
        })));

        debug!(
            "Speech Dispatcher backend created (client {})",
            connection.client_id()
        );
        Ok(Self {
            connection,
            tracker,
            paused: false,
        })
    }

    fn apply_voice(&self, lang: &str, voice: Option<&Voice>) -> Result<()> {
        let language = primary_subtag(lang);
        if !language.is_empty() {
            self.connection
                .set_language(c_text(&language))
                .map_err(|e| spd_error("set language", e))?;
        }

        if let Some(voice) = voice {
            let spd_voice = speech_dispatcher::Voice {
                name: c_text(&voice.id),
                language: c_text(&voice.lang),
                variant: None,
            };
            if let Err(e) = self.connection.set_synthesis_voice(&spd_voice) {
                warn!("Failed to select voice {}: {}", voice.name, e);
            }
        }
        Ok(())
    }
}

impl Synthesizer for SpeechdSynthesizer {
    fn name(&self) -> &str {
        "speech-dispatcher"
    }

    fn voices(&self) -> Result<Vec<Voice>> {
        let voices = self
            .connection
            .list_synthesis_voices()
            .map_err(|e| spd_error("list voices", e))?;

        Ok(voices
            .iter()
            .map(|v| {
                let name = match v.variant.as_deref() {
                    Some(variant) => format!("{} ({})", v.name, variant),
                    None => v.name.clone(),
                };
                Voice::new(&v.name, &name, &v.language, true)
            })
            .collect())
    }

    fn speak(
        &mut self,
        text: &str,
        lang: &str,
        voice: Option<&Voice>,
        rate: f32,
        notifier: Notifier,
    ) -> Result<()> {
        self.cancel()?;

        let text = c_text(text);
        if text.trim().is_empty() {
            notifier.completed();
            return Ok(());
        }

        self.apply_voice(lang, voice)?;
        self.connection
            .set_voice_rate(spd_rate(rate))
            .map_err(|e| spd_error("set rate", e))?;

        debug!("Speaking: {}", text);
        self.tracker.begin(notifier)?;
        match self.connection.say(Priority::Message, text) {
            Some(id) => self.tracker.started(Some(id)),
            None => {
                self.tracker.abandon()?;
                error!("Speech Dispatcher refused the utterance");
                Err(ReadaloudError::Speech(
                    "Speech Dispatcher refused the utterance".to_string(),
                ))
            }
        }
    }

    fn pause(&mut self) -> Result<()> {
        if !self.tracker.is_active() {
            return Ok(());
        }
        debug!("Pausing Speech Dispatcher");
        self.connection.pause().map_err(|e| spd_error("pause", e))?;
        self.paused = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if !self.paused {
            return Ok(());
        }
        debug!("Resuming Speech Dispatcher");
        self.paused = false;
        self.connection.resume().map_err(|e| spd_error("resume", e))
    }

    fn cancel(&mut self) -> Result<()> {
        let active = self.tracker.abandon()?;
        if active.is_none() && !self.paused {
            return Ok(());
        }
        debug!("Canceling speech");
        self.paused = false;
        self.connection.cancel().map_err(|e| spd_error("cancel", e))
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        debug!("Setting rate to {} (applies from the next chunk)", rate);
        self.connection
            .set_voice_rate(spd_rate(rate))
            .map_err(|e| spd_error("set rate", e))
    }
}

impl Drop for SpeechdSynthesizer {
    fn drop(&mut self) {
        debug!("Shutting down Speech Dispatcher backend");
        let _ = self.cancel();
    }
}
