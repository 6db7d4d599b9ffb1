//! Local playback on the platform voice synthesizer

use crate::speech::backend::{ChunkRequest, Notifier, PlaybackBackend};
use crate::speech::voices::Voice;
use crate::Result;
use log::debug;

/// Platform speech synthesis facility
///
/// One implementation per platform mechanism. `speak` starts an utterance and
/// returns immediately; its outcome is reported through the notifier.
pub trait Synthesizer: Send {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Voices installed on this platform
    fn voices(&self) -> Result<Vec<Voice>>;

    /// Start speaking `text`, using `voice` when given
    fn speak(
        &mut self,
        text: &str,
        lang: &str,
        voice: Option<&Voice>,
        rate: f32,
        notifier: Notifier,
    ) -> Result<()>;

    /// Pause the current utterance
    fn pause(&mut self) -> Result<()>;

    /// Continue a paused utterance
    fn resume(&mut self) -> Result<()>;

    /// Silence the current utterance; fine to call when nothing is playing
    fn cancel(&mut self) -> Result<()>;

    /// Change the rate multiplier
    fn set_rate(&mut self, rate: f32) -> Result<()>;
}

/// [`PlaybackBackend`] over a platform [`Synthesizer`]
pub struct LocalSynthesisBackend {
    synth: Box<dyn Synthesizer>,
    max_chars: usize,
}

impl LocalSynthesisBackend {
    pub fn new(synth: Box<dyn Synthesizer>, max_chars: usize) -> Self {
        debug!("Local synthesis backend using {}", synth.name());
        Self {
            synth,
            max_chars: max_chars.max(1),
        }
    }
}

impl PlaybackBackend for LocalSynthesisBackend {
    fn max_chunk_chars(&self) -> usize {
        self.max_chars
    }

    fn voices(&self) -> Result<Vec<Voice>> {
        self.synth.voices()
    }

    fn play(&mut self, request: &ChunkRequest, notifier: Notifier) -> Result<()> {
        debug!(
            "Local speak ({} chars, voice {:?})",
            request.text.chars().count(),
            request.voice.as_ref().map(|v| v.name.as_str())
        );
        self.synth.speak(
            &request.text,
            &request.lang,
            request.voice.as_ref(),
            request.rate,
            notifier,
        )
    }

    fn pause(&mut self) -> Result<()> {
        self.synth.pause()
    }

    fn resume(&mut self) -> Result<()> {
        self.synth.resume()
    }

    fn cancel(&mut self) -> Result<()> {
        self.synth.cancel()
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        self.synth.set_rate(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorded {
        spoken: Vec<(String, String, Option<String>, f32)>,
        pauses: usize,
        resumes: usize,
        cancels: usize,
    }

    struct RecordingSynth {
        recorded: Arc<Mutex<Recorded>>,
    }

    impl Synthesizer for RecordingSynth {
        fn name(&self) -> &str {
            "recording"
        }

        fn voices(&self) -> Result<Vec<Voice>> {
            Ok(vec![Voice::new("1", "Samantha", "en-US", true)])
        }

        fn speak(
            &mut self,
            text: &str,
            lang: &str,
            voice: Option<&Voice>,
            rate: f32,
            notifier: Notifier,
        ) -> Result<()> {
            self.recorded.lock().unwrap().spoken.push((
                text.to_string(),
                lang.to_string(),
                voice.map(|v| v.name.clone()),
                rate,
            ));
            notifier.completed();
            Ok(())
        }

        fn pause(&mut self) -> Result<()> {
            self.recorded.lock().unwrap().pauses += 1;
            Ok(())
        }

        fn resume(&mut self) -> Result<()> {
            self.recorded.lock().unwrap().resumes += 1;
            Ok(())
        }

        fn cancel(&mut self) -> Result<()> {
            self.recorded.lock().unwrap().cancels += 1;
            Ok(())
        }

        fn set_rate(&mut self, _rate: f32) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_play_attaches_voice() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mut backend = LocalSynthesisBackend::new(
            Box::new(RecordingSynth {
                recorded: Arc::clone(&recorded),
            }),
            220,
        );
        let (tx, rx) = mpsc::channel();

        let request = ChunkRequest {
            text: "Hello world.".into(),
            lang: "en-US".into(),
            rate: 1.5,
            voice: Some(Voice::new("1", "Samantha", "en-US", true)),
        };
        backend.play(&request, Notifier::new(3, tx)).unwrap();

        let recorded = recorded.lock().unwrap();
        assert_eq!(
            recorded.spoken,
            vec![(
                "Hello world.".to_string(),
                "en-US".to_string(),
                Some("Samantha".to_string()),
                1.5
            )]
        );
        assert_eq!(rx.try_recv().unwrap().epoch, 3);
    }

    #[test]
    fn test_cancel_after_finish_is_safe() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mut backend = LocalSynthesisBackend::new(
            Box::new(RecordingSynth {
                recorded: Arc::clone(&recorded),
            }),
            220,
        );

        assert!(backend.cancel().is_ok());
        assert!(backend.cancel().is_ok());
        assert_eq!(recorded.lock().unwrap().cancels, 2);
        assert_eq!(backend.max_chunk_chars(), 220);
    }

    #[test]
    fn test_resume_continues_without_resending_text() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let mut backend = LocalSynthesisBackend::new(
            Box::new(RecordingSynth {
                recorded: Arc::clone(&recorded),
            }),
            220,
        );
        let (tx, _rx) = mpsc::channel();

        let request = ChunkRequest {
            text: "A sentence long enough to pause in.".into(),
            lang: "en-US".into(),
            rate: 1.0,
            voice: None,
        };
        backend.play(&request, Notifier::new(1, tx)).unwrap();
        backend.pause().unwrap();
        backend.resume().unwrap();

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.spoken.len(), 1);
        assert_eq!(recorded.pauses, 1);
        assert_eq!(recorded.resumes, 1);
        assert_eq!(recorded.cancels, 0);
    }
}
