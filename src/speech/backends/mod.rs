//! Playback backends and the platform facilities behind them

pub mod local;
pub mod remote;
pub mod stream;
mod tracker;

// Native TTS backend using the tts crate (cross-platform)
pub mod native;

// Speech Dispatcher with in-place pause (Linux)
#[cfg(target_os = "linux")]
pub mod speechd;

// espeak-ng subprocess fallback for Linux without Speech Dispatcher
#[cfg(unix)]
pub mod espeak;

pub use local::{LocalSynthesisBackend, Synthesizer};
pub use native::NativeSynthesizer;
pub use remote::{build_request_url, MediaPlayer, RemoteAudioBackend};
pub use stream::StreamingPlayer;

#[cfg(target_os = "linux")]
pub use speechd::SpeechdSynthesizer;

#[cfg(unix)]
pub use espeak::EspeakSynthesizer;

use crate::{ReadaloudError, Result};
use log::info;

/// Try one synthesizer, logging the attempt
fn attempt<S, F>(label: &str, create: F, failures: &mut Vec<String>) -> Option<Box<dyn Synthesizer>>
where
    S: Synthesizer + 'static,
    F: FnOnce() -> Result<S>,
{
    info!("Trying {} backend...", label);
    match create() {
        Ok(synth) => {
            info!("✓ Successfully initialized {} backend", label);
            Some(Box::new(synth))
        }
        Err(e) => {
            info!("✗ {} backend unavailable: {}", label, e);
            failures.push(format!("{} ({})", label, e));
            None
        }
    }
}

/// Create the best synthesizer this platform offers
///
/// Synthesizers that pause in place come first: Speech Dispatcher on Linux,
/// then the platform speech service through the tts crate, then espeak-ng
/// where it can run.
pub fn create_synthesizer() -> Result<Box<dyn Synthesizer>> {
    let mut failures = Vec::new();

    #[cfg(target_os = "linux")]
    {
        if let Some(synth) = attempt("Speech Dispatcher", SpeechdSynthesizer::new, &mut failures) {
            return Ok(synth);
        }
    }

    if let Some(synth) = attempt("native speech", NativeSynthesizer::new, &mut failures) {
        return Ok(synth);
    }

    #[cfg(unix)]
    {
        if let Some(synth) = attempt("espeak-ng", EspeakSynthesizer::new, &mut failures) {
            return Ok(synth);
        }
    }

    let tried: Vec<String> = failures
        .iter()
        .enumerate()
        .map(|(i, failure)| format!("{}. {}", i + 1, failure))
        .collect();
    Err(ReadaloudError::Speech(format!(
        "No speech backend available. Tried:\n{}",
        tried.join("\n")
    )))
}
