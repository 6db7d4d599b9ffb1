//! Remote audio stream player using reqwest and rodio
//!
//! Each `load` spawns a worker thread that fetches the audio, decodes it and
//! plays it on the default output device. The worker owns the output stream
//! (it cannot leave the thread that opened it) and shares the sink with the
//! player so pause, resume and speed changes reach it in place.
//!
//! Speed changes resample the audio, so pitch moves with the rate.

use crate::speech::backend::Notifier;
use crate::speech::backends::remote::MediaPlayer;
use crate::{ReadaloudError, Result};
use log::{debug, error};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use rodio::{Decoder, OutputStream, Sink};
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// State shared between the player and one worker
#[derive(Default)]
struct PlaybackState {
    /// Set once the audio is decoded and queued
    sink: Option<Arc<Sink>>,
    paused: bool,
    speed: f32,
    cancelled: bool,
}

type SharedState = Arc<Mutex<PlaybackState>>;

/// How a worker's stream ended without error
#[derive(Debug, PartialEq, Eq)]
enum StreamEnd {
    Finished,
    Cancelled,
}

/// Streaming [`MediaPlayer`] for the default audio device
pub struct StreamingPlayer {
    client: Option<Client>,
    current: Option<SharedState>,
}

impl StreamingPlayer {
    pub fn new() -> Self {
        Self {
            client: None,
            current: None,
        }
    }

    /// HTTP client, built on first use
    fn client(&mut self) -> Result<Client> {
        if let Some(client) = self.client.as_ref() {
            return Ok(client.clone());
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("readaloud/", env!("CARGO_PKG_VERSION")))
            .build()?;
        self.client = Some(client.clone());
        Ok(client)
    }

    fn with_current(&self, f: impl FnOnce(&mut PlaybackState)) -> Result<()> {
        if let Some(state) = self.current.as_ref() {
            f(&mut *lock(state)?);
        }
        Ok(())
    }
}

impl Default for StreamingPlayer {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(state: &SharedState) -> Result<MutexGuard<'_, PlaybackState>> {
    state
        .lock()
        .map_err(|_| ReadaloudError::Audio("Playback state lock poisoned".to_string()))
}

/// Whether a response content type can hold audio
///
/// Servers that send no content type get the benefit of the doubt.
fn is_audio_content_type(content_type: &str) -> bool {
    let content_type = content_type.trim().to_ascii_lowercase();
    content_type.is_empty()
        || content_type.starts_with("audio/")
        || content_type.starts_with("application/octet-stream")
}

fn fetch_audio(client: &Client, url: &str) -> Result<Vec<u8>> {
    let response = client.get(url).send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(ReadaloudError::Http(format!(
            "Remote speech request failed with status {}",
            status
        )));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !is_audio_content_type(&content_type) {
        return Err(ReadaloudError::Http(format!(
            "Remote speech returned {} instead of audio",
            content_type
        )));
    }

    let bytes = response.bytes()?;
    if bytes.is_empty() {
        return Err(ReadaloudError::Audio("Remote speech returned no audio".to_string()));
    }
    debug!("Fetched {} bytes of audio", bytes.len());
    Ok(bytes.to_vec())
}

fn play_stream(client: &Client, url: &str, state: &SharedState) -> Result<StreamEnd> {
    let audio = fetch_audio(client, url)?;
    if lock(state)?.cancelled {
        return Ok(StreamEnd::Cancelled);
    }

    let (_stream, handle) = OutputStream::try_default()
        .map_err(|e| ReadaloudError::Audio(format!("No audio output device: {}", e)))?;
    let sink = Sink::try_new(&handle)
        .map_err(|e| ReadaloudError::Audio(format!("Failed to open audio sink: {}", e)))?;
    let source = Decoder::new(Cursor::new(audio))
        .map_err(|e| ReadaloudError::Audio(format!("Failed to decode audio: {}", e)))?;

    let sink = Arc::new(sink);
    {
        let mut shared = lock(state)?;
        if shared.cancelled {
            return Ok(StreamEnd::Cancelled);
        }
        sink.set_speed(shared.speed);
        if shared.paused {
            sink.pause();
        }
        sink.append(source);
        shared.sink = Some(Arc::clone(&sink));
    }

    loop {
        if lock(state)?.cancelled {
            sink.stop();
            return Ok(StreamEnd::Cancelled);
        }
        if sink.empty() {
            return Ok(StreamEnd::Finished);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn stream_worker(client: Client, url: String, state: SharedState, notifier: Notifier) {
    match play_stream(&client, &url, &state) {
        Ok(StreamEnd::Finished) => notifier.completed(),
        Ok(StreamEnd::Cancelled) => notifier.interrupted(),
        Err(e) => {
            let cancelled = lock(&state).map(|s| s.cancelled).unwrap_or(true);
            if cancelled {
                notifier.interrupted();
            } else {
                error!("Remote playback failed: {}", e);
                notifier.failed(e.to_string());
            }
        }
    }
}

impl MediaPlayer for StreamingPlayer {
    fn load(&mut self, url: &str, rate: f32, notifier: Notifier) -> Result<()> {
        self.reset()?;
        let client = self.client()?;

        let state: SharedState = Arc::new(Mutex::new(PlaybackState {
            speed: rate,
            ..Default::default()
        }));
        self.current = Some(Arc::clone(&state));

        let url = url.to_string();
        thread::Builder::new()
            .name("audio-stream".to_string())
            .spawn(move || stream_worker(client, url, state, notifier))
            .map_err(|e| ReadaloudError::Audio(format!("Failed to start stream worker: {}", e)))?;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.with_current(|state| {
            state.paused = true;
            if let Some(sink) = state.sink.as_ref() {
                sink.pause();
            }
        })
    }

    fn play(&mut self) -> Result<()> {
        self.with_current(|state| {
            state.paused = false;
            if let Some(sink) = state.sink.as_ref() {
                sink.play();
            }
        })
    }

    fn reset(&mut self) -> Result<()> {
        let Some(state) = self.current.take() else {
            return Ok(());
        };
        debug!("Dropping remote audio stream");

        let mut state = lock(&state)?;
        state.cancelled = true;
        if let Some(sink) = state.sink.take() {
            sink.stop();
        }
        Ok(())
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        self.with_current(|state| {
            state.speed = rate;
            if let Some(sink) = state.sink.as_ref() {
                sink.set_speed(rate);
            }
        })
    }
}

impl Drop for StreamingPlayer {
    fn drop(&mut self) {
        let _ = self.reset();
    }
}
