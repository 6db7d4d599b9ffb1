//! Remote playback of text-to-speech audio
//!
//! Each chunk becomes a GET request against a text-to-speech endpoint that
//! answers with an audio stream. The stream is handed to a [`MediaPlayer`],
//! which reports the outcome of the unit through its notifier.

use crate::speech::backend::{ChunkRequest, Notifier, PlaybackBackend};
use crate::Result;
use log::debug;

/// Audio player for remote streams
///
/// `load` starts playback of `url` and returns immediately. The player
/// reports completion or failure through the notifier; a `reset` player
/// reports the unit as interrupted, if at all.
pub trait MediaPlayer: Send {
    /// Start playing the audio at `url`
    fn load(&mut self, url: &str, rate: f32, notifier: Notifier) -> Result<()>;

    /// Pause in place
    fn pause(&mut self) -> Result<()>;

    /// Continue after `pause()`
    fn play(&mut self) -> Result<()>;

    /// Drop the current source; fine to call when nothing is loaded
    fn reset(&mut self) -> Result<()>;

    /// Change the playback speed of the current and later sources
    fn set_rate(&mut self, rate: f32) -> Result<()>;
}

/// Build the request URL for one chunk
///
/// ```
/// use readaloud::speech::backends::build_request_url;
///
/// let url = build_request_url("https://tts.example/api", "你好", "zh-CN");
/// assert_eq!(
///     url,
///     "https://tts.example/api?client=gtx&ie=UTF-8&tl=zh-CN&q=%E4%BD%A0%E5%A5%BD"
/// );
/// ```
pub fn build_request_url(endpoint: &str, text: &str, lang: &str) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!(
        "{}{}client=gtx&ie=UTF-8&tl={}&q={}",
        endpoint,
        separator,
        urlencoding::encode(lang),
        urlencoding::encode(text)
    )
}

/// [`PlaybackBackend`] over a remote text-to-speech endpoint
pub struct RemoteAudioBackend {
    endpoint: String,
    max_chars: usize,
    player: Box<dyn MediaPlayer>,
}

impl RemoteAudioBackend {
    pub fn new(endpoint: &str, max_chars: usize, player: Box<dyn MediaPlayer>) -> Self {
        debug!("Remote audio backend on {}", endpoint);
        Self {
            endpoint: endpoint.to_string(),
            max_chars: max_chars.max(1),
            player,
        }
    }
}

impl PlaybackBackend for RemoteAudioBackend {
    fn max_chunk_chars(&self) -> usize {
        self.max_chars
    }

    fn play(&mut self, request: &ChunkRequest, notifier: Notifier) -> Result<()> {
        let url = build_request_url(&self.endpoint, &request.text, &request.lang);
        debug!(
            "Remote speak ({} chars, lang {})",
            request.text.chars().count(),
            request.lang
        );
        self.player.load(&url, request.rate, notifier)
    }

    fn pause(&mut self) -> Result<()> {
        self.player.pause()
    }

    fn resume(&mut self) -> Result<()> {
        self.player.play()
    }

    fn cancel(&mut self) -> Result<()> {
        let paused = self.player.pause();
        let reset = self.player.reset();
        paused.and(reset)
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        self.player.set_rate(rate)
    }
}
