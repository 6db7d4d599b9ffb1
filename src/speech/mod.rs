//! Speech playback engine

pub mod backend;
pub mod backends;
pub mod chunker;
pub mod controller;
pub mod input;
pub mod session;
pub mod voices;

pub use backend::{
    BackendKind, ChunkRequest, FailureReason, Notifier, PlaybackBackend, PlaybackEvent,
    PlaybackOutcome,
};
pub use chunker::{chunk, chunk_text, normalize_whitespace};
pub use controller::{PlaybackController, SpeakOptions, MAX_RATE, MIN_RATE};
pub use input::SpeechInput;
pub use session::{PlaybackSession, PlaybackStatus};
pub use voices::{pick_best_voice, Voice};
