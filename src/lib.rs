//! readaloud - speech playback engine
//!
//! Turns runtime-supplied text (page summaries, headings, chat replies) into
//! continuous speech. Playback is chunked, runs on either the platform voice
//! synthesizer or a remote audio-streaming endpoint, and can be paused,
//! resumed and cancelled at any point.

pub mod config;
pub mod error;
pub mod lang;
pub mod speech;

pub use error::{ReadaloudError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "readaloud";
