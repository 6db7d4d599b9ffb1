//! Error types for readaloud

use std::io;
use thiserror::Error;

/// Main error type for the playback engine
#[derive(Error, Debug)]
pub enum ReadaloudError {
    #[error("Speech synthesis error: {0}")]
    Speech(String),

    #[error("Playback backend error: {0}")]
    Backend(String),

    #[error("Audio output error: {0}")]
    Audio(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for readaloud operations
pub type Result<T> = std::result::Result<T, ReadaloudError>;

impl From<String> for ReadaloudError {
    fn from(s: String) -> Self {
        ReadaloudError::Other(s)
    }
}

impl From<&str> for ReadaloudError {
    fn from(s: &str) -> Self {
        ReadaloudError::Other(s.to_string())
    }
}

impl From<reqwest::Error> for ReadaloudError {
    fn from(e: reqwest::Error) -> Self {
        ReadaloudError::Http(e.to_string())
    }
}
