//! Preference file
//!
//! The host keeps the user's playback rate and preferred language in an INI
//! file between runs, alongside a few engine tunables. The playback engine
//! itself never reads or writes this file; the host turns it into
//! [`EngineSettings`] and passes values in.

use crate::lang::speech_tag;
use crate::{ReadaloudError, Result};
use ini::Ini;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Default remote text-to-speech endpoint
pub const DEFAULT_REMOTE_ENDPOINT: &str = "https://translate.google.com/translate_tts";

/// Longest chunk sent to the platform synthesizer
pub const DEFAULT_LOCAL_MAX_CHARS: usize = 220;

/// Longest chunk sent to the remote endpoint
///
/// The endpoint publishes no request limit; this is an empirical margin.
pub const DEFAULT_REMOTE_MAX_CHARS: usize = 180;

/// Values the host hands to the playback engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Rate multiplier (1.0 is normal speed)
    pub rate: f32,
    /// Speech language tag
    pub lang: String,
    pub remote_endpoint: String,
    pub remote_max_chars: usize,
    pub local_max_chars: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            rate: 1.0,
            lang: speech_tag("en"),
            remote_endpoint: DEFAULT_REMOTE_ENDPOINT.to_string(),
            remote_max_chars: DEFAULT_REMOTE_MAX_CHARS,
            local_max_chars: DEFAULT_LOCAL_MAX_CHARS,
        }
    }
}

/// User preferences backed by an INI file
pub struct Config {
    ini: Ini,

    /// Config file path (~/.readaloud.cfg by default)
    path: PathBuf,
}

impl Config {
    /// Load the preference file from the home directory, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load a preference file from `path`, creating it with defaults if missing
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!("Loading config from {:?}", path);

        let ini = if path.exists() {
            Ini::load_from_file(&path)
                .map_err(|e| ReadaloudError::IniParse(format!("Failed to load config: {}", e)))?
        } else {
            info!("Config file not found, creating default");
            let default = Self::default_config();
            default
                .write_to_file(&path)
                .map_err(|e| ReadaloudError::Config(format!("Failed to write config: {}", e)))?;
            default
        };

        Ok(Self { ini, path })
    }

    /// Save preferences to disk
    pub fn save(&self) -> Result<()> {
        debug!("Saving config to {:?}", self.path);
        self.ini
            .write_to_file(&self.path)
            .map_err(|e| ReadaloudError::Config(format!("Failed to save config: {}", e)))
    }

    fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".readaloud.cfg")
    }

    /// Expose the config file path for display
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn default_config() -> Ini {
        let mut ini = Ini::new();

        ini.with_section(Some("speech"))
            .set("rate", "1.0")
            .set("lang", "en");

        ini.with_section(Some("remote"))
            .set("endpoint", DEFAULT_REMOTE_ENDPOINT)
            .set("max_chars", DEFAULT_REMOTE_MAX_CHARS.to_string());

        ini.with_section(Some("local"))
            .set("max_chars", DEFAULT_LOCAL_MAX_CHARS.to_string());

        ini
    }

    /// Get a string value from config
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        self.ini
            .get_from(Some(section), key)
            .unwrap_or(default)
            .to_string()
    }

    /// Get a float value from config
    pub fn get_float(&self, section: &str, key: &str, default: f32) -> f32 {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Get an unsigned integer value from config
    pub fn get_usize(&self, section: &str, key: &str, default: usize) -> usize {
        self.ini
            .get_from(Some(section), key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Set a value in config
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        self.ini.with_section(Some(section)).set(key, value);
    }

    /// Preferred speech rate multiplier
    ///
    /// Non-positive or unparseable values fall back to normal speed.
    pub fn rate(&self) -> f32 {
        let rate = self.get_float("speech", "rate", 1.0);
        if rate.is_finite() && rate > 0.0 {
            rate
        } else {
            1.0
        }
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.set("speech", "rate", &format!("{:.2}", rate));
    }

    /// Preferred language as a speech tag ("zh" is returned as "zh-CN")
    pub fn lang(&self) -> String {
        speech_tag(&self.get_string("speech", "lang", "en"))
    }

    pub fn set_lang(&mut self, code: &str) {
        self.set("speech", "lang", code);
    }

    pub fn remote_endpoint(&self) -> String {
        self.get_string("remote", "endpoint", DEFAULT_REMOTE_ENDPOINT)
    }

    pub fn remote_max_chars(&self) -> usize {
        self.get_usize("remote", "max_chars", DEFAULT_REMOTE_MAX_CHARS)
            .max(1)
    }

    pub fn local_max_chars(&self) -> usize {
        self.get_usize("local", "max_chars", DEFAULT_LOCAL_MAX_CHARS)
            .max(1)
    }

    /// Collect everything the playback engine needs
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            rate: self.rate(),
            lang: self.lang(),
            remote_endpoint: self.remote_endpoint(),
            remote_max_chars: self.remote_max_chars(),
            local_max_chars: self.local_max_chars(),
        }
    }
}
