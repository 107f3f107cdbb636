use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::{PcmFormat, DEFAULT_SAMPLE_RATE};
use crate::processing::DEFAULT_SEGMENT_CHAR_LIMIT;
use crate::synthesis::DEFAULT_MODEL;

const SETTINGS_FILE_NAME: &str = "settings.json";

/// Errors that can occur while loading or saving settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("settings I/O on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NarratorSettings {
    /// Number of segments synthesized at the same time.
    pub concurrency: usize,

    /// Maximum characters per segment sent to the backend.
    pub segment_char_limit: usize,

    /// Sample rate of the PCM the backend returns.
    pub sample_rate: u32,

    /// Backend model name.
    pub model: String,

    /// How long `stop` waits before a new run may start.
    pub stop_settle_ms: u64,

    /// Per-request timeout for the backend.
    pub request_timeout_secs: u64,

    /// Where exports go. Defaults to the XDG data directory.
    pub output_dir: Option<PathBuf>,
}

impl Default for NarratorSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            segment_char_limit: DEFAULT_SEGMENT_CHAR_LIMIT,
            sample_rate: DEFAULT_SAMPLE_RATE,
            model: DEFAULT_MODEL.to_string(),
            stop_settle_ms: 300,
            request_timeout_secs: 120,
            output_dir: None,
        }
    }
}

impl NarratorSettings {
    pub fn pcm_format(&self) -> PcmFormat {
        PcmFormat::mono(self.sample_rate)
    }

    pub fn stop_settle(&self) -> Duration {
        Duration::from_millis(self.stop_settle_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// ~/.config/bangla-narrator/settings.json
pub fn default_settings_path() -> Result<PathBuf, SettingsError> {
    let dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
    Ok(dir.join("bangla-narrator").join(SETTINGS_FILE_NAME))
}

/// The settings file to use: `explicit` when given, else the default location.
pub fn settings_path(explicit: Option<&Path>) -> Result<PathBuf, SettingsError> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_settings_path(),
    }
}

/// Load settings from `path`, falling back to defaults when the file is
/// missing or unreadable.
pub fn load_settings(path: &Path) -> NarratorSettings {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<NarratorSettings>(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Settings: failed to parse {:?}: {}", path, e);
                NarratorSettings::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => NarratorSettings::default(),
        Err(e) => {
            log::warn!("Settings: failed to read {:?}: {}", path, e);
            NarratorSettings::default()
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SettingsError {
    let path = path.to_path_buf();
    move |source| SettingsError::Io { path, source }
}

pub fn save_settings(path: &Path, settings: &NarratorSettings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let contents = serde_json::to_string_pretty(settings)?;

    // Write to a sibling temp file, then rename over the real one.
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &contents).map_err(io_error(&tmp_path))?;

    // Windows rename fails if the destination exists.
    if cfg!(windows) && path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(io_error(path)(e));
            }
        }
    }

    std::fs::rename(&tmp_path, path).map_err(io_error(path))?;
    Ok(())
}
