//! Output locations and download file names.
//!
//! Exports default to: ~/.local/share/bangla-narrator/exports/
//! Playback files live in: ~/.local/share/bangla-narrator/temp/playback/

use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

const APP_DIR: &str = "bangla-narrator";

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Default directory for exported WAV files.
pub fn default_export_dir() -> PathBuf {
    data_dir().join("exports")
}

/// Create the playback directory if it doesn't exist.
pub fn create_playback_dir() -> std::io::Result<PathBuf> {
    let dir = data_dir().join("temp").join("playback");
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// File name for a single segment download.
/// Format: segment_<id>.wav
pub fn segment_file_name(id: Uuid) -> String {
    format!("segment_{}.wav", id)
}

/// Strip everything except ASCII letters, digits, spaces, `-` and `_`.
pub fn sanitize_project_name(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' '))
        .collect::<String>()
        .trim()
        .to_string()
}

/// File name for the merged download.
/// Format: <sanitized project name>.wav, or project_<unix millis>.wav when that is empty.
pub fn merged_file_name(project_name: &str) -> String {
    let safe = sanitize_project_name(project_name);
    if safe.is_empty() {
        format!("project_{}.wav", chrono::Utc::now().timestamp_millis())
    } else {
        format!("{}.wav", safe)
    }
}
