//! Completed synthesis result owned by a queue item.
//!
//! A clip may be materialized as a WAV file for playback. That file belongs to
//! the clip and is deleted when the last reference is dropped, which happens
//! when its item is removed from the queue or the queue is cleared.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::wav::{self, CodecError, PcmFormat};

/// Raw PCM16 audio plus the playback file derived from it, if any.
pub struct AudioClip {
    pcm: Vec<u8>,
    format: PcmFormat,
    playback_file: Mutex<Option<PathBuf>>,
}

impl AudioClip {
    /// Validate and take ownership of a PCM16 payload.
    pub fn new(pcm: Vec<u8>, format: PcmFormat) -> Result<Self, CodecError> {
        wav::validate_pcm(&pcm, format)?;
        Ok(Self {
            pcm,
            format,
            playback_file: Mutex::new(None),
        })
    }

    pub fn pcm(&self) -> &[u8] {
        &self.pcm
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn duration_secs(&self) -> f64 {
        wav::duration_secs(self.pcm.len(), self.format)
    }

    /// Duration as `m:ss`, as shown next to each queue entry.
    pub fn duration_label(&self) -> String {
        wav::format_duration(self.duration_secs())
    }

    /// Encode as a standalone WAV file.
    pub fn to_wav(&self) -> Result<Vec<u8>, CodecError> {
        wav::encode(&self.pcm, self.format)
    }

    /// Write the clip to `path` for playback and keep ownership of that file.
    ///
    /// Subsequent calls return the already written path.
    pub fn playback_file(&self, path: &Path) -> std::io::Result<PathBuf> {
        let mut slot = self
            .playback_file
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.clone());
        }

        let bytes = self
            .to_wav()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)?;
        log::debug!("Playback file written: {:?}", path);

        *slot = Some(path.to_path_buf());
        Ok(path.to_path_buf())
    }

    /// Delete the playback file, if one was written.
    pub fn release(&self) {
        let taken = self
            .playback_file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(path) = taken {
            match std::fs::remove_file(&path) {
                Ok(()) => log::debug!("Released playback file: {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to release playback file {:?}: {}", path, e),
            }
        }
    }
}

impl Drop for AudioClip {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioClip")
            .field("bytes", &self.pcm.len())
            .field("format", &self.format)
            .finish()
    }
}
