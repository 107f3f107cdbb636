//! A narration project: one queue, one scheduler, and the exports built from
//! them.
//!
//! This is the surface a front end drives: submit text, generate everything,
//! stop, remove items, and download single segments or the merged file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audio::{
    self, create_playback_dir, default_export_dir, merged_file_name, segment_file_name, AudioClip,
    CodecError,
};
use crate::presets::Voice;
use crate::processing::{segment, Pace};
use crate::queue::{ItemId, NewItem, QueueStore, StatusCounts};
use crate::scheduler::{RunOutcome, Scheduler, SchedulerConfig};
use crate::settings::NarratorSettings;
use crate::synthesis::{GenerationError, SpeechBackend, SpeechRequest};

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("no queue item with id {0}")]
    UnknownItem(ItemId),
    #[error("item {0} has no audio yet")]
    NotCompleted(ItemId),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("I/O on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ProjectError {
    let path = path.to_path_buf();
    move |source| ProjectError::Io { path, source }
}

fn write_file(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ProjectError> {
    std::fs::create_dir_all(dir).map_err(io_error(dir))?;
    let path = dir.join(file_name);
    std::fs::write(&path, bytes).map_err(io_error(&path))?;
    Ok(path)
}

pub struct Project {
    name: String,
    settings: NarratorSettings,
    backend: Arc<dyn SpeechBackend>,
    store: QueueStore,
    scheduler: Scheduler,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        backend: Arc<dyn SpeechBackend>,
        settings: NarratorSettings,
    ) -> Self {
        let store = QueueStore::new();
        let scheduler = Scheduler::new(
            store.clone(),
            Arc::clone(&backend),
            SchedulerConfig::from(&settings),
        );
        Self {
            name: name.into(),
            settings,
            backend,
            store,
            scheduler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn settings(&self) -> &NarratorSettings {
        &self.settings
    }

    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn counts(&self) -> StatusCounts {
        self.store.counts()
    }

    pub fn is_processing(&self) -> bool {
        self.scheduler.is_processing()
    }

    /// Split `text` into segments and queue one `Idle` item per segment,
    /// all sharing the same voice, pace and instructions.
    pub fn submit(&self, text: &str, voice: Voice, pace: Pace, instructions: &str) -> Vec<ItemId> {
        let chunks = segment(text, self.settings.segment_char_limit);
        if chunks.is_empty() {
            log::debug!("Project: nothing to submit");
            return Vec::new();
        }
        log::info!(
            "Project: queued {} segments ({} voice, pace {})",
            chunks.len(),
            voice.id(),
            pace
        );
        self.store.add_all(chunks.into_iter().map(|text| NewItem {
            text,
            voice: voice.id().to_string(),
            pace,
            instructions: instructions.trim().to_string(),
        }))
    }

    pub async fn generate_all(&self) -> RunOutcome {
        self.scheduler.run().await
    }

    pub async fn stop(&self) -> Option<usize> {
        self.scheduler.stop().await
    }

    pub fn remove(&self, id: ItemId) -> bool {
        self.store.remove(id)
    }

    pub fn clear(&self) -> usize {
        self.store.clear()
    }

    /// Directory exports go to when the caller doesn't name one.
    pub fn export_dir(&self) -> PathBuf {
        self.settings
            .output_dir
            .clone()
            .unwrap_or_else(default_export_dir)
    }

    fn completed_clip(&self, id: ItemId) -> Result<Arc<AudioClip>, ProjectError> {
        let item = self.store.get(id).ok_or(ProjectError::UnknownItem(id))?;
        item.clip().cloned().ok_or(ProjectError::NotCompleted(id))
    }

    /// Write one completed segment as `segment_{id}.wav` into `dir`.
    pub fn export_segment(&self, id: ItemId, dir: &Path) -> Result<PathBuf, ProjectError> {
        let wav = self.completed_clip(id)?.to_wav()?;
        let path = write_file(dir, &segment_file_name(id), &wav)?;
        log::info!("Project: exported segment to {:?}", path);
        Ok(path)
    }

    /// All completed segments merged in queue order, or `None` when nothing
    /// has completed yet.
    pub fn merged_wav(&self) -> Result<Option<Vec<u8>>, ProjectError> {
        let clips = self.store.completed_clips();
        if clips.is_empty() {
            return Ok(None);
        }
        let buffers: Vec<&[u8]> = clips.iter().map(|clip| clip.pcm()).collect();
        let wav = audio::wav::merge(&buffers, self.settings.pcm_format())?;
        Ok(Some(wav))
    }

    /// Write the merged file, named after the project, into `dir`.
    pub fn export_merged(&self, dir: &Path) -> Result<Option<PathBuf>, ProjectError> {
        let Some(wav) = self.merged_wav()? else {
            log::info!("Project: no completed segments to merge");
            return Ok(None);
        };
        let path = write_file(dir, &merged_file_name(&self.name), &wav)?;
        log::info!("Project: exported merged audio to {:?}", path);
        Ok(Some(path))
    }

    /// Materialize a completed segment in the playback directory.
    pub fn playback_file(&self, id: ItemId) -> Result<PathBuf, ProjectError> {
        let dir = create_playback_dir().map_err(io_error(Path::new("playback")))?;
        self.playback_file_in(id, &dir)
    }

    /// Like `playback_file`, but inside `dir`. The file is removed together
    /// with its item.
    pub fn playback_file_in(&self, id: ItemId, dir: &Path) -> Result<PathBuf, ProjectError> {
        let path = dir.join(segment_file_name(id));
        self.completed_clip(id)?
            .playback_file(&path)
            .map_err(io_error(&path))
    }

    /// Synthesize a short sample sentence with `voice`.
    pub async fn preview_voice(&self, voice: Voice) -> Result<AudioClip, GenerationError> {
        let request = SpeechRequest::preview(voice.id());
        let pcm = self.backend.generate(&request).await?;
        AudioClip::new(pcm, self.settings.pcm_format())
            .map_err(|e| GenerationError::InvalidAudio(e.to_string()))
    }
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("items", &self.store.len())
            .field("processing", &self.scheduler.is_processing())
            .finish()
    }
}
