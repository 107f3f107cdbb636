//! Bengali long-form narration on top of a text-to-speech backend.
//!
//! Text is split into backend-sized segments, each segment becomes a queue
//! item, and the scheduler synthesizes pending items with bounded concurrency.
//! Completed audio can be exported per segment or merged into one WAV file.

pub mod audio;
pub mod presets;
pub mod processing;
pub mod project;
pub mod queue;
pub mod scheduler;
pub mod settings;
pub mod synthesis;

pub use presets::{style_tag, StyleTag, Voice, STYLE_TAGS};
pub use processing::{Pace, PaceError};
pub use project::{Project, ProjectError};
pub use queue::{ItemId, ItemStatus, QueueItem, QueueStore, StatusCounts, StatusKind};
pub use scheduler::{RunOutcome, Scheduler, SchedulerConfig};
pub use settings::NarratorSettings;
pub use synthesis::{GeminiBackend, GenerationError, SpeechBackend, SpeechRequest};
