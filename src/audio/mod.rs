//! Audio handling for narration output.
//!
//! Raw PCM16 from the speech backend is wrapped in WAV containers with hound,
//! merged for the full-project download, and owned per item as an `AudioClip`.

mod clip;
mod paths;
pub mod wav;

pub use clip::AudioClip;
pub use paths::{
    create_playback_dir, default_export_dir, merged_file_name, sanitize_project_name,
    segment_file_name,
};
pub use wav::{CodecError, PcmFormat, DEFAULT_SAMPLE_RATE};
