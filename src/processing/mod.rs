//! Text-side processing for narration.
//!
//! - `segmenter`: split long text into backend-sized chunks
//! - `pace`: speaking rate and the hint derived from it
//! - `prompt`: combine style instructions and pace into the backend prompt

pub mod pace;
pub mod prompt;
pub mod segmenter;

pub use pace::{Pace, PaceError};
pub use prompt::{append_style, combined_instructions, speech_prompt};
pub use segmenter::{segment, DEFAULT_SEGMENT_CHAR_LIMIT};
