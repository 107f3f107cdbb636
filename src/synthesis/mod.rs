//! Speech synthesis backends.
//!
//! The scheduler only sees the `SpeechBackend` trait: text, voice and an
//! instruction string in, raw PCM16 bytes out. `GeminiBackend` is the real
//! implementation; tests substitute their own.

mod gemini;

use futures_util::future::BoxFuture;

pub use gemini::{get_api_key, is_api_key_configured, GeminiBackend, DEFAULT_MODEL};

/// Short Bengali sentence used to preview a voice.
pub const PREVIEW_TEXT: &str = "হ্যালো, আমি আপনার নির্বাচিত ভয়েস।";

/// Instruction used for voice previews.
pub const PREVIEW_INSTRUCTIONS: &str = "Speak clearly and naturally.";

/// One generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    /// Style instructions with the pace hint already folded in.
    pub instructions: String,
}

/// Errors that can occur during speech generation
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    #[error("Gemini API key not configured. Set GEMINI_API_KEY environment variable.")]
    MissingApiKey,
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Gemini API error ({status}): {message}")]
    ApiError { status: u16, message: String },
    #[error("Failed to parse API response: {0}")]
    ParseError(String),
    #[error("No audio data returned from Gemini.")]
    NoAudio,
    #[error("Invalid audio returned: {0}")]
    InvalidAudio(String),
}

/// A remote text-to-speech service.
///
/// Must be callable concurrently; the scheduler runs several requests at once.
pub trait SpeechBackend: Send + Sync + 'static {
    fn generate<'a>(
        &'a self,
        request: &'a SpeechRequest,
    ) -> BoxFuture<'a, Result<Vec<u8>, GenerationError>>;
}

impl SpeechRequest {
    /// Request for a voice preview.
    pub fn preview(voice: &str) -> Self {
        Self {
            text: PREVIEW_TEXT.to_string(),
            voice: voice.to_string(),
            instructions: PREVIEW_INSTRUCTIONS.to_string(),
        }
    }
}
