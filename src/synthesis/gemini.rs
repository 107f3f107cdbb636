//! Gemini text-to-speech client.
//!
//! Calls `generateContent` with the audio response modality and a prebuilt
//! voice. The audio comes back as base64 inline data holding headerless PCM16
//! at 24 kHz mono.

use base64::{engine::general_purpose::STANDARD, Engine};
use futures_util::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

use super::{GenerationError, SpeechBackend, SpeechRequest};
use crate::processing::speech_prompt;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-tts";

const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Global HTTP client for reuse across requests (avoids TLS handshake overhead)
static HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

fn get_http_client(timeout: Duration) -> Result<&'static Client, GenerationError> {
    if let Some(client) = HTTP_CLIENT.get() {
        return Ok(client);
    }
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GenerationError::NetworkError(e.to_string()))?;
    Ok(HTTP_CLIENT.get_or_init(|| client))
}

/// Get the Gemini API key from the environment.
/// `GEMINI_API_KEY` wins over the generic `API_KEY`.
pub fn get_api_key() -> Option<String> {
    ["GEMINI_API_KEY", "API_KEY"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|key| !key.is_empty())
}

/// Check if an API key is configured (for status display)
pub fn is_api_key_configured() -> bool {
    get_api_key().is_some()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
    speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Gemini API error response
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn build_request(request: &SpeechRequest) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![Part {
                text: Some(speech_prompt(&request.text, &request.instructions)),
                inline_data: None,
            }],
        }],
        generation_config: GenerationConfig {
            response_modalities: vec!["AUDIO"],
            speech_config: SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig {
                        voice_name: request.voice.clone(),
                    },
                },
            },
        },
    }
}

/// Pull the first inline audio part out of a response and decode it.
fn extract_audio(response: GenerateResponse) -> Result<Vec<u8>, GenerationError> {
    let encoded = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|content| content.parts.into_iter().find_map(|p| p.inline_data))
        .map(|inline| inline.data)
        .filter(|data| !data.is_empty())
        .ok_or(GenerationError::NoAudio)?;

    STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| GenerationError::InvalidAudio(e.to_string()))
}

/// Backend that calls the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    model: String,
    timeout: Duration,
}

impl GeminiBackend {
    pub fn new(model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            model: model.into(),
            timeout,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", API_BASE_URL, self.model)
    }

    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, GenerationError> {
        let api_key = get_api_key().ok_or(GenerationError::MissingApiKey)?;

        log::info!(
            "Synthesizing {} chars with voice {} ({})",
            request.text.chars().count(),
            request.voice,
            self.model
        );

        let response = get_http_client(self.timeout)?
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&build_request(request))
            .send()
            .await
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status.is_success() {
            let body: GenerateResponse = response
                .json()
                .await
                .map_err(|e| GenerationError::ParseError(e.to_string()))?;
            let pcm = extract_audio(body)?;
            log::info!("Synthesis successful: {} PCM bytes", pcm.len());
            Ok(pcm)
        } else {
            let error_text = response.text().await.unwrap_or_default();

            let message =
                if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                    error_response.error.message
                } else {
                    error_text
                };

            log::error!("Gemini API error ({}): {}", status.as_u16(), message);

            Err(GenerationError::ApiError {
                status: status.as_u16(),
                message,
            })
        }
    }
}

impl Default for GeminiBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL, Duration::from_secs(120))
    }
}

impl SpeechBackend for GeminiBackend {
    fn generate<'a>(
        &'a self,
        request: &'a SpeechRequest,
    ) -> BoxFuture<'a, Result<Vec<u8>, GenerationError>> {
        Box::pin(self.synthesize(request))
    }
}
