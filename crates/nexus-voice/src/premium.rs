//! Premium voice-cloning synthesis over HTTP.
//!
//! Client for an ElevenLabs-style REST API: list the voices available
//! under an API key, synthesize text with a chosen voice, and create an
//! instant clone from an uploaded sample. Synthesis requests raw PCM so
//! the result can be piped straight to the audio player without decoding.

use crate::error::VoiceError;
use crate::playback::AudioClip;
use async_trait::async_trait;
use nexus_types::voice::{VoiceCategory, VoiceGender, VoiceProfile};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.elevenlabs.io/v1";

/// Synthesis model requested from the provider.
const SYNTHESIS_MODEL: &str = "eleven_multilingual_v2";

/// PCM output format requested from the provider (s16le mono 22.05 kHz).
const OUTPUT_FORMAT: &str = "pcm_22050";

/// Sample rate matching [`OUTPUT_FORMAT`].
const OUTPUT_SAMPLE_RATE: u32 = 22_050;

/// Maximum text length per synthesis request.
const MAX_TTS_INPUT_BYTES: usize = 64 * 1024;

/// Timeout for synthesis requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// The premium synthesis seam the call session depends on.
#[async_trait]
pub trait PremiumSynthesizer: Send + Sync {
    /// Voices available under the given API key.
    async fn voices(&self, api_key: &str) -> Result<Vec<VoiceProfile>, VoiceError>;

    /// Synthesizes text with the given voice, returning playable PCM.
    async fn synthesize(
        &self,
        api_key: &str,
        voice_id: &str,
        text: &str,
    ) -> Result<AudioClip, VoiceError>;
}

/// HTTP client for the premium synthesis provider.
#[derive(Debug, Clone)]
pub struct PremiumTtsClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<ProviderVoice>,
}

#[derive(Debug, Deserialize)]
struct ProviderVoice {
    voice_id: String,
    name: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    labels: Option<VoiceLabels>,
    #[serde(default)]
    preview_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VoiceLabels {
    #[serde(default)]
    gender: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    detail: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

fn profile_from_provider(voice: ProviderVoice) -> VoiceProfile {
    let gender = match voice.labels.unwrap_or_default().gender.as_deref() {
        Some("male") => VoiceGender::Male,
        Some("female") => VoiceGender::Female,
        _ => VoiceGender::Unknown,
    };
    let category = match voice.category.as_deref() {
        Some("cloned") => VoiceCategory::Cloned,
        _ => VoiceCategory::Standard,
    };
    VoiceProfile {
        id: voice.voice_id,
        name: voice.name,
        gender,
        // Provider voices are multilingual; default to a US context.
        lang: "en-US".to_string(),
        category,
        preview_url: voice.preview_url,
    }
}

/// Extracts the provider's detail message from an error body, falling
/// back to a generic label.
fn api_error_message(body: &str, fallback: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .and_then(|d| d.message)
        .unwrap_or_else(|| fallback.to_string())
}

impl Default for PremiumTtsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PremiumTtsClient {
    /// Creates a client against the provider's production API.
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Overrides the API base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Creates an instant voice clone from an uploaded audio sample.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::TtsApi`] with the provider's detail message
    /// on a non-success status.
    pub async fn clone_voice(
        &self,
        api_key: &str,
        name: &str,
        sample_filename: &str,
        sample: Vec<u8>,
    ) -> Result<VoiceProfile, VoiceError> {
        let form = reqwest::multipart::Form::new()
            .text("name", name.to_string())
            .text("description", "Cloned via NexusVoice Dashboard".to_string())
            .part(
                "files",
                reqwest::multipart::Part::bytes(sample).file_name(sample_filename.to_string()),
            );

        let response = self
            .http
            .post(format!("{}/voices/add", self.base_url))
            .header("xi-api-key", api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::TtsApi {
                status: status.as_u16(),
                message: api_error_message(&body, "voice cloning failed"),
            });
        }

        #[derive(Deserialize)]
        struct AddVoiceResponse {
            voice_id: String,
        }
        let added: AddVoiceResponse = response.json().await?;

        Ok(VoiceProfile {
            id: added.voice_id,
            name: name.to_string(),
            gender: VoiceGender::Unknown,
            lang: "en-US".to_string(),
            category: VoiceCategory::Cloned,
            preview_url: None,
        })
    }
}

#[async_trait]
impl PremiumSynthesizer for PremiumTtsClient {
    async fn voices(&self, api_key: &str) -> Result<Vec<VoiceProfile>, VoiceError> {
        if api_key.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .http
            .get(format!("{}/voices", self.base_url))
            .header("xi-api-key", api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::TtsApi {
                status: status.as_u16(),
                message: api_error_message(&body, "failed to fetch voices"),
            });
        }

        let parsed: VoicesResponse = response.json().await?;
        Ok(parsed.voices.into_iter().map(profile_from_provider).collect())
    }

    async fn synthesize(
        &self,
        api_key: &str,
        voice_id: &str,
        text: &str,
    ) -> Result<AudioClip, VoiceError> {
        if api_key.is_empty() {
            return Err(VoiceError::Config("API key required".to_string()));
        }
        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceError::Tts(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_TTS_INPUT_BYTES
            )));
        }

        let response = self
            .http
            .post(format!(
                "{}/text-to-speech/{}?output_format={}",
                self.base_url, voice_id, OUTPUT_FORMAT
            ))
            .header("xi-api-key", api_key)
            .json(&json!({
                "text": text,
                "model_id": SYNTHESIS_MODEL,
                "voice_settings": {
                    "stability": 0.5,
                    "similarity_boost": 0.75
                }
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(voice_id, status = status.as_u16(), "premium synthesis failed");
            return Err(VoiceError::TtsApi {
                status: status.as_u16(),
                message: api_error_message(&body, "TTS generation failed"),
            });
        }

        let pcm = response.bytes().await?.to_vec();
        Ok(AudioClip {
            pcm,
            sample_rate: OUTPUT_SAMPLE_RATE,
        })
    }
}
