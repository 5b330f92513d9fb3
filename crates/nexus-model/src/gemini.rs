//! HTTP client for a Gemini-style `generateContent` REST API.

use crate::chat::{ChatTurn, ConversationModel};
use crate::error::ModelError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for lightweight text tasks such as prompt optimization.
pub const OPTIMIZER_MODEL: &str = "gemini-3-flash-preview";

/// Environment variable holding the API key.
const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Timeout for model requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the hosted language-model API.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

/// Builds the request body for a `generateContent` call.
///
/// `history` comes first in `contents`, followed by the new user message;
/// the system instruction and temperature ride in their dedicated fields.
fn build_request_body(
    system_instruction: &str,
    history: &[ChatTurn],
    new_message: &str,
    temperature: f64,
) -> Value {
    let mut contents: Vec<Value> = history
        .iter()
        .map(|turn| {
            json!({
                "role": turn.role.as_str(),
                "parts": [{ "text": turn.text }]
            })
        })
        .collect();
    contents.push(json!({
        "role": "user",
        "parts": [{ "text": new_message }]
    }));

    json!({
        "system_instruction": { "parts": [{ "text": system_instruction }] },
        "contents": contents,
        "generationConfig": { "temperature": temperature }
    })
}

/// Pulls the first candidate's concatenated text out of a response.
fn extract_reply(response: GenerateContentResponse) -> Result<String, ModelError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ModelError::EmptyReply);
    }
    Ok(text)
}

impl GeminiClient {
    /// Creates a client with an explicit API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: DEFAULT_API_BASE.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Creates a client from the `GEMINI_API_KEY` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingApiKey`] if the variable is unset or
    /// empty.
    pub fn from_env() -> Result<Self, ModelError> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key)),
            _ => Err(ModelError::MissingApiKey),
        }
    }

    /// Overrides the API base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn generate_content(&self, model: &str, body: Value) -> Result<String, ModelError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(model, status = status.as_u16(), "model request failed");
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        extract_reply(parsed)
    }

    /// Rewrites a system prompt to be more conversational and concise.
    ///
    /// Uses the lightweight text model regardless of the agent's
    /// configured model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] on transport or API failure.
    pub async fn optimize_prompt(&self, current_prompt: &str) -> Result<String, ModelError> {
        let instruction = format!(
            "Optimize the following system prompt for an AI voice agent to be more \
             conversational, concise, and persuasive.\n\nCurrent Prompt: \"{current_prompt}\"\n\n\
             Output only the optimized prompt text."
        );
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": instruction }] }]
        });
        self.generate_content(OPTIMIZER_MODEL, body).await
    }
}

#[async_trait]
impl ConversationModel for GeminiClient {
    async fn generate(
        &self,
        model: &str,
        system_instruction: &str,
        user_message: &str,
        temperature: f64,
    ) -> Result<String, ModelError> {
        let body = build_request_body(system_instruction, &[], user_message, temperature);
        self.generate_content(model, body).await
    }

    async fn chat(
        &self,
        model: &str,
        system_instruction: &str,
        history: &[ChatTurn],
        new_message: &str,
        temperature: f64,
    ) -> Result<String, ModelError> {
        let body = build_request_body(system_instruction, history, new_message, temperature);
        self.generate_content(model, body).await
    }
}
