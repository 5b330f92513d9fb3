//! Cloned-voice API handlers.
//!
//! The dashboard performs the clone against the premium provider, then
//! registers the resulting profile here so it shows up in agent voice
//! pickers across sessions.

use crate::api::{with_conn, ApiError};
use crate::AppState;
use axum::{extract::Extension, Json};
use nexus_types::voice::{VoiceCategory, VoiceGender, VoiceProfile};
use serde::Deserialize;
use std::sync::Arc;

/// Request body for registering a cloned voice.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceBody {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub gender: VoiceGender,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default)]
    pub preview_url: Option<String>,
}

fn default_lang() -> String {
    "en-US".to_string()
}

/// Handler for `GET /api/voices`.
pub async fn list_voices_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<VoiceProfile>>, ApiError> {
    let voices = with_conn(state, nexus_store::list_custom_voices).await?;
    Ok(Json(voices))
}

/// Handler for `POST /api/voices`.
pub async fn save_voice_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<VoiceBody>,
) -> Result<Json<VoiceProfile>, ApiError> {
    if body.id.trim().is_empty() {
        return Err(ApiError::BadRequest("voice id is required".to_string()));
    }
    let voice = VoiceProfile {
        id: body.id,
        name: body.name,
        gender: body.gender,
        lang: body.lang,
        category: VoiceCategory::Cloned,
        preview_url: body.preview_url,
    };
    let saved = voice.clone();
    with_conn(state, move |conn| {
        nexus_store::save_custom_voice(conn, &voice)
    })
    .await?;
    Ok(Json(saved))
}
