//! Settings API handlers.

use crate::api::{with_conn, ApiError};
use crate::AppState;
use axum::{extract::Extension, Json};
use nexus_store::SettingKey;
use nexus_types::TelephonyCredentials;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Response body for the settings snapshot.
///
/// The telephony auth token is never echoed back; only its presence is
/// reported.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub premium_tts_key: Option<String>,
    pub backend_url: Option<String>,
    pub automation_webhook: Option<String>,
    pub telephony_connected: bool,
}

/// Request body for a partial settings update. Absent fields are left
/// untouched; empty strings clear the setting.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default)]
    pub premium_tts_key: Option<String>,
    #[serde(default)]
    pub backend_url: Option<String>,
    #[serde(default)]
    pub automation_webhook: Option<String>,
}

/// Request body for storing telephony credentials.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelephonyRequest {
    pub account_sid: String,
    pub auth_token: String,
}

fn apply(
    conn: &rusqlite::Connection,
    key: SettingKey,
    value: Option<String>,
) -> Result<(), nexus_store::StoreError> {
    match value {
        Some(value) if value.is_empty() => nexus_store::delete_setting(conn, key),
        Some(value) => nexus_store::set_setting(conn, key, &value),
        None => Ok(()),
    }
}

fn snapshot(conn: &rusqlite::Connection) -> Result<SettingsResponse, nexus_store::StoreError> {
    Ok(SettingsResponse {
        premium_tts_key: nexus_store::get_setting(conn, SettingKey::PremiumTtsKey)?,
        backend_url: nexus_store::get_setting(conn, SettingKey::BackendUrl)?,
        automation_webhook: nexus_store::get_setting(conn, SettingKey::AutomationWebhook)?,
        telephony_connected: nexus_store::get_telephony_credentials(conn)?.is_some(),
    })
}

/// Handler for `GET /api/settings`.
pub async fn get_settings_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let settings = with_conn(state, snapshot).await?;
    Ok(Json(settings))
}

/// Handler for `PUT /api/settings`.
pub async fn update_settings_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<SettingsUpdate>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let settings = with_conn(state, move |conn| {
        apply(conn, SettingKey::PremiumTtsKey, body.premium_tts_key)?;
        apply(conn, SettingKey::BackendUrl, body.backend_url)?;
        apply(conn, SettingKey::AutomationWebhook, body.automation_webhook)?;
        snapshot(conn)
    })
    .await?;
    Ok(Json(settings))
}

/// Handler for `PUT /api/settings/telephony`.
pub async fn set_telephony_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<TelephonyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.account_sid.trim().is_empty() || body.auth_token.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "accountSid and authToken are required".to_string(),
        ));
    }
    let creds = TelephonyCredentials {
        account_sid: body.account_sid,
        auth_token: body.auth_token,
    };
    with_conn(state, move |conn| {
        nexus_store::set_telephony_credentials(conn, &creds)
    })
    .await?;
    Ok(Json(serde_json::json!({ "connected": true })))
}

/// Handler for `DELETE /api/settings/telephony`.
pub async fn delete_telephony_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(state, |conn| {
        nexus_store::delete_setting(conn, SettingKey::TelephonyCredentials)
    })
    .await?;
    Ok(Json(serde_json::json!({ "connected": false })))
}
