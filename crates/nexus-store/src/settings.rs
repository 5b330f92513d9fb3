//! Key-value settings.
//!
//! Settings are small opaque strings keyed by [`SettingKey`]. Telephony
//! credentials are stored under one key as a JSON blob, matching the
//! last-write-wins contract of the rest of the store.

use crate::error::StoreError;
use nexus_types::TelephonyCredentials;
use rusqlite::{params, Connection, OptionalExtension};

/// Well-known setting keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    /// API key for the premium voice-cloning TTS provider.
    PremiumTtsKey,
    /// Base URL of the call-execution backend.
    BackendUrl,
    /// Automation webhook URL (outbound call triggers).
    AutomationWebhook,
    /// Telephony provider credentials, stored as JSON.
    TelephonyCredentials,
}

impl SettingKey {
    /// The string key stored in the `settings` table.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PremiumTtsKey => "premium_tts_api_key",
            Self::BackendUrl => "backend_url",
            Self::AutomationWebhook => "automation_webhook",
            Self::TelephonyCredentials => "telephony_credentials",
        }
    }
}

/// Reads a setting. Returns `None` when the key has never been written.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn get_setting(conn: &Connection, key: SettingKey) -> Result<Option<String>, StoreError> {
    let value = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            [key.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

/// Writes a setting, replacing any previous value.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn set_setting(conn: &Connection, key: SettingKey, value: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO settings (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                        updated_at = excluded.updated_at",
        params![key.as_str(), value],
    )?;
    Ok(())
}

/// Removes a setting. Removing an absent key is a no-op.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn delete_setting(conn: &Connection, key: SettingKey) -> Result<(), StoreError> {
    conn.execute("DELETE FROM settings WHERE key = ?1", [key.as_str()])?;
    Ok(())
}

/// Reads the stored telephony credentials, if any.
///
/// # Errors
///
/// Returns `StoreError::Corrupt` if the stored blob is not valid JSON for
/// the credentials shape.
pub fn get_telephony_credentials(
    conn: &Connection,
) -> Result<Option<TelephonyCredentials>, StoreError> {
    match get_setting(conn, SettingKey::TelephonyCredentials)? {
        Some(raw) => {
            let creds = serde_json::from_str(&raw).map_err(|e| {
                StoreError::Corrupt(format!("telephony credentials blob: {e}"))
            })?;
            Ok(Some(creds))
        }
        None => Ok(None),
    }
}

/// Stores telephony credentials, replacing any previous value.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure or `StoreError::Json` if
/// the credentials cannot be serialized.
pub fn set_telephony_credentials(
    conn: &Connection,
    creds: &TelephonyCredentials,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(creds)?;
    set_setting(conn, SettingKey::TelephonyCredentials, &raw)
}
