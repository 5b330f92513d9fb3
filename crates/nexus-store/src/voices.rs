//! Cloned voice profiles and connected CRM accounts.

use crate::error::StoreError;
use nexus_types::voice::{VoiceCategory, VoiceGender, VoiceProfile};
use nexus_types::{ConnectedAccount, TestStatus};
use rusqlite::{params, Connection, OptionalExtension};

fn gender_label(gender: VoiceGender) -> &'static str {
    match gender {
        VoiceGender::Male => "male",
        VoiceGender::Female => "female",
        VoiceGender::Unknown => "unknown",
    }
}

fn gender_from_label(label: &str) -> VoiceGender {
    match label {
        "male" => VoiceGender::Male,
        "female" => VoiceGender::Female,
        _ => VoiceGender::Unknown,
    }
}

/// Lists all locally stored cloned voices.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn list_custom_voices(conn: &Connection) -> Result<Vec<VoiceProfile>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT id, name, gender, lang, preview_url FROM custom_voices ORDER BY name")?;
    let voices = stmt
        .query_map([], |row| {
            Ok(VoiceProfile {
                id: row.get(0)?,
                name: row.get(1)?,
                gender: gender_from_label(&row.get::<_, String>(2)?),
                lang: row.get(3)?,
                category: VoiceCategory::Cloned,
                preview_url: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(voices)
}

/// Stores a cloned voice profile.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn save_custom_voice(conn: &Connection, voice: &VoiceProfile) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO custom_voices (id, name, gender, lang, category, preview_url)
         VALUES (?1, ?2, ?3, ?4, 'cloned', ?5)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            gender = excluded.gender,
            lang = excluded.lang,
            preview_url = excluded.preview_url",
        params![
            voice.id,
            voice.name,
            gender_label(voice.gender),
            voice.lang,
            voice.preview_url,
        ],
    )?;
    Ok(())
}

// ── Connected CRM accounts ───────────────────────────────────────────

/// Lists all connected CRM sub-accounts.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn list_accounts(conn: &Connection) -> Result<Vec<ConnectedAccount>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, location_id, location_name, api_key, connected_at,
                last_test_status, last_test_message
         FROM connected_accounts ORDER BY connected_at DESC",
    )?;
    let accounts = stmt
        .query_map([], |row| {
            Ok(ConnectedAccount {
                id: row.get(0)?,
                location_id: row.get(1)?,
                location_name: row.get(2)?,
                api_key: row.get(3)?,
                connected_at: row.get(4)?,
                last_test_status: row
                    .get::<_, Option<String>>(5)?
                    .as_deref()
                    .and_then(TestStatus::from_str_opt),
                last_test_message: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(accounts)
}

/// Fetches one connected account by ID.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if no account has the given ID.
pub fn get_account(conn: &Connection, id: &str) -> Result<ConnectedAccount, StoreError> {
    conn.query_row(
        "SELECT id, location_id, location_name, api_key, connected_at,
                last_test_status, last_test_message
         FROM connected_accounts WHERE id = ?1",
        [id],
        |row| {
            Ok(ConnectedAccount {
                id: row.get(0)?,
                location_id: row.get(1)?,
                location_name: row.get(2)?,
                api_key: row.get(3)?,
                connected_at: row.get(4)?,
                last_test_status: row
                    .get::<_, Option<String>>(5)?
                    .as_deref()
                    .and_then(TestStatus::from_str_opt),
                last_test_message: row.get(6)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("connected account {id}")))
}

/// Inserts or replaces a connected account (last write wins).
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn save_account(conn: &Connection, account: &ConnectedAccount) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO connected_accounts (
            id, location_id, location_name, api_key, connected_at,
            last_test_status, last_test_message
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
            location_id = excluded.location_id,
            location_name = excluded.location_name,
            api_key = excluded.api_key,
            last_test_status = excluded.last_test_status,
            last_test_message = excluded.last_test_message",
        params![
            account.id,
            account.location_id,
            account.location_name,
            account.api_key,
            account.connected_at,
            account.last_test_status.map(TestStatus::as_str),
            account.last_test_message,
        ],
    )?;
    Ok(())
}

/// Removes a connected account. Removing an absent account is a no-op.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn delete_account(conn: &Connection, id: &str) -> Result<(), StoreError> {
    conn.execute("DELETE FROM connected_accounts WHERE id = ?1", [id])?;
    Ok(())
}
