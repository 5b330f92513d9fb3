//! Phone number persistence and assignment.

use crate::error::StoreError;
use nexus_types::{NumberCapabilities, NumberStatus, PhoneNumber};
use rusqlite::{params, Connection, OptionalExtension, Row};

fn number_from_row(row: &Row<'_>) -> rusqlite::Result<PhoneNumber> {
    Ok(PhoneNumber {
        id: row.get("id")?,
        number: row.get("number")?,
        country: row.get("country")?,
        capabilities: NumberCapabilities {
            voice: row.get::<_, i64>("cap_voice")? != 0,
            sms: row.get::<_, i64>("cap_sms")? != 0,
            mms: row.get::<_, i64>("cap_mms")? != 0,
        },
        assigned_agent_id: row.get("assigned_agent_id")?,
        status: NumberStatus::from_str_opt(&row.get::<_, String>("status")?)
            .unwrap_or(NumberStatus::Active),
        friendly_name: row.get("friendly_name")?,
    })
}

/// Lists all owned numbers.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn list_numbers(conn: &Connection) -> Result<Vec<PhoneNumber>, StoreError> {
    let mut stmt = conn.prepare("SELECT * FROM phone_numbers ORDER BY number ASC")?;
    let numbers = stmt
        .query_map([], |row| number_from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(numbers)
}

/// Fetches one number by ID.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if no number has the given ID.
pub fn get_number(conn: &Connection, id: &str) -> Result<PhoneNumber, StoreError> {
    conn.query_row("SELECT * FROM phone_numbers WHERE id = ?1", [id], |row| {
        number_from_row(row)
    })
    .optional()?
    .ok_or_else(|| StoreError::NotFound(format!("phone number {id}")))
}

/// Inserts or replaces a number record (last write wins).
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn save_number(conn: &Connection, number: &PhoneNumber) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO phone_numbers (
            id, number, country, cap_voice, cap_sms, cap_mms,
            assigned_agent_id, status, friendly_name
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET
            number = excluded.number,
            country = excluded.country,
            cap_voice = excluded.cap_voice,
            cap_sms = excluded.cap_sms,
            cap_mms = excluded.cap_mms,
            assigned_agent_id = excluded.assigned_agent_id,
            status = excluded.status,
            friendly_name = excluded.friendly_name",
        params![
            number.id,
            number.number,
            number.country,
            number.capabilities.voice as i64,
            number.capabilities.sms as i64,
            number.capabilities.mms as i64,
            number.assigned_agent_id,
            number.status.as_str(),
            number.friendly_name,
        ],
    )?;
    Ok(())
}

/// Merges a batch of provider-synced numbers into the store.
///
/// Numbers already present keep their agent assignment; numbers not yet
/// present are inserted as unassigned. Nothing is deleted — a number that
/// disappeared from the provider sync stays until explicitly released.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn merge_provider_numbers(
    conn: &Connection,
    numbers: &[PhoneNumber],
) -> Result<(), StoreError> {
    for number in numbers {
        conn.execute(
            "INSERT INTO phone_numbers (
                id, number, country, cap_voice, cap_sms, cap_mms,
                assigned_agent_id, status, friendly_name
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                number = excluded.number,
                country = excluded.country,
                cap_voice = excluded.cap_voice,
                cap_sms = excluded.cap_sms,
                cap_mms = excluded.cap_mms,
                status = excluded.status,
                friendly_name = excluded.friendly_name",
            params![
                number.id,
                number.number,
                number.country,
                number.capabilities.voice as i64,
                number.capabilities.sms as i64,
                number.capabilities.mms as i64,
                number.status.as_str(),
                number.friendly_name,
            ],
        )?;
    }
    tracing::debug!(count = numbers.len(), "merged provider numbers");
    Ok(())
}

/// Assigns a number to an agent, moving it off any previous agent.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if either the number or the agent does
/// not exist.
pub fn assign_number_to_agent(
    conn: &Connection,
    number_id: &str,
    agent_id: &str,
) -> Result<(), StoreError> {
    let agent_exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM agents WHERE id = ?1)",
        [agent_id],
        |row| row.get(0),
    )?;
    if !agent_exists {
        return Err(StoreError::NotFound(format!("agent {agent_id}")));
    }

    let updated = conn.execute(
        "UPDATE phone_numbers SET assigned_agent_id = ?2 WHERE id = ?1",
        params![number_id, agent_id],
    )?;
    if updated == 0 {
        return Err(StoreError::NotFound(format!("phone number {number_id}")));
    }
    Ok(())
}

/// Clears a number's agent assignment. Unassigning an unassigned number
/// is a no-op.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if the number does not exist.
pub fn unassign_number(conn: &Connection, number_id: &str) -> Result<(), StoreError> {
    let updated = conn.execute(
        "UPDATE phone_numbers SET assigned_agent_id = NULL WHERE id = ?1",
        [number_id],
    )?;
    if updated == 0 {
        return Err(StoreError::NotFound(format!("phone number {number_id}")));
    }
    Ok(())
}
