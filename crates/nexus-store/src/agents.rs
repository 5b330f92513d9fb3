//! Agent and folder persistence.

use crate::error::StoreError;
use nexus_types::{Agent, AgentFolder, AgentStatus, CrmFieldMapping};
use rusqlite::{params, Connection, OptionalExtension, Row};

fn agent_from_row(row: &Row<'_>) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: row.get("id")?,
        name: row.get("name")?,
        role: row.get("role")?,
        status: AgentStatus::from_str_opt(&row.get::<_, String>("status")?)
            .unwrap_or(AgentStatus::Draft),
        model: row.get("model")?,
        voice_id: row.get("voice_id")?,
        phone_numbers: Vec::new(),
        prompt_template: row.get("prompt_template")?,
        temperature: row.get("temperature")?,
        crm_location_id: row.get("crm_location_id")?,
        folder_id: row.get("folder_id")?,
        created_at: row.get("created_at")?,
        greeting: row.get("greeting")?,
        transcription_language: row.get("transcription_language")?,
        max_duration_seconds: row.get::<_, i64>("max_duration_seconds")? as u32,
        silence_timeout_seconds: row.get("silence_timeout_seconds")?,
        interruption_sensitivity: row.get("interruption_sensitivity")?,
        wait_for_greeting: row.get::<_, i64>("wait_for_greeting")? != 0,
        crm_field_mapping: None,
    })
}

/// Attaches the derived fields that live outside the `agents` row: the
/// assigned phone numbers and the parsed CRM mapping blob.
fn hydrate_agent(
    conn: &Connection,
    mut agent: Agent,
    mapping_json: Option<String>,
) -> Result<Agent, StoreError> {
    if let Some(raw) = mapping_json {
        let mapping: CrmFieldMapping = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Corrupt(format!("crm mapping for agent {}: {e}", agent.id)))?;
        agent.crm_field_mapping = Some(mapping);
    }

    let mut stmt = conn.prepare(
        "SELECT id FROM phone_numbers WHERE assigned_agent_id = ?1 ORDER BY number ASC",
    )?;
    let ids = stmt
        .query_map([&agent.id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    agent.phone_numbers = ids;

    Ok(agent)
}

/// Lists all agents, newest first.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure, `StoreError::Corrupt` if
/// a stored CRM mapping blob cannot be parsed.
pub fn list_agents(conn: &Connection) -> Result<Vec<Agent>, StoreError> {
    let mut stmt = conn.prepare("SELECT * FROM agents ORDER BY created_at DESC")?;
    let rows = stmt
        .query_map([], |row| {
            let agent = agent_from_row(row)?;
            let mapping: Option<String> = row.get("crm_field_mapping_json")?;
            Ok((agent, mapping))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(agent, mapping)| hydrate_agent(conn, agent, mapping))
        .collect()
}

/// Fetches one agent by ID.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if no agent has the given ID.
pub fn get_agent(conn: &Connection, id: &str) -> Result<Agent, StoreError> {
    let found = conn
        .query_row(
            "SELECT * FROM agents WHERE id = ?1",
            [id],
            |row| {
                let agent = agent_from_row(row)?;
                let mapping: Option<String> = row.get("crm_field_mapping_json")?;
                Ok((agent, mapping))
            },
        )
        .optional()?;

    match found {
        Some((agent, mapping)) => hydrate_agent(conn, agent, mapping),
        None => Err(StoreError::NotFound(format!("agent {id}"))),
    }
}

/// Inserts or fully replaces an agent record (last write wins).
///
/// The `phone_numbers` field is ignored here; assignment is owned by the
/// phone-number side (see [`crate::assign_number_to_agent`]).
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure, `StoreError::Json` if
/// the CRM mapping cannot be serialized.
pub fn save_agent(conn: &Connection, agent: &Agent) -> Result<(), StoreError> {
    let mapping_json = agent
        .crm_field_mapping
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT INTO agents (
            id, name, role, status, model, voice_id, prompt_template, temperature,
            crm_location_id, folder_id, created_at, greeting, transcription_language,
            max_duration_seconds, silence_timeout_seconds, interruption_sensitivity,
            wait_for_greeting, crm_field_mapping_json
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            role = excluded.role,
            status = excluded.status,
            model = excluded.model,
            voice_id = excluded.voice_id,
            prompt_template = excluded.prompt_template,
            temperature = excluded.temperature,
            crm_location_id = excluded.crm_location_id,
            folder_id = excluded.folder_id,
            greeting = excluded.greeting,
            transcription_language = excluded.transcription_language,
            max_duration_seconds = excluded.max_duration_seconds,
            silence_timeout_seconds = excluded.silence_timeout_seconds,
            interruption_sensitivity = excluded.interruption_sensitivity,
            wait_for_greeting = excluded.wait_for_greeting,
            crm_field_mapping_json = excluded.crm_field_mapping_json",
        params![
            agent.id,
            agent.name,
            agent.role,
            agent.status.as_str(),
            agent.model,
            agent.voice_id,
            agent.prompt_template,
            agent.temperature,
            agent.crm_location_id,
            agent.folder_id,
            agent.created_at,
            agent.greeting,
            agent.transcription_language,
            agent.max_duration_seconds as i64,
            agent.silence_timeout_seconds,
            agent.interruption_sensitivity,
            agent.wait_for_greeting as i64,
            mapping_json,
        ],
    )?;
    Ok(())
}

/// Deletes an agent and releases its phone number assignments.
///
/// Deleting an absent agent is a no-op.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn delete_agent(conn: &Connection, id: &str) -> Result<(), StoreError> {
    // Release assignments first so the numbers survive the agent.
    conn.execute(
        "UPDATE phone_numbers SET assigned_agent_id = NULL WHERE assigned_agent_id = ?1",
        [id],
    )?;
    let deleted = conn.execute("DELETE FROM agents WHERE id = ?1", [id])?;
    if deleted > 0 {
        tracing::info!(agent_id = id, "deleted agent");
    }
    Ok(())
}

// ── Folders ──────────────────────────────────────────────────────────

/// Lists all folders in name order.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn list_folders(conn: &Connection) -> Result<Vec<AgentFolder>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, name, icon FROM agent_folders ORDER BY name ASC")?;
    let folders = stmt
        .query_map([], |row| {
            Ok(AgentFolder {
                id: row.get(0)?,
                name: row.get(1)?,
                icon: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(folders)
}

/// Inserts or replaces a folder.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn save_folder(conn: &Connection, folder: &AgentFolder) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO agent_folders (id, name, icon) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, icon = excluded.icon",
        params![folder.id, folder.name, folder.icon],
    )?;
    Ok(())
}

/// Renames a folder.
///
/// # Errors
///
/// Returns `StoreError::NotFound` if the folder does not exist.
pub fn rename_folder(conn: &Connection, id: &str, name: &str) -> Result<(), StoreError> {
    let updated = conn.execute(
        "UPDATE agent_folders SET name = ?2 WHERE id = ?1",
        params![id, name],
    )?;
    if updated == 0 {
        return Err(StoreError::NotFound(format!("folder {id}")));
    }
    Ok(())
}

/// Deletes a folder, detaching its agents.
///
/// Deleting an absent folder is a no-op.
///
/// # Errors
///
/// Returns `StoreError::Database` on SQL failure.
pub fn delete_folder(conn: &Connection, id: &str) -> Result<(), StoreError> {
    conn.execute("UPDATE agents SET folder_id = NULL WHERE folder_id = ?1", [id])?;
    conn.execute("DELETE FROM agent_folders WHERE id = ?1", [id])?;
    Ok(())
}
