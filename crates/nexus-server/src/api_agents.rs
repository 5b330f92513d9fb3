//! Agent API handlers.

use crate::api::{with_conn, ApiError};
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    Json,
};
use nexus_types::{Agent, AgentStatus, CrmFieldMapping};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body for creating or updating an agent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentBody {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub status: AgentStatus,
    pub model: String,
    pub voice_id: String,
    #[serde(default)]
    pub prompt_template: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub crm_location_id: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub greeting: String,
    #[serde(default = "default_language")]
    pub transcription_language: String,
    #[serde(default = "default_max_duration")]
    pub max_duration_seconds: u32,
    #[serde(default = "default_silence_timeout")]
    pub silence_timeout_seconds: f64,
    #[serde(default = "default_interruption_sensitivity")]
    pub interruption_sensitivity: f64,
    #[serde(default)]
    pub wait_for_greeting: bool,
    #[serde(default)]
    pub crm_field_mapping: Option<CrmFieldMapping>,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_max_duration() -> u32 {
    600
}

fn default_silence_timeout() -> f64 {
    2.0
}

fn default_interruption_sensitivity() -> f64 {
    0.5
}

/// Response body for one agent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub id: String,
    pub name: String,
    pub role: String,
    pub status: AgentStatus,
    pub model: String,
    pub voice_id: String,
    pub phone_numbers: Vec<String>,
    pub prompt_template: String,
    pub temperature: f64,
    pub crm_location_id: Option<String>,
    pub folder_id: Option<String>,
    pub created_at: String,
    pub greeting: String,
    pub transcription_language: String,
    pub max_duration_seconds: u32,
    pub silence_timeout_seconds: f64,
    pub interruption_sensitivity: f64,
    pub wait_for_greeting: bool,
    pub crm_field_mapping: Option<CrmFieldMapping>,
}

impl From<Agent> for AgentResponse {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.name,
            role: agent.role,
            status: agent.status,
            model: agent.model,
            voice_id: agent.voice_id,
            phone_numbers: agent.phone_numbers,
            prompt_template: agent.prompt_template,
            temperature: agent.temperature,
            crm_location_id: agent.crm_location_id,
            folder_id: agent.folder_id,
            created_at: agent.created_at,
            greeting: agent.greeting,
            transcription_language: agent.transcription_language,
            max_duration_seconds: agent.max_duration_seconds,
            silence_timeout_seconds: agent.silence_timeout_seconds,
            interruption_sensitivity: agent.interruption_sensitivity,
            wait_for_greeting: agent.wait_for_greeting,
            crm_field_mapping: agent.crm_field_mapping,
        }
    }
}

fn agent_from_body(id: String, created_at: String, body: AgentBody) -> Agent {
    Agent {
        id,
        name: body.name,
        role: body.role,
        status: body.status,
        model: body.model,
        voice_id: body.voice_id,
        phone_numbers: Vec::new(),
        prompt_template: body.prompt_template,
        temperature: body.temperature,
        crm_location_id: body.crm_location_id,
        folder_id: body.folder_id,
        created_at,
        greeting: body.greeting,
        transcription_language: body.transcription_language,
        max_duration_seconds: body.max_duration_seconds,
        silence_timeout_seconds: body.silence_timeout_seconds,
        interruption_sensitivity: body.interruption_sensitivity,
        wait_for_greeting: body.wait_for_greeting,
        crm_field_mapping: body.crm_field_mapping,
    }
}

/// Handler for `GET /api/agents`.
pub async fn list_agents_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<AgentResponse>>, ApiError> {
    let agents = with_conn(state, nexus_store::list_agents).await?;
    Ok(Json(agents.into_iter().map(AgentResponse::from).collect()))
}

/// Handler for `GET /api/agents/:agentId`.
pub async fn get_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<AgentResponse>, ApiError> {
    let agent = with_conn(state, move |conn| nexus_store::get_agent(conn, &agent_id)).await?;
    Ok(Json(agent.into()))
}

/// Handler for `POST /api/agents`.
pub async fn create_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<AgentBody>,
) -> Result<Json<AgentResponse>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("agent name is required".to_string()));
    }
    let id = uuid::Uuid::new_v4().to_string();
    let created_at = chrono::Utc::now().to_rfc3339();
    let agent = agent_from_body(id.clone(), created_at, body);

    let saved = with_conn(state, move |conn| {
        nexus_store::save_agent(conn, &agent)?;
        nexus_store::get_agent(conn, &id)
    })
    .await?;
    Ok(Json(saved.into()))
}

/// Handler for `PUT /api/agents/:agentId`.
pub async fn update_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(body): Json<AgentBody>,
) -> Result<Json<AgentResponse>, ApiError> {
    let saved = with_conn(state, move |conn| {
        // Preserve the original creation timestamp.
        let existing = nexus_store::get_agent(conn, &agent_id)?;
        let agent = agent_from_body(agent_id.clone(), existing.created_at, body);
        nexus_store::save_agent(conn, &agent)?;
        nexus_store::get_agent(conn, &agent_id)
    })
    .await?;
    Ok(Json(saved.into()))
}

/// Handler for `DELETE /api/agents/:agentId`.
pub async fn delete_agent_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(state, move |conn| {
        nexus_store::delete_agent(conn, &agent_id)
    })
    .await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
