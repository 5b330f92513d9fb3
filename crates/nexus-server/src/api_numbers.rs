//! Phone number API handlers.

use crate::api::{with_conn, ApiError};
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    Json,
};
use nexus_types::{NumberCapabilities, NumberStatus, PhoneNumber};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Wire shape for one owned number.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberBody {
    pub id: String,
    pub number: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub capabilities: NumberCapabilities,
    #[serde(default)]
    pub assigned_agent_id: Option<String>,
    #[serde(default)]
    pub status: NumberStatus,
    #[serde(default)]
    pub friendly_name: Option<String>,
}

fn default_country() -> String {
    "US".to_string()
}

impl From<PhoneNumber> for NumberBody {
    fn from(number: PhoneNumber) -> Self {
        Self {
            id: number.id,
            number: number.number,
            country: number.country,
            capabilities: number.capabilities,
            assigned_agent_id: number.assigned_agent_id,
            status: number.status,
            friendly_name: number.friendly_name,
        }
    }
}

impl From<NumberBody> for PhoneNumber {
    fn from(body: NumberBody) -> Self {
        Self {
            id: body.id,
            number: body.number,
            country: body.country,
            capabilities: body.capabilities,
            assigned_agent_id: body.assigned_agent_id,
            status: body.status,
            friendly_name: body.friendly_name,
        }
    }
}

/// Request body for assigning a number.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub agent_id: String,
}

/// Handler for `GET /api/numbers`.
pub async fn list_numbers_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<NumberBody>>, ApiError> {
    let numbers = with_conn(state, nexus_store::list_numbers).await?;
    Ok(Json(numbers.into_iter().map(NumberBody::from).collect()))
}

/// Handler for `POST /api/numbers`.
pub async fn save_number_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<NumberBody>,
) -> Result<Json<NumberBody>, ApiError> {
    if body.number.trim().is_empty() {
        return Err(ApiError::BadRequest("number is required".to_string()));
    }
    let number: PhoneNumber = body.into();
    let id = number.id.clone();
    let saved = with_conn(state, move |conn| {
        nexus_store::save_number(conn, &number)?;
        nexus_store::get_number(conn, &id)
    })
    .await?;
    Ok(Json(saved.into()))
}

/// Handler for `POST /api/numbers/sync`.
///
/// Accepts the full listing from the telephony provider and merges it,
/// preserving existing agent assignments.
pub async fn sync_numbers_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<Vec<NumberBody>>,
) -> Result<Json<Vec<NumberBody>>, ApiError> {
    let numbers: Vec<PhoneNumber> = body.into_iter().map(PhoneNumber::from).collect();
    let merged = with_conn(state, move |conn| {
        nexus_store::merge_provider_numbers(conn, &numbers)?;
        nexus_store::list_numbers(conn)
    })
    .await?;
    Ok(Json(merged.into_iter().map(NumberBody::from).collect()))
}

/// Handler for `POST /api/numbers/import`.
///
/// Pulls the account's owned numbers from the telephony provider using
/// the stored credentials and merges them, preserving assignments.
pub async fn import_numbers_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<NumberBody>>, ApiError> {
    let creds = with_conn(state.clone(), nexus_store::get_telephony_credentials)
        .await?
        .ok_or_else(|| {
            ApiError::BadRequest("telephony credentials are not configured".to_string())
        })?;

    let fetched = state
        .telephony
        .incoming_numbers(&creds)
        .await
        .map_err(|e| match e {
            nexus_telephony::TelephonyError::Auth { status } => {
                ApiError::BadRequest(format!("telephony authentication failed (status {status})"))
            }
            other => ApiError::InternalServerError(other.to_string()),
        })?;

    let merged = with_conn(state, move |conn| {
        nexus_store::merge_provider_numbers(conn, &fetched)?;
        nexus_store::list_numbers(conn)
    })
    .await?;
    Ok(Json(merged.into_iter().map(NumberBody::from).collect()))
}

/// Handler for `POST /api/numbers/:numberId/assign`.
pub async fn assign_number_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(number_id): Path<String>,
    Json(body): Json<AssignRequest>,
) -> Result<Json<NumberBody>, ApiError> {
    let number = with_conn(state, move |conn| {
        nexus_store::assign_number_to_agent(conn, &number_id, &body.agent_id)?;
        nexus_store::get_number(conn, &number_id)
    })
    .await?;
    Ok(Json(number.into()))
}

/// Handler for `POST /api/numbers/:numberId/unassign`.
pub async fn unassign_number_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(number_id): Path<String>,
) -> Result<Json<NumberBody>, ApiError> {
    let number = with_conn(state, move |conn| {
        nexus_store::unassign_number(conn, &number_id)?;
        nexus_store::get_number(conn, &number_id)
    })
    .await?;
    Ok(Json(number.into()))
}
