//! Connected CRM account API handlers.

use crate::api::{with_conn, ApiError};
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    Json,
};
use nexus_types::{ConnectedAccount, TestStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Wire shape for one connected account.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBody {
    #[serde(default)]
    pub id: Option<String>,
    pub location_id: String,
    pub location_name: String,
    pub api_key: String,
    #[serde(default)]
    pub last_test_status: Option<TestStatus>,
    #[serde(default)]
    pub last_test_message: Option<String>,
}

/// Response wire shape, including server-assigned fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: String,
    pub location_id: String,
    pub location_name: String,
    pub api_key: String,
    pub connected_at: String,
    pub last_test_status: Option<TestStatus>,
    pub last_test_message: Option<String>,
}

impl From<ConnectedAccount> for AccountResponse {
    fn from(account: ConnectedAccount) -> Self {
        Self {
            id: account.id,
            location_id: account.location_id,
            location_name: account.location_name,
            api_key: account.api_key,
            connected_at: account.connected_at,
            last_test_status: account.last_test_status,
            last_test_message: account.last_test_message,
        }
    }
}

/// Handler for `GET /api/accounts`.
pub async fn list_accounts_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<AccountResponse>>, ApiError> {
    let accounts = with_conn(state, nexus_store::list_accounts).await?;
    Ok(Json(
        accounts.into_iter().map(AccountResponse::from).collect(),
    ))
}

/// Handler for `POST /api/accounts`.
pub async fn save_account_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<AccountBody>,
) -> Result<Json<AccountResponse>, ApiError> {
    if body.location_id.trim().is_empty() || body.api_key.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "locationId and apiKey are required".to_string(),
        ));
    }
    let id = body
        .id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let account = ConnectedAccount {
        id: id.clone(),
        location_id: body.location_id,
        location_name: body.location_name,
        api_key: body.api_key,
        connected_at: chrono::Utc::now().to_rfc3339(),
        last_test_status: body.last_test_status,
        last_test_message: body.last_test_message,
    };
    let saved = with_conn(state, move |conn| {
        nexus_store::save_account(conn, &account)?;
        nexus_store::get_account(conn, &id)
    })
    .await?;
    Ok(Json(saved.into()))
}

/// Handler for `DELETE /api/accounts/:accountId`.
pub async fn delete_account_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(account_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(state, move |conn| {
        nexus_store::delete_account(conn, &account_id)
    })
    .await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
