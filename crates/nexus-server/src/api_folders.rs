//! Folder API handlers.

use crate::api::{with_conn, ApiError};
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    Json,
};
use nexus_types::AgentFolder;
use serde::Deserialize;
use std::sync::Arc;

/// Request body for creating a folder.
#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Request body for renaming a folder.
#[derive(Debug, Deserialize)]
pub struct RenameFolderRequest {
    pub name: String,
}

/// Handler for `GET /api/folders`.
pub async fn list_folders_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<AgentFolder>>, ApiError> {
    let folders = with_conn(state, nexus_store::list_folders).await?;
    Ok(Json(folders))
}

/// Handler for `POST /api/folders`.
pub async fn create_folder_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<CreateFolderRequest>,
) -> Result<Json<AgentFolder>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("folder name is required".to_string()));
    }
    let folder = AgentFolder {
        id: uuid::Uuid::new_v4().to_string(),
        name: body.name,
        icon: body.icon,
    };
    let saved = folder.clone();
    with_conn(state, move |conn| nexus_store::save_folder(conn, &folder)).await?;
    Ok(Json(saved))
}

/// Handler for `PATCH /api/folders/:folderId`.
pub async fn rename_folder_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(folder_id): Path<String>,
    Json(body): Json<RenameFolderRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(state, move |conn| {
        nexus_store::rename_folder(conn, &folder_id, &body.name)
    })
    .await?;
    Ok(Json(serde_json::json!({ "renamed": true })))
}

/// Handler for `DELETE /api/folders/:folderId`.
pub async fn delete_folder_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(folder_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    with_conn(state, move |conn| {
        nexus_store::delete_folder(conn, &folder_id)
    })
    .await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
