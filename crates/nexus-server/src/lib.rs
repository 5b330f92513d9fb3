//! NexusVoice dashboard server library logic.
//!
//! Serves the dashboard's resource model — agents, folders, phone
//! numbers, settings, cloned voices, connected CRM accounts — as a JSON
//! API over the settings/agent store.

pub mod api;
pub mod api_accounts;
pub mod api_agents;
pub mod api_folders;
pub mod api_numbers;
pub mod api_settings;
pub mod api_voices;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Extension, Json, Router,
};
use nexus_db::DbPool;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Maximum request body size (2 MiB). Protects against OOM from oversized
/// payloads.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Telephony provider client (number import).
    pub telephony: nexus_telephony::TelephonyClient,
}

impl AppState {
    /// Builds state with the production telephony client.
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            telephony: nexus_telephony::TelephonyClient::new(),
        }
    }
}

/// Health check handler.
///
/// Returns `200 OK` with server status and version. Used by the dashboard
/// shell and monitoring to verify the server is running.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/agents",
            post(api_agents::create_agent_handler).get(api_agents::list_agents_handler),
        )
        .route(
            "/api/agents/{agentId}",
            get(api_agents::get_agent_handler)
                .put(api_agents::update_agent_handler)
                .delete(api_agents::delete_agent_handler),
        )
        .route(
            "/api/folders",
            post(api_folders::create_folder_handler).get(api_folders::list_folders_handler),
        )
        .route(
            "/api/folders/{folderId}",
            axum::routing::patch(api_folders::rename_folder_handler)
                .delete(api_folders::delete_folder_handler),
        )
        .route(
            "/api/numbers",
            post(api_numbers::save_number_handler).get(api_numbers::list_numbers_handler),
        )
        .route("/api/numbers/sync", post(api_numbers::sync_numbers_handler))
        .route(
            "/api/numbers/import",
            post(api_numbers::import_numbers_handler),
        )
        .route(
            "/api/numbers/{numberId}/assign",
            post(api_numbers::assign_number_handler),
        )
        .route(
            "/api/numbers/{numberId}/unassign",
            post(api_numbers::unassign_number_handler),
        )
        .route(
            "/api/settings",
            get(api_settings::get_settings_handler).put(api_settings::update_settings_handler),
        )
        .route(
            "/api/settings/telephony",
            put(api_settings::set_telephony_handler)
                .delete(api_settings::delete_telephony_handler),
        )
        .route(
            "/api/voices",
            post(api_voices::save_voice_handler).get(api_voices::list_voices_handler),
        )
        .route(
            "/api/accounts",
            post(api_accounts::save_account_handler).get(api_accounts::list_accounts_handler),
        )
        .route(
            "/api/accounts/{accountId}",
            axum::routing::delete(api_accounts::delete_account_handler),
        )
        .layer(Extension(Arc::new(state)))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
