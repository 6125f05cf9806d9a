/// API Request Handlers
/// Reuses the collector and schema browser behind the TUI

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::core::browser::DatabaseEntry;
use crate::core::host::server_process_running;
use crate::core::metrics::MetricSnapshot;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(msg: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg),
        }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<T>>)>;

fn failure<T>(status: StatusCode, msg: String) -> (StatusCode, Json<ApiResponse<T>>) {
    (status, Json(ApiResponse::error(msg)))
}

// ============================================================================
// Metrics
// ============================================================================

/// Fresh snapshot, or the last one if a refresh is already running
pub async fn current_snapshot(state: &AppState) -> Option<MetricSnapshot> {
    match state.refresher.trigger() {
        Some(rx) => match rx.await {
            Ok(snapshot) => {
                *state.latest.write().await = Some(snapshot.clone());
                Some(snapshot)
            }
            Err(_) => state.latest.read().await.clone(),
        },
        None => state.latest.read().await.clone(),
    }
}

pub async fn get_metrics(State(state): State<AppState>) -> ApiResult<MetricSnapshot> {
    current_snapshot(&state)
        .await
        .map(|snapshot| Json(ApiResponse::ok(snapshot)))
        .ok_or_else(|| {
            failure(
                StatusCode::SERVICE_UNAVAILABLE,
                "Metrics are being collected, try again shortly".to_string(),
            )
        })
}

// ============================================================================
// Server status
// ============================================================================

#[derive(Serialize)]
pub struct ServerStatus {
    endpoint: String,
    process_running: bool,
    reachable: bool,
    error: Option<String>,
}

pub async fn get_status(State(state): State<AppState>) -> ApiResult<ServerStatus> {
    let names = state.server_processes.clone();
    let process_running = tokio::task::spawn_blocking(move || server_process_running(&names))
        .await
        .map_err(|e| failure::<ServerStatus>(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let ping = state.client.ping().await;

    Ok(Json(ApiResponse::ok(ServerStatus {
        endpoint: state.client.endpoint().to_string(),
        process_running,
        reachable: ping.is_ok(),
        error: ping.err().map(|e| e.to_string()),
    })))
}

// ============================================================================
// Schema
// ============================================================================

#[derive(Deserialize)]
pub struct DatabasesQuery {
    #[serde(default)]
    all: bool,
}

pub async fn get_databases(
    State(state): State<AppState>,
    Query(query): Query<DatabasesQuery>,
) -> ApiResult<Vec<DatabaseEntry>> {
    state
        .browser
        .list_databases(query.all)
        .await
        .map(|databases| Json(ApiResponse::ok(databases)))
        .map_err(|e| failure(StatusCode::SERVICE_UNAVAILABLE, format!("{:#}", e)))
}

// ============================================================================
// Misc
// ============================================================================

pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::ok("healthy".to_string()))
}

#[derive(Serialize)]
pub struct VersionInfo {
    version: &'static str,
    build: &'static str,
}

pub async fn get_version_info() -> Json<ApiResponse<VersionInfo>> {
    Json(ApiResponse::ok(VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
        build: crate::cli::BUILD_TIMESTAMP,
    }))
}
