/// API Routes definition

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::websocket;
use super::AppState;

pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    // Read-only routes
    let api_routes = Router::new()
        .route("/api/metrics", get(handlers::get_metrics))
        .route("/api/status", get(handlers::get_status))
        .route("/api/databases", get(handlers::get_databases))
        .route("/api/health", get(handlers::health_check))
        .route("/api/version", get(handlers::get_version_info))
        .route("/ws/metrics", get(websocket::ws_metrics_handler));

    let mut app = api_routes
        .with_state(state)
        // Add tracing middleware
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    app
}
