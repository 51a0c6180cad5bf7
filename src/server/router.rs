//! Route composition.

use axum::extract::State;
use axum::http::Method;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::metrics;
use crate::server::execute::execute_handler;
use crate::server::state::AppState;
use crate::server::ws;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/livez", get(live_handler))
        .route("/readyz", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .route("/execute", post(execute_handler))
        .route("/ws/screencast", get(ws::screencast_handler))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({
        "service": "gaia-host",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.registry.len(),
        "screencast_subscribers": state.screencast.subscriber_count(),
        "started_at": state.started_at.to_rfc3339(),
    }))
}

async fn live_handler() -> Json<serde_json::Value> {
    Json(json!({ "live": true }))
}

async fn ready_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "ready": true, "sessions": state.registry.len() }))
}

async fn metrics_handler() -> impl IntoResponse {
    metrics::register_metrics();
    match metrics::encode() {
        Ok(body) => (axum::http::StatusCode::OK, body).into_response(),
        Err(err) => {
            tracing::error!(%err, "failed to encode prometheus metrics");
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                "metric encode error",
            )
                .into_response()
        }
    }
}
