//! Admin HTTP surface: dashboard status and operator controls.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::scheduling::{ControlError, CuratorScheduler};

pub struct AppState {
    pub scheduler: Arc<CuratorScheduler>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaRequest {
    pub max_posts_per_day: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuotaResponse {
    max_posts_per_day: u32,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn control_error(e: ControlError) -> Response {
    match e {
        ControlError::InvalidQuota(_) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        ControlError::Persist(inner) => {
            error!(error = %inner, "Failed to persist operator change");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to persist change")
        }
    }
}

pub fn router(scheduler: Arc<CuratorScheduler>) -> Router {
    let state = Arc::new(AppState { scheduler });
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/curator/status", get(status_handler))
        .route("/api/curator/run", post(run_handler))
        .route(
            "/api/curator/emergency-stop",
            post(emergency_stop_handler).delete(clear_emergency_stop_handler),
        )
        .route("/api/curator/quota", put(quota_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// --- HTTP handlers ---

async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.scheduler.dashboard(Utc::now()))
}

/// Starts a manual run in the background and returns immediately.
async fn run_handler(State(state): State<Arc<AppState>>) -> Response {
    let scheduler = state.scheduler.clone();
    if scheduler.state().emergency_stop {
        return error_response(StatusCode::CONFLICT, "emergency stop is engaged");
    }
    if scheduler.is_processing() {
        return error_response(StatusCode::CONFLICT, "a run is already in progress");
    }

    tokio::spawn(async move {
        let outcome = scheduler.run_now(Utc::now()).await;
        info!(?outcome, "Manual run finished");
    });
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "accepted": true })),
    )
        .into_response()
}

async fn emergency_stop_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.scheduler.emergency_stop() {
        Ok(()) => Json(state.scheduler.state()).into_response(),
        Err(e) => control_error(e),
    }
}

async fn clear_emergency_stop_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.scheduler.clear_emergency_stop() {
        Ok(()) => Json(state.scheduler.state()).into_response(),
        Err(e) => control_error(e),
    }
}

async fn quota_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuotaRequest>,
) -> Response {
    match state.scheduler.set_max_posts_per_day(request.max_posts_per_day) {
        Ok(()) => Json(QuotaResponse {
            max_posts_per_day: state.scheduler.max_posts_per_day(),
        })
        .into_response(),
        Err(e) => control_error(e),
    }
}
