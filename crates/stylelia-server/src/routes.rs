use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stylelia_core::pipeline::{CycleReport, CycleState};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{logging, AppState};

// ── Last cycle ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub(crate) enum LastCycle {
    Completed(CycleReport),
    Failed {
        failed_in: CycleState,
        trail: Vec<CycleState>,
        error: String,
        finished_at: DateTime<Utc>,
    },
}

#[derive(Deserialize)]
pub(crate) struct LogsQuery {
    pub limit: Option<usize>,
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/reconcile", post(reconcile))
        .route("/api/last", get(last_cycle))
        .route("/api/logs", get(logs))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────────

pub(crate) async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = state.pipeline.config();
    Json(json!({
        "status": "ok",
        "repository": format!("{}/{}", config.organization, config.repository),
        "lint_tool": config.lint_tool,
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Runs one cycle inline. Overlapping triggers get 409 instead of queueing.
pub(crate) async fn reconcile(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<Value>) {
    let Ok(_running) = state.running.try_lock() else {
        warn!("reconcile requested while a cycle is running");
        return (
            StatusCode::CONFLICT,
            Json(json!({ "error": "a reconciliation cycle is already running" })),
        );
    };

    let (status, last) = match state.pipeline.run_cycle().await {
        Ok(report) => (StatusCode::OK, LastCycle::Completed(report)),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            LastCycle::Failed {
                failed_in: e.failed_in,
                error: e.source.to_string(),
                trail: e.trail,
                finished_at: Utc::now(),
            },
        ),
    };
    let body = serde_json::to_value(&last).unwrap_or_default();
    *state.last.lock().unwrap_or_else(|e| e.into_inner()) = Some(last);
    (status, Json(body))
}

pub(crate) async fn last_cycle(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LastCycle>, (StatusCode, Json<Value>)> {
    state
        .last
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "no cycle has run yet" })),
            )
        })
}

pub(crate) async fn logs(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LogsQuery>,
) -> Json<Value> {
    let limit = q.limit.unwrap_or(100).min(500);
    Json(json!(logging::recent(&state.logs, limit)))
}
