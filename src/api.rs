// src/api.rs
//! Thin HTTP surface: trigger a run, poll its status, read the history and
//! send a digest.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::pipeline::{RunError, RunSummary, Tracker};
use crate::scheduler::run_within_budget;
use crate::store::UpdateRecord;

const DEFAULT_DAYS: u32 = 7;
const MAX_DAYS: u32 = 365;

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<Tracker>,
    pub run_budget: Duration,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/runs", post(start_run))
        .route("/status", get(status))
        .route("/updates", get(updates))
        .route("/digest", post(send_digest))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct WindowQuery {
    days: Option<u32>,
}

impl WindowQuery {
    fn days(&self) -> u32 {
        self.days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS)
    }
}

fn internal(err: anyhow::Error) -> Response {
    tracing::error!(error = %format!("{err:#}"), "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err.to_string() })),
    )
        .into_response()
}

/// The run proceeds in the background; callers poll `/status`.
async fn start_run(State(state): State<AppState>) -> Response {
    match state.tracker.try_begin() {
        Ok(permit) => {
            let tracker = state.tracker.clone();
            let budget = state.run_budget;
            tokio::spawn(async move {
                run_within_budget(&tracker, permit, budget).await;
            });
            (StatusCode::ACCEPTED, Json(json!({ "status": "started" }))).into_response()
        }
        Err(RunError::AlreadyRunning) => (
            StatusCode::CONFLICT,
            Json(json!({ "status": "already_running" })),
        )
            .into_response(),
        Err(e) => internal(e.into()),
    }
}

#[derive(Serialize)]
struct StatusOut {
    running: bool,
    sources: usize,
    channels: Vec<&'static str>,
    last_run: Option<RunSummary>,
}

async fn status(State(state): State<AppState>) -> Json<StatusOut> {
    let t = &state.tracker;
    Json(StatusOut {
        running: t.is_running(),
        sources: t.detector().registry().len(),
        channels: t.dispatcher().channel_names(),
        last_run: t.last_run(),
    })
}

async fn updates(State(state): State<AppState>, Query(q): Query<WindowQuery>) -> Response {
    match state.tracker.store().window_query(q.days()) {
        Ok(rows) => Json::<Vec<UpdateRecord>>(rows).into_response(),
        Err(e) => internal(e),
    }
}

#[derive(Serialize)]
struct DigestOut {
    window: String,
    competitors: usize,
    updates: usize,
    delivered: usize,
    failed: usize,
    not_configured: Vec<&'static str>,
}

async fn send_digest(State(state): State<AppState>, Query(q): Query<WindowQuery>) -> Response {
    match state.tracker.digest(q.days()).await {
        Ok((digest, report)) => Json(DigestOut {
            window: digest.window_description(),
            competitors: digest.groups.len(),
            updates: digest.total(),
            delivered: report.delivered(),
            failed: report.failed(),
            not_configured: report.not_configured,
        })
        .into_response(),
        Err(e) => internal(e),
    }
}
