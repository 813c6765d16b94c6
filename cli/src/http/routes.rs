//! HTTP route handlers.

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use uuid::Uuid;

use txscope_core::api::{
    check_request, plan_run, preview_script, start_run, CancelHandle, RunLifecycle, RunOptions,
    RunRequestBody,
};

use crate::http::{models::*, state::AppState, stream};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/run", post(run_handler))
        .route("/api/script", post(script_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

fn decode(
    state: &AppState,
    payload: Result<Json<RunRequestBody>, JsonRejection>,
) -> Result<RunRequestBody, HttpServerError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| fail(state, HttpServerError::InvalidJson(e.body_text())))
}

fn fail(state: &AppState, err: HttpServerError) -> HttpServerError {
    state.stats_mut().increment_error();
    err
}

/// POST /api/run - validate, plan and stream one tool run
async fn run_handler(
    State(state): State<AppState>,
    payload: Result<Json<RunRequestBody>, JsonRejection>,
) -> Result<Response, HttpServerError> {
    state.stats_mut().increment_request("/api/run");
    let body = decode(&state, payload)?;

    let run_id = Uuid::new_v4().to_string();
    let mut lifecycle = RunLifecycle::new(run_id.clone());
    let checked = check_request(&body, &mut lifecycle).map_err(|e| fail(&state, e.into()))?;

    // Taken before planning so a busy server never builds a workspace it
    // cannot run.
    let permit = state.run_slots.clone().try_acquire_owned().map_err(|_| {
        fail(
            &state,
            HttpServerError::TooManyRuns {
                limit: state.cfg.http_server.max_concurrent_runs,
            },
        )
    })?;

    let prepared = plan_run(checked, state.backend.as_ref(), &mut lifecycle)
        .await
        .map_err(|e| fail(&state, e.into()))?;

    let cancel = CancelHandle::child_of(&state.root_cancel);
    let run = start_run(
        prepared,
        RunOptions::from(&state.cfg.control),
        cancel,
        permit,
    );
    state.stats_mut().runs_started += 1;
    tracing::info!(target: "txscope.http", run_id = %run_id, mode = %run.mode, "run started");

    Ok(stream::into_response(run, lifecycle, state.clone()))
}

/// POST /api/script - the script a SIMULATE request would run
async fn script_handler(
    State(state): State<AppState>,
    payload: Result<Json<RunRequestBody>, JsonRejection>,
) -> Result<Json<ScriptResponse>, HttpServerError> {
    state.stats_mut().increment_request("/api/script");
    let body = decode(&state, payload)?;
    let script = preview_script(&body).map_err(|e| fail(&state, e.into()))?;
    Ok(Json(ScriptResponse {
        success: true,
        data: script,
    }))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    state.stats_mut().increment_request("/health");
    let tools = state.backend.preflight();
    let active = state.active_runs();
    let stats = state.stats();

    Json(HealthResponse {
        status: "healthy".into(),
        session_id: state.session_id.clone(),
        uptime_seconds: stats.uptime_seconds(),
        requests_handled: stats.requests_total,
        errors: stats.errors_total,
        backend: state.backend.name().to_string(),
        tools,
        runs: RunCounters {
            started: stats.runs_started,
            ok: stats.runs_ok,
            failed: stats.runs_failed,
            cancelled: stats.runs_cancelled,
            abandoned: stats.runs_abandoned,
            active,
            max_concurrent: state.cfg.http_server.max_concurrent_runs,
        },
        timestamp: Local::now().to_rfc3339(),
    })
}
