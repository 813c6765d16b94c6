//! Request/response bodies of the HTTP API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use txscope_core::api::{RunError, SynthesizedScript, ToolStatus};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScriptResponse {
    pub success: bool,
    pub data: SynthesizedScript,
}

#[derive(Debug, Serialize)]
pub struct RunCounters {
    pub started: u64,
    pub ok: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub abandoned: u64,
    pub active: usize,
    pub max_concurrent: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub session_id: String,
    pub uptime_seconds: f64,
    pub requests_handled: u64,
    pub errors: u64,
    pub backend: String,
    pub tools: Vec<ToolStatus>,
    pub runs: RunCounters,
    pub timestamp: String,
}

#[derive(Debug, Error)]
pub enum HttpServerError {
    #[error("invalid JSON body: {0}")]
    InvalidJson(String),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("too many concurrent runs (limit {limit})")]
    TooManyRuns { limit: usize },

    #[error("internal error: {0}")]
    Internal(String),
}

impl HttpServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpServerError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            HttpServerError::Run(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            HttpServerError::Run(_) | HttpServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            HttpServerError::TooManyRuns { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            HttpServerError::InvalidJson(_) => "INVALID_JSON",
            HttpServerError::Run(e) => e.code(),
            HttpServerError::TooManyRuns { .. } => "TOO_MANY_RUNS",
            HttpServerError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let field = match &self {
            HttpServerError::Run(e) => e.field().map(str::to_string),
            _ => None,
        };
        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            error_code: self.code().to_string(),
            field,
        };
        (self.status(), Json(body)).into_response()
    }
}
