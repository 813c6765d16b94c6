//! Shared server state.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use txscope_core::api::{AppConfig, RunOutcome, Termination, ToolBackend};

#[derive(Clone)]
pub struct AppState {
    pub session_id: String,
    pub backend: Arc<dyn ToolBackend>,
    pub cfg: Arc<AppConfig>,
    pub stats: Arc<RwLock<ServerStats>>,
    /// One permit per running process, held until it has been reaped.
    pub run_slots: Arc<Semaphore>,
    /// Parent of every run's cancel token; cancelled on shutdown.
    pub root_cancel: CancellationToken,
}

impl AppState {
    pub fn new(session_id: String, backend: Arc<dyn ToolBackend>, cfg: AppConfig) -> Self {
        let slots = cfg.http_server.max_concurrent_runs.max(1);
        Self {
            session_id,
            backend,
            cfg: Arc::new(cfg),
            stats: Arc::new(RwLock::new(ServerStats::new())),
            run_slots: Arc::new(Semaphore::new(slots)),
            root_cancel: CancellationToken::new(),
        }
    }

    pub fn stats(&self) -> RwLockReadGuard<'_, ServerStats> {
        self.stats.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats_mut(&self) -> RwLockWriteGuard<'_, ServerStats> {
        self.stats.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn active_runs(&self) -> usize {
        self.cfg
            .http_server
            .max_concurrent_runs
            .max(1)
            .saturating_sub(self.run_slots.available_permits())
    }
}

/// Counters reported by `/health`. Run outcomes are counted when the client
/// read them; runs abandoned by a disconnect only show up as cancelled
/// through `runs_abandoned`.
#[derive(Debug)]
pub struct ServerStats {
    started_at: Instant,
    pub requests_total: u64,
    pub requests_by_endpoint: HashMap<String, u64>,
    pub errors_total: u64,
    pub runs_started: u64,
    pub runs_ok: u64,
    pub runs_failed: u64,
    pub runs_cancelled: u64,
    pub runs_abandoned: u64,
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            requests_total: 0,
            requests_by_endpoint: HashMap::new(),
            errors_total: 0,
            runs_started: 0,
            runs_ok: 0,
            runs_failed: 0,
            runs_cancelled: 0,
            runs_abandoned: 0,
        }
    }

    pub fn increment_request(&mut self, endpoint: &str) {
        self.requests_total += 1;
        *self
            .requests_by_endpoint
            .entry(endpoint.to_string())
            .or_insert(0) += 1;
    }

    pub fn increment_error(&mut self) {
        self.errors_total += 1;
    }

    pub fn record_outcome(&mut self, outcome: &RunOutcome) {
        match outcome.termination() {
            Termination::Ok => self.runs_ok += 1,
            Termination::Failed(_) => self.runs_failed += 1,
            Termination::Cancelled => self.runs_cancelled += 1,
        }
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}
