//! Seam between the run pipeline and the external analysis tool.
//!
//! A backend turns a validated request into a [`ToolPlan`]: the exact argv to
//! execute plus the per-run workspace it needs. It never runs anything itself.

mod workspace;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::PlanError;
use crate::request::{SimulateRequest, TraceRequest};
use crate::runner::CommandSpec;
use crate::script::SynthesizedScript;

pub use workspace::Workspace;

#[derive(Debug)]
pub struct ToolPlan {
    pub command: CommandSpec,
    /// Removed once the run terminates. `None` for runs that need no files.
    pub workspace: Option<Workspace>,
}

impl ToolPlan {
    pub fn without_workspace(command: CommandSpec) -> Self {
        Self {
            command,
            workspace: None,
        }
    }
}

/// Availability of one tool binary, reported by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub program: String,
    pub resolved: Option<PathBuf>,
}

impl ToolStatus {
    pub fn available(&self) -> bool {
        self.resolved.is_some()
    }
}

#[async_trait]
pub trait ToolBackend: Send + Sync {
    fn name(&self) -> &str;

    /// `run_id` names the workspace directory, when the plan needs one.
    async fn plan_trace(&self, run_id: &str, req: &TraceRequest) -> Result<ToolPlan, PlanError>;

    async fn plan_simulate(
        &self,
        run_id: &str,
        req: &SimulateRequest,
        script: &SynthesizedScript,
    ) -> Result<ToolPlan, PlanError>;

    fn preflight(&self) -> Vec<ToolStatus>;
}
