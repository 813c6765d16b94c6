//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `txscope_core::api` instead of reaching into internal modules.

pub use crate::backend::{ToolBackend, ToolPlan, ToolStatus, Workspace};
pub use crate::cancel::{CancelHandle, CancelOnDrop, CancelReason};
pub use crate::config::{
    AppConfig, CommandTemplate, CommandToolConfig, ControlConfig, FoundryToolConfig,
    HttpServerConfig, LoggingConfig, ToolConfig, WorkspaceConfig,
};
pub use crate::engine::{
    check_request, plan_run, prepare_run, preview_script, start_run, CheckedRun, PreparedRun,
    RunLifecycle, RunState, RunStream,
};
pub use crate::error::{
    CliError, ConfigError, PlanError, RunError, RunnerError, SynthesisError, ValidationError,
};
pub use crate::request::{
    validate, DealToken, RpcUrl, RunInputs, RunMode, RunRequest, RunRequestBody, SimulateRequest,
    TraceRequest,
};
pub use crate::runner::{
    spawn_run, CommandSpec, FailureKind, RunOptions, RunOutcome, RunnerEvent, Termination,
};
pub use crate::script::{synthesize, SynthesizedScript};
pub use crate::util::redact_url;
