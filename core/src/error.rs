use thiserror::Error;

/// A decoded request failed its mode-specific schema. Carries the wire name of
/// the offending field so the client can point at it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown run type `{0}` (expected TRACE or SIMULATE)")]
    UnknownMode(String),

    #[error("missing required field `{field}`")]
    Missing { field: &'static str },

    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ValidationError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::Invalid {
            field,
            reason: reason.into(),
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::UnknownMode(_) => "type",
            ValidationError::Missing { field } | ValidationError::Invalid { field, .. } => field,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("`{field}` cannot be embedded in a script literal: {reason}")]
    UnsafeLiteral { field: &'static str, reason: String },

    #[error("request is not a SIMULATE request")]
    NotSimulate,
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("tool backend `{backend}` does not support {mode} runs")]
    Unsupported { backend: String, mode: &'static str },

    #[error("tool misconfigured: {0}")]
    Config(String),

    #[error("failed to prepare run workspace")]
    Workspace(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn process: {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error while streaming process output")]
    StreamIo(#[source] std::io::Error),

    #[error("failed to wait for process")]
    Wait(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("config parse error")]
    Parse(#[source] anyhow::Error),

    #[error("config validation error: {0}")]
    Validation(String),

    #[error("env var invalid: {key}")]
    EnvInvalid {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Everything that can stop a run before its process is spawned.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl RunError {
    pub fn code(&self) -> &'static str {
        match self {
            RunError::Validation(_) => "VALIDATION_ERROR",
            RunError::Synthesis(_) => "SYNTHESIS_ERROR",
            RunError::Plan(_) => "PLAN_ERROR",
        }
    }

    /// Validation-class failures are the caller's fault; plan failures are ours.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RunError::Validation(_) | RunError::Synthesis(_))
    }

    pub fn field(&self) -> Option<&'static str> {
        match self {
            RunError::Validation(e) => Some(e.field()),
            RunError::Synthesis(SynthesisError::UnsafeLiteral { field, .. }) => Some(field),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Command(String),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("io error")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
