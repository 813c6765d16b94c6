use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub http_server: HttpServerConfig,

    #[serde(default)]
    pub tool: ToolConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,

    /// Upper bound for producing response headers. Streaming bodies are not
    /// subject to it; run length is bounded by `control.max_run_secs`.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_concurrent_runs() -> usize {
    4
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_concurrent_runs: default_max_concurrent_runs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider")]
pub enum ToolConfig {
    #[serde(rename = "foundry")]
    Foundry(FoundryToolConfig),
    #[serde(rename = "command")]
    Command(CommandToolConfig),
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig::Foundry(FoundryToolConfig::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundryToolConfig {
    #[serde(default = "default_forge_bin")]
    pub forge_bin: String,

    #[serde(default = "default_cast_bin")]
    pub cast_bin: String,

    /// Checkout of forge-std; `src/` is remapped as `forge-std/`.
    #[serde(default)]
    pub forge_std_path: Option<String>,

    #[serde(default = "default_verbosity")]
    pub verbosity: u8,

    #[serde(default = "default_color")]
    pub color: bool,

    #[serde(default)]
    pub solc_version: Option<String>,

    #[serde(default)]
    pub trace_args: Vec<String>,

    #[serde(default)]
    pub simulate_args: Vec<String>,

    #[serde(default)]
    pub envs: HashMap<String, String>,
}

fn default_forge_bin() -> String {
    "forge".to_string()
}

fn default_cast_bin() -> String {
    "cast".to_string()
}

fn default_verbosity() -> u8 {
    4
}

fn default_color() -> bool {
    true
}

impl Default for FoundryToolConfig {
    fn default() -> Self {
        Self {
            forge_bin: default_forge_bin(),
            cast_bin: default_cast_bin(),
            forge_std_path: None,
            verbosity: default_verbosity(),
            color: default_color(),
            solc_version: None,
            trace_args: Vec::new(),
            simulate_args: Vec::new(),
            envs: HashMap::new(),
        }
    }
}

/// Operator-defined argv templates. Placeholders: `{rpc_url}`, `{tx_hash}`,
/// `{workspace}`, `{script_path}`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommandToolConfig {
    #[serde(default)]
    pub trace: Option<CommandTemplate>,

    #[serde(default)]
    pub simulate: Option<CommandTemplate>,

    #[serde(default)]
    pub envs: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Relative path of the synthesized script inside the run workspace.
    #[serde(default = "default_script_file")]
    pub script_file: String,

    #[serde(default)]
    pub script_via_stdin: bool,
}

fn default_script_file() -> String {
    "Simulate.t.sol".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_abort_grace_ms")]
    pub abort_grace_ms: u64,

    #[serde(default = "default_max_run_secs")]
    pub max_run_secs: u64,

    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Appends a status line to every stream. When off, only failures get
    /// one (non-zero exit, signal, time limit, spawn or stream errors).
    #[serde(default = "default_status_trailer")]
    pub status_trailer: bool,
}

fn default_abort_grace_ms() -> u64 {
    3_000
}

fn default_max_run_secs() -> u64 {
    600
}

fn default_drain_timeout_ms() -> u64 {
    2_000
}

fn default_channel_capacity() -> usize {
    64
}

fn default_status_trailer() -> bool {
    true
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            abort_grace_ms: default_abort_grace_ms(),
            max_run_secs: default_max_run_secs(),
            drain_timeout_ms: default_drain_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            status_trailer: default_status_trailer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkspaceConfig {
    /// Parent directory for per-run workspaces. `~` is expanded.
    #[serde(default)]
    pub root: Option<String>,
}

impl WorkspaceConfig {
    pub fn resolve_root(&self) -> PathBuf {
        if let Some(root) = self.root.as_deref().filter(|r| !r.trim().is_empty()) {
            return PathBuf::from(shellexpand::tilde(root).as_ref());
        }
        dirs::cache_dir()
            .map(|d| d.join("txscope").join("runs"))
            .unwrap_or_else(|| std::env::temp_dir().join("txscope-runs"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// When set, logs are also written to a daily-rolling file in this directory.
    #[serde(default)]
    pub dir: Option<String>,

    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file_prefix() -> String {
    "txscope.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
            file_prefix: default_log_file_prefix(),
        }
    }
}
