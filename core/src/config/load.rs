use std::path::Path;

use crate::error::ConfigError;

use super::types::{AppConfig, ToolConfig};

pub const DEFAULT_CONFIG_FILE: &str = "txscope.toml";

/// Loads `path` (must exist) or `./txscope.toml` (optional), then applies
/// `TXSCOPE_*` environment overrides and validates the result.
pub fn load_from(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut cfg = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound(p.display().to_string()));
            }
            parse_file(p)?
        }
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            parse_file(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    validate(&cfg)?;
    Ok(cfg)
}

pub fn parse_str(s: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str::<AppConfig>(s).map_err(|e| ConfigError::Parse(e.into()))
}

fn parse_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse(e.into()))?;
    parse_str(&s)
}

pub(crate) fn apply_env_overrides<F>(cfg: &mut AppConfig, get: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("TXSCOPE_HOST") {
        cfg.http_server.host = v;
    }
    if let Some(v) = get("TXSCOPE_PORT") {
        cfg.http_server.port = v.trim().parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::EnvInvalid {
                key: "TXSCOPE_PORT".into(),
                source: e.into(),
            }
        })?;
    }
    if let Some(v) = get("TXSCOPE_WORKSPACE_ROOT") {
        cfg.workspace.root = Some(v);
    }
    if let Some(v) = get("TXSCOPE_LOG_LEVEL") {
        cfg.logging.level = v;
    }

    if let ToolConfig::Foundry(ref mut foundry) = cfg.tool {
        if let Some(v) = get("TXSCOPE_FORGE_BIN") {
            foundry.forge_bin = v;
        }
        if let Some(v) = get("TXSCOPE_CAST_BIN") {
            foundry.cast_bin = v;
        }
        if let Some(v) = get("TXSCOPE_FORGE_STD") {
            foundry.forge_std_path = Some(v);
        }
    }

    Ok(())
}

pub fn validate(cfg: &AppConfig) -> Result<(), ConfigError> {
    if cfg.http_server.max_concurrent_runs == 0 {
        return Err(ConfigError::Validation(
            "http_server.max_concurrent_runs must be at least 1".into(),
        ));
    }
    if cfg.control.channel_capacity == 0 {
        return Err(ConfigError::Validation(
            "control.channel_capacity must be at least 1".into(),
        ));
    }
    if cfg.control.max_run_secs == 0 {
        return Err(ConfigError::Validation(
            "control.max_run_secs must be at least 1".into(),
        ));
    }
    if let ToolConfig::Command(ref command) = cfg.tool {
        if command.trace.is_none() && command.simulate.is_none() {
            return Err(ConfigError::Validation(
                "tool.provider = \"command\" needs at least one of tool.trace / tool.simulate"
                    .into(),
            ));
        }
    }
    Ok(())
}
