use std::sync::Arc;

use anyhow::Result;

use txscope_core::api::{AppConfig, ToolBackend, ToolConfig};

use crate::backend::{CommandBackend, FoundryBackend};

pub fn build_backend(cfg: &AppConfig) -> Result<Arc<dyn ToolBackend>> {
    let root = cfg.workspace.resolve_root();
    std::fs::create_dir_all(&root)
        .map_err(|e| anyhow::anyhow!("cannot create workspace root {}: {e}", root.display()))?;

    let backend: Arc<dyn ToolBackend> = match &cfg.tool {
        ToolConfig::Foundry(f) => Arc::new(FoundryBackend::new(f.clone(), root)),
        ToolConfig::Command(c) => {
            if c.trace.is_none() && c.simulate.is_none() {
                anyhow::bail!("tool.provider = \"command\" needs a trace or simulate template");
            }
            Arc::new(CommandBackend::new(c.clone(), root))
        }
    };

    for status in backend.preflight() {
        if status.available() {
            tracing::debug!(target: "txscope.backend", tool = %status.name, path = ?status.resolved, "tool found");
        } else {
            tracing::warn!(target: "txscope.backend", tool = %status.name, program = %status.program, "tool not available");
        }
    }
    Ok(backend)
}
