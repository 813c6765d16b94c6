use std::path::PathBuf;

use async_trait::async_trait;

use txscope_core::api as core_api;
use txscope_core::api::{
    CommandSpec, CommandTemplate, CommandToolConfig, PlanError, SimulateRequest,
    SynthesizedScript, ToolPlan, ToolStatus, TraceRequest, Workspace,
};

use super::foundry::resolve;

const PLACEHOLDERS: [&str; 4] = ["rpc_url", "tx_hash", "workspace", "script_path"];

/// Runs operator-supplied argv templates instead of a built-in tool.
pub struct CommandBackend {
    cfg: CommandToolConfig,
    workspace_root: PathBuf,
}

#[derive(Default)]
struct Vars<'a> {
    rpc_url: Option<&'a str>,
    tx_hash: Option<String>,
    workspace: Option<String>,
    script_path: Option<String>,
}

impl Vars<'_> {
    fn get(&self, name: &str) -> Option<&str> {
        match name {
            "rpc_url" => self.rpc_url,
            "tx_hash" => self.tx_hash.as_deref(),
            "workspace" => self.workspace.as_deref(),
            "script_path" => self.script_path.as_deref(),
            _ => None,
        }
    }
}

impl CommandBackend {
    pub fn new(cfg: CommandToolConfig, workspace_root: PathBuf) -> Self {
        Self {
            cfg,
            workspace_root,
        }
    }

    fn template(
        &self,
        template: Option<&CommandTemplate>,
        mode: &'static str,
    ) -> Result<CommandTemplate, PlanError> {
        template.cloned().ok_or_else(|| PlanError::Unsupported {
            backend: "command".to_string(),
            mode,
        })
    }

    fn build(&self, template: &CommandTemplate, vars: &Vars<'_>) -> Result<CommandSpec, PlanError> {
        let args = template
            .args
            .iter()
            .map(|arg| render(arg, vars))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CommandSpec::new(&template.program)
            .args(args)
            .envs(&self.cfg.envs))
    }
}

fn uses_workspace(template: &CommandTemplate) -> bool {
    template
        .args
        .iter()
        .any(|a| a.contains("{workspace}") || a.contains("{script_path}"))
}

/// Substitutes `{name}` placeholders in one argv element. Each value lands
/// inside that single element, never split or re-parsed.
fn render(arg: &str, vars: &Vars<'_>) -> Result<String, PlanError> {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return Ok(out);
        };
        let name = &after[..close];
        if PLACEHOLDERS.contains(&name) {
            let value = vars.get(name).ok_or_else(|| {
                PlanError::Config(format!("placeholder {{{name}}} is not available for this run"))
            })?;
            out.push_str(value);
        } else {
            out.push('{');
            out.push_str(name);
            out.push('}');
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[async_trait]
impl core_api::ToolBackend for CommandBackend {
    fn name(&self) -> &str {
        "command"
    }

    async fn plan_trace(&self, run_id: &str, req: &TraceRequest) -> Result<ToolPlan, PlanError> {
        let template = self.template(self.cfg.trace.as_ref(), "TRACE")?;
        let workspace = if uses_workspace(&template) {
            Some(Workspace::create(&self.workspace_root, run_id).await?)
        } else {
            None
        };

        let vars = Vars {
            rpc_url: Some(req.rpc_url.as_str()),
            tx_hash: Some(req.tx_hash_hex()),
            workspace: workspace
                .as_ref()
                .map(|w| w.path().display().to_string()),
            script_path: None,
        };
        let mut command = self.build(&template, &vars)?;
        if let Some(ws) = &workspace {
            command = command.cwd(ws.path());
        }

        tracing::debug!(target: "txscope.backend", run_id, command = %command.display_redacted(), "planned trace");
        Ok(ToolPlan { command, workspace })
    }

    async fn plan_simulate(
        &self,
        run_id: &str,
        req: &SimulateRequest,
        script: &SynthesizedScript,
    ) -> Result<ToolPlan, PlanError> {
        let template = self.template(self.cfg.simulate.as_ref(), "SIMULATE")?;
        let workspace = Workspace::create(&self.workspace_root, run_id).await?;
        let script_path = workspace
            .write_file(&template.script_file, script.source.as_bytes())
            .await?;

        let vars = Vars {
            rpc_url: Some(req.rpc_url.as_str()),
            tx_hash: None,
            workspace: Some(workspace.path().display().to_string()),
            script_path: Some(script_path.display().to_string()),
        };
        let mut command = self.build(&template, &vars)?.cwd(workspace.path());
        if template.script_via_stdin {
            command = command.stdin(script.source.clone());
        }

        tracing::debug!(target: "txscope.backend", run_id, command = %command.display_redacted(), "planned simulation");
        Ok(ToolPlan {
            command,
            workspace: Some(workspace),
        })
    }

    fn preflight(&self) -> Vec<ToolStatus> {
        [("trace", &self.cfg.trace), ("simulate", &self.cfg.simulate)]
            .into_iter()
            .filter_map(|(name, t)| t.as_ref().map(|t| resolve(name, &t.program)))
            .collect()
    }
}
