use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use txscope_core::api as core_api;
use txscope_core::api::{
    CommandSpec, FoundryToolConfig, PlanError, SimulateRequest, SynthesizedScript, ToolPlan,
    ToolStatus, TraceRequest, Workspace,
};

/// Default backend: `cast run` for traces, a throwaway Foundry project run
/// with `forge test` for simulations.
pub struct FoundryBackend {
    cfg: FoundryToolConfig,
    workspace_root: PathBuf,
}

#[derive(Serialize)]
struct FoundryManifest {
    profile: Profiles,
}

#[derive(Serialize)]
struct Profiles {
    default: Profile,
}

#[derive(Serialize)]
struct Profile {
    src: String,
    test: String,
    out: String,
    libs: Vec<String>,
    remappings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    solc_version: Option<String>,
}

impl FoundryBackend {
    pub fn new(cfg: FoundryToolConfig, workspace_root: PathBuf) -> Self {
        Self {
            cfg,
            workspace_root,
        }
    }

    fn forge_std(&self) -> Result<PathBuf, PlanError> {
        let configured = self
            .cfg
            .forge_std_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                PlanError::Config(
                    "tool.forge_std_path is not set (or TXSCOPE_FORGE_STD)".to_string(),
                )
            })?;
        let path = PathBuf::from(shellexpand::tilde(configured).as_ref());
        if !path.join("src").is_dir() {
            return Err(PlanError::Config(format!(
                "forge-std not found at {}",
                path.display()
            )));
        }
        Ok(path)
    }

    fn manifest(&self, forge_std: &Path) -> Result<String, PlanError> {
        let manifest = FoundryManifest {
            profile: Profiles {
                default: Profile {
                    src: "src".to_string(),
                    test: "test".to_string(),
                    out: "out".to_string(),
                    libs: Vec::new(),
                    remappings: vec![format!("forge-std/={}/", forge_std.join("src").display())],
                    solc_version: self.cfg.solc_version.clone(),
                },
            },
        };
        toml::to_string(&manifest).map_err(|e| PlanError::Config(format!("foundry.toml: {e}")))
    }

    fn color_args(&self) -> Option<[&'static str; 2]> {
        self.cfg.color.then_some(["--color", "always"])
    }

    fn verbosity_flag(&self) -> Option<String> {
        match self.cfg.verbosity.min(5) {
            0 => None,
            n => Some(format!("-{}", "v".repeat(n as usize))),
        }
    }
}

#[async_trait]
impl core_api::ToolBackend for FoundryBackend {
    fn name(&self) -> &str {
        "foundry"
    }

    async fn plan_trace(&self, run_id: &str, req: &TraceRequest) -> Result<ToolPlan, PlanError> {
        let mut command = CommandSpec::new(&self.cfg.cast_bin)
            .arg("run")
            .arg(req.tx_hash_hex())
            .arg("--rpc-url")
            .arg(req.rpc_url.as_str())
            .envs(&self.cfg.envs);
        if let Some(color) = self.color_args() {
            command = command.args(color);
        }
        command = command.args(self.cfg.trace_args.iter().cloned());

        tracing::debug!(
            target: "txscope.backend",
            run_id,
            command = %command.display_redacted(),
            "planned trace"
        );
        Ok(ToolPlan::without_workspace(command))
    }

    async fn plan_simulate(
        &self,
        run_id: &str,
        _req: &SimulateRequest,
        script: &SynthesizedScript,
    ) -> Result<ToolPlan, PlanError> {
        let forge_std = self.forge_std()?;
        let manifest = self.manifest(&forge_std)?;

        let workspace = Workspace::create(&self.workspace_root, run_id).await?;
        workspace
            .write_file("foundry.toml", manifest.as_bytes())
            .await?;
        workspace.create_dir("src").await?;
        workspace
            .write_file(
                Path::new("test").join(&script.file_name),
                script.source.as_bytes(),
            )
            .await?;

        let mut command = CommandSpec::new(&self.cfg.forge_bin)
            .arg("test")
            .arg("--root")
            .arg(workspace.path().display().to_string())
            .arg("--match-contract")
            .arg(&script.contract_name)
            .arg("--match-test")
            .arg(&script.test_name)
            .cwd(workspace.path())
            .envs(&self.cfg.envs);
        if let Some(v) = self.verbosity_flag() {
            command = command.arg(v);
        }
        if let Some(color) = self.color_args() {
            command = command.args(color);
        }
        command = command.args(self.cfg.simulate_args.iter().cloned());

        tracing::debug!(
            target: "txscope.backend",
            run_id,
            workspace = %workspace.path().display(),
            command = %command.display_redacted(),
            "planned simulation"
        );
        Ok(ToolPlan {
            command,
            workspace: Some(workspace),
        })
    }

    fn preflight(&self) -> Vec<ToolStatus> {
        let mut out = vec![
            resolve("forge", &self.cfg.forge_bin),
            resolve("cast", &self.cfg.cast_bin),
        ];
        out.push(ToolStatus {
            name: "forge-std".to_string(),
            program: self.cfg.forge_std_path.clone().unwrap_or_default(),
            resolved: self.forge_std().ok(),
        });
        out
    }
}

pub(crate) fn resolve(name: &str, program: &str) -> ToolStatus {
    ToolStatus {
        name: name.to_string(),
        program: program.to_string(),
        resolved: which::which(program).ok(),
    }
}
