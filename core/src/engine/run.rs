use tokio::sync::mpsc;

use crate::backend::{ToolBackend, ToolPlan};
use crate::cancel::CancelHandle;
use crate::error::{RunError, SynthesisError};
use crate::request::{validate, RunMode, RunRequest, RunRequestBody};
use crate::runner::{spawn_run, FailureKind, RunOptions, RunnerEvent, Termination};
use crate::script::{synthesize, SynthesizedScript};

use super::state::{RunLifecycle, RunState};

/// A request that passed validation and has a concrete command to execute.
#[derive(Debug)]
pub struct PreparedRun {
    pub run_id: String,
    pub mode: RunMode,
    pub plan: ToolPlan,
    pub script: Option<SynthesizedScript>,
}

/// Live events of one started run.
#[derive(Debug)]
pub struct RunStream {
    pub run_id: String,
    pub mode: RunMode,
    pub events: mpsc::Receiver<RunnerEvent>,
    pub cancel: CancelHandle,
}

/// A request that passed validation (and synthesis for SIMULATE) but has not
/// touched the backend yet.
#[derive(Debug)]
pub struct CheckedRun {
    pub run_id: String,
    pub request: RunRequest,
    pub script: Option<SynthesizedScript>,
}

/// Validates `body`, synthesizes the script for SIMULATE runs and asks the
/// backend for a plan. Nothing is spawned here; on error the lifecycle ends
/// in `Terminated(error)`.
pub async fn prepare_run(
    body: &RunRequestBody,
    backend: &dyn ToolBackend,
    lifecycle: &mut RunLifecycle,
) -> Result<PreparedRun, RunError> {
    let checked = check_request(body, lifecycle)?;
    plan_run(checked, backend, lifecycle).await
}

/// First half of [`prepare_run`]: validation and synthesis only. Cheap, and
/// free of side effects outside the process.
pub fn check_request(
    body: &RunRequestBody,
    lifecycle: &mut RunLifecycle,
) -> Result<CheckedRun, RunError> {
    let run_id = lifecycle.run_id().to_string();
    lifecycle.advance(RunState::Validating);

    let checked = validate(body).map_err(RunError::from).and_then(|req| {
        let script = match &req {
            RunRequest::Trace(_) => None,
            RunRequest::Simulate(sim) => Some(synthesize(sim)?),
        };
        Ok((req, script))
    });
    match checked {
        Ok((request, script)) => Ok(CheckedRun {
            run_id,
            request,
            script,
        }),
        Err(e) => Err(reject(lifecycle, e)),
    }
}

/// Second half of [`prepare_run`]: the backend builds the command and any
/// workspace it needs.
pub async fn plan_run(
    checked: CheckedRun,
    backend: &dyn ToolBackend,
    lifecycle: &mut RunLifecycle,
) -> Result<PreparedRun, RunError> {
    let CheckedRun {
        run_id,
        request: req,
        script,
    } = checked;

    tracing::info!(
        target: "txscope.engine",
        run_id = %run_id,
        mode = %req.mode(),
        rpc_url = %req.rpc_url(),
        backend = backend.name(),
        "request accepted"
    );
    lifecycle.advance(RunState::Running);

    let planned = match (&req, &script) {
        (RunRequest::Trace(trace), _) => backend.plan_trace(&run_id, trace).await,
        (RunRequest::Simulate(sim), Some(script)) => {
            backend.plan_simulate(&run_id, sim, script).await
        }
        (RunRequest::Simulate(_), None) => {
            return Err(reject(lifecycle, SynthesisError::NotSimulate.into()))
        }
    };
    let plan = planned.map_err(|e| reject(lifecycle, e.into()))?;

    Ok(PreparedRun {
        run_id,
        mode: req.mode(),
        plan,
        script,
    })
}

fn reject(lifecycle: &mut RunLifecycle, err: RunError) -> RunError {
    tracing::info!(
        target: "txscope.engine",
        run_id = %lifecycle.run_id(),
        code = err.code(),
        field = err.field().unwrap_or(""),
        error = %err,
        "request rejected"
    );
    lifecycle.advance(RunState::Terminated(Termination::Failed(FailureKind::Rejected)));
    err
}

/// Spawns the planned command. The plan's workspace and `guard` are both
/// released once the process has been reaped.
pub fn start_run<G>(prepared: PreparedRun, opts: RunOptions, cancel: CancelHandle, guard: G) -> RunStream
where
    G: Send + 'static,
{
    let PreparedRun {
        run_id, mode, plan, ..
    } = prepared;
    let ToolPlan { command, workspace } = plan;

    let events = spawn_run(command, opts, cancel.clone(), (workspace, guard));
    RunStream {
        run_id,
        mode,
        events,
        cancel,
    }
}

/// The script a SIMULATE request would run, without running it.
pub fn preview_script(body: &RunRequestBody) -> Result<SynthesizedScript, RunError> {
    match validate(body)? {
        RunRequest::Simulate(sim) => Ok(synthesize(&sim)?),
        RunRequest::Trace(_) => Err(SynthesisError::NotSimulate.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ToolStatus;
    use crate::error::PlanError;
    use crate::request::{RunInputs, SimulateRequest, TraceRequest};
    use crate::runner::CommandSpec;
    use async_trait::async_trait;

    struct EchoBackend;

    #[async_trait]
    impl ToolBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn plan_trace(&self, _run_id: &str, req: &TraceRequest) -> Result<ToolPlan, PlanError> {
            Ok(ToolPlan::without_workspace(
                CommandSpec::new("echo").arg(req.tx_hash_hex()),
            ))
        }

        async fn plan_simulate(
            &self,
            _run_id: &str,
            _req: &SimulateRequest,
            script: &SynthesizedScript,
        ) -> Result<ToolPlan, PlanError> {
            Ok(ToolPlan::without_workspace(
                CommandSpec::new("cat").stdin(script.source.clone()),
            ))
        }

        fn preflight(&self) -> Vec<ToolStatus> {
            Vec::new()
        }
    }

    struct BrokenBackend;

    #[async_trait]
    impl ToolBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }

        async fn plan_trace(&self, _run_id: &str, _req: &TraceRequest) -> Result<ToolPlan, PlanError> {
            Err(PlanError::Config("no tool".into()))
        }

        async fn plan_simulate(
            &self,
            _run_id: &str,
            _req: &SimulateRequest,
            _script: &SynthesizedScript,
        ) -> Result<ToolPlan, PlanError> {
            Err(PlanError::Config("no tool".into()))
        }

        fn preflight(&self) -> Vec<ToolStatus> {
            Vec::new()
        }
    }

    fn trace_body() -> RunRequestBody {
        RunRequestBody {
            mode: "TRACE".into(),
            inputs: RunInputs {
                rpc_url: Some("https://rpc.example/eth".into()),
                tx_hash: Some(format!("0x{}", "ab".repeat(32))),
                ..Default::default()
            },
        }
    }

    fn simulate_body() -> RunRequestBody {
        RunRequestBody {
            mode: "SIMULATE".into(),
            inputs: RunInputs {
                rpc_url: Some("https://rpc.example/eth".into()),
                sender: Some("0xd8da6bf26964af9d7eed9e03e53415d37aa96045".into()),
                to: Some("0x7a250d5630b4cf539739df2c5dacb4c659f2488d".into()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn trace_skips_synthesis() {
        let mut lc = RunLifecycle::new("t1");
        let prepared = prepare_run(&trace_body(), &EchoBackend, &mut lc).await.unwrap();
        assert_eq!(prepared.mode, RunMode::Trace);
        assert!(prepared.script.is_none());
        assert_eq!(prepared.plan.command.program, "echo");
        assert_eq!(lc.state(), RunState::Running);
    }

    #[tokio::test]
    async fn simulate_carries_script() {
        let mut lc = RunLifecycle::new("s1");
        let prepared = prepare_run(&simulate_body(), &EchoBackend, &mut lc).await.unwrap();
        let script = prepared.script.unwrap();
        assert!(script.source.contains("contract SimulateTest"));
        assert_eq!(
            prepared.plan.command.stdin.as_deref(),
            Some(script.source.as_bytes())
        );
    }

    #[tokio::test]
    async fn validation_failure_terminates_lifecycle() {
        let mut body = simulate_body();
        body.inputs.should_deal_token = Some(true);
        body.inputs.amount = Some("1".into());
        body.inputs.spender = Some("0x000000000022d473030f116ddee9f6b43ac78ba3".into());

        let mut lc = RunLifecycle::new("v1");
        let err = prepare_run(&body, &EchoBackend, &mut lc).await.unwrap_err();
        assert_eq!(err.field(), Some("tokenAddress"));
        assert_eq!(
            lc.state(),
            RunState::Terminated(Termination::Failed(FailureKind::Rejected))
        );
    }

    #[tokio::test]
    async fn plan_failure_is_server_side() {
        let mut lc = RunLifecycle::new("p1");
        let err = prepare_run(&trace_body(), &BrokenBackend, &mut lc).await.unwrap_err();
        assert!(!err.is_client_error());
        assert!(lc.state().is_terminal());
    }

    #[tokio::test]
    async fn check_then_plan_matches_prepare() {
        let mut lc = RunLifecycle::new("c1");
        let checked = check_request(&simulate_body(), &mut lc).unwrap();
        assert_eq!(lc.state(), RunState::Validating);
        assert!(checked.script.is_some());

        let prepared = plan_run(checked, &EchoBackend, &mut lc).await.unwrap();
        assert_eq!(prepared.run_id, "c1");
        assert_eq!(prepared.plan.command.program, "cat");
        assert_eq!(lc.state(), RunState::Running);
    }

    #[tokio::test]
    async fn started_run_ends_with_finished() {
        let mut lc = RunLifecycle::new("e1");
        let prepared = prepare_run(&trace_body(), &EchoBackend, &mut lc).await.unwrap();
        let mut stream = start_run(prepared, RunOptions::default(), CancelHandle::new(), ());

        let mut last = None;
        while let Some(ev) = stream.events.recv().await {
            lc.observe(&ev);
            last = Some(ev);
        }
        assert!(matches!(last, Some(RunnerEvent::Finished(_))));
        assert!(lc.state().is_terminal());
    }

    #[test]
    fn preview_rejects_trace() {
        let err = preview_script(&trace_body()).unwrap_err();
        assert_eq!(err.code(), "SYNTHESIS_ERROR");
        assert!(preview_script(&simulate_body()).is_ok());
    }
}
