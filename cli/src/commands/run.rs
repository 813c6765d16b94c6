//! `txscope run`: one request, output streamed to stdout.
//!
//! Tool output goes to stdout byte for byte; the status trailer and logs go to
//! stderr so the output can be piped or redirected on its own.

use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::commands::cli::RunArgs;
use crate::commands::{read_request, report_rejection};
use txscope_core::api::{
    prepare_run, start_run, AppConfig, CancelHandle, CancelReason, CliError, RunLifecycle,
    RunOptions, RunnerEvent,
};

pub async fn handle_run(args: RunArgs, cfg: AppConfig) -> Result<i32, CliError> {
    let body = read_request(&args.request).await?;
    let backend = txscope_plugins::factory::build_backend(&cfg)?;

    let mut lifecycle = RunLifecycle::new(Uuid::new_v4().to_string());
    let prepared = match prepare_run(&body, backend.as_ref(), &mut lifecycle).await {
        Ok(prepared) => prepared,
        Err(e) if e.is_client_error() => return Ok(report_rejection(&e)),
        Err(e) => return Err(e.into()),
    };

    let cancel = CancelHandle::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(target: "txscope.engine", "interrupted, stopping run");
            on_interrupt.cancel(CancelReason::UserRequested);
        }
    });

    let mut run = start_run(prepared, RunOptions::from(&cfg.control), cancel.clone(), ());
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    let mut exit_code = 1;

    while let Some(event) = run.events.recv().await {
        lifecycle.observe(&event);
        match event {
            RunnerEvent::Started { .. } => {}
            RunnerEvent::Output(chunk) => {
                let written = async {
                    stdout.write_all(&chunk).await?;
                    stdout.flush().await
                };
                if let Err(e) = written.await {
                    // Reader went away (e.g. `| head`); stop the tool.
                    tracing::debug!(target: "txscope.engine", error = %e, "stdout closed");
                    cancel.cancel(CancelReason::ClientDisconnected);
                }
            }
            RunnerEvent::Finished(outcome) => {
                if cfg.control.status_trailer || outcome.must_report() {
                    stderr.write_all(&outcome.trailer()).await?;
                    stderr.flush().await?;
                }
                exit_code = outcome.exit_code();
            }
        }
    }

    interrupt.abort();
    tracing::info!(
        target: "txscope.engine",
        run_id = %run.run_id,
        state = %lifecycle.state(),
        exit_code,
        "run complete"
    );
    Ok(exit_code)
}
