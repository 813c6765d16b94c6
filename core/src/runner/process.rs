use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::io::ReaderStream;

use crate::cancel::{CancelHandle, CancelReason};
use crate::config::ControlConfig;
use crate::error::RunnerError;
use crate::util::preview;

use super::events::{RunOutcome, RunnerEvent};
use super::exit::outcome_from_status;
use super::kill::{sweep_group, terminate};
use super::spec::CommandSpec;

type OutputStream = BoxStream<'static, std::io::Result<Bytes>>;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub abort_grace: Duration,
    pub max_run: Duration,
    pub drain_timeout: Duration,
    pub channel_capacity: usize,
}

impl From<&ControlConfig> for RunOptions {
    fn from(cfg: &ControlConfig) -> Self {
        Self {
            abort_grace: Duration::from_millis(cfg.abort_grace_ms),
            max_run: Duration::from_secs(cfg.max_run_secs),
            drain_timeout: Duration::from_millis(cfg.drain_timeout_ms),
            channel_capacity: cfg.channel_capacity.max(1),
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from(&ControlConfig::default())
    }
}

/// Spawns `spec` on a background task and returns its event stream.
///
/// `guard` is dropped once the process has been reaped and before the final
/// `Finished` event is sent, so resources it owns (workspace, run slot) are
/// released on every exit path.
pub fn spawn_run<G>(
    spec: CommandSpec,
    opts: RunOptions,
    cancel: CancelHandle,
    guard: G,
) -> mpsc::Receiver<RunnerEvent>
where
    G: Send + 'static,
{
    let (tx, rx) = mpsc::channel(opts.channel_capacity);
    tokio::spawn(async move {
        let started = Instant::now();
        let outcome = drive(&spec, &opts, &cancel, &tx).await;
        drop(guard);

        match &outcome {
            RunOutcome::SpawnFailed { program, error } => {
                tracing::error!(target: "txscope.runner", program = %program, error = %error, "spawn failed");
            }
            other => {
                tracing::info!(
                    target: "txscope.runner",
                    outcome = ?other,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "run finished"
                );
            }
        }

        let _ = tx.send(RunnerEvent::Finished(outcome)).await;
    });
    rx
}

async fn drive(
    spec: &CommandSpec,
    opts: &RunOptions,
    cancel: &CancelHandle,
    tx: &mpsc::Sender<RunnerEvent>,
) -> RunOutcome {
    if let Some(reason) = cancel.reason() {
        return RunOutcome::Cancelled { reason };
    }

    let (mut child, mut output) = match spawn_child(spec) {
        Ok(spawned) => spawned,
        Err(RunnerError::Spawn { program, source }) => {
            return RunOutcome::SpawnFailed {
                program,
                error: source.to_string(),
            }
        }
        Err(e) => {
            return RunOutcome::SpawnFailed {
                program: spec.program.clone(),
                error: e.to_string(),
            }
        }
    };
    let pid = child.id();
    tracing::info!(
        target: "txscope.runner",
        ?pid,
        command = %spec.display_redacted(),
        "process started"
    );

    feed_stdin(&mut child, spec.stdin.clone());
    emit(tx, cancel, RunnerEvent::Started { pid }).await;

    let deadline = tokio::time::sleep(opts.max_run);
    tokio::pin!(deadline);
    // Armed once the process exits; bounds how long descendants holding the
    // pipe open can delay the end of the stream.
    let drain = tokio::time::sleep(Duration::MAX);
    tokio::pin!(drain);

    let mut status: Option<ExitStatus> = None;
    let mut eof = false;

    while !(eof && status.is_some()) {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                if let Some(status) = status {
                    sweep_group(pid);
                    return outcome_from_status(status);
                }
                let reason = cancel.reason().unwrap_or(CancelReason::Shutdown);
                tracing::info!(target: "txscope.runner", ?pid, reason = %reason, "cancelling process");
                terminate(&mut child, pid, opts.abort_grace).await;
                return RunOutcome::Cancelled { reason };
            }

            // A silent process never reaches `emit`, so watch the receiver too.
            _ = tx.closed() => {
                tracing::debug!(target: "txscope.runner", ?pid, "event receiver dropped");
                cancel.cancel(CancelReason::ClientDisconnected);
            }

            _ = &mut deadline, if status.is_none() => {
                tracing::warn!(target: "txscope.runner", ?pid, max_run_secs = opts.max_run.as_secs(), "run time limit reached");
                terminate(&mut child, pid, opts.abort_grace).await;
                return RunOutcome::TimedOut { after: opts.max_run };
            }

            chunk = output.next(), if !eof => match chunk {
                Some(Ok(bytes)) => {
                    tracing::trace!(
                        target: "txscope.runner",
                        ?pid,
                        len = bytes.len(),
                        head = %preview(&String::from_utf8_lossy(&bytes), 80),
                        "output"
                    );
                    emit(tx, cancel, RunnerEvent::Output(bytes)).await
                }
                Some(Err(e)) => {
                    tracing::error!(target: "txscope.runner", ?pid, error = %e, "reading process output failed");
                    if status.is_none() {
                        terminate(&mut child, pid, opts.abort_grace).await;
                    }
                    return RunOutcome::StreamFailed { error: e.to_string() };
                }
                None => eof = true,
            },

            res = child.wait(), if status.is_none() => match res {
                Ok(s) => {
                    tracing::debug!(target: "txscope.runner", ?pid, status = %s, "process exited");
                    status = Some(s);
                    drain.as_mut().reset(Instant::now() + opts.drain_timeout);
                }
                Err(e) => {
                    let err = RunnerError::Wait(e);
                    tracing::error!(target: "txscope.runner", ?pid, error = %err, "waiting for process failed");
                    terminate(&mut child, pid, opts.abort_grace).await;
                    return RunOutcome::StreamFailed { error: err.to_string() };
                }
            },

            _ = &mut drain, if status.is_some() && !eof => {
                tracing::warn!(target: "txscope.runner", ?pid, "output still open after exit, closing");
                sweep_group(pid);
                eof = true;
            }
        }
    }

    match status {
        Some(status) => outcome_from_status(status),
        None => RunOutcome::StreamFailed {
            error: "process status unavailable".into(),
        },
    }
}

/// Sends `event`, giving up as soon as the run is cancelled. A closed
/// receiver means nobody is listening any more, which cancels the run.
async fn emit(tx: &mpsc::Sender<RunnerEvent>, cancel: &CancelHandle, event: RunnerEvent) {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {}
        sent = tx.send(event) => {
            if sent.is_err() {
                cancel.cancel(CancelReason::ClientDisconnected);
            }
        }
    }
}

fn feed_stdin(child: &mut Child, input: Option<Bytes>) {
    let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) else {
        return;
    };
    tokio::spawn(async move {
        if let Err(e) = stdin.write_all(&input).await {
            tracing::debug!(target: "txscope.runner", error = %e, "child closed stdin early");
        }
        // stdin dropped here, signalling EOF
    });
}

fn spawn_child(spec: &CommandSpec) -> Result<(Child, OutputStream), RunnerError> {
    let spawn_err = |source: std::io::Error| RunnerError::Spawn {
        program: spec.program.clone(),
        source,
    };

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(&spec.envs)
        .kill_on_drop(true)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }

    #[cfg(unix)]
    {
        use std::os::fd::OwnedFd;
        use tokio::net::unix::pipe;

        // stdout and stderr share one pipe so the bytes keep the exact order
        // the process wrote them in.
        let (reader, writer) = std::io::pipe().map_err(spawn_err)?;
        let writer_err = writer.try_clone().map_err(spawn_err)?;
        cmd.process_group(0).stdout(writer).stderr(writer_err);

        let child = cmd.spawn().map_err(spawn_err)?;
        // Release the parent's copies of the write end so EOF follows exit.
        drop(cmd);

        let receiver =
            pipe::Receiver::from_owned_fd(OwnedFd::from(reader)).map_err(RunnerError::StreamIo)?;
        Ok((child, ReaderStream::new(receiver).boxed()))
    }

    #[cfg(not(unix))]
    {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(spawn_err)?;
        let missing = || RunnerError::StreamIo(std::io::Error::other("child output not captured"));
        let stdout = child.stdout.take().ok_or_else(missing)?;
        let stderr = child.stderr.take().ok_or_else(missing)?;
        let merged = futures::stream::select(ReaderStream::new(stdout), ReaderStream::new(stderr));
        Ok((child, merged.boxed()))
    }
}
