use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

/// Asks the process (and its group) to stop, waits up to `grace`, then kills.
/// Always reaps the child before returning.
pub(crate) async fn terminate(
    child: &mut Child,
    pid: Option<u32>,
    grace: Duration,
) -> Option<ExitStatus> {
    request_stop(child, pid);

    let status = match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            tracing::warn!(target: "txscope.runner", ?pid, error = %e, "wait after stop request failed");
            force_kill(child, pid).await
        }
        Err(_) => {
            tracing::warn!(
                target: "txscope.runner",
                ?pid,
                grace_ms = grace.as_millis() as u64,
                "process still alive after grace period, killing"
            );
            force_kill(child, pid).await
        }
    };

    sweep_group(pid);
    status
}

async fn force_kill(child: &mut Child, pid: Option<u32>) -> Option<ExitStatus> {
    sweep_group(pid);
    let _ = child.start_kill();
    child.wait().await.ok()
}

#[cfg(unix)]
fn request_stop(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        if signal_group(pid, libc::SIGTERM) {
            return;
        }
    }
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child, _pid: Option<u32>) {
    let _ = child.start_kill();
}

/// SIGKILLs whatever is left of the run's process group, e.g. compiler
/// subprocesses that outlived the tool.
#[cfg(unix)]
pub(crate) fn sweep_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        signal_group(pid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
pub(crate) fn sweep_group(_pid: Option<u32>) {}

/// The child is spawned as its own group leader, so its pid is the pgid.
#[cfg(unix)]
fn signal_group(pgid: u32, signal: libc::c_int) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return false;
    };
    if pgid <= 1 {
        return false;
    }
    // SAFETY: kill(2) has no memory-safety preconditions; a negative pid
    // addresses the process group only.
    unsafe { libc::kill(-pgid, signal) == 0 }
}
