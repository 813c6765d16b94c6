//! Process runner behaviour against real `/bin/sh` children.
#![cfg(unix)]

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use txscope_core::backend::Workspace;
use txscope_core::cancel::{CancelHandle, CancelReason};
use txscope_core::runner::{spawn_run, CommandSpec, RunOptions, RunOutcome, RunnerEvent};

fn sh(script: &str) -> CommandSpec {
    CommandSpec::new("/bin/sh").arg("-c").arg(script)
}

fn opts() -> RunOptions {
    RunOptions {
        abort_grace: Duration::from_millis(300),
        max_run: Duration::from_secs(20),
        drain_timeout: Duration::from_millis(300),
        channel_capacity: 16,
    }
}

struct Collected {
    output: Vec<u8>,
    pid: Option<u32>,
    outcome: RunOutcome,
}

async fn collect(mut rx: mpsc::Receiver<RunnerEvent>) -> Collected {
    let mut output = Vec::new();
    let mut pid = None;
    loop {
        let ev = tokio::time::timeout(Duration::from_secs(15), rx.recv())
            .await
            .expect("runner stalled")
            .expect("channel closed without Finished");
        match ev {
            RunnerEvent::Started { pid: p } => pid = p,
            RunnerEvent::Output(bytes) => output.extend_from_slice(&bytes),
            RunnerEvent::Finished(outcome) => {
                assert!(rx.recv().await.is_none(), "events after Finished");
                return Collected {
                    output,
                    pid,
                    outcome,
                };
            }
        }
    }
}

/// Waits for the first output chunk and returns it with the pid.
async fn first_output(rx: &mut mpsc::Receiver<RunnerEvent>) -> (Option<u32>, Vec<u8>) {
    let mut pid = None;
    loop {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no output in time")
        {
            Some(RunnerEvent::Started { pid: p }) => pid = p,
            Some(RunnerEvent::Output(bytes)) => return (pid, bytes.to_vec()),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

/// Linux zombies still answer `kill -0`, so look at /proc instead.
fn is_alive(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(") ")
            .map(|(_, rest)| !rest.starts_with('Z'))
            .unwrap_or(false),
        Err(_) => false,
    }
}

async fn wait_dead(pid: u32) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while is_alive(pid) {
        assert!(Instant::now() < deadline, "process {pid} still alive");
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn multi_burst_output_keeps_production_order() {
    let rx = spawn_run(
        sh("printf 'one '; sleep 0.1; printf 'two ' >&2; sleep 0.1; printf 'three '; printf 'four' >&2"),
        opts(),
        CancelHandle::new(),
        (),
    );
    let done = collect(rx).await;
    assert_eq!(String::from_utf8(done.output).unwrap(), "one two three four");
    assert_eq!(done.outcome, RunOutcome::Exited { code: 0 });
    assert!(done.pid.is_some());
}

#[tokio::test]
async fn output_arrives_before_exit() {
    let mut rx = spawn_run(
        sh("echo early; sleep 2; echo late"),
        opts(),
        CancelHandle::new(),
        (),
    );
    let started = Instant::now();
    let (_, first) = first_output(&mut rx).await;
    assert_eq!(first, b"early\n");
    assert!(started.elapsed() < Duration::from_millis(1500));

    let rest = collect(rx).await;
    assert_eq!(rest.output, b"late\n");
}

#[tokio::test]
async fn non_zero_exit_is_reported() {
    let done = collect(spawn_run(
        sh("echo 'revert: boom' >&2; exit 3"),
        opts(),
        CancelHandle::new(),
        (),
    ))
    .await;
    assert_eq!(done.output, b"revert: boom\n");
    assert_eq!(done.outcome, RunOutcome::Exited { code: 3 });
}

#[tokio::test]
async fn spawn_failure_is_a_terminal_event() {
    let mut rx = spawn_run(
        CommandSpec::new("/nonexistent/txscope-tool"),
        opts(),
        CancelHandle::new(),
        (),
    );
    match rx.recv().await {
        Some(RunnerEvent::Finished(RunOutcome::SpawnFailed { program, .. })) => {
            assert_eq!(program, "/nonexistent/txscope-tool");
        }
        other => panic!("expected spawn failure, got {other:?}"),
    }
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn stdin_is_fed_and_closed() {
    let done = collect(spawn_run(
        CommandSpec::new("cat").stdin("contract SimulateTest {}"),
        opts(),
        CancelHandle::new(),
        (),
    ))
    .await;
    assert_eq!(done.output, b"contract SimulateTest {}");
    assert_eq!(done.outcome, RunOutcome::Exited { code: 0 });
}

#[tokio::test]
async fn cancel_terminates_within_grace() {
    let cancel = CancelHandle::new();
    let mut rx = spawn_run(sh("echo ready; sleep 30"), opts(), cancel.clone(), ());
    let (pid, _) = first_output(&mut rx).await;

    let t = Instant::now();
    assert!(cancel.cancel(CancelReason::UserRequested));
    assert!(!cancel.cancel(CancelReason::ClientDisconnected));
    let done = collect(rx).await;

    assert_eq!(
        done.outcome,
        RunOutcome::Cancelled {
            reason: CancelReason::UserRequested
        }
    );
    assert!(t.elapsed() < Duration::from_secs(2));
    wait_dead(pid.unwrap()).await;
}

#[tokio::test]
async fn term_ignoring_process_is_killed() {
    let cancel = CancelHandle::new();
    let mut rx = spawn_run(
        sh("trap '' TERM; echo ready; while :; do sleep 0.05; done"),
        opts(),
        cancel.clone(),
        (),
    );
    let (pid, _) = first_output(&mut rx).await;

    let t = Instant::now();
    cancel.cancel(CancelReason::UserRequested);
    let done = collect(rx).await;
    assert!(matches!(done.outcome, RunOutcome::Cancelled { .. }));
    assert!(t.elapsed() >= Duration::from_millis(300));
    assert!(t.elapsed() < Duration::from_secs(3));
    wait_dead(pid.unwrap()).await;
}

#[tokio::test]
async fn descendants_do_not_outlive_cancelled_run() {
    let cancel = CancelHandle::new();
    let mut rx = spawn_run(sh("sleep 30 & echo $!; wait"), opts(), cancel.clone(), ());
    let (_, line) = first_output(&mut rx).await;
    let grandchild: u32 = String::from_utf8(line).unwrap().trim().parse().unwrap();
    assert!(is_alive(grandchild));

    cancel.cancel(CancelReason::ClientDisconnected);
    collect(rx).await;
    wait_dead(grandchild).await;
}

#[tokio::test]
async fn background_writer_cannot_hold_stream_open() {
    let t = Instant::now();
    let done = collect(spawn_run(
        sh("(sleep 30; echo never) & echo done"),
        opts(),
        CancelHandle::new(),
        (),
    ))
    .await;
    assert_eq!(done.output, b"done\n");
    assert_eq!(done.outcome, RunOutcome::Exited { code: 0 });
    assert!(t.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn run_time_limit() {
    let mut o = opts();
    o.max_run = Duration::from_millis(300);
    let done = collect(spawn_run(sh("sleep 30"), o, CancelHandle::new(), ())).await;
    assert!(matches!(done.outcome, RunOutcome::TimedOut { .. }));
    wait_dead(done.pid.unwrap()).await;
}

#[tokio::test]
async fn dropped_receiver_cancels_run() {
    let cancel = CancelHandle::new();
    let mut rx = spawn_run(
        sh("while :; do echo tick; sleep 0.02; done"),
        opts(),
        cancel.clone(),
        (),
    );
    let (pid, _) = first_output(&mut rx).await;
    drop(rx);

    tokio::time::timeout(Duration::from_secs(3), cancel.cancelled())
        .await
        .expect("run not cancelled after receiver dropped");
    assert_eq!(cancel.reason(), Some(CancelReason::ClientDisconnected));
    wait_dead(pid.unwrap()).await;
}

#[tokio::test]
async fn dropped_receiver_cancels_silent_run() {
    let cancel = CancelHandle::new();
    let mut rx = spawn_run(sh("echo ready; exec sleep 30"), opts(), cancel.clone(), ());
    let (pid, first) = first_output(&mut rx).await;
    assert_eq!(first, b"ready\n");
    drop(rx);

    // Nothing else is ever written, so only the closed receiver can stop it.
    tokio::time::timeout(Duration::from_secs(1), cancel.cancelled())
        .await
        .expect("silent run not cancelled after receiver dropped");
    assert_eq!(cancel.reason(), Some(CancelReason::ClientDisconnected));
    wait_dead(pid.unwrap()).await;
}

#[tokio::test]
async fn concurrent_runs_are_isolated() {
    let a_cancel = CancelHandle::new();
    let mut a = spawn_run(
        sh("while :; do echo AAAA; sleep 0.02; done"),
        opts(),
        a_cancel.clone(),
        (),
    );
    let b = spawn_run(
        sh("for i in 1 2 3 4 5; do echo BBBB; sleep 0.05; done"),
        opts(),
        CancelHandle::new(),
        (),
    );

    first_output(&mut a).await;
    a_cancel.cancel(CancelReason::UserRequested);

    let (a_done, b_done) = tokio::join!(collect(a), collect(b));
    assert!(matches!(a_done.outcome, RunOutcome::Cancelled { .. }));
    assert!(!String::from_utf8_lossy(&a_done.output).contains('B'));

    assert_eq!(b_done.outcome, RunOutcome::Exited { code: 0 });
    assert_eq!(b_done.output, "BBBB\n".repeat(5).into_bytes());
}

#[tokio::test]
async fn workspace_is_removed_on_every_exit_path() {
    let root = tempfile::tempdir().unwrap();

    let ok_ws = Workspace::create(root.path(), "ok").await.unwrap();
    let ok_path = ok_ws.path().to_path_buf();
    collect(spawn_run(sh("exit 0"), opts(), CancelHandle::new(), ok_ws)).await;
    assert!(!ok_path.exists());

    let failed_ws = Workspace::create(root.path(), "spawn").await.unwrap();
    let failed_path = failed_ws.path().to_path_buf();
    collect(spawn_run(
        CommandSpec::new("/nonexistent/tool"),
        opts(),
        CancelHandle::new(),
        failed_ws,
    ))
    .await;
    assert!(!failed_path.exists());

    let cancel = CancelHandle::new();
    let cancelled_ws = Workspace::create(root.path(), "cancel").await.unwrap();
    let cancelled_path = cancelled_ws.path().to_path_buf();
    let mut rx = spawn_run(sh("echo up; sleep 30"), opts(), cancel.clone(), cancelled_ws);
    first_output(&mut rx).await;
    cancel.cancel(CancelReason::UserRequested);
    collect(rx).await;
    assert!(!cancelled_path.exists());
}

#[tokio::test]
async fn already_cancelled_run_never_spawns() {
    let cancel = CancelHandle::new();
    cancel.cancel(CancelReason::Shutdown);
    let mut rx = spawn_run(sh("echo nope"), opts(), cancel, ());
    match rx.recv().await {
        Some(RunnerEvent::Finished(RunOutcome::Cancelled { reason })) => {
            assert_eq!(reason, CancelReason::Shutdown)
        }
        other => panic!("unexpected {other:?}"),
    }
}
