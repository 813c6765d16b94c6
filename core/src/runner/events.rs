use std::fmt;
use std::time::Duration;

use bytes::Bytes;

use crate::cancel::CancelReason;

/// What a running process reports to whoever consumes it.
///
/// A run always produces exactly one `Finished`, and it is the last event.
/// `Started` precedes any `Output`; it is absent when the spawn failed.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    Started { pid: Option<u32> },
    Output(Bytes),
    Finished(RunOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Exited { code: i32 },
    Signaled { signal: i32 },
    Cancelled { reason: CancelReason },
    TimedOut { after: Duration },
    SpawnFailed { program: String, error: String },
    StreamFailed { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Refused before anything was spawned (validation, synthesis, planning).
    Rejected,
    Runtime,
    TimedOut,
    Spawn,
    Stream,
}

/// Final state of a run as seen by the request state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Ok,
    Failed(FailureKind),
    Cancelled,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Ok => f.write_str("ok"),
            Termination::Failed(kind) => write!(f, "error({kind:?})"),
            Termination::Cancelled => f.write_str("cancelled"),
        }
    }
}

impl RunOutcome {
    pub fn termination(&self) -> Termination {
        match self {
            RunOutcome::Exited { code: 0 } => Termination::Ok,
            RunOutcome::Exited { .. } | RunOutcome::Signaled { .. } => {
                Termination::Failed(FailureKind::Runtime)
            }
            RunOutcome::Cancelled { .. } => Termination::Cancelled,
            RunOutcome::TimedOut { .. } => Termination::Failed(FailureKind::TimedOut),
            RunOutcome::SpawnFailed { .. } => Termination::Failed(FailureKind::Spawn),
            RunOutcome::StreamFailed { .. } => Termination::Failed(FailureKind::Stream),
        }
    }

    /// Process-style exit code for command-line callers.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Exited { code } => *code,
            RunOutcome::Signaled { signal } => 128 + signal,
            RunOutcome::Cancelled { .. } => 130,
            RunOutcome::TimedOut { .. } => 124,
            RunOutcome::SpawnFailed { .. } => 127,
            RunOutcome::StreamFailed { .. } => 1,
        }
    }

    /// Outcomes whose trailer is sent even when status trailers are turned
    /// off: every failure needs an explicit indicator in the stream, since the
    /// tool's own output may not say it failed. Success and cancellation
    /// stay silent.
    pub fn must_report(&self) -> bool {
        matches!(self.termination(), Termination::Failed(_))
    }

    /// One terminal line describing the outcome, ANSI-coloured like the tool
    /// output around it.
    pub fn trailer(&self) -> Bytes {
        let line = match self {
            RunOutcome::Exited { code: 0 } => paint(GREEN, "process exited with code 0"),
            RunOutcome::Exited { code } => {
                paint(RED, &format!("process exited with code {code}"))
            }
            RunOutcome::Signaled { signal } => {
                paint(RED, &format!("process terminated by signal {signal}"))
            }
            RunOutcome::Cancelled { reason } => {
                paint(YELLOW, &format!("run cancelled ({reason})"))
            }
            RunOutcome::TimedOut { after } => paint(
                RED,
                &format!("run exceeded {}s and was terminated", after.as_secs()),
            ),
            RunOutcome::SpawnFailed { program, error } => {
                paint(RED, &format!("failed to start `{program}`: {error}"))
            }
            RunOutcome::StreamFailed { error } => {
                paint(RED, &format!("output stream failed: {error}"))
            }
        };
        Bytes::from(line)
    }
}

const GREEN: &str = "32";
const RED: &str = "31";
const YELLOW: &str = "33";

fn paint(color: &str, text: &str) -> String {
    format!("\r\n\x1b[{color}m[txscope] {text}\x1b[0m\r\n")
}
