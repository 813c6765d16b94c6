use std::fmt;

use crate::runner::{RunnerEvent, Termination};

/// Per-request lifecycle. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Validating,
    Running,
    Streaming,
    Terminated(Termination),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Terminated(_))
    }

    fn allows(&self, next: &RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Idle, Validating) => true,
            (Validating, Running) => true,
            (Validating, Terminated(Termination::Failed(_))) => true,
            (Running, Streaming) => true,
            (Running, Terminated(_)) => true,
            (Streaming, Terminated(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::Validating => f.write_str("validating"),
            RunState::Running => f.write_str("running"),
            RunState::Streaming => f.write_str("streaming"),
            RunState::Terminated(t) => write!(f, "terminated({t})"),
        }
    }
}

#[derive(Debug)]
pub struct RunLifecycle {
    run_id: String,
    state: RunState,
}

impl RunLifecycle {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            state: RunState::Idle,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Moves to `next` if the transition is legal. Illegal transitions are
    /// logged and ignored, so a terminal state can never be left.
    pub fn advance(&mut self, next: RunState) -> bool {
        if !self.state.allows(&next) {
            tracing::warn!(
                target: "txscope.engine",
                run_id = %self.run_id,
                from = %self.state,
                to = %next,
                "ignoring illegal state transition"
            );
            return false;
        }
        tracing::debug!(
            target: "txscope.engine",
            run_id = %self.run_id,
            from = %self.state,
            to = %next,
            "state transition"
        );
        self.state = next;
        true
    }

    /// Follows the runner's event stream: the first event moves the run to
    /// `Streaming`, `Finished` terminates it.
    pub fn observe(&mut self, event: &RunnerEvent) {
        match event {
            RunnerEvent::Started { .. } | RunnerEvent::Output(_) => {
                if self.state == RunState::Running {
                    self.advance(RunState::Streaming);
                }
            }
            RunnerEvent::Finished(outcome) => {
                self.advance(RunState::Terminated(outcome.termination()));
            }
        }
    }
}
