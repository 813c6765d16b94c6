mod events;
pub mod exit;
mod kill;
mod process;
mod spec;

pub use events::{FailureKind, RunOutcome, RunnerEvent, Termination};
pub use exit::outcome_from_status;
pub use process::{spawn_run, RunOptions};
pub use spec::CommandSpec;
