mod run;
mod state;

pub use run::{
    check_request, plan_run, prepare_run, preview_script, start_run, CheckedRun, PreparedRun,
    RunStream,
};
pub use state::{RunLifecycle, RunState};
