use std::process::ExitStatus;

use super::events::RunOutcome;

pub fn outcome_from_status(status: ExitStatus) -> RunOutcome {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return RunOutcome::Signaled { signal };
        }
    }
    RunOutcome::Exited {
        code: status.code().unwrap_or(1),
    }
}
