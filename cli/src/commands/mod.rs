pub mod cli;
pub mod run;
pub mod script;
pub mod serve;

use tokio::io::AsyncReadExt;

use txscope_core::api::{CliError, RunError, RunRequestBody};

/// Reads a request body from `path`, or stdin for `-`.
pub(crate) async fn read_request(path: &str) -> Result<RunRequestBody, CliError> {
    let raw = if path == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        let path = shellexpand::tilde(path).into_owned();
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CliError::Command(format!("cannot read request file {path}: {e}")))?
    };
    serde_json::from_str(&raw).map_err(|e| CliError::Command(format!("invalid request JSON: {e}")))
}

/// Prints a rejected request the way the HTTP API reports it and returns the
/// exit code for usage errors.
pub(crate) fn report_rejection(err: &RunError) -> i32 {
    match err.field() {
        Some(field) => eprintln!("{}: {err} (field `{field}`)", err.code()),
        None => eprintln!("{}: {err}", err.code()),
    }
    2
}
