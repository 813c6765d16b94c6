//! `txscope script`: prints the generated simulation test without running it.

use crate::commands::cli::ScriptArgs;
use crate::commands::{read_request, report_rejection};
use txscope_core::api::{preview_script, CliError};

pub async fn handle_script(args: ScriptArgs) -> Result<i32, CliError> {
    let body = read_request(&args.request).await?;
    let script = match preview_script(&body) {
        Ok(script) => script,
        Err(e) if e.is_client_error() => return Ok(report_rejection(&e)),
        Err(e) => return Err(e.into()),
    };

    if args.json {
        let out = serde_json::to_string_pretty(&script)
            .map_err(|e| CliError::Command(format!("cannot encode script: {e}")))?;
        println!("{out}");
    } else {
        print!("{}", script.source);
    }
    Ok(0)
}
