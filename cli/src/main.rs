use std::path::Path;

use clap::Parser;

mod commands;
mod http;
mod logging;

use commands::cli::{self, Commands};
use txscope_core::api::CliError;
use txscope_core::config;

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let args = cli::Args::parse();

    let mut cfg = config::load_from(args.config.as_deref().map(Path::new))?;
    if let Some(level) = args.log_level.clone() {
        cfg.logging.level = level;
    }
    let guard = logging::init(&cfg.logging)?;

    let code = match args.command {
        Commands::Serve(serve_args) => commands::serve::handle_serve(serve_args, cfg).await,
        Commands::Run(run_args) => commands::run::handle_run(run_args, cfg).await,
        Commands::Script(script_args) => commands::script::handle_script(script_args).await,
    };

    let code = match code {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            drop(guard);
            return Err(e);
        }
    };

    drop(guard);
    std::process::exit(code);
}
