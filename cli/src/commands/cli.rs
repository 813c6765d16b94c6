use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Stream transaction traces and simulations from Foundry")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ./txscope.toml when present).
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log level when RUST_LOG is unset (overrides `logging.level`).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    /// Reported by /health; random when omitted.
    #[arg(long)]
    pub session_id: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Request JSON as sent to POST /api/run; `-` reads stdin.
    #[arg(long, default_value = "-")]
    pub request: String,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ScriptArgs {
    /// SIMULATE request JSON; `-` reads stdin.
    #[arg(long, default_value = "-")]
    pub request: String,

    /// Print the script with its metadata as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the HTTP API.
    Serve(ServeArgs),
    /// Execute one request and stream its output to stdout.
    Run(RunArgs),
    /// Print the script a SIMULATE request would execute.
    Script(ScriptArgs),
}
