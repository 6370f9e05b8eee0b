use anyhow::Context as _;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
mod context;
mod dispatch;
mod error;
mod extract;
mod files;
mod gateway;
mod intent;
mod project;
mod render;
mod scaffold;
mod session;
mod shell;
#[cfg(test)]
mod testing;

#[derive(Parser, Debug, Clone)]
#[command(name = "phpa", version, about = "Interactive AI assistant for PHP projects, backed by a local Ollama model", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/php-assistant/config.toml)
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Ollama base URL
    #[arg(long = "host")]
    host: Option<String>,

    /// Model to use
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// Timeout (seconds) for generation requests
    #[arg(long = "timeout")]
    timeout_secs: Option<u64>,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable ANSI colors
    #[arg(long = "no-color")]
    no_color: bool,

    /// Extra arguments; command-line mode is not implemented, they are only echoed
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);
    if cli.no_color {
        render::disable_color();
    }

    if let Err(e) = run(cli).await {
        eprintln!("error: {:#}", e);
        if let Some(hint) = error::hint_for(&e) {
            eprintln!("hint: {}", hint);
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let overrides = config::Overrides { host: cli.host, model: cli.model, timeout_secs: cli.timeout_secs };
    let cfg = config::resolve_config(cli.config.as_deref(), &overrides)?;
    tracing::debug!(host = %cfg.backend.host, model = %cfg.backend.model, "configuration resolved");

    let gateway = gateway::Gateway::new(cfg.backend.clone()).context("building the HTTP client")?;
    let cwd = std::env::current_dir().context("reading the current directory")?;
    let mut session = session::Session::new(&cfg.app_name, &gateway, &shell::SystemShell, cwd);

    session.print_banner();
    if !cli.args.is_empty() {
        println!("Arguments received: {}", cli.args.join(" "));
        println!("Command-line mode is not implemented; starting the interactive session.");
    }
    session.run().await
}
