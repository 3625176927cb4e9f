use anyhow::Result;
use clap::{Parser, Subcommand};
use poisonlab_app::{commands, AppConfig};
use poisonlab_policy::Variant;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "poisonlab", version, about = "MCP tool poisoning demo server")]
struct Cli {
    /// YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured variant
    #[arg(long, global = true)]
    variant: Option<Variant>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Print the published tool listing as JSON
    Tools,
    /// Print the access decision for a path
    Check { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(variant) = cli.variant {
        config.variant = variant;
    }
    config.validate()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => commands::serve::run(config).await,
        Command::Tools => commands::tools::run(&config),
        Command::Check { path } => commands::check::run(&config, &path),
    }
}
