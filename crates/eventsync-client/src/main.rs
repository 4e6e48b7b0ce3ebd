//! eventsync CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use eventsync_client::cli::{Cli, Command, ConfigAction};
use eventsync_client::commands;
use eventsync_client::config::ClientConfig;
use eventsync_client::error::{ClientError, ClientResult};
use eventsync_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = match cli.command {
        Command::Run if cli.debug => TracingConfig::daemon().with_level(Level::DEBUG),
        Command::Run => TracingConfig::daemon(),
        _ => TracingConfig::cli(cli.debug),
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path).map_err(ClientError::Config)?,
        None => ClientConfig::load().map_err(ClientError::Config)?,
    };

    match cli.command {
        Command::Pull => commands::pull::run(&cli, &config).await,
        Command::Run => commands::run::run(&cli, &config).await,
        Command::Save { ref draft } => commands::save::run(&cli, &config, draft).await,
        Command::List { json } => commands::list::run(&cli, &config, json).await,
        Command::Config { ref action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config),
        },
    }
}
