use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cpm_cli::{Cli, Commands, CpmConfig};
use tracing::{debug, error};
use tracing_subscriber::FmtSubscriber;

mod commands;

fn run(cli: &Cli, config: &CpmConfig) -> Result<()> {
    match &cli.command {
        Commands::Clear {
            generators,
            demands,
            run,
        } => commands::clear::handle(generators, demands, run, config),
        Commands::Demo { run } => commands::demo::handle(run, config),
        Commands::Config { command } => commands::config::handle(command, config),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match CpmConfig::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    let level = match cli.log_level {
        Some(level) => level,
        None => match config.log_level() {
            Ok(level) => level,
            Err(e) => {
                eprintln!("error: {e:#}");
                return ExitCode::FAILURE;
            }
        },
    };

    // Logs go to stderr so JSON on stdout stays machine-readable.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: could not install log subscriber: {e}");
    }
    debug!(?config, "resolved configuration");

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
