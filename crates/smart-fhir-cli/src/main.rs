// Binary entry point for smart-fhir-cli

mod args;
mod browser;
mod commands;
mod config;
mod constants;
mod logging;
mod output;
mod spinner;

use anyhow::Result;
use args::{Cli, CliConfig, load_env_file};
use clap::{CommandFactory, Parser};
use commands::Commands;
use output::OutputLevel;
use smart_fhir_core::SmartError;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        match e.downcast_ref::<SmartError>() {
            Some(err) => commands::report_error(err, OutputLevel::Normal),
            None => output::error(&format!("{e:#}"), OutputLevel::Normal),
        }
        std::process::exit(1);
    }
}

/// Parse CLI arguments, load configuration and dispatch to the requested
/// sub-command.
pub async fn run() -> Result<()> {
    // Enable shell completion generation when the user sets COMPLETE=fish etc.
    clap_complete::CompleteEnv::with_factory(Cli::command).complete();
    let cli = Cli::parse();

    let output_level = if cli.quiet {
        OutputLevel::Quiet
    } else if cli.verbose {
        OutputLevel::Verbose
    } else {
        OutputLevel::Normal
    };

    if let Commands::Completions(args) = &cli.command {
        return args.run();
    }

    let cli_config = CliConfig::load()?;

    // Before logging, so SMART_FHIR_LOG may come from .env too
    let env_file = load_env_file(cli.env_file.as_deref())?;

    let log_file = cli.log_file.as_deref().or(cli_config.config.log_file.as_deref());
    logging::init(cli.verbose, log_file)?;

    if let Some(path) = env_file {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    match &cli.command {
        Commands::Login(args) => args.run(output_level, &cli_config).await?,
        Commands::Shell(args) => args.run(output_level, &cli_config).await?,
        Commands::Info(args) => args.run(output_level, &cli_config).await?,
        Commands::Completions(args) => args.run()?,
    }

    Ok(())
}
