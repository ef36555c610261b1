use anyhow::{Context, Result};
use etcetera::BaseStrategy;
use std::path::{Path, PathBuf};

use clap::Parser;

use crate::commands::Commands;
use crate::config::{self, Config};
use crate::constants::{BINARY_NAME, ENV_FILE_NAME};

// Example strings for after_long_help
const CLI_EXAMPLES: &str = r#"EXAMPLES:
  smart-fhir login                                # Sign in through the browser
  smart-fhir login --patient                      # Sign in and print the patient in context
  smart-fhir login --no-browser --timeout 120     # Print the URL instead of opening it
  smart-fhir shell                                # Interactive session (login, patients, observations)
  smart-fhir info                                 # Show resolved configuration
  smart-fhir --env-file ./tenant.env login        # Load provider settings from a file

ENVIRONMENT:
  AUTH0_DOMAIN, AUTH0_CLIENT_ID (required), AUTH0_CLIENT_SECRET, AUTH0_REDIRECT_URI,
  AUTH0_SCOPE, AUTH0_PROMPT, FHIR_BASE, FHIR_AUDIENCE, PATIENT_CLAIM_NS,
  PATIENT_CLAIM_SOURCE, SMART_FHIR_LOG"#;

pub struct CliConfig {
    pub config_base_path: PathBuf,
    pub data_base_path: PathBuf,
    pub config: Config,
}

impl CliConfig {
    pub fn load() -> Result<Self> {
        let strategy = etcetera::choose_base_strategy()
            .context("Unable to determine configuration directories")?;

        let config_base_path = strategy.config_dir().join(BINARY_NAME);
        let data_base_path = strategy.data_dir().join(BINARY_NAME);

        Self::load_from(config_base_path, data_base_path)
    }

    pub fn load_from(config_base_path: PathBuf, data_base_path: PathBuf) -> Result<Self> {
        let config = config::Config::load(&config_base_path)?;

        Ok(Self {
            config_base_path,
            data_base_path,
            config,
        })
    }
}

#[derive(Parser)]
#[command(author, version, long_about = None)]
#[command(about = "Sign in to a SMART-on-FHIR server and read patient data")]
#[command(name = BINARY_NAME)]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output (debug logging)
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Quiet output (only show errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Load provider settings from this dotenv file (default: ./.env if present)
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,
}

/// Seed the process environment from a dotenv file.
///
/// Variables already set in the environment take precedence. A missing
/// default `.env` is not an error; a missing explicit file is.
pub fn load_env_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    match explicit {
        Some(path) => dotenvy::from_path(path)
            .map(|_| Some(path.to_path_buf()))
            .with_context(|| format!("Failed to load environment file {}", path.display())),
        None => match dotenvy::from_filename(ENV_FILE_NAME) {
            Ok(path) => Ok(Some(path)),
            Err(e) if e.not_found() => Ok(None),
            Err(e) => Err(e).context("Failed to load .env"),
        },
    }
}
