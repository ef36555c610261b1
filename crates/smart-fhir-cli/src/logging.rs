//! Diagnostic logging setup.
//!
//! The core crate logs through the `log` facade; the subscriber installed here
//! picks those records up along with the CLI's own `tracing` events.

use anyhow::{Context, Result, anyhow};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoLocal;

use crate::constants::LOG_ENV_VAR;

/// Level used when neither `--verbose` nor the environment says otherwise
const DEFAULT_DIRECTIVE: &str = "warn";

const VERBOSE_DIRECTIVE: &str = "smart_fhir_core=debug,smart_fhir_cli=debug,info";

/// Filter directives from `SMART_FHIR_LOG`, falling back to the verbosity flag
fn directives(verbose: bool) -> String {
    match std::env::var(LOG_ENV_VAR) {
        Ok(directives) if !directives.trim().is_empty() => directives,
        _ if verbose => VERBOSE_DIRECTIVE.to_string(),
        _ => DEFAULT_DIRECTIVE.to_string(),
    }
}

/// Install the global subscriber, writing to stderr or to `log_file`.
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directives(verbose)))
        .with_target(true);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            builder
                .with_timer(ChronoLocal::rfc_3339())
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow!("Failed to initialize logging: {e}"))
        }
        None => builder
            .with_writer(std::io::stderr)
            .without_time()
            .try_init()
            .map_err(|e| anyhow!("Failed to initialize logging: {e}")),
    }
}
