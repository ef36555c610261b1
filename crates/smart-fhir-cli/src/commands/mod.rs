use anyhow::Result;
use clap::Subcommand;
use smart_fhir_core::{ConfigBuilder, Session, SmartAuth, SmartError, mask_token};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::args::CliConfig;
use crate::output::{self, OutputLevel};

pub mod completions;
pub mod info;
pub mod login;
pub mod shell;

pub use completions::CompletionsArgs;
pub use info::InfoArgs;
pub use login::LoginArgs;
pub use shell::ShellArgs;

// Example strings for after_long_help
const LOGIN_EXAMPLES: &str = r#"EXAMPLES:
  smart-fhir login                         # Open the browser and wait for the redirect
  smart-fhir login --patient               # Also print the Patient resource in context
  smart-fhir login --no-browser            # Print the authorization URL instead
  smart-fhir login --timeout 60            # Give up after one minute"#;

const SHELL_EXAMPLES: &str = r#"EXAMPLES:
  smart-fhir shell                         # Start an interactive session
  smart-fhir shell --vi                    # Use vi key bindings"#;

const INFO_EXAMPLES: &str = r#"EXAMPLES:
  smart-fhir info                          # Show config paths and provider settings"#;

const COMPLETIONS_EXAMPLES: &str = r#"EXAMPLES:
  smart-fhir completions bash > ~/.bashrc  # Add bash completions
  smart-fhir completions zsh > ~/.zshrc    # Add zsh completions
  smart-fhir completions fish > ~/.config/fish/completions/smart-fhir.fish"#;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in through the browser and show the resulting session
    #[command(after_long_help = LOGIN_EXAMPLES)]
    Login(LoginArgs),
    /// Start an interactive session
    #[command(after_long_help = SHELL_EXAMPLES)]
    Shell(ShellArgs),
    /// Show configuration and system information
    #[command(after_long_help = INFO_EXAMPLES)]
    Info(InfoArgs),
    /// Generate shell completions
    #[command(after_long_help = COMPLETIONS_EXAMPLES)]
    Completions(CompletionsArgs),
}

/// Build the login driver from the environment plus local preferences
pub fn build_auth(cli_config: &CliConfig, redirect_timeout: Option<u64>) -> Result<SmartAuth> {
    let mut config = cli_config.config.apply(ConfigBuilder::from_env()?);
    if let Some(timeout) = redirect_timeout {
        config = config.with_redirect_timeout(timeout);
    }
    Ok(SmartAuth::new(config)?)
}

/// Cancels its token on Ctrl-C until dropped.
pub struct CtrlCGuard {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl CtrlCGuard {
    pub fn install() -> Self {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let handle = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("Ctrl-C received, cancelling login");
                trigger.cancel();
            }
        });

        Self { token, handle }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for CtrlCGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Print the current session without revealing tokens
pub fn print_session(session: &Session, output_level: OutputLevel) {
    if !session.is_authenticated() {
        output::note("Not signed in.", output_level);
        return;
    }

    output::heading("Session:", output_level);
    output::field(
        "access token",
        &mask_token(session.access_token().unwrap_or_default()),
        output_level,
    );
    output::field(
        "id token",
        &session.id_token().map(mask_token).unwrap_or_else(|| "none".to_string()),
        output_level,
    );

    match session.expires_in_secs() {
        Some(_) if session.is_expired() => output::warning("token has expired", output_level),
        Some(secs) => output::field("expires in", &format!("{secs}s"), output_level),
        None => output::field("expires in", "unknown", output_level),
    }

    match session.patient_ref() {
        Some(patient) => output::field("patient", &output::format_patient(patient), output_level),
        None => output::field("patient", "none in token", output_level),
    }
}

/// Print a library error with a hint on how to recover
pub fn report_error(err: &SmartError, output_level: OutputLevel) {
    let suggestion = match err {
        SmartError::ConfigMissing { name } => {
            Some(format!("Set {name} in the environment or in a .env file"))
        }
        SmartError::InvalidConfig { .. } => {
            Some(format!("Check the values shown by {}", output::format_command("smart-fhir info")))
        }
        SmartError::PortUnavailable { .. } => Some(
            "Another login may be in progress; finish it or change AUTH0_REDIRECT_URI".to_string(),
        ),
        SmartError::Timeout { .. } => {
            Some("No redirect arrived; run login again and finish signing in".to_string())
        }
        SmartError::StateMismatch => {
            Some("The redirect did not belong to this attempt; run login again".to_string())
        }
        SmartError::ExchangeFailed { .. } => Some(
            "The provider rejected the code; check the client settings and try again".to_string(),
        ),
        SmartError::Network { .. } => Some("Check your network connection".to_string()),
        SmartError::Fhir { status: 401, .. } => Some("Sign in again to refresh the token".to_string()),
        _ => None,
    };

    match suggestion {
        Some(suggestion) => output::error_with_suggestion(&err.to_string(), &suggestion, output_level),
        None => output::error(&err.to_string(), output_level),
    }
}

/// Pretty-print raw FHIR JSON on stdout
pub fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
