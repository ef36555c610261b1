use anyhow::Result;
use clap::Args;
use smart_fhir_core::{Session, SharedSession, SmartAuth, SmartError};

use crate::args::CliConfig;
use crate::browser::SystemBrowser;
use crate::commands::{CtrlCGuard, build_auth, print_json, print_session};
use crate::output::{self, OutputLevel};
use crate::spinner::Spinner;

#[derive(Args)]
pub struct LoginArgs {
    /// Seconds to wait for the browser redirect
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print the authorization URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Fetch and print the Patient resource in context after signing in
    #[arg(long)]
    pub patient: bool,
}

impl LoginArgs {
    pub async fn run(&self, output_level: OutputLevel, cli_config: &CliConfig) -> Result<()> {
        let auth = build_auth(cli_config, self.timeout)?;
        let session = SharedSession::new();
        let browser = SystemBrowser::new(
            cli_config.config.open_browser && !self.no_browser,
            output_level,
        );

        let current = login_with_feedback(&auth, &session, &browser, output_level).await?;

        print_session(&current, output_level);

        if self.patient {
            let (Some(token), Some(patient)) = (current.access_token(), current.patient_ref())
            else {
                output::warning(
                    &format!(
                        "No '{}' claim in the {}; nothing to fetch",
                        auth.config().patient_claim,
                        auth.config().patient_token
                    ),
                    output_level,
                );
                return Ok(());
            };

            let fhir = auth.fhir_client()?;
            let resource = fhir.get_patient(patient, token).await?;
            print_json(&resource)?;
        }

        Ok(())
    }
}

/// Run one login attempt with a spinner; Ctrl-C cancels the wait.
pub async fn login_with_feedback(
    auth: &SmartAuth,
    session: &SharedSession,
    browser: &SystemBrowser,
    output_level: OutputLevel,
) -> Result<Session, SmartError> {
    let guard = CtrlCGuard::install();

    output::note(
        &format!(
            "Waiting up to {}s for the sign-in redirect (Ctrl-C to cancel)",
            auth.config().redirect_timeout_secs
        ),
        output_level,
    );

    let spinner = (output_level.show_user() && browser.launches())
        .then(|| Spinner::start("Waiting for sign-in", auth.config().redirect_timeout()));

    let result = auth.login_into(session, browser, guard.token()).await;
    if let Some(spinner) = spinner {
        spinner.stop().await;
    }

    if result.is_ok() {
        output::success("Signed in.", output_level);
    }
    result
}
