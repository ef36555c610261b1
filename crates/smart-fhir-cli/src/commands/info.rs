use anyhow::Result;
use clap::Args;
use smart_fhir_core::config::env_keys;
use smart_fhir_core::{ConfigBuilder, mask_token};

use crate::{args::CliConfig, constants::*, output::OutputLevel};

#[derive(Args)]
pub struct InfoArgs {
    // Info command has no arguments
}

/// How an environment variable is displayed
fn env_var_display(name: &str, value: Option<String>) -> String {
    match value {
        None => "None".to_string(),
        Some(v) if name == env_keys::CLIENT_SECRET => mask_token(&v),
        Some(v) => v,
    }
}

impl InfoArgs {
    pub async fn run(&self, output_level: OutputLevel, cli_config: &CliConfig) -> Result<()> {
        let config_path = cli_config.config_base_path.join(CONFIG_FILE_NAME);
        let history_path = cli_config.data_base_path.join(HISTORY_FILE_NAME);

        crate::output::note(
            &format!("config file: {}", config_path.display()),
            output_level,
        );
        crate::output::note(
            &format!("shell history: {}", history_path.display()),
            output_level,
        );
        if let Some(log_file) = &cli_config.config.log_file {
            crate::output::note(&format!("log file: {}", log_file.display()), output_level);
        }

        crate::output::heading("\nEnv Vars:", output_level);
        for name in env_keys::ALL {
            let value = std::env::var(name).ok().filter(|v| !v.is_empty());
            crate::output::note(
                &format!("{name} = {}", env_var_display(name, value)),
                output_level,
            );
        }

        crate::output::heading("\nResolved:", output_level);
        match ConfigBuilder::from_env() {
            Ok(config) => {
                let config = cli_config.config.apply(config);
                crate::output::note(
                    &format!("authorize endpoint: {}", config.authorize_url()),
                    output_level,
                );
                crate::output::note(
                    &format!("token endpoint: {}", config.token_url()),
                    output_level,
                );
                crate::output::note(
                    &format!(
                        "client type: {}",
                        if config.is_public_client() { "public (PKCE only)" } else { "confidential" }
                    ),
                    output_level,
                );
                crate::output::note(
                    &format!(
                        "patient claim: '{}' from {}",
                        config.patient_claim, config.patient_token
                    ),
                    output_level,
                );
                crate::output::note(
                    &format!(
                        "timeouts: redirect {}s, requests {}s",
                        config.redirect_timeout_secs, config.request_timeout_secs
                    ),
                    output_level,
                );
            }
            Err(e) => crate::output::warning(&e.to_string(), output_level),
        }

        crate::output::heading("\nVersion info:", output_level);
        crate::output::note(
            &format!("version: {}", env!("CARGO_PKG_VERSION")),
            output_level,
        );

        Ok(())
    }
}
