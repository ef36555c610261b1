use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use smart_fhir_core::SmartConfig;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::CONFIG_FILE_NAME;

/// Local preferences; identity-provider settings come from the environment
#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Seconds to wait for the browser redirect
    pub redirect_timeout_secs: u64,
    /// Seconds allowed for each token/FHIR request
    pub request_timeout_secs: u64,
    /// Launch the system browser automatically
    pub open_browser: bool,
    /// Append plain-text logs to this file
    pub log_file: Option<PathBuf>,
    /// Enable vim mode in the interactive shell
    pub vi_mode: bool,
    /// Shell `logout` also ends the upstream identity-provider session
    pub federated_logout: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redirect_timeout_secs: 300,
            request_timeout_secs: 30,
            open_browser: true,
            log_file: None,
            vi_mode: false,
            federated_logout: true,
        }
    }
}

impl Config {
    pub fn load(base_path: &Path) -> Result<Config> {
        let config_path = base_path.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            let default_config = Config::default();
            default_config.save(base_path)?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", config_path.display()))?;

        Ok(config)
    }

    pub fn save(&self, base_path: &Path) -> Result<()> {
        let config_path = base_path.join(CONFIG_FILE_NAME);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(config_path, content)?;
        Ok(())
    }

    /// Layer these preferences over an environment-sourced configuration
    pub fn apply(&self, config: SmartConfig) -> SmartConfig {
        config
            .with_redirect_timeout(self.redirect_timeout_secs)
            .with_request_timeout(self.request_timeout_secs)
    }
}
