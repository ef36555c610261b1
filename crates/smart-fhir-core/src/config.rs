use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::SmartError;
use crate::utils::mask::mask_optional;

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8900/cb";
pub const DEFAULT_SCOPE: &str = "openid profile user/*.*";
pub const DEFAULT_PATIENT_CLAIM: &str = "patient";
pub const DEFAULT_PROMPT: &str = "consent";

/// Environment variable names read by [`ConfigBuilder`]
pub mod env_keys {
    pub const AUTH_DOMAIN: &str = "AUTH0_DOMAIN";
    pub const CLIENT_ID: &str = "AUTH0_CLIENT_ID";
    pub const CLIENT_SECRET: &str = "AUTH0_CLIENT_SECRET";
    pub const REDIRECT_URI: &str = "AUTH0_REDIRECT_URI";
    pub const SCOPE: &str = "AUTH0_SCOPE";
    pub const PROMPT: &str = "AUTH0_PROMPT";
    pub const FHIR_BASE: &str = "FHIR_BASE";
    pub const FHIR_AUDIENCE: &str = "FHIR_AUDIENCE";
    pub const PATIENT_CLAIM: &str = "PATIENT_CLAIM_NS";
    pub const PATIENT_CLAIM_SOURCE: &str = "PATIENT_CLAIM_SOURCE";

    pub const ALL: &[&str] = &[
        AUTH_DOMAIN,
        CLIENT_ID,
        CLIENT_SECRET,
        REDIRECT_URI,
        SCOPE,
        PROMPT,
        FHIR_BASE,
        FHIR_AUDIENCE,
        PATIENT_CLAIM,
        PATIENT_CLAIM_SOURCE,
    ];
}

/// Which token is authoritative for the patient claim.
///
/// Exactly one token is consulted; there is no fallback from one to the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientTokenSource {
    #[default]
    IdToken,
    AccessToken,
}

impl PatientTokenSource {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "id_token" | "id" => Some(Self::IdToken),
            "access_token" | "access" => Some(Self::AccessToken),
            _ => None,
        }
    }
}

impl std::fmt::Display for PatientTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::IdToken => "id_token",
            Self::AccessToken => "access_token",
        };
        write!(f, "{name}")
    }
}

/// Loopback address the redirect URI points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl RedirectTarget {
    /// Split a registered redirect URI into host, port and path.
    ///
    /// Only plain `http` loopback-style URIs with an explicit host are accepted.
    pub fn parse(redirect_uri: &str) -> Result<Self, SmartError> {
        let url = url::Url::parse(redirect_uri).map_err(|e| {
            SmartError::invalid_config(format!("redirect URI '{redirect_uri}' is not a URL: {e}"))
        })?;

        if url.scheme() != "http" {
            return Err(SmartError::invalid_config(format!(
                "redirect URI '{redirect_uri}' must use http for a loopback listener"
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| {
                SmartError::invalid_config(format!("redirect URI '{redirect_uri}' has no host"))
            })?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let port = url.port_or_known_default().ok_or_else(|| {
            SmartError::invalid_config(format!("redirect URI '{redirect_uri}' has no port"))
        })?;

        Ok(Self {
            host,
            port,
            path: url.path().to_string(),
        })
    }

    pub fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Root of the loopback site, e.g. `http://127.0.0.1:8900/`
    pub fn origin(&self) -> String {
        format!("http://{}/", self.addr())
    }
}

/// Identity-provider and resource-server settings for one client registration
#[derive(Clone, Serialize, Deserialize)]
pub struct SmartConfig {
    /// Provider domain, either bare (`tenant.us.auth0.com`) or a full base URL
    pub auth_domain: String,
    pub client_id: String,
    /// Present for confidential clients; public clients rely on PKCE alone
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    /// Space-delimited scope string
    pub scope: String,
    /// Resource-server audience (the FHIR base URL for Auth0 tenants)
    pub audience: Option<String>,
    /// Extra `prompt` parameter on the authorization request
    pub prompt: Option<String>,
    pub fhir_base: Option<String>,
    pub patient_claim: String,
    pub patient_token: PatientTokenSource,
    pub redirect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl SmartConfig {
    pub fn new(auth_domain: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            auth_domain: auth_domain.into(),
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            audience: None,
            prompt: Some(DEFAULT_PROMPT.to_string()),
            fhir_base: None,
            patient_claim: DEFAULT_PATIENT_CLAIM.to_string(),
            patient_token: PatientTokenSource::default(),
            redirect_timeout_secs: 300,
            request_timeout_secs: 30,
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_prompt(mut self, prompt: Option<String>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_fhir_base(mut self, fhir_base: impl Into<String>) -> Self {
        self.fhir_base = Some(fhir_base.into());
        self
    }

    pub fn with_patient_claim(mut self, claim: impl Into<String>) -> Self {
        self.patient_claim = claim.into();
        self
    }

    pub fn with_patient_token(mut self, source: PatientTokenSource) -> Self {
        self.patient_token = source;
        self
    }

    pub fn with_redirect_timeout(mut self, timeout_secs: u64) -> Self {
        self.redirect_timeout_secs = timeout_secs;
        self
    }

    pub fn with_request_timeout(mut self, timeout_secs: u64) -> Self {
        self.request_timeout_secs = timeout_secs;
        self
    }

    /// Base URL of the identity provider, without trailing slash
    pub fn issuer_base(&self) -> String {
        let domain = self.auth_domain.trim().trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        }
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/authorize", self.issuer_base())
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.issuer_base())
    }

    pub fn redirect_target(&self) -> Result<RedirectTarget, SmartError> {
        RedirectTarget::parse(&self.redirect_uri)
    }

    pub fn redirect_timeout(&self) -> Duration {
        Duration::from_secs(self.redirect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn is_public_client(&self) -> bool {
        self.client_secret.as_deref().is_none_or(str::is_empty)
    }

    /// Validate the configuration before any network activity
    pub fn validate(&self) -> Result<(), SmartError> {
        if self.auth_domain.trim().is_empty() {
            return Err(SmartError::config_missing(env_keys::AUTH_DOMAIN));
        }

        if self.client_id.trim().is_empty() {
            return Err(SmartError::config_missing(env_keys::CLIENT_ID));
        }

        if self.redirect_uri.trim().is_empty() {
            return Err(SmartError::config_missing(env_keys::REDIRECT_URI));
        }

        self.redirect_target()?;

        url::Url::parse(&self.issuer_base()).map_err(|e| {
            SmartError::invalid_config(format!(
                "identity provider domain '{}' is not usable: {e}",
                self.auth_domain
            ))
        })?;

        if self.scope.trim().is_empty() {
            return Err(SmartError::invalid_config("scope must not be empty"));
        }

        if self.patient_claim.trim().is_empty() {
            return Err(SmartError::invalid_config(
                "patient claim name must not be empty",
            ));
        }

        if self.redirect_timeout_secs == 0 {
            return Err(SmartError::invalid_config(
                "redirect timeout must be greater than zero",
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for SmartConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartConfig")
            .field("auth_domain", &self.auth_domain)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &mask_optional(self.client_secret.as_deref()),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("audience", &self.audience)
            .field("prompt", &self.prompt)
            .field("fhir_base", &self.fhir_base)
            .field("patient_claim", &self.patient_claim)
            .field("patient_token", &self.patient_token)
            .field("redirect_timeout_secs", &self.redirect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Configuration builder for creating a [`SmartConfig`] from environment variables
pub struct ConfigBuilder;

impl ConfigBuilder {
    /// Create config from the process environment
    pub fn from_env() -> Result<SmartConfig, SmartError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<SmartConfig, SmartError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let auth_domain =
            get(env_keys::AUTH_DOMAIN).ok_or_else(|| SmartError::config_missing(env_keys::AUTH_DOMAIN))?;
        let client_id =
            get(env_keys::CLIENT_ID).ok_or_else(|| SmartError::config_missing(env_keys::CLIENT_ID))?;

        let mut config = SmartConfig::new(auth_domain, client_id);

        if let Some(secret) = get(env_keys::CLIENT_SECRET) {
            config = config.with_client_secret(secret);
        }

        if let Some(redirect_uri) = get(env_keys::REDIRECT_URI) {
            config = config.with_redirect_uri(redirect_uri);
        }

        if let Some(scope) = get(env_keys::SCOPE) {
            config = config.with_scope(scope);
        }

        if let Some(prompt) = lookup(env_keys::PROMPT) {
            // An explicitly empty prompt disables the parameter
            let prompt = prompt.trim().to_string();
            config = config.with_prompt((!prompt.is_empty()).then_some(prompt));
        }

        if let Some(fhir_base) = get(env_keys::FHIR_BASE) {
            config = config.with_fhir_base(fhir_base);
        }

        let audience = get(env_keys::FHIR_AUDIENCE).or_else(|| config.fhir_base.clone());
        if let Some(audience) = audience {
            config = config.with_audience(audience);
        }

        if let Some(claim) = get(env_keys::PATIENT_CLAIM) {
            config = config.with_patient_claim(claim);
        }

        if let Some(source) = get(env_keys::PATIENT_CLAIM_SOURCE) {
            let parsed = PatientTokenSource::parse(&source).ok_or_else(|| {
                SmartError::invalid_config(format!(
                    "{} must be 'id_token' or 'access_token', got '{source}'",
                    env_keys::PATIENT_CLAIM_SOURCE
                ))
            })?;
            config = config.with_patient_token(parsed);
        }

        config.validate()?;
        Ok(config)
    }
}
