use std::time::Duration;
use thiserror::Error;

/// Main error type for the SMART-on-FHIR client
#[derive(Error, Debug)]
pub enum SmartError {
    /// A required identity-provider setting is absent
    #[error("Missing configuration: {name} is not set")]
    ConfigMissing { name: String },

    /// A setting is present but unusable (e.g. a redirect URI without a port)
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The loopback listener could not claim its port
    #[error("Loopback port unavailable at {addr}")]
    PortUnavailable {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// No redirect arrived before the deadline
    #[error("No authorization redirect received within {duration:?}")]
    Timeout { duration: Duration },

    /// The caller aborted the attempt
    #[error("Login attempt cancelled")]
    Cancelled,

    /// Redirect `state` did not match the value issued with the authorization request
    #[error("State mismatch in authorization redirect (possible CSRF or stale redirect)")]
    StateMismatch,

    /// The provider redirected back with `error`/`error_description`
    #[error("Provider returned {error}: {}", .description.as_deref().unwrap_or("no description"))]
    ProviderError {
        error: String,
        description: Option<String>,
    },

    /// The redirect carried neither a code nor an error
    #[error("Invalid authorization redirect: {message}")]
    InvalidRedirect { message: String },

    /// Token endpoint rejected the exchange or returned an unusable body
    #[error("Token exchange failed{}: {detail}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    ExchangeFailed { status: Option<u16>, detail: String },

    /// A JWT-shaped string could not be decoded
    #[error("Malformed token: {reason}")]
    MalformedToken { reason: String },

    /// Transport-level failures talking to the provider or FHIR server
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Socket errors on an already-bound listener
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// FHIR server returned a non-success status
    #[error("FHIR request failed (HTTP {status}): {detail}")]
    Fhir { status: u16, detail: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The system browser could not be launched
    #[error("Failed to open browser: {message}")]
    Browser { message: String },
}

impl SmartError {
    /// Create a missing-configuration error
    pub fn config_missing(name: impl Into<String>) -> Self {
        Self::ConfigMissing { name: name.into() }
    }

    /// Create an invalid-configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a port-unavailable error
    pub fn port_unavailable(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::PortUnavailable {
            addr: addr.into(),
            source,
        }
    }

    /// Create a timeout error
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Create a provider error from redirect parameters
    pub fn provider(error: impl Into<String>, description: Option<String>) -> Self {
        Self::ProviderError {
            error: error.into(),
            description,
        }
    }

    /// Create an invalid-redirect error
    pub fn invalid_redirect(message: impl Into<String>) -> Self {
        Self::InvalidRedirect {
            message: message.into(),
        }
    }

    /// Create an exchange error
    pub fn exchange_failed(status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::ExchangeFailed {
            status,
            detail: detail.into(),
        }
    }

    /// Create a malformed-token error
    pub fn malformed_token(reason: impl Into<String>) -> Self {
        Self::MalformedToken {
            reason: reason.into(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a FHIR error
    pub fn fhir(status: u16, detail: impl Into<String>) -> Self {
        Self::Fhir {
            status,
            detail: detail.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Serialization {
            message: message.into(),
            source: source.into(),
        }
    }

    /// Create a browser error
    pub fn browser(message: impl Into<String>) -> Self {
        Self::Browser {
            message: message.into(),
        }
    }

    /// Check whether the user can simply try the login again
    pub fn is_retryable(&self) -> bool {
        match self {
            SmartError::PortUnavailable { .. }
            | SmartError::Timeout { .. }
            | SmartError::Cancelled
            | SmartError::StateMismatch
            | SmartError::ProviderError { .. }
            | SmartError::InvalidRedirect { .. }
            | SmartError::ExchangeFailed { .. }
            | SmartError::Network { .. } => true,
            SmartError::Fhir { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Check whether the error stems from configuration rather than the attempt itself
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            SmartError::ConfigMissing { .. } | SmartError::InvalidConfig { .. }
        )
    }
}

/// Convert from reqwest errors
impl From<reqwest::Error> for SmartError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SmartError::network_with_source("Request timed out", err)
        } else if err.is_connect() {
            SmartError::network_with_source("Connection failed", err)
        } else {
            SmartError::network_with_source("HTTP request failed", err)
        }
    }
}

/// Convert from serde_json errors
impl From<serde_json::Error> for SmartError {
    fn from(err: serde_json::Error) -> Self {
        SmartError::serialization("JSON serialization failed", err)
    }
}
