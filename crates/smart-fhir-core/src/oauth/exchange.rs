//! Authorization-code-for-token exchange.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::SmartConfig;
use crate::error::SmartError;
use crate::utils::mask::{mask_optional, mask_token, truncate_body};

/// Tokens returned by a successful exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub id_token: Option<String>,
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &mask_token(&self.access_token))
            .field("id_token", &mask_optional(self.id_token.as_deref()))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Raw token endpoint body; every field is checked before use
#[derive(Deserialize)]
struct RawTokenResponse {
    access_token: Option<String>,
    id_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
}

/// Token exchange request body.
#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    code: &'a str,
    redirect_uri: &'a str,
    client_id: &'a str,
    code_verifier: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
}

/// Client for the provider's token endpoint
pub struct TokenExchangeClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
}

impl TokenExchangeClient {
    pub fn new(config: &SmartConfig) -> Result<Self, SmartError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SmartError::network_with_source("Failed to build HTTP client", e))?;

        Ok(Self {
            http,
            token_url: config.token_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone().filter(|s| !s.is_empty()),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Trade an authorization code and its PKCE verifier for tokens.
    ///
    /// Issues exactly one request; failures are not retried.
    pub async fn exchange(
        &self,
        code: &str,
        code_verifier: &str,
        cancel: &CancellationToken,
    ) -> Result<TokenResponse, SmartError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(SmartError::Cancelled),
            result = self.send_exchange(code, code_verifier) => result,
        }
    }

    async fn send_exchange(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, SmartError> {
        let request_body = TokenRequest {
            grant_type: "authorization_code",
            code,
            redirect_uri: &self.redirect_uri,
            client_id: &self.client_id,
            code_verifier,
            client_secret: self.client_secret.as_deref(),
        };

        let body = serde_urlencoded::to_string(&request_body)
            .map_err(|e| SmartError::serialization("Failed to encode token request", e))?;

        debug!(
            "Exchanging authorization code at {} ({} client)",
            self.token_url,
            if self.client_secret.is_some() { "confidential" } else { "public" }
        );

        let response = self
            .http
            .post(&self.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!("Token endpoint returned HTTP {}", status.as_u16());
            return Err(SmartError::exchange_failed(
                Some(status.as_u16()),
                truncate_body(&text),
            ));
        }

        let token = Self::parse_token_body(&text)?;
        info!(
            "Token exchange succeeded: access_token={}, id_token={}",
            mask_token(&token.access_token),
            mask_optional(token.id_token.as_deref())
        );

        Ok(token)
    }

    fn parse_token_body(text: &str) -> Result<TokenResponse, SmartError> {
        let raw: RawTokenResponse = serde_json::from_str(text).map_err(|e| {
            SmartError::exchange_failed(None, format!("token response is not valid JSON: {e}"))
        })?;

        let access_token = raw
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                SmartError::exchange_failed(None, "token response has no access_token")
            })?;

        Ok(TokenResponse {
            access_token,
            id_token: raw.id_token.filter(|t| !t.is_empty()),
            token_type: raw.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_in: raw.expires_in,
            scope: raw.scope,
        })
    }
}
