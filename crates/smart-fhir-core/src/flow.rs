//! Interactive login orchestration.

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::SmartConfig;
use crate::error::SmartError;
use crate::fhir::FhirClient;
use crate::oauth::{
    AuthorizationRequest, CallbackServer, PkceChallenge, TokenExchangeClient, logout_url,
};
use crate::patient::PatientClaimExtractor;
use crate::session::{Session, SharedSession};

/// Opens the authorization URL for the user.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> Result<(), SmartError>;
}

/// SMART-on-FHIR login driver for one client registration.
pub struct SmartAuth {
    config: SmartConfig,
    extractor: PatientClaimExtractor,
    exchange: TokenExchangeClient,
}

impl SmartAuth {
    /// Validate `config` and prepare the token exchange client
    pub fn new(config: SmartConfig) -> Result<Self, SmartError> {
        config.validate()?;

        let extractor = PatientClaimExtractor::new(config.patient_claim.clone());
        let exchange = TokenExchangeClient::new(&config)?;

        Ok(Self {
            config,
            extractor,
            exchange,
        })
    }

    pub fn config(&self) -> &SmartConfig {
        &self.config
    }

    /// Run one complete login attempt and return the resulting session.
    ///
    /// The listener is bound before the browser is opened so the redirect
    /// cannot arrive early. Nothing outside this call observes partial state:
    /// on any error no session is produced.
    pub async fn login(
        &self,
        browser: &dyn BrowserLauncher,
        cancel: &CancellationToken,
    ) -> Result<Session, SmartError> {
        let target = self.config.redirect_target()?;

        let pkce = PkceChallenge::generate();
        let request = AuthorizationRequest::new(&self.config, &pkce);

        let server = CallbackServer::for_redirect(&target).await?;

        info!("Opening browser for login at {}", self.config.authorize_url());
        if let Err(e) = browser.open(&request.url()) {
            warn!("{e}; waiting for the redirect anyway");
        }

        info!(
            "Waiting for authorization redirect on {} (timeout: {}s)",
            server.redirect_uri(),
            self.config.redirect_timeout_secs
        );
        let redirect = server
            .wait_for_callback(self.config.redirect_timeout(), cancel)
            .await?;

        let code = redirect.verify_state(request.state())?;

        let tokens = self.exchange.exchange(&code, &pkce.verifier, cancel).await?;

        let session =
            Session::from_token_response(tokens, &self.extractor, self.config.patient_token);
        match session.patient_ref() {
            Some(patient) => info!("Login complete; patient context {patient}"),
            None => info!(
                "Login complete; no '{}' claim in {}",
                self.extractor.claim(),
                self.config.patient_token
            ),
        }

        Ok(session)
    }

    /// Log in and swap the shared session only if every step succeeded
    pub async fn login_into(
        &self,
        shared: &SharedSession,
        browser: &dyn BrowserLauncher,
        cancel: &CancellationToken,
    ) -> Result<Session, SmartError> {
        let session = self.login(browser, cancel).await?;
        shared.replace(session.clone()).await;
        Ok(session)
    }

    /// Forget the local session. Provider-side logout is [`Self::logout_url`].
    pub async fn logout(&self, shared: &SharedSession) {
        shared.clear().await;
        info!("Local session cleared");
    }

    /// Provider logout page that lands back on the loopback root afterwards
    pub fn logout_url(&self, federated: bool) -> Result<String, SmartError> {
        let origin = self.config.redirect_target()?.origin();
        Ok(logout_url(&self.config, Some(&origin), federated))
    }

    /// FHIR client for the configured base URL
    pub fn fhir_client(&self) -> Result<FhirClient, SmartError> {
        let base = self
            .config
            .fhir_base
            .as_deref()
            .ok_or_else(|| SmartError::config_missing(crate::config::env_keys::FHIR_BASE))?;
        FhirClient::new(base, self.config.request_timeout())
    }
}
