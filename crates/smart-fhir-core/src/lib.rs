//! # smart-fhir-core
//!
//! Desktop-side SMART-on-FHIR authentication: OAuth 2.0 authorization code
//! flow with PKCE against an Auth0-style identity provider, a loopback
//! listener for the redirect, and a small FHIR reader for the resulting
//! bearer token.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smart_fhir_core::{ConfigBuilder, SharedSession, SmartAuth, BrowserLauncher, SmartError};
//! use tokio_util::sync::CancellationToken;
//!
//! struct PrintUrl;
//!
//! impl BrowserLauncher for PrintUrl {
//!     fn open(&self, url: &str) -> Result<(), SmartError> {
//!         println!("Open {url}");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SmartError> {
//!     let auth = SmartAuth::new(ConfigBuilder::from_env()?)?;
//!     let session = SharedSession::new();
//!
//!     auth.login_into(&session, &PrintUrl, &CancellationToken::new()).await?;
//!
//!     if let (Some(token), Some(patient)) = (session.bearer().await, session.patient_ref().await) {
//!         let fhir = auth.fhir_client()?;
//!         println!("{}", fhir.get_patient(&patient, &token).await?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`Result<T, SmartError>`](SmartError). A failed
//! login never modifies the [`SharedSession`]; the attempt can simply be
//! repeated (see [`SmartError::is_retryable`]).
//!
//! ## Patient context
//!
//! The patient identifier is read from an unverified JWT claim
//! ([`PatientClaimExtractor`]). Treat it as a hint for which record to load,
//! never as proof of authorization.

pub mod config;
pub mod error;
pub mod fhir;
pub mod flow;
pub mod oauth;
pub mod patient;
pub mod session;
pub mod utils;


pub use config::{ConfigBuilder, PatientTokenSource, RedirectTarget, SmartConfig};
pub use error::SmartError;
pub use fhir::{FhirClient, bundle_resources};
pub use flow::{BrowserLauncher, SmartAuth};
pub use oauth::{
    AuthorizationRequest, CallbackServer, PkceChallenge, RedirectResult, TokenExchangeClient,
    TokenResponse, await_redirect,
};
pub use patient::{PatientClaimExtractor, decode_claims};
pub use session::{Session, SharedSession};
pub use utils::mask::mask_token;

// Re-export test utilities for crate-level scenario tests
#[cfg(test)]
pub use utils::test_helpers;
