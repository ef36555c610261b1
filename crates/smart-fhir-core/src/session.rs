//! In-memory session state for the signed-in user.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

use crate::config::PatientTokenSource;
use crate::oauth::TokenResponse;
use crate::patient::PatientClaimExtractor;
use crate::utils::mask::mask_optional;

/// Tokens and patient context of the current login, if any.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    access_token: Option<String>,
    id_token: Option<String>,
    token_type: Option<String>,
    /// Milliseconds since the Unix epoch
    expires_at: Option<u64>,
    patient_ref: Option<String>,
}

impl Session {
    /// An empty, unauthenticated session
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a complete session from a successful token exchange
    pub fn from_token_response(
        tokens: TokenResponse,
        extractor: &PatientClaimExtractor,
        source: PatientTokenSource,
    ) -> Self {
        let patient_ref = extractor.extract_from(&tokens, source);
        let expires_at = tokens
            .expires_in
            .map(|secs| now_millis().saturating_add(secs.saturating_mul(1000)));

        Self {
            access_token: Some(tokens.access_token),
            id_token: tokens.id_token,
            token_type: Some(tokens.token_type),
            expires_at,
            patient_ref,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }

    pub fn patient_ref(&self) -> Option<&str> {
        self.patient_ref.as_deref()
    }

    /// True once the provider-declared lifetime has passed.
    ///
    /// Sessions without a declared lifetime never report expiry.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| now_millis() >= at)
    }

    /// Seconds until expiry, saturating at zero
    pub fn expires_in_secs(&self) -> Option<u64> {
        self.expires_at
            .map(|at| at.saturating_sub(now_millis()) / 1000)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &mask_optional(self.access_token.as_deref()))
            .field("id_token", &mask_optional(self.id_token.as_deref()))
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("patient_ref", &self.patient_ref)
            .finish()
    }
}

/// Session shared between the login flow (single writer) and readers.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<RwLock<Session>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a complete session in one step
    pub async fn replace(&self, session: Session) {
        *self.inner.write().await = session;
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    pub async fn snapshot(&self) -> Session {
        self.inner.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.read().await.is_authenticated()
    }

    /// Current access token, if signed in
    pub async fn bearer(&self) -> Option<String> {
        self.inner.read().await.access_token.clone()
    }

    pub async fn patient_ref(&self) -> Option<String> {
        self.inner.read().await.patient_ref.clone()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
