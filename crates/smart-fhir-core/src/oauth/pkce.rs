//! PKCE (Proof Key for Code Exchange) for the authorization code flow.
//!
//! Implements the S256 method of RFC 7636.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Random bytes behind each verifier; encodes to 86 characters
const VERIFIER_BYTES: usize = 64;

/// Verifier/challenge pair for one login attempt.
#[derive(Clone)]
pub struct PkceChallenge {
    /// Secret sent only with the token request
    pub verifier: String,
    /// Derived value sent with the authorization request
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a fresh pair from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut verifier_bytes = [0u8; VERIFIER_BYTES];
        rand::rng().fill_bytes(&mut verifier_bytes);

        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);
        let challenge = Self::challenge_for(&verifier);

        Self {
            verifier,
            challenge,
        }
    }

    /// `base64url_nopad(SHA-256(verifier))`
    pub fn challenge_for(verifier: &str) -> String {
        let hash = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hash)
    }

    /// Check a verifier against a previously issued challenge
    pub fn verify(verifier: &str, challenge: &str) -> bool {
        Self::challenge_for(verifier) == challenge
    }

    /// The challenge method (always "S256").
    pub fn method(&self) -> &'static str {
        "S256"
    }
}

impl std::fmt::Debug for PkceChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceChallenge")
            .field("verifier", &"<redacted>")
            .field("challenge", &self.challenge)
            .finish()
    }
}
