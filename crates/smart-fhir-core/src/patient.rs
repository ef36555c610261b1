//! Patient context extraction from JWT claims.
//!
//! Claims are read from the token payload WITHOUT verifying the signature.
//! The result is a display hint for choosing which Patient to fetch, not an
//! authorization decision; the FHIR server enforces access with the bearer
//! token itself.

use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use log::debug;
use serde_json::{Map, Value};

use crate::config::{DEFAULT_PATIENT_CLAIM, PatientTokenSource};
use crate::error::SmartError;
use crate::oauth::TokenResponse;

/// base64url that accepts payload segments with or without `=` padding
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode the payload segment of a JWT into its claim set.
pub fn decode_claims(token: &str) -> Result<Map<String, Value>, SmartError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(SmartError::malformed_token(format!(
            "expected 3 dot-separated segments, found {}",
            segments.len()
        )));
    }

    let payload = URL_SAFE_LENIENT
        .decode(segments[1])
        .map_err(|e| SmartError::malformed_token(format!("payload is not base64url: {e}")))?;

    match serde_json::from_slice::<Value>(&payload) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(SmartError::malformed_token("payload is not a JSON object")),
        Err(e) => Err(SmartError::malformed_token(format!(
            "payload is not JSON: {e}"
        ))),
    }
}

/// Reads the patient identifier from a configurable claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientClaimExtractor {
    claim: String,
}

impl Default for PatientClaimExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_PATIENT_CLAIM)
    }
}

impl PatientClaimExtractor {
    pub fn new(claim: impl Into<String>) -> Self {
        Self {
            claim: claim.into(),
        }
    }

    pub fn claim(&self) -> &str {
        &self.claim
    }

    /// Patient identifier carried by `token`, if any.
    ///
    /// Never fails: malformed tokens and missing or non-scalar claims yield `None`.
    pub fn extract(&self, token: &str) -> Option<String> {
        let claims = match decode_claims(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("No patient context: {e}");
                return None;
            }
        };

        match claims.get(&self.claim)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Extract from whichever token `source` names; the other token is ignored
    pub fn extract_from(
        &self,
        tokens: &TokenResponse,
        source: PatientTokenSource,
    ) -> Option<String> {
        match source {
            PatientTokenSource::IdToken => tokens.id_token.as_deref().and_then(|t| self.extract(t)),
            PatientTokenSource::AccessToken => self.extract(&tokens.access_token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_helpers::{jwt_with_claims, token_response};
    use serde_json::json;

    #[test]
    fn test_extract_string_claim() {
        let token = jwt_with_claims(&json!({"sub": "auth0|1", "patient": "123"}));
        assert_eq!(
            PatientClaimExtractor::default().extract(&token).as_deref(),
            Some("123")
        );
    }

    #[test]
    fn test_extract_numeric_claim() {
        let token = jwt_with_claims(&json!({"patient": 456}));
        assert_eq!(
            PatientClaimExtractor::default().extract(&token).as_deref(),
            Some("456")
        );
    }

    #[test]
    fn test_extract_namespaced_claim() {
        let claim = "https://fhir.example.com/claims/patient";
        let mut claims = serde_json::Map::new();
        claims.insert(claim.to_string(), json!("pat-9"));
        claims.insert("patient".to_string(), json!("other"));
        let token = jwt_with_claims(&Value::Object(claims));
        assert_eq!(
            PatientClaimExtractor::new(claim).extract(&token).as_deref(),
            Some("pat-9")
        );
    }

    #[test]
    fn test_missing_or_non_scalar_claim() {
        let extractor = PatientClaimExtractor::default();
        assert_eq!(extractor.extract(&jwt_with_claims(&json!({"sub": "x"}))), None);
        assert_eq!(
            extractor.extract(&jwt_with_claims(&json!({"patient": {"id": "1"}}))),
            None
        );
        assert_eq!(
            extractor.extract(&jwt_with_claims(&json!({"patient": ["1"]}))),
            None
        );
        assert_eq!(extractor.extract(&jwt_with_claims(&json!({"patient": ""}))), None);
    }

    #[test]
    fn test_short_tokens_yield_none() {
        let extractor = PatientClaimExtractor::default();
        assert_eq!(extractor.extract(""), None);
        assert_eq!(extractor.extract("a.b"), None);
        assert_eq!(extractor.extract("opaque-access-token"), None);
        assert_eq!(extractor.extract("a.b.c.d"), None);
    }

    #[test]
    fn test_decode_claims_errors() {
        assert!(matches!(
            decode_claims("a.b"),
            Err(SmartError::MalformedToken { .. })
        ));
        assert!(matches!(
            decode_claims("a.!!!.c"),
            Err(SmartError::MalformedToken { .. })
        ));
        // "WzFd" is base64 for "[1]"
        assert!(matches!(
            decode_claims("a.WzFd.c"),
            Err(SmartError::MalformedToken { .. })
        ));
    }

    #[test]
    fn test_decode_claims_tolerates_padding() {
        // {"patient":"12"} needs two padding characters
        let unpadded = "eyJwYXRpZW50IjoiMTIifQ";
        let padded = format!("{unpadded}==");
        let claims = decode_claims(&format!("h.{unpadded}.s")).unwrap();
        assert_eq!(claims["patient"], "12");
        assert_eq!(decode_claims(&format!("h.{padded}.s")).unwrap(), claims);
    }

    #[test]
    fn test_extract_from_honours_source_without_fallback() {
        let extractor = PatientClaimExtractor::default();
        let id_token = jwt_with_claims(&json!({"patient": "from-id"}));
        let access_token = jwt_with_claims(&json!({"patient": "from-access"}));

        let both = token_response(&access_token, Some(&id_token));
        assert_eq!(
            extractor
                .extract_from(&both, PatientTokenSource::IdToken)
                .as_deref(),
            Some("from-id")
        );
        assert_eq!(
            extractor
                .extract_from(&both, PatientTokenSource::AccessToken)
                .as_deref(),
            Some("from-access")
        );

        let access_only = token_response(&access_token, None);
        assert_eq!(
            extractor.extract_from(&access_only, PatientTokenSource::IdToken),
            None
        );
    }
}
