//! Helpers for keeping credentials out of logs and error messages.

/// Number of leading characters of a token that may appear in logs
pub const MASK_PREFIX_LEN: usize = 8;

/// Maximum length of a response body carried inside an error
pub const DIAGNOSTIC_BODY_LIMIT: usize = 256;

/// Tokens shorter than this are hidden entirely; the prefix would give most of them away
const MIN_PARTIAL_MASK_LEN: usize = 2 * MASK_PREFIX_LEN;

/// Mask a bearer token as its first few characters followed by `…`.
///
/// Short tokens are fully hidden rather than echoed back.
pub fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return "<none>".to_string();
    }

    if token.chars().count() < MIN_PARTIAL_MASK_LEN {
        return "…".to_string();
    }

    let prefix: String = token.chars().take(MASK_PREFIX_LEN).collect();
    format!("{prefix}…")
}

/// Mask an optional token
pub fn mask_optional(token: Option<&str>) -> String {
    token.map(mask_token).unwrap_or_else(|| "<none>".to_string())
}

/// Truncate a response body for diagnostic purposes, respecting char boundaries.
pub fn truncate_body(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= DIAGNOSTIC_BODY_LIMIT {
        return body.to_string();
    }

    let truncated: String = body.chars().take(DIAGNOSTIC_BODY_LIMIT).collect();
    format!("{truncated}… (truncated)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_token_keeps_prefix() {
        assert_eq!(mask_token("eyJhbGciOiJSUzI1NiJ9.payload.sig"), "eyJhbGci…");
    }

    #[test]
    fn test_mask_token_hides_short_tokens() {
        assert_eq!(mask_token("abc"), "…");
        assert_eq!(mask_token("12345678"), "…");
        assert_eq!(mask_token("123456789"), "…");
        assert_eq!(mask_token("123456789abcdef"), "…");
        assert_eq!(mask_token("123456789abcdefg"), "12345678…");
        assert_eq!(mask_token(""), "<none>");
    }

    #[test]
    fn test_mask_optional() {
        assert_eq!(mask_optional(None), "<none>");
        assert_eq!(mask_optional(Some("tok_abcdefghijklm")), "tok_abcd…");
        assert_eq!(mask_optional(Some("tok_abcdefghij")), "…");
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("  short  "), "short");

        let long = "x".repeat(DIAGNOSTIC_BODY_LIMIT + 50);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("… (truncated)"));
        assert!(truncated.starts_with(&"x".repeat(DIAGNOSTIC_BODY_LIMIT)));
    }

    #[test]
    fn test_truncate_body_multibyte() {
        let long = "é".repeat(DIAGNOSTIC_BODY_LIMIT + 1);
        let truncated = truncate_body(&long);
        assert!(truncated.starts_with(&"é".repeat(DIAGNOSTIC_BODY_LIMIT)));
    }
}
