//! Authorization request construction.

use rand::RngCore;

use super::PkceChallenge;
use crate::config::SmartConfig;

/// Parameters of a single authorization request.
///
/// Built once per login attempt; the `state` it carries is what the redirect
/// must echo back.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    endpoint: String,
    client_id: String,
    redirect_uri: String,
    scope: String,
    audience: Option<String>,
    prompt: Option<String>,
    state: String,
    challenge: String,
    challenge_method: &'static str,
}

impl AuthorizationRequest {
    pub fn new(config: &SmartConfig, pkce: &PkceChallenge) -> Self {
        Self {
            endpoint: config.authorize_url(),
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
            audience: config.audience.clone(),
            prompt: config.prompt.clone(),
            state: generate_state(),
            challenge: pkce.challenge.clone(),
            challenge_method: pkce.method(),
        }
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// Render the full authorization URL with every value percent-encoded
    pub fn url(&self) -> String {
        let mut url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}",
            self.endpoint,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scope),
        );

        if let Some(audience) = &self.audience {
            url.push_str(&format!("&audience={}", urlencoding::encode(audience)));
        }

        url.push_str(&format!(
            "&code_challenge={}&code_challenge_method={}&state={}",
            urlencoding::encode(&self.challenge),
            self.challenge_method,
            urlencoding::encode(&self.state),
        ));

        if let Some(prompt) = &self.prompt {
            url.push_str(&format!("&prompt={}", urlencoding::encode(prompt)));
        }

        url
    }
}

/// Build the authorization URL and return it with the `state` to expect back.
pub fn build(config: &SmartConfig, pkce: &PkceChallenge) -> (String, String) {
    let request = AuthorizationRequest::new(config, pkce);
    (request.url(), request.state)
}

/// Generate a random state string for CSRF protection.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Provider-side logout page, optionally redirecting to `return_to` afterwards.
///
/// `federated` also signs the user out of an upstream identity provider.
pub fn logout_url(config: &SmartConfig, return_to: Option<&str>, federated: bool) -> String {
    let mut url = format!(
        "{}/v2/logout?client_id={}",
        config.issuer_base(),
        urlencoding::encode(&config.client_id)
    );

    if let Some(return_to) = return_to {
        url.push_str(&format!("&returnTo={}", urlencoding::encode(return_to)));
    }

    if federated {
        url.push_str("&federated");
    }

    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_pairs(url: &str) -> Vec<(String, String)> {
        url::Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn param(pairs: &[(String, String)], key: &str) -> Option<String> {
        pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    #[test]
    fn test_build_contains_every_parameter() {
        let config = SmartConfig::new("tenant.us.auth0.com", "client-123")
            .with_audience("https://fhir.example.com/r4");
        let pkce = PkceChallenge::generate();

        let (url, state) = build(&config, &pkce);
        assert!(url.starts_with("https://tenant.us.auth0.com/authorize?"));

        let pairs = query_pairs(&url);
        assert_eq!(param(&pairs, "response_type").as_deref(), Some("code"));
        assert_eq!(param(&pairs, "client_id").as_deref(), Some("client-123"));
        assert_eq!(
            param(&pairs, "redirect_uri").as_deref(),
            Some("http://127.0.0.1:8900/cb")
        );
        assert_eq!(
            param(&pairs, "scope").as_deref(),
            Some("openid profile user/*.*")
        );
        assert_eq!(
            param(&pairs, "audience").as_deref(),
            Some("https://fhir.example.com/r4")
        );
        assert_eq!(param(&pairs, "code_challenge"), Some(pkce.challenge.clone()));
        assert_eq!(
            param(&pairs, "code_challenge_method").as_deref(),
            Some("S256")
        );
        assert_eq!(param(&pairs, "state"), Some(state));
        assert_eq!(param(&pairs, "prompt").as_deref(), Some("consent"));
    }

    #[test]
    fn test_values_are_percent_encoded() {
        let config = SmartConfig::new("tenant.us.auth0.com", "client-123");
        let pkce = PkceChallenge::generate();
        let (url, _) = build(&config, &pkce);

        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8900%2Fcb"));
        assert!(url.contains("scope=openid%20profile%20user%2F%2A.%2A"));
        assert!(!url.contains("code_verifier"));
        assert!(!url.contains(&pkce.verifier));
    }

    #[test]
    fn test_optional_parameters_omitted() {
        let config = SmartConfig::new("tenant.us.auth0.com", "client-123").with_prompt(None);
        let pkce = PkceChallenge::generate();
        let (url, _) = build(&config, &pkce);

        let pairs = query_pairs(&url);
        assert!(param(&pairs, "audience").is_none());
        assert!(param(&pairs, "prompt").is_none());
    }

    #[test]
    fn test_state_is_fresh_per_request() {
        let config = SmartConfig::new("tenant.us.auth0.com", "client-123");
        let pkce = PkceChallenge::generate();

        let (_, first) = build(&config, &pkce);
        let (_, second) = build(&config, &pkce);
        assert_ne!(first, second);
        assert_eq!(first.len(), 32);
    }

    #[test]
    fn test_logout_url() {
        let config = SmartConfig::new("tenant.us.auth0.com", "client-123");
        assert_eq!(
            logout_url(&config, None, false),
            "https://tenant.us.auth0.com/v2/logout?client_id=client-123"
        );
        assert_eq!(
            logout_url(&config, Some("http://127.0.0.1:8900/"), false),
            "https://tenant.us.auth0.com/v2/logout?client_id=client-123&returnTo=http%3A%2F%2F127.0.0.1%3A8900%2F"
        );
        assert_eq!(
            logout_url(&config, Some("http://127.0.0.1:8900/"), true),
            "https://tenant.us.auth0.com/v2/logout?client_id=client-123&returnTo=http%3A%2F%2F127.0.0.1%3A8900%2F&federated"
        );
    }
}
