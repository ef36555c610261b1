//! Test utilities for driving the login flow without a real browser or provider
//!
//! The simulated browser plays the provider's role: it reads the authorization
//! URL it is asked to open and fires the redirect at the loopback listener.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::SmartError;
use crate::flow::BrowserLauncher;
use crate::oauth::TokenResponse;

/// Find a port that is free right now.
///
/// Binds an ephemeral port and drops the listener; racy, but fine for tests.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Send a bare HTTP/1.1 request and return the full response text
pub async fn send_raw_request(addr: SocketAddr, method: &str, target: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("{method} {target} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

/// Unsigned JWT (`alg: none`) carrying `claims` as its payload
pub fn jwt_with_claims(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

pub fn token_response(access_token: &str, id_token: Option<&str>) -> TokenResponse {
    TokenResponse {
        access_token: access_token.to_string(),
        id_token: id_token.map(str::to_string),
        token_type: "Bearer".to_string(),
        expires_in: None,
        scope: None,
    }
}

/// What the simulated provider sends back to the redirect URI
#[derive(Debug, Clone)]
pub enum SimulatedRedirect {
    /// `?code=…&state=<state from the authorization URL>`
    Approve { code: String },
    /// `?code=…&state=<something else>`
    WrongState { code: String, state: String },
    /// `?error=…&error_description=…`
    Deny { error: String, description: String },
    /// Never redirect
    Ignore,
}

/// Browser stand-in that records the URL it was asked to open
pub struct SimulatedBrowser {
    redirect: SimulatedRedirect,
    fail_to_open: bool,
    opened: Mutex<Vec<String>>,
}

impl SimulatedBrowser {
    pub fn new(redirect: SimulatedRedirect) -> Self {
        Self {
            redirect,
            fail_to_open: false,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn approving(code: &str) -> Self {
        Self::new(SimulatedRedirect::Approve {
            code: code.to_string(),
        })
    }

    /// Report a launch failure while still delivering the redirect
    pub fn failing_to_open(mut self) -> Self {
        self.fail_to_open = true;
        self
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    fn redirect_target(&self, authorize_url: &str) -> Option<String> {
        let url = url::Url::parse(authorize_url).unwrap();
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };
        let redirect_uri = param("redirect_uri").unwrap();
        let state = param("state").unwrap();

        let query = match &self.redirect {
            SimulatedRedirect::Approve { code } => {
                format!("code={}&state={}", urlencoding::encode(code), urlencoding::encode(&state))
            }
            SimulatedRedirect::WrongState { code, state } => {
                format!("code={}&state={}", urlencoding::encode(code), urlencoding::encode(state))
            }
            SimulatedRedirect::Deny { error, description } => format!(
                "error={}&error_description={}",
                urlencoding::encode(error),
                urlencoding::encode(description)
            ),
            SimulatedRedirect::Ignore => return None,
        };

        Some(format!("{redirect_uri}?{query}"))
    }
}

impl BrowserLauncher for SimulatedBrowser {
    fn open(&self, url: &str) -> Result<(), SmartError> {
        self.opened.lock().unwrap().push(url.to_string());

        if let Some(target) = self.redirect_target(url) {
            let target = url::Url::parse(&target).unwrap();
            let addr: SocketAddr = format!(
                "{}:{}",
                target.host_str().unwrap(),
                target.port_or_known_default().unwrap()
            )
            .parse()
            .unwrap();
            let request_target = format!("{}?{}", target.path(), target.query().unwrap_or(""));

            tokio::spawn(async move {
                send_raw_request(addr, "GET", &request_target).await;
            });
        }

        if self.fail_to_open {
            return Err(SmartError::browser("no display available"));
        }
        Ok(())
    }
}
