//! Loopback HTTP listener for the authorization redirect.
//!
//! Binds the host/port of the registered redirect URI, waits for exactly one
//! GET on the redirect path, answers it with a small HTML page and hands the
//! query parameters back to the caller.

use log::{debug, info, warn};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, lookup_host};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::RedirectTarget;
use crate::error::SmartError;

/// Upper bound on the request head we are willing to buffer
const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// How long a single connection may take to send its request line
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Connections read concurrently before accepting pauses
const MAX_PENDING_CONNECTIONS: usize = 32;

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Login complete</title></head>
<body style="font-family: system-ui; text-align: center; margin-top: 20vh;">
<h2>You may now close this tab.</h2>
<p>Return to the application to continue.</p>
</body>
</html>"#;

/// Query parameters carried by the provider's redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectResult {
    Code {
        code: String,
        state: Option<String>,
    },
    Error {
        error: String,
        description: Option<String>,
    },
}

impl RedirectResult {
    /// Interpret a raw query string (without the leading `?`).
    pub fn from_query(query: &str) -> Result<Self, SmartError> {
        let param = |name: &str| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
        };

        if let Some(error) = param("error") {
            return Ok(Self::Error {
                error,
                description: param("error_description"),
            });
        }

        match param("code") {
            Some(code) if !code.is_empty() => Ok(Self::Code {
                code,
                state: param("state"),
            }),
            _ => Err(SmartError::invalid_redirect(
                "redirect carried neither an authorization code nor an error",
            )),
        }
    }

    /// Release the code only when `state` matches what we issued.
    ///
    /// A provider error is surfaced verbatim; a mismatch drops the code.
    pub fn verify_state(self, expected: &str) -> Result<String, SmartError> {
        match self {
            Self::Error { error, description } => Err(SmartError::provider(error, description)),
            Self::Code { code, state } => match state {
                Some(state) if state == expected => Ok(code),
                _ => Err(SmartError::StateMismatch),
            },
        }
    }
}

enum Outcome {
    Ignored,
    Finished(Result<RedirectResult, SmartError>),
}

/// One-shot listener for a single login attempt.
///
/// A hostname redirect URI is bound on every address it resolves to, so a
/// concurrent attempt cannot slip in on the other address family.
pub struct CallbackServer {
    listeners: Vec<TcpListener>,
    /// Never empty once bound
    addrs: Vec<SocketAddr>,
    host: String,
    path: Arc<str>,
}

impl CallbackServer {
    /// Bind the listener. Fails immediately if the address is taken.
    pub async fn bind(host: &str, port: u16, path: &str) -> Result<Self, SmartError> {
        let display_addr = RedirectTarget {
            host: host.to_string(),
            port,
            path: path.to_string(),
        }
        .addr();

        let mut candidates: Vec<SocketAddr> = Vec::new();
        for addr in lookup_host((host, port))
            .await
            .map_err(|e| SmartError::port_unavailable(display_addr.clone(), e))?
        {
            if !candidates.contains(&addr) {
                candidates.push(addr);
            }
        }

        let mut listeners: Vec<TcpListener> = Vec::with_capacity(candidates.len());
        let mut addrs: Vec<SocketAddr> = Vec::with_capacity(candidates.len());
        for mut addr in candidates {
            // Port 0 picks a port once; the remaining addresses share it
            if let Some(bound) = addrs.first().map(SocketAddr::port) {
                addr.set_port(bound);
            }

            let listener = match TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(e) if e.kind() == ErrorKind::AddrNotAvailable => {
                    debug!("Skipping {addr} for the redirect listener: {e}");
                    continue;
                }
                Err(e) => return Err(SmartError::port_unavailable(display_addr, e)),
            };
            let local = listener
                .local_addr()
                .map_err(|e| SmartError::port_unavailable(display_addr.clone(), e))?;

            debug!("Redirect listener bound on {local}{path}");
            listeners.push(listener);
            addrs.push(local);
        }

        if listeners.is_empty() {
            return Err(SmartError::port_unavailable(
                display_addr,
                std::io::Error::new(
                    ErrorKind::AddrNotAvailable,
                    "host resolved to no usable address",
                ),
            ));
        }

        Ok(Self {
            listeners,
            addrs,
            host: host.to_string(),
            path: normalize_path(path).into(),
        })
    }

    /// Bind from a parsed redirect URI
    pub async fn for_redirect(target: &RedirectTarget) -> Result<Self, SmartError> {
        Self::bind(&target.host, target.port, &target.path).await
    }

    /// First bound address
    pub fn local_addr(&self) -> SocketAddr {
        self.addrs[0]
    }

    /// Every address the listener holds
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Redirect URI this listener answers on
    pub fn redirect_uri(&self) -> String {
        let target = RedirectTarget {
            host: self.host.clone(),
            port: self.local_addr().port(),
            path: self.path.to_string(),
        };
        format!("http://{}{}", target.addr(), target.path)
    }

    /// Wait for the redirect, the deadline or cancellation, whichever comes first.
    ///
    /// Requests for other paths get a 404 and non-GET requests a 405; neither
    /// ends the wait. Connections are read concurrently, so an idle socket
    /// cannot hold up the redirect. The listener and any connections still
    /// being read are released when this returns.
    pub async fn wait_for_callback(
        self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RedirectResult, SmartError> {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut connections: JoinSet<Outcome> = JoinSet::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Redirect wait cancelled");
                    return Err(SmartError::Cancelled);
                }
                _ = &mut deadline => {
                    warn!("No redirect received within {timeout:?}");
                    return Err(SmartError::timeout(timeout));
                }
                accepted = accept_any(&self.listeners), if connections.len() < MAX_PENDING_CONNECTIONS => {
                    let (stream, peer) = accepted
                        .map_err(|e| SmartError::io("Failed to accept redirect connection", e))?;
                    debug!("Redirect listener accepted connection from {peer}");
                    connections.spawn(handle_connection(stream, Arc::clone(&self.path)));
                }
                Some(joined) = connections.join_next() => match joined {
                    Ok(Outcome::Finished(result)) => return result,
                    Ok(Outcome::Ignored) => {}
                    Err(e) => debug!("Redirect connection task ended abnormally: {e}"),
                },
            }
        }
    }
}

async fn accept_any(listeners: &[TcpListener]) -> std::io::Result<(TcpStream, SocketAddr)> {
    std::future::poll_fn(|cx| {
        for listener in listeners {
            if let Poll::Ready(accepted) = listener.poll_accept(cx) {
                return Poll::Ready(accepted);
            }
        }
        Poll::Pending
    })
    .await
}

async fn handle_connection(mut stream: TcpStream, redirect_path: Arc<str>) -> Outcome {
    let head = match tokio::time::timeout(READ_TIMEOUT, read_request_head(&mut stream)).await {
        Ok(Ok(head)) => head,
        Ok(Err(e)) => {
            debug!("Ignoring unreadable connection: {e}");
            return Outcome::Ignored;
        }
        Err(_) => {
            debug!("Ignoring connection that sent no request line");
            return Outcome::Ignored;
        }
    };

    let Some((method, target)) = parse_request_line(&head) else {
        send_response(&mut stream, "400 Bad Request", "text/plain", "Bad Request", "").await;
        return Outcome::Ignored;
    };

    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    if path != &*redirect_path {
        debug!("Redirect listener: 404 for {path}");
        send_response(&mut stream, "404 Not Found", "text/plain", "Not Found", "").await;
        return Outcome::Ignored;
    }

    if method != "GET" {
        debug!("Redirect listener: 405 for {method} {path}");
        send_response(
            &mut stream,
            "405 Method Not Allowed",
            "text/plain",
            "Method Not Allowed",
            "Allow: GET\r\n",
        )
        .await;
        return Outcome::Ignored;
    }

    let result = RedirectResult::from_query(query);
    let page = match &result {
        Ok(RedirectResult::Code { .. }) => SUCCESS_PAGE.to_string(),
        Ok(RedirectResult::Error { error, description }) => {
            error_page(error, description.as_deref().unwrap_or(""))
        }
        Err(_) => error_page("invalid_redirect", "The redirect carried no authorization code."),
    };

    send_response(&mut stream, "200 OK", "text/html; charset=utf-8", &page, "").await;
    info!("Authorization redirect received");

    Outcome::Finished(result)
}

/// Bind the redirect listener and wait for one redirect.
pub async fn await_redirect(
    host: &str,
    port: u16,
    path: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<RedirectResult, SmartError> {
    CallbackServer::bind(host, port, path)
        .await?
        .wait_for_callback(timeout, cancel)
        .await
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

async fn read_request_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);

        if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() >= MAX_REQUEST_HEAD {
            break;
        }
    }

    if buffer.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed before sending a request",
        ));
    }

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Split `GET /cb?code=x HTTP/1.1` into method and request target
fn parse_request_line(head: &str) -> Option<(&str, &str)> {
    let mut parts = head.lines().next()?.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    parts.next()?.starts_with("HTTP/").then_some((method, target))
}

async fn send_response(
    stream: &mut TcpStream,
    status: &str,
    content_type: &str,
    body: &str,
    extra_headers: &str,
) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n{extra_headers}Connection: close\r\n\r\n{body}",
        body.len()
    );

    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!("Failed to write redirect response: {e}");
        return;
    }
    let _ = stream.shutdown().await;
}

fn error_page(error: &str, description: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Login failed</title></head>
<body style="font-family: system-ui; text-align: center; margin-top: 20vh;">
<h2>Login failed</h2>
<p><strong>{}</strong></p>
<p>{}</p>
<p>You may close this tab and try again.</p>
</body>
</html>"#,
        html_escape(error),
        html_escape(description)
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_helpers::send_raw_request;

    #[test]
    fn test_from_query_code_and_state() {
        let result = RedirectResult::from_query("code=abc123&state=xyz789").unwrap();
        assert_eq!(
            result,
            RedirectResult::Code {
                code: "abc123".to_string(),
                state: Some("xyz789".to_string())
            }
        );
    }

    #[test]
    fn test_from_query_decodes_values() {
        let result =
            RedirectResult::from_query("error=access_denied&error_description=User%20denied+access")
                .unwrap();
        assert_eq!(
            result,
            RedirectResult::Error {
                error: "access_denied".to_string(),
                description: Some("User denied access".to_string())
            }
        );
    }

    #[test]
    fn test_from_query_without_code_or_error() {
        assert!(matches!(
            RedirectResult::from_query("state=xyz"),
            Err(SmartError::InvalidRedirect { .. })
        ));
        assert!(matches!(
            RedirectResult::from_query(""),
            Err(SmartError::InvalidRedirect { .. })
        ));
    }

    #[test]
    fn test_verify_state() {
        let matching = RedirectResult::Code {
            code: "abc".to_string(),
            state: Some("s1".to_string()),
        };
        assert_eq!(matching.verify_state("s1").unwrap(), "abc");

        let wrong = RedirectResult::Code {
            code: "abc".to_string(),
            state: Some("WRONG".to_string()),
        };
        assert!(matches!(wrong.verify_state("s1"), Err(SmartError::StateMismatch)));

        let missing = RedirectResult::Code {
            code: "abc".to_string(),
            state: None,
        };
        assert!(matches!(missing.verify_state("s1"), Err(SmartError::StateMismatch)));

        let provider = RedirectResult::Error {
            error: "access_denied".to_string(),
            description: None,
        };
        assert!(matches!(
            provider.verify_state("s1"),
            Err(SmartError::ProviderError { error, .. }) if error == "access_denied"
        ));
    }

    #[test]
    fn test_parse_request_line() {
        assert_eq!(
            parse_request_line("GET /cb?code=1 HTTP/1.1\r\nHost: x\r\n\r\n"),
            Some(("GET", "/cb?code=1"))
        );
        assert_eq!(parse_request_line("garbage"), None);
        assert_eq!(parse_request_line(""), None);
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape("<script>\"x\" & 'y'</script>"),
            "&lt;script&gt;&quot;x&quot; &amp; &#x27;y&#x27;&lt;/script&gt;"
        );
    }

    #[tokio::test]
    async fn test_redirect_uri_reflects_bound_port() {
        let server = CallbackServer::bind("127.0.0.1", 0, "cb").await.unwrap();
        let port = server.local_addr().port();
        assert_ne!(port, 0);
        assert_eq!(server.redirect_uri(), format!("http://127.0.0.1:{port}/cb"));
    }

    #[tokio::test]
    async fn test_wait_returns_code_and_serves_page() {
        let server = CallbackServer::bind("127.0.0.1", 0, "/cb").await.unwrap();
        let addr = server.local_addr();
        let cancel = CancellationToken::new();

        let waiter = tokio::spawn(async move {
            server
                .wait_for_callback(Duration::from_secs(5), &cancel)
                .await
        });

        let response = send_raw_request(addr, "GET", "/cb?code=abc&state=s1").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("You may now close this tab."));

        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result.verify_state("s1").unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_other_paths_and_methods_keep_waiting() {
        let server = CallbackServer::bind("127.0.0.1", 0, "/cb").await.unwrap();
        let addr = server.local_addr();
        let cancel = CancellationToken::new();

        let waiter = tokio::spawn(async move {
            server
                .wait_for_callback(Duration::from_secs(5), &cancel)
                .await
        });

        let favicon = send_raw_request(addr, "GET", "/favicon.ico").await;
        assert!(favicon.starts_with("HTTP/1.1 404"));

        let post = send_raw_request(addr, "POST", "/cb?code=abc&state=s1").await;
        assert!(post.starts_with("HTTP/1.1 405"));
        assert!(post.contains("Allow: GET"));

        assert!(!waiter.is_finished());

        let ok = send_raw_request(addr, "GET", "/cb?code=real&state=s1").await;
        assert!(ok.starts_with("HTTP/1.1 200"));

        let result = waiter.await.unwrap().unwrap();
        assert_eq!(
            result,
            RedirectResult::Code {
                code: "real".to_string(),
                state: Some("s1".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_provider_error_page_is_escaped() {
        let server = CallbackServer::bind("127.0.0.1", 0, "/cb").await.unwrap();
        let addr = server.local_addr();
        let cancel = CancellationToken::new();

        let waiter = tokio::spawn(async move {
            server
                .wait_for_callback(Duration::from_secs(5), &cancel)
                .await
        });

        let response = send_raw_request(
            addr,
            "GET",
            "/cb?error=access_denied&error_description=%3Cb%3Enope%3C%2Fb%3E",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("&lt;b&gt;nope&lt;/b&gt;"));

        let result = waiter.await.unwrap().unwrap();
        assert!(matches!(result, RedirectResult::Error { .. }));
    }

    #[tokio::test]
    async fn test_missing_code_finishes_with_invalid_redirect() {
        let server = CallbackServer::bind("127.0.0.1", 0, "/cb").await.unwrap();
        let addr = server.local_addr();
        let cancel = CancellationToken::new();

        let waiter = tokio::spawn(async move {
            server
                .wait_for_callback(Duration::from_secs(5), &cancel)
                .await
        });

        let response = send_raw_request(addr, "GET", "/cb?state=s1").await;
        assert!(response.starts_with("HTTP/1.1 200"));

        assert!(matches!(
            waiter.await.unwrap(),
            Err(SmartError::InvalidRedirect { .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout_releases_port() {
        let server = CallbackServer::bind("127.0.0.1", 0, "/cb").await.unwrap();
        let port = server.local_addr().port();
        let cancel = CancellationToken::new();

        let result = server
            .wait_for_callback(Duration::from_millis(100), &cancel)
            .await;
        assert!(matches!(result, Err(SmartError::Timeout { .. })));

        tokio_test::assert_ok!(CallbackServer::bind("127.0.0.1", port, "/cb").await);
    }

    #[tokio::test]
    async fn test_cancel_unblocks_wait() {
        let server = CallbackServer::bind("127.0.0.1", 0, "/cb").await.unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result = server
            .wait_for_callback(Duration::from_secs(30), &cancel)
            .await;
        assert!(matches!(result, Err(SmartError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_second_bind_fails_with_port_unavailable() {
        let first = CallbackServer::bind("127.0.0.1", 0, "/cb").await.unwrap();
        let port = first.local_addr().port();

        match CallbackServer::bind("127.0.0.1", port, "/cb").await {
            Err(SmartError::PortUnavailable { addr, .. }) => {
                assert_eq!(addr, format!("127.0.0.1:{port}"))
            }
            Ok(_) => panic!("second bind unexpectedly succeeded"),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_idle_connection_does_not_delay_redirect() {
        let server = CallbackServer::bind("127.0.0.1", 0, "/cb").await.unwrap();
        let addr = server.local_addr();
        let cancel = CancellationToken::new();

        let waiter = tokio::spawn(async move {
            server
                .wait_for_callback(Duration::from_secs(30), &cancel)
                .await
        });

        // Pre-connected sockets that never send a request line
        let _idle = TcpStream::connect(addr).await.unwrap();
        let _idle_too = TcpStream::connect(addr).await.unwrap();

        let started = std::time::Instant::now();
        let response = tokio::time::timeout(
            Duration::from_secs(2),
            send_raw_request(addr, "GET", "/cb?code=a&state=s"),
        )
        .await
        .expect("redirect stalled behind an idle connection");
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(started.elapsed() < READ_TIMEOUT);

        let result = waiter.await.unwrap().unwrap();
        assert_eq!(result.verify_state("s").unwrap(), "a");
    }

    #[tokio::test]
    async fn test_hostname_binds_every_resolved_address() {
        let server = CallbackServer::bind("localhost", 0, "/cb").await.unwrap();
        let port = server.local_addr().port();

        let resolved: Vec<SocketAddr> = lookup_host(("localhost", port)).await.unwrap().collect();
        assert!(!server.local_addrs().is_empty());
        for addr in server.local_addrs() {
            assert_eq!(addr.port(), port);
            assert!(resolved.contains(addr), "{addr} not among {resolved:?}");

            // Every family the first attempt holds is closed to a second one
            let second = CallbackServer::bind(&addr.ip().to_string(), port, "/cb").await;
            assert!(matches!(second, Err(SmartError::PortUnavailable { .. })));
        }

        assert!(matches!(
            CallbackServer::bind("localhost", port, "/cb").await,
            Err(SmartError::PortUnavailable { .. })
        ));
        assert_eq!(server.redirect_uri(), format!("http://localhost:{port}/cb"));
    }
}
