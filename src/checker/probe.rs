// src/checker/probe.rs
// =============================================================================
// This module checks whether a single site is up by making an HTTP request.
//
// Key functionality:
// - Makes a GET request with a bounded deadline (5 seconds by default)
// - Follows redirects and asks every cache on the way not to answer for us
// - Classifies the outcome as UP or DOWN and measures latency
// - On a connection failure, tries one lightweight HEAD request as a fallback
//   (only when the fallback policy allows it)
//
// A probe never returns an error: every failure becomes a DOWN result.
//
// Per-site state machine:
//
//   Pending -> Primary GET -> UP | DOWN
//                  |
//                  +-- connection failure --> Fallback HEAD -> UP | DOWN
// =============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::targets::Target;

/// Default deadline for one probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(5000);

// How many redirects we follow before calling the site broken
const MAX_REDIRECTS: usize = 10;

/// Whether a site answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Up,
    Down,
}

/// How a probe reached its verdict.
///
/// `OpaqueFallback` is a weak signal: the fallback HEAD request completed
/// without a transport error, but its status code was never looked at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    /// The site answered with this HTTP status
    Status { code: u16 },
    /// UP was inferred from an error-free fallback request
    OpaqueFallback,
    /// The deadline was hit before any response arrived
    Timeout,
    /// The connection could not be established (fallback skipped or failed)
    Connect { message: String },
    /// Any other transport failure (too many redirects, bad URL, ...)
    Error { message: String },
}

/// What to do when the primary request fails at the connection level.
///
/// Browsers cannot read the status of many cross-origin responses, so a
/// browser-based checker retries with a HEAD request and counts "no error"
/// as UP.
/// Outside a browser the real status is always visible, which makes the
/// retry a second chance for flaky connections rather than a workaround.
/// `Strict` turns it off: any connection failure is DOWN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    #[default]
    OpaqueRetry,
    Strict,
}

/// The result of checking one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// The URL that was checked
    pub url: String,
    pub status: Status,
    /// Milliseconds from the start of the probe to the answer (None when DOWN)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// True when the URL uses https (scheme check only)
    pub secure: bool,
    pub checked_at: DateTime<Utc>,
    pub evidence: Evidence,
}

impl CheckResult {
    pub fn is_up(&self) -> bool {
        self.status == Status::Up
    }

    /// True when UP was only inferred from the fallback request.
    pub fn is_weak_signal(&self) -> bool {
        self.evidence == Evidence::OpaqueFallback
    }

    fn up(target: &Target, latency: Duration, evidence: Evidence) -> Self {
        Self {
            url: target.url().to_string(),
            status: Status::Up,
            latency_ms: Some(latency.as_millis() as u64),
            secure: target.is_secure(),
            checked_at: Utc::now(),
            evidence,
        }
    }

    fn down(target: &Target, evidence: Evidence) -> Self {
        Self {
            url: target.url().to_string(),
            status: Status::Down,
            latency_ms: None,
            secure: target.is_secure(),
            checked_at: Utc::now(),
            evidence,
        }
    }
}

// Anything that can check a target
//
// The scheduler only depends on this trait, so tests can swap the real HTTP
// prober for a fake one that records when it was called.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, target: &Target) -> CheckResult;
}

// The real prober, backed by one shared reqwest client
//
// Client is cheap to clone (an Arc inside) and pools connections, so every
// probe in a run reuses it.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
    timeout: Duration,
    fallback: FallbackPolicy,
}

impl HttpProber {
    pub fn new(timeout: Duration, fallback: FallbackPolicy) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(concat!("site-guardian/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            timeout,
            fallback,
        })
    }

    // The primary GET request
    //
    // The deadline is attached to the request itself, so the timer lives
    // exactly as long as the request future and is dropped on every path.
    async fn primary(&self, url: &str) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .get(url)
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache")
            .timeout(self.timeout)
            .send()
            .await
    }

    // The reduced-visibility fallback: we only care whether it completed
    async fn fallback_probe(&self, url: &str) -> Result<(), reqwest::Error> {
        self.client
            .head(url)
            .header(CACHE_CONTROL, "no-store")
            .timeout(self.timeout)
            .send()
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(&self, target: &Target) -> CheckResult {
        let start = Instant::now();
        debug!(url = %target, "probing");

        match self.primary(target.url()).await {
            Ok(response) => analyze_response(target, start, response.status()),
            Err(e) => self.handle_failure(target, start, e).await,
        }
    }
}

impl HttpProber {
    // Categorizes a transport failure and runs the fallback when allowed
    async fn handle_failure(&self, target: &Target, start: Instant, error: reqwest::Error) -> CheckResult {
        match classify_error(&error) {
            FailureKind::Timeout => {
                warn!(url = %target, timeout_ms = self.timeout.as_millis() as u64, "probe timed out");
                CheckResult::down(target, Evidence::Timeout)
            }
            FailureKind::Connectivity => {
                let message = error.to_string();
                match self.fallback {
                    FallbackPolicy::Strict => {
                        warn!(url = %target, error = %message, "connection failed");
                        CheckResult::down(target, Evidence::Connect { message })
                    }
                    FallbackPolicy::OpaqueRetry => {
                        warn!(url = %target, error = %message, "connection failed, trying HEAD fallback");
                        match self.fallback_probe(target.url()).await {
                            Ok(()) => CheckResult::up(target, start.elapsed(), Evidence::OpaqueFallback),
                            Err(fallback_error) => {
                                warn!(url = %target, error = %fallback_error, "fallback failed");
                                CheckResult::down(
                                    target,
                                    Evidence::Connect {
                                        message: fallback_error.to_string(),
                                    },
                                )
                            }
                        }
                    }
                }
            }
            FailureKind::Other => {
                warn!(url = %target, error = %error, "probe failed");
                CheckResult::down(
                    target,
                    Evidence::Error {
                        message: error.to_string(),
                    },
                )
            }
        }
    }
}

// Turns an HTTP status into a result
//
// 2xx and 3xx count as UP. With redirects being followed, a 3xx only shows up
// here when the site sends one without a Location header.
fn analyze_response(target: &Target, start: Instant, status: reqwest::StatusCode) -> CheckResult {
    let evidence = Evidence::Status {
        code: status.as_u16(),
    };

    if status.is_success() || status.is_redirection() {
        let result = CheckResult::up(target, start.elapsed(), evidence);
        debug!(url = %target, status = status.as_u16(), latency_ms = ?result.latency_ms, "site is up");
        result
    } else {
        warn!(url = %target, status = status.as_u16(), "site answered with a non-success status");
        CheckResult::down(target, evidence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    Timeout,
    Connectivity,
    Other,
}

// Sorts reqwest errors into the three branches of the state machine
//
// Timeout is checked first: a connect that runs out of time reports both
// is_timeout() and is_connect().
fn classify_error(error: &reqwest::Error) -> FailureKind {
    if error.is_timeout() {
        FailureKind::Timeout
    } else if error.is_connect() || (error.is_request() && error.status().is_none()) {
        FailureKind::Connectivity
    } else {
        FailureKind::Other
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why GET and not HEAD for the primary request?
//    - Plenty of servers answer HEAD with 405 or 404 while GET works fine
//    - GET is what a visitor's browser does, so it is the honest check
//
// 2. Why is the fallback result a "weak signal"?
//    - The fallback only proves that something answered on that address
//    - A 500 or a parking page would still count as UP
//    - Reports mark these results so nobody mistakes them for a real 200
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn target(url: &str) -> Target {
        Target::parse(url).unwrap()
    }

    fn prober(timeout_ms: u64, fallback: FallbackPolicy) -> HttpProber {
        HttpProber::new(Duration::from_millis(timeout_ms), fallback).unwrap()
    }

    // An address nothing listens on: bind a port, then drop the listener
    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}/", port)
    }

    #[tokio::test]
    async fn test_ok_response_is_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(120)))
            .mount(&server)
            .await;

        let result = prober(5000, FallbackPolicy::OpaqueRetry)
            .probe(&target(&format!("{}/", server.uri())))
            .await;

        assert_eq!(result.status, Status::Up);
        assert_eq!(result.evidence, Evidence::Status { code: 200 });
        assert!(result.latency_ms.unwrap() >= 120);
        assert!(!result.secure);
    }

    #[tokio::test]
    async fn test_sends_no_cache_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("cache-control", "no-store"))
            .and(header("pragma", "no-cache"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let result = prober(5000, FallbackPolicy::Strict)
            .probe(&target(&server.uri()))
            .await;
        assert!(result.is_up());
    }

    #[tokio::test]
    async fn test_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(
                ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let result = prober(5000, FallbackPolicy::Strict)
            .probe(&target(&format!("{}/old", server.uri())))
            .await;
        assert_eq!(result.evidence, Evidence::Status { code: 200 });
    }

    #[tokio::test]
    async fn test_server_error_is_down_without_latency() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        // A non-success status is an answer, so no fallback is attempted
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = prober(5000, FallbackPolicy::OpaqueRetry)
            .probe(&target(&server.uri()))
            .await;

        assert_eq!(result.status, Status::Down);
        assert_eq!(result.latency_ms, None);
        assert_eq!(result.evidence, Evidence::Status { code: 503 });
    }

    #[tokio::test]
    async fn test_timeout_is_down_without_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let result = prober(200, FallbackPolicy::OpaqueRetry)
            .probe(&target(&server.uri()))
            .await;

        assert_eq!(result.status, Status::Down);
        assert_eq!(result.latency_ms, None);
        assert_eq!(result.evidence, Evidence::Timeout);
    }

    #[tokio::test]
    async fn test_connection_refused_strict_is_down() {
        let result = prober(2000, FallbackPolicy::Strict)
            .probe(&target(&closed_port_url()))
            .await;

        assert_eq!(result.status, Status::Down);
        assert!(matches!(result.evidence, Evidence::Connect { .. }));
    }

    #[tokio::test]
    async fn test_connection_refused_fallback_also_fails() {
        let result = prober(2000, FallbackPolicy::OpaqueRetry)
            .probe(&target(&closed_port_url()))
            .await;

        assert_eq!(result.status, Status::Down);
        assert_eq!(result.latency_ms, None);
        assert!(!result.is_weak_signal());
    }

    #[tokio::test]
    async fn test_https_scheme_sets_secure_flag() {
        // Nothing answers here; only the scheme matters for the flag
        let url = closed_port_url().replace("http://", "https://");
        let result = prober(2000, FallbackPolicy::Strict).probe(&target(&url)).await;
        assert!(result.secure);
        assert_eq!(result.status, Status::Down);
    }

    #[test]
    fn test_result_serializes_status_uppercase() {
        let result = CheckResult::down(&target("http://a.com"), Evidence::Timeout);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "DOWN");
        assert_eq!(json["evidence"]["kind"], "timeout");
        assert!(json.get("latency_ms").is_none());
    }

    #[test]
    fn test_fallback_result_is_weak_signal() {
        let result = CheckResult::up(&target("https://a.com"), Duration::from_millis(40), Evidence::OpaqueFallback);
        assert!(result.is_up());
        assert!(result.is_weak_signal());
        assert_eq!(result.latency_ms, Some(40));
    }

    // A server that hangs up on the first request without answering, then
    // answers every later one with 200
    async fn hang_up_once_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            let (mut first, _) = listener.accept().await.unwrap();
            let _ = first.read(&mut buf).await;
            drop(first);

            while let Ok((mut socket, _)) = listener.accept().await {
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                    .await;
            }
        });

        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_dropped_connection_rescued_by_head_fallback() {
        let url = hang_up_once_server().await;
        let result = prober(2000, FallbackPolicy::OpaqueRetry).probe(&target(&url)).await;

        assert_eq!(result.status, Status::Up);
        assert_eq!(result.evidence, Evidence::OpaqueFallback);
        assert!(result.latency_ms.is_some());
        assert!(result.is_weak_signal());
    }

    #[tokio::test]
    async fn test_dropped_connection_strict_is_down() {
        let url = hang_up_once_server().await;
        let result = prober(2000, FallbackPolicy::Strict).probe(&target(&url)).await;

        assert_eq!(result.status, Status::Down);
        assert_eq!(result.latency_ms, None);
        assert!(matches!(result.evidence, Evidence::Connect { .. }));
    }
}
