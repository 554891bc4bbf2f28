//! Upstream JSON-RPC client with connection pooling.
//!
//! The bridge owns one [`UpstreamClient`] for its entire lifetime. The
//! underlying reqwest client is built once at startup and maintains a pool of
//! persistent connections to the upstream server; actual TCP connections are
//! established lazily on first use and reused for subsequent requests,
//! avoiding per-message TCP and TLS handshakes. Dropping the client on any
//! exit path releases the pool deterministically.
//!
//! # Error Classification
//!
//! Failures are classified into [`UpstreamError`] variants whose `Display`
//! form becomes the detail embedded in the synthesized `-32603` response:
//! timeouts, connection failures, non-2xx HTTP status, and non-JSON bodies.
//! No automatic retry: a retried POST could duplicate tool side effects.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::BridgeError;

/// Configuration for the upstream client.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Full URL of the upstream JSON-RPC endpoint.
    pub url: String,
    /// Request timeout (includes connection + response).
    pub timeout: Duration,
    /// Connection timeout (TCP + TLS handshake).
    pub connect_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// Idle connection timeout.
    pub pool_idle_timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8001/mcp".to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            pool_max_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

impl UpstreamConfig {
    /// Create a new config with the specified endpoint URL.
    ///
    /// Uses default values for all other settings.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Errors from a single upstream exchange.
///
/// These are per-message failures: the relay loop converts them into
/// synthesized JSON-RPC error responses and keeps running.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The request did not complete within the configured timeout.
    #[error("upstream request to {url} timed out after {timeout_secs}s")]
    Timeout {
        /// The upstream endpoint URL.
        url: String,
        /// The configured timeout in seconds.
        timeout_secs: u64,
    },

    /// A TCP/TLS connection to the upstream could not be established.
    #[error("connection to {url} failed: {reason}")]
    ConnectionFailed {
        /// The upstream endpoint URL.
        url: String,
        /// Human-readable description of the connection failure.
        reason: String,
    },

    /// The upstream returned a non-success HTTP status.
    #[error("upstream returned HTTP {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
    },

    /// The upstream response body was not valid JSON.
    #[error("upstream response was not valid JSON: {reason}")]
    InvalidBody {
        /// Human-readable description of the parse failure.
        reason: String,
    },

    /// Any other request failure (DNS, protocol, body transfer).
    #[error("upstream request failed: {reason}")]
    Request {
        /// Human-readable description of the failure.
        reason: String,
    },
}

/// Upstream JSON-RPC client.
///
/// `Clone` shares the underlying connection pool. The bridge's serial relay
/// loop owns a single instance; no synchronization is needed.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    /// Create a new upstream client with a pooled connection.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ClientBuild`] if the client cannot be built.
    pub fn new(config: UpstreamConfig) -> Result<Self, BridgeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| BridgeError::ClientBuild {
                reason: e.to_string(),
            })?;

        Ok(Self { client, config })
    }

    /// The configured endpoint URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Forward a call to the upstream and parse its response body as JSON.
    ///
    /// Posts the payload with `Content-Type: application/json` over the
    /// pooled connection. The response is returned as a raw JSON value —
    /// result and error envelopes from the upstream pass through unchanged.
    ///
    /// # Errors
    ///
    /// * [`UpstreamError::Timeout`] — request timed out
    /// * [`UpstreamError::ConnectionFailed`] — failed to connect
    /// * [`UpstreamError::Status`] — non-2xx HTTP status
    /// * [`UpstreamError::InvalidBody`] — response body was not JSON
    pub async fn forward(&self, payload: &Value) -> Result<Value, UpstreamError> {
        let response = self.post(payload).await?;

        let body: Value = response.json().await.map_err(|e| {
            warn!(url = %self.config.url, error = %e, "failed to parse upstream response");
            UpstreamError::InvalidBody {
                reason: e.to_string(),
            }
        })?;

        debug!(
            url = %self.config.url,
            has_error = body.get("error").is_some(),
            "received upstream response"
        );

        Ok(body)
    }

    /// Forward a notification to the upstream, discarding the response body.
    ///
    /// Notifications expect no response on the stdio channel, but the
    /// outbound HTTP call is still issued so the upstream observes the
    /// message.
    ///
    /// # Errors
    ///
    /// Same classification as [`UpstreamClient::forward`], minus body parsing.
    pub async fn notify(&self, payload: &Value) -> Result<(), UpstreamError> {
        self.post(payload).await.map(drop)
    }

    /// POST the payload and check the HTTP status.
    async fn post(&self, payload: &Value) -> Result<reqwest::Response, UpstreamError> {
        let response = self
            .client
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| self.classify_error(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %self.config.url, status = %status, "upstream returned error status");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    /// Classify a reqwest error into an [`UpstreamError`].
    fn classify_error(&self, error: reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            warn!(
                url = %self.config.url,
                timeout_secs = self.config.timeout.as_secs(),
                "upstream request timed out"
            );
            UpstreamError::Timeout {
                url: self.config.url.clone(),
                timeout_secs: self.config.timeout.as_secs(),
            }
        } else if error.is_connect() {
            warn!(url = %self.config.url, "failed to connect to upstream");
            UpstreamError::ConnectionFailed {
                url: self.config.url.clone(),
                reason: error.to_string(),
            }
        } else {
            warn!(url = %self.config.url, error = %error, "upstream request failed");
            UpstreamError::Request {
                reason: error.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_config() {
        let config = UpstreamConfig::default();
        assert_eq!(config.url, "http://127.0.0.1:8001/mcp");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.pool_max_idle_per_host, 32);
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_config_with_url() {
        let config = UpstreamConfig::with_url("http://localhost:3000/rpc");
        assert_eq!(config.url, "http://localhost:3000/rpc");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_client_creation() {
        let client = UpstreamClient::new(UpstreamConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_forward_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": {"tools": []}
            })))
            .mount(&server)
            .await;

        let client = UpstreamClient::new(UpstreamConfig::with_url(server.uri())).unwrap();
        let body = client
            .forward(&json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
            .await
            .unwrap();

        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["tools"], json!([]));
    }

    #[tokio::test]
    async fn test_forward_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = UpstreamClient::new(UpstreamConfig::with_url(server.uri())).unwrap();
        let err = client
            .forward(&json!({"jsonrpc": "2.0", "id": 1, "method": "x"}))
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::Status { status: 500 }));
    }

    #[tokio::test]
    async fn test_forward_non_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = UpstreamClient::new(UpstreamConfig::with_url(server.uri())).unwrap();
        let err = client
            .forward(&json!({"jsonrpc": "2.0", "id": 1, "method": "x"}))
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::InvalidBody { .. }));
    }

    #[tokio::test]
    async fn test_forward_connection_refused() {
        // Port 1 — nothing listening.
        let client = UpstreamClient::new(UpstreamConfig::with_url("http://127.0.0.1:1/mcp")).unwrap();
        let err = client
            .forward(&json!({"jsonrpc": "2.0", "id": 1, "method": "x"}))
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::ConnectionFailed { .. }));
    }

    #[tokio::test]
    async fn test_notify_discards_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let client = UpstreamClient::new(UpstreamConfig::with_url(server.uri())).unwrap();
        let result = client
            .notify(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_forward_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"jsonrpc": "2.0", "id": 1, "result": null}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let config = UpstreamConfig {
            timeout: Duration::from_millis(100),
            ..UpstreamConfig::with_url(server.uri())
        };
        let client = UpstreamClient::new(config).unwrap();
        let err = client
            .forward(&json!({"jsonrpc": "2.0", "id": 1, "method": "x"}))
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::Timeout { .. }));
    }
}
