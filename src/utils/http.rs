//! HTTP transport shared by the trading API and JSON-RPC clients
//!
//! Every request the trader makes is a JSON POST, so the transport is a
//! single-method trait. The reqwest implementation keeps one blocking client
//! (one connection pool) for the whole run.

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{TraderError, TraderResult};

/// A JSON POST request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub body: serde_json::Value,
    /// Bearer token for the Authorization header
    pub bearer: Option<String>,
}

impl HttpRequest {
    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            body,
            bearer: None,
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

/// Status and raw body of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok_json(body: &serde_json::Value) -> Self {
        Self::new(200, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fail with a status-derived error unless the reply is 2xx
    pub fn error_for_status(self, context: &str) -> TraderResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TraderError::from_status(self.status, context, &self.body))
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> TraderResult<T> {
        super::parse_json(&self.body)
    }
}

/// Blocking JSON-over-HTTP transport
pub trait HttpTransport: Send + Sync {
    fn post_json(&self, request: &HttpRequest) -> TraderResult<HttpReply>;
}

/// Transport handle shared by all clients of a run
pub type SharedTransport = Arc<dyn HttpTransport>;

/// reqwest-backed transport with connection reuse
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> TraderResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(5)
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .user_agent(concat!("share-trader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TraderError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn shared(timeout: Duration) -> TraderResult<SharedTransport> {
        Ok(Arc::new(Self::new(timeout)?))
    }
}

impl HttpTransport for ReqwestTransport {
    fn post_json(&self, request: &HttpRequest) -> TraderResult<HttpReply> {
        debug!(host = %extract_domain(&request.url), "POST");

        let mut builder = self.client.post(&request.url).json(&request.body);
        if let Some(ref token) = request.bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;

        Ok(HttpReply { status, body })
    }
}

/// Host part of a URL; endpoint URLs may carry API keys in the path, so logs use this
pub fn extract_domain(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .split(['/', '?'])
        .next()
        .unwrap_or(url)
        .to_string()
}
