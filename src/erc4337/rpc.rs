//! Minimal JSON-RPC 2.0 client over [`HttpTransport`]

use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ErrorCode, TraderError, TraderResult};
use crate::utils::{extract_domain, HttpRequest, SharedTransport};

/// RPC request structure
#[derive(Debug, Serialize)]
struct RpcRequest<'a, T: Serialize> {
    jsonrpc: &'static str,
    method: &'a str,
    params: T,
    id: u64,
}

/// RPC response structure
#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// Error object of a JSON-RPC response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// JSON-RPC endpoint bound to a URL
pub struct JsonRpcClient {
    /// Label used in errors and logs ("bundler", "paymaster", "node")
    name: &'static str,
    url: String,
    transport: SharedTransport,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(name: &'static str, url: impl Into<String>, transport: SharedTransport) -> Self {
        Self {
            name,
            url: url.into(),
            transport,
            next_id: AtomicU64::new(1),
        }
    }

    /// Call a method whose result must be present
    pub fn call<P: Serialize, R: DeserializeOwned>(&self, method: &str, params: P) -> TraderResult<R> {
        match self.call_optional(method, params)? {
            Some(result) => Ok(result),
            None => Err(TraderError::rpc_error(format!("{} {} returned no result", self.name, method))),
        }
    }

    /// Call a method where a null result is a legitimate answer
    pub fn call_optional<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> TraderResult<Option<R>> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        let body = serde_json::to_value(&request)?;

        debug!(endpoint = self.name, host = %extract_domain(&self.url), method, "rpc call");

        let reply = self
            .transport
            .post_json(&HttpRequest::post(&self.url, body))?
            .error_for_status(&format!("{} {}", self.name, method))?;

        let response: RpcResponse = reply.json()?;

        if let Some(err) = response.error {
            return Err(rpc_failure(self.name, method, &err));
        }

        match response.result {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                TraderError::new(
                    ErrorCode::ParseError,
                    format!("{} {} returned an unexpected result: {}", self.name, method, e),
                )
            }),
        }
    }
}

fn rpc_failure(name: &str, method: &str, err: &RpcErrorObject) -> TraderError {
    let failure = TraderError::rpc_error(format!("{} {} failed: {}", name, method, err.message));
    match &err.data {
        Some(data) => failure.with_details(format!("code {}, data {}", err.code, data)),
        None => failure.with_details(format!("code {}", err.code)),
    }
}
