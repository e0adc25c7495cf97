//! ERC-4337 Bundler Integration
//!
//! Gas estimation, submission and receipt polling against a bundler's
//! JSON-RPC endpoint.

use std::thread;
use std::time::{Duration, Instant};

use ethers_core::types::{Address, H256};
use serde_json::json;
use tracing::{debug, info, warn};

use super::rpc::JsonRpcClient;
use super::user_operation::{GasEstimate, UserOperation, UserOperationReceipt};
use crate::error::{ErrorCode, TraderError, TraderResult};
use crate::utils::SharedTransport;

/// Fixed-interval receipt polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Bundler client for submitting UserOperations
pub struct BundlerClient {
    rpc: JsonRpcClient,
    entry_point: Address,
}

impl BundlerClient {
    pub fn new(url: &str, entry_point: Address, transport: SharedTransport) -> Self {
        Self {
            rpc: JsonRpcClient::new("bundler", url, transport),
            entry_point,
        }
    }

    /// Estimate gas for a UserOperation
    pub fn estimate_user_operation_gas(&self, user_op: &UserOperation) -> TraderResult<GasEstimate> {
        self.rpc
            .call("eth_estimateUserOperationGas", json!([user_op, self.entry_point]))
    }

    /// Estimate gas, using `fallback` when the bundler reports an RPC error
    pub fn estimate_or_fallback(&self, user_op: &UserOperation, fallback: &GasEstimate) -> TraderResult<GasEstimate> {
        match self.estimate_user_operation_gas(user_op) {
            Ok(estimate) => Ok(estimate),
            Err(err) if err.code == ErrorCode::RpcError => {
                warn!(error = %err, "gas estimation failed, using fallback limits");
                Ok(*fallback)
            }
            Err(err) => Err(err),
        }
    }

    /// Submit a UserOperation to the bundler; returns the user operation hash
    pub fn send_user_operation(&self, user_op: &UserOperation) -> TraderResult<H256> {
        self.rpc
            .call("eth_sendUserOperation", json!([user_op, self.entry_point]))
            .map_err(|err| {
                if err.code == ErrorCode::RpcError {
                    TraderError {
                        code: ErrorCode::UserOperationRejected,
                        ..err
                    }
                } else {
                    err
                }
            })
    }

    /// Get UserOperation receipt; `None` until the operation is included
    pub fn get_user_operation_receipt(&self, user_op_hash: H256) -> TraderResult<Option<UserOperationReceipt>> {
        self.rpc
            .call_optional("eth_getUserOperationReceipt", json!([user_op_hash]))
    }

    /// Poll for the receipt until it arrives or the policy's timeout elapses.
    ///
    /// Network and RPC failures count as "not yet"; other errors end the wait.
    pub fn wait_for_receipt(&self, user_op_hash: H256, policy: &PollPolicy) -> TraderResult<UserOperationReceipt> {
        let start = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.get_user_operation_receipt(user_op_hash) {
                Ok(Some(receipt)) => {
                    info!(attempt, elapsed_ms = start.elapsed().as_millis() as u64, "receipt received");
                    return Ok(receipt);
                }
                Ok(None) => debug!(attempt, "receipt not available yet"),
                Err(err) if err.is_transient() || err.code == ErrorCode::RpcError => {
                    warn!(attempt, error = %err, "receipt query failed");
                }
                Err(err) => return Err(err),
            }

            if start.elapsed() + policy.interval > policy.timeout {
                return Err(TraderError::timeout(format!(
                    "No receipt for user operation {:?} after {}s",
                    user_op_hash,
                    policy.timeout.as_secs()
                ))
                .with_details(format!("{} attempts", attempt)));
            }

            thread::sleep(policy.interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ethers_core::types::U256;

    use super::*;
    use crate::utils::http::mock::ScriptedTransport;

    const URL: &str = "https://bundler.test/rpc";

    fn bundler(transport: &Arc<ScriptedTransport>) -> BundlerClient {
        BundlerClient::new(URL, Address::repeat_byte(0x5f), transport.clone())
    }

    fn quick_policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(5),
            timeout: Duration::from_millis(40),
        }
    }

    fn receipt_json() -> serde_json::Value {
        json!({
            "userOpHash": format!("0x{}", "aa".repeat(32)),
            "success": true,
            "receipt": {"transactionHash": format!("0x{}", "bb".repeat(32))}
        })
    }

    fn op() -> UserOperation {
        UserOperation::new(Address::repeat_byte(0x01), U256::zero(), vec![0x01])
    }

    #[test]
    fn test_estimate_params() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_rpc_result(
            "bundler.test",
            "eth_estimateUserOperationGas",
            json!({"preVerificationGas": "0x1", "verificationGasLimit": "0x2", "callGasLimit": "0x3"}),
        );

        let estimate = bundler(&transport).estimate_user_operation_gas(&op()).unwrap();
        assert_eq!(estimate, GasEstimate::new(1, 2, 3));

        let sent = &transport.rpc_calls("eth_estimateUserOperationGas")[0];
        assert_eq!(sent.body["params"][0]["callData"], "0x01");
        assert_eq!(sent.body["params"][1], format!("{:?}", Address::repeat_byte(0x5f)));
    }

    #[test]
    fn test_estimate_fallback_on_rpc_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_rpc_error("bundler.test", "eth_estimateUserOperationGas", -32500, "AA23 reverted");

        let fallback = GasEstimate::new(0xdd0a, 0x141e9, 0x39bb8);
        let estimate = bundler(&transport).estimate_or_fallback(&op(), &fallback).unwrap();
        assert_eq!(estimate, fallback);
    }

    #[test]
    fn test_estimate_fallback_not_used_for_auth_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_post("bundler.test", 401, json!({"error": "unauthorized"}));

        let fallback = GasEstimate::new(1, 1, 1);
        let err = bundler(&transport).estimate_or_fallback(&op(), &fallback).unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthError);
    }

    #[test]
    fn test_send_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_rpc_error("bundler.test", "eth_sendUserOperation", -32507, "invalid signature");

        let err = bundler(&transport).send_user_operation(&op()).unwrap_err();
        assert_eq!(err.code, ErrorCode::UserOperationRejected);
        assert!(err.message.contains("invalid signature"));
    }

    #[test]
    fn test_send_returns_hash() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_rpc_result(
            "bundler.test",
            "eth_sendUserOperation",
            json!(format!("0x{}", "cd".repeat(32))),
        );

        let hash = bundler(&transport).send_user_operation(&op()).unwrap();
        assert_eq!(hash, H256::repeat_byte(0xcd));
    }

    #[test]
    fn test_wait_for_receipt_after_pending() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .on_rpc_result("bundler.test", "eth_getUserOperationReceipt", serde_json::Value::Null)
            .on_rpc_error("bundler.test", "eth_getUserOperationReceipt", -32601, "temporarily unavailable")
            .on_rpc_result("bundler.test", "eth_getUserOperationReceipt", receipt_json());

        let receipt = bundler(&transport)
            .wait_for_receipt(H256::repeat_byte(0xaa), &quick_policy())
            .unwrap();
        assert_eq!(receipt.transaction_hash(), H256::repeat_byte(0xbb));
        assert_eq!(transport.rpc_calls("eth_getUserOperationReceipt").len(), 3);
    }

    #[test]
    fn test_wait_for_receipt_survives_network_errors() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .on_rpc_failure(
                "bundler.test",
                "eth_getUserOperationReceipt",
                TraderError::network("connection reset"),
            )
            .on_rpc_result("bundler.test", "eth_getUserOperationReceipt", receipt_json());

        let receipt = bundler(&transport)
            .wait_for_receipt(H256::repeat_byte(0xaa), &quick_policy())
            .unwrap();
        assert!(receipt.success);
        assert_eq!(transport.rpc_calls("eth_getUserOperationReceipt").len(), 2);
    }

    #[test]
    fn test_wait_for_receipt_times_out() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_rpc_result("bundler.test", "eth_getUserOperationReceipt", serde_json::Value::Null);

        let err = bundler(&transport)
            .wait_for_receipt(H256::repeat_byte(0xaa), &quick_policy())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Timeout);

        // Never more polls than the timeout allows
        let polls = transport.rpc_calls("eth_getUserOperationReceipt").len();
        assert!((1..=8).contains(&polls), "polled {} times", polls);
    }

    #[test]
    fn test_wait_for_receipt_stops_on_auth_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_post("bundler.test", 403, json!({}));

        let err = bundler(&transport)
            .wait_for_receipt(H256::repeat_byte(0xaa), &quick_policy())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthError);
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn test_default_poll_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.timeout, Duration::from_secs(120));
    }
}
