//! ERC-4337 Paymaster Integration (ERC-7677 methods)
//!
//! Sponsorship happens in two rounds: stub data for gas estimation, then the
//! final `paymasterAndData` once gas limits are known.

use ethers_core::types::{Address, Bytes};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::chain_id_hex;
use super::rpc::JsonRpcClient;
use super::user_operation::UserOperation;
use crate::error::{ErrorCode, TraderError, TraderResult};
use crate::utils::SharedTransport;

/// Sponsor metadata some paymasters attach to their answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsorInfo {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Paymaster answer for v0.6 user operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterData {
    pub paymaster_and_data: Bytes,
    #[serde(default)]
    pub sponsor: Option<SponsorInfo>,
    /// Stub data that is already final, no second round needed
    #[serde(default)]
    pub is_final: Option<bool>,
}

impl PaymasterData {
    /// Paymaster contract address (first 20 bytes)
    pub fn paymaster(&self) -> Option<Address> {
        (self.paymaster_and_data.len() >= 20).then(|| Address::from_slice(&self.paymaster_and_data[..20]))
    }
}

/// Paymaster client for sponsoring transactions
pub struct PaymasterClient {
    rpc: JsonRpcClient,
    entry_point: Address,
    chain_id: u64,
    /// Provider-specific context, e.g. a sponsorship policy id
    context: Option<serde_json::Value>,
}

impl PaymasterClient {
    pub fn new(url: &str, entry_point: Address, chain_id: u64, transport: SharedTransport) -> Self {
        Self {
            rpc: JsonRpcClient::new("paymaster", url, transport),
            entry_point,
            chain_id,
            context: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// `pm_getPaymasterStubData`: placeholder data for gas estimation
    pub fn get_paymaster_stub_data(&self, user_op: &UserOperation) -> TraderResult<PaymasterData> {
        self.request("pm_getPaymasterStubData", user_op)
    }

    /// `pm_getPaymasterData`: final sponsorship for the fully priced operation
    pub fn get_paymaster_data(&self, user_op: &UserOperation) -> TraderResult<PaymasterData> {
        self.request("pm_getPaymasterData", user_op)
    }

    fn request(&self, method: &str, user_op: &UserOperation) -> TraderResult<PaymasterData> {
        let params = json!([user_op, self.entry_point, chain_id_hex(self.chain_id), self.context]);

        let data: PaymasterData = self.rpc.call(method, params).map_err(|err| {
            if err.code == ErrorCode::RpcError {
                TraderError {
                    code: ErrorCode::SponsorshipDenied,
                    ..err
                }
            } else {
                err
            }
        })?;

        if data.paymaster_and_data.len() < 20 {
            return Err(TraderError::new(
                ErrorCode::SponsorshipDenied,
                format!("{} returned no paymaster address", method),
            ));
        }

        debug!(
            method,
            paymaster = ?data.paymaster(),
            sponsor = data.sponsor.as_ref().map(|s| s.name.as_str()),
            "paymaster data"
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ethers_core::types::U256;

    use super::*;
    use crate::utils::http::mock::ScriptedTransport;

    fn op() -> UserOperation {
        UserOperation::new(Address::repeat_byte(0x01), U256::zero(), vec![0x01])
    }

    fn paymaster(transport: &Arc<ScriptedTransport>) -> PaymasterClient {
        PaymasterClient::new("https://paymaster.test", Address::repeat_byte(0x5f), 8453, transport.clone())
    }

    #[test]
    fn test_stub_data_params() {
        let transport = Arc::new(ScriptedTransport::new());
        let pm_and_data = format!("0x{}{}", "2f".repeat(20), "00".repeat(8));
        transport.on_rpc_result(
            "paymaster.test",
            "pm_getPaymasterStubData",
            json!({"paymasterAndData": pm_and_data, "sponsor": {"name": "Trading Platform"}}),
        );

        let data = paymaster(&transport).get_paymaster_stub_data(&op()).unwrap();
        assert_eq!(data.paymaster(), Some(Address::repeat_byte(0x2f)));
        assert_eq!(data.sponsor.unwrap().name, "Trading Platform");

        let sent = &transport.rpc_calls("pm_getPaymasterStubData")[0];
        assert_eq!(sent.body["params"][2], "0x2105");
        assert!(sent.body["params"][3].is_null());
    }

    #[test]
    fn test_context_is_forwarded() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_rpc_result(
            "paymaster.test",
            "pm_getPaymasterData",
            json!({"paymasterAndData": format!("0x{}", "2f".repeat(20))}),
        );

        paymaster(&transport)
            .with_context(json!({"policyId": "abc"}))
            .get_paymaster_data(&op())
            .unwrap();

        let sent = &transport.rpc_calls("pm_getPaymasterData")[0];
        assert_eq!(sent.body["params"][3]["policyId"], "abc");
    }

    #[test]
    fn test_denied_sponsorship() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_rpc_error("paymaster.test", "pm_getPaymasterData", -32000, "policy limit reached");

        let err = paymaster(&transport).get_paymaster_data(&op()).unwrap_err();
        assert_eq!(err.code, ErrorCode::SponsorshipDenied);
    }

    #[test]
    fn test_empty_paymaster_and_data() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_rpc_result("paymaster.test", "pm_getPaymasterData", json!({"paymasterAndData": "0x"}));

        let err = paymaster(&transport).get_paymaster_data(&op()).unwrap_err();
        assert_eq!(err.code, ErrorCode::SponsorshipDenied);
    }
}
