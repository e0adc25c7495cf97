//! Chain node queries: account-abstraction nonce and gas fees

use ethers_core::types::{Address, Bytes, U256};
use serde_json::json;
use tracing::{debug, warn};

use super::rpc::JsonRpcClient;
use super::user_operation::FeeQuote;
use crate::abi::{self, AbiDecoder, AbiType};
use crate::error::{ErrorCode, TraderError, TraderResult};
use crate::utils::{parse_quantity, SharedTransport};

/// Percent buffers applied on top of the node's fee readings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    pub fee_buffer_pct: u64,
    pub priority_buffer_pct: u64,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            fee_buffer_pct: 150,
            priority_buffer_pct: 180,
        }
    }
}

impl FeePolicy {
    /// `maxFee = gasPrice * fee%`, `maxPriority = priority * priority%`,
    /// with maxFee raised to at least maxPriority.
    /// Fails if a buffered fee does not fit in 256 bits.
    pub fn apply(&self, gas_price: U256, priority_fee: U256) -> TraderResult<FeeQuote> {
        let max_priority_fee_per_gas = buffered(priority_fee, self.priority_buffer_pct, "priority fee")?;
        let max_fee_per_gas = buffered(gas_price, self.fee_buffer_pct, "gas price")?.max(max_priority_fee_per_gas);
        Ok(FeeQuote {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        })
    }
}

fn buffered(value: U256, pct: u64, what: &str) -> TraderResult<U256> {
    value
        .checked_mul(U256::from(pct))
        .map(|scaled| scaled / 100u64)
        .ok_or_else(|| TraderError::parse_error(format!("node {} {} overflows with a {}% buffer", what, value, pct)))
}

/// Client for the chain's JSON-RPC node
pub struct NodeClient {
    rpc: JsonRpcClient,
    entry_point: Address,
}

impl NodeClient {
    pub fn new(url: &str, entry_point: Address, transport: SharedTransport) -> Self {
        Self {
            rpc: JsonRpcClient::new("node", url, transport),
            entry_point,
        }
    }

    /// `EntryPoint.getNonce(sender, key)`.
    /// A node error on a non-zero key is retried once with key 0.
    pub fn get_nonce(&self, sender: Address, key: U256) -> TraderResult<U256> {
        match self.query_nonce(sender, key) {
            Err(err) if err.code == ErrorCode::RpcError && !key.is_zero() => {
                warn!(key = %key, error = %err, "nonce query failed, retrying with key 0");
                self.query_nonce(sender, U256::zero())
            }
            result => result,
        }
    }

    fn query_nonce(&self, sender: Address, key: U256) -> TraderResult<U256> {
        let data = Bytes::from(abi::get_nonce(sender, key)?);
        let raw: Bytes = self
            .rpc
            .call("eth_call", json!([{"to": self.entry_point, "data": data}, "latest"]))?;

        let values = AbiDecoder::decode(&raw, &[AbiType::uint256()])?;
        let nonce = values
            .first()
            .and_then(|v| v.as_uint())
            .ok_or_else(|| TraderError::parse_error("getNonce returned no value"))?;

        debug!(key = %key, nonce = %nonce, "account nonce");
        Ok(nonce)
    }

    /// `eth_gasPrice`
    pub fn gas_price(&self) -> TraderResult<U256> {
        let raw: String = self.rpc.call("eth_gasPrice", json!([]))?;
        parse_quantity(&raw)
    }

    /// `eth_maxPriorityFeePerGas`
    pub fn max_priority_fee_per_gas(&self) -> TraderResult<U256> {
        let raw: String = self.rpc.call("eth_maxPriorityFeePerGas", json!([]))?;
        parse_quantity(&raw)
    }

    /// Current fees with the policy's buffers applied
    pub fn fee_quote(&self, policy: &FeePolicy) -> TraderResult<FeeQuote> {
        let gas_price = self.gas_price()?;
        let priority_fee = self.max_priority_fee_per_gas()?;
        let quote = policy.apply(gas_price, priority_fee)?;

        debug!(
            gas_price = %gas_price,
            priority_fee = %priority_fee,
            max_fee = %quote.max_fee_per_gas,
            max_priority = %quote.max_priority_fee_per_gas,
            "fee quote"
        );
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::abi::u256_to_word;
    use crate::utils::http::mock::ScriptedTransport;

    fn word_hex(value: u64) -> serde_json::Value {
        json!(format!("0x{}", hex::encode(u256_to_word(U256::from(value)))))
    }

    fn node(transport: &Arc<ScriptedTransport>) -> NodeClient {
        NodeClient::new("https://node.test", Address::repeat_byte(0xee), transport.clone())
    }

    #[test]
    fn test_fee_policy_defaults() {
        let quote = FeePolicy::default()
            .apply(U256::from(1_000_000u64), U256::from(1_000u64))
            .unwrap();
        assert_eq!(quote.max_fee_per_gas, U256::from(1_500_000u64));
        assert_eq!(quote.max_priority_fee_per_gas, U256::from(1_800u64));
    }

    #[test]
    fn test_fee_policy_raises_max_fee() {
        let quote = FeePolicy::default().apply(U256::from(100u64), U256::from(1_000u64)).unwrap();
        assert_eq!(quote.max_fee_per_gas, quote.max_priority_fee_per_gas);
    }

    #[test]
    fn test_fee_policy_overflow_is_an_error() {
        let err = FeePolicy::default().apply(U256::MAX / 2u64, U256::one()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseError);

        let err = FeePolicy::default().apply(U256::one(), U256::MAX / 2u64).unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseError);
    }

    #[test]
    fn test_fee_quote_rejects_huge_gas_price() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .on_rpc_result("node.test", "eth_gasPrice", json!(format!("0x{}", "f".repeat(64))))
            .on_rpc_result("node.test", "eth_maxPriorityFeePerGas", json!("0x3e8"));

        let err = node(&transport).fee_quote(&FeePolicy::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseError);
    }

    #[test]
    fn test_get_nonce() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_rpc_result("node.test", "eth_call", word_hex(42));

        let sender = Address::repeat_byte(0x01);
        let nonce = node(&transport).get_nonce(sender, U256::zero()).unwrap();
        assert_eq!(nonce, U256::from(42u64));

        let call = &transport.rpc_calls("eth_call")[0];
        let data = call.body["params"][0]["data"].as_str().unwrap();
        assert!(data.starts_with("0x35567e1a"));
        assert_eq!(call.body["params"][0]["to"], format!("{:?}", Address::repeat_byte(0xee)));
        assert_eq!(call.body["params"][1], "latest");
    }

    #[test]
    fn test_get_nonce_falls_back_to_key_zero() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .on_rpc_error("node.test", "eth_call", -32000, "execution reverted")
            .on_rpc_result("node.test", "eth_call", word_hex(5));

        let nonce = node(&transport)
            .get_nonce(Address::repeat_byte(0x01), U256::from(1u64))
            .unwrap();
        assert_eq!(nonce, U256::from(5u64));

        let calls = transport.rpc_calls("eth_call");
        assert_eq!(calls.len(), 2);
        let retried = calls[1].body["params"][0]["data"].as_str().unwrap();
        assert!(retried.ends_with(&"0".repeat(64)));
    }

    #[test]
    fn test_get_nonce_key_zero_error_is_final() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_rpc_error("node.test", "eth_call", -32000, "execution reverted");

        let err = node(&transport)
            .get_nonce(Address::repeat_byte(0x01), U256::zero())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RpcError);
        assert_eq!(transport.rpc_calls("eth_call").len(), 1);
    }

    #[test]
    fn test_fee_quote() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .on_rpc_result("node.test", "eth_gasPrice", json!("0xf4240"))
            .on_rpc_result("node.test", "eth_maxPriorityFeePerGas", json!("0x3e8"));

        let quote = node(&transport).fee_quote(&FeePolicy::default()).unwrap();
        assert_eq!(quote.max_fee_per_gas, U256::from(1_500_000u64));
        assert_eq!(quote.max_priority_fee_per_gas, U256::from(1_800u64));
    }
}
