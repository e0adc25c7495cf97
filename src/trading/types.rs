//! Trading API request and response types

use ethers_core::types::U256;
use serde::{Deserialize, Deserializer, Serialize};

use crate::abi::decode_hex;
use crate::error::{ErrorCode, TraderError, TraderResult};
use crate::utils::{u256_flexible, u64_flexible};

/// Default slippage tolerance (5%)
pub const DEFAULT_SLIPPAGE_BPS: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputType {
    Shares,
    Gold,
}

/// Body of `POST /v1/trade/quote`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub transaction_type: TransactionType,
    pub input_type: InputType,
    pub o_player_ids: Vec<u64>,
    pub input_values: Vec<u64>,
    pub slippage_bps: u32,
}

impl QuoteRequest {
    /// Buy `shares` shares of a single player
    pub fn buy_shares(player_id: u64, shares: u64, slippage_bps: u32) -> Self {
        Self {
            transaction_type: TransactionType::Buy,
            input_type: InputType::Shares,
            o_player_ids: vec![player_id],
            input_values: vec![shares],
            slippage_bps,
        }
    }
}

/// Priced quote for a purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub uuid: String,
    /// Requested player; not part of the API answer
    #[serde(default)]
    pub player_id: u64,
    /// Requested quantity; not part of the API answer
    #[serde(default)]
    pub shares: u64,
    /// Max spend in display units
    #[serde(default, deserialize_with = "display_amount")]
    pub total_max_gold_to_spend: String,
    /// Max spend in token base units
    #[serde(deserialize_with = "u256_flexible")]
    pub total_max_gold_to_spend_wei: U256,
}

/// Trade signature issued for a quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSignature {
    /// Hex-encoded signature blob, passed through to `buyShares`
    pub signature: String,
    #[serde(deserialize_with = "u256_flexible")]
    pub nonce: U256,
    /// Unix timestamp after which the signature is rejected
    #[serde(deserialize_with = "u64_flexible")]
    pub deadline: u64,
}

impl TradeSignature {
    pub fn signature_bytes(&self) -> TraderResult<Vec<u8>> {
        decode_hex(&self.signature).map_err(|e| {
            TraderError::new(ErrorCode::HexError, format!("Trade signature is not hex: {}", e))
        })
    }

    /// Seconds until the deadline, negative once expired
    pub fn seconds_left(&self, now_unix: i64) -> i64 {
        i64::try_from(self.deadline).unwrap_or(i64::MAX) - now_unix
    }

    pub fn is_expired(&self, now_unix: i64) -> bool {
        self.seconds_left(now_unix) <= 0
    }
}

/// `{"data": ...}` wrapper used by every endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: Option<T>,
}

/// Accept an amount given either as a JSON string or a number
fn display_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}
