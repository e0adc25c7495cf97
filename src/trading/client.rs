//! Trading API client: quotes and trade signatures

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use super::types::{Envelope, Quote, QuoteRequest, TradeSignature, DEFAULT_SLIPPAGE_BPS};
use crate::error::{ErrorCode, TraderError, TraderResult};
use crate::utils::logging::redact_token;
use crate::utils::{HttpRequest, SharedTransport};

/// Bearer-authenticated client for the trading REST API
pub struct TradingClient {
    base_url: String,
    token: String,
    slippage_bps: u32,
    transport: SharedTransport,
}

impl TradingClient {
    pub fn new(base_url: &str, token: impl Into<String>, transport: SharedTransport) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            transport,
        }
    }

    pub fn with_slippage_bps(mut self, slippage_bps: u32) -> Self {
        self.slippage_bps = slippage_bps;
        self
    }

    /// `POST /v1/trade/quote` for a single-player share purchase
    pub fn get_quote(&self, player_id: u64, shares: u64) -> TraderResult<Quote> {
        let request = QuoteRequest::buy_shares(player_id, shares, self.slippage_bps);

        let mut quote: Quote = self.post("/v1/trade/quote", &request).map_err(|err| {
            // 4xx other than auth means the platform refused to price the trade
            let client_error = matches!(err.status, Some(400..=499));
            if err.code == ErrorCode::HttpStatus && client_error {
                TraderError {
                    code: ErrorCode::QuoteRejected,
                    ..err
                }
            } else {
                err
            }
        })?;
        quote.player_id = player_id;
        quote.shares = shares;

        info!(
            quote_id = %quote.uuid,
            max_gold = %quote.total_max_gold_to_spend,
            max_gold_wei = %quote.total_max_gold_to_spend_wei,
            "quote received"
        );
        Ok(quote)
    }

    /// `POST /v1/trade/signature/buy` for a quote
    pub fn get_buy_signature(&self, quote_id: &str) -> TraderResult<TradeSignature> {
        let signature: TradeSignature =
            self.post("/v1/trade/signature/buy", &serde_json::json!({ "quoteId": quote_id }))?;

        info!(nonce = %signature.nonce, deadline = signature.deadline, "trade signature received");
        Ok(signature)
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> TraderResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(path, token = %redact_token(&self.token), "trading API request");

        let request = HttpRequest::post(url, serde_json::to_value(body)?).with_bearer(self.token.clone());
        let reply = self
            .transport
            .post_json(&request)?
            .error_for_status(&format!("Trading API {}", path))?;

        let envelope: Envelope<T> = reply.json()?;
        envelope
            .data
            .ok_or_else(|| TraderError::parse_error(format!("Trading API {} returned no data", path)))
    }
}
