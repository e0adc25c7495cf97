//! Runtime configuration
//!
//! Values come from built-in defaults, then an optional JSON file, then
//! `TRADER_*` environment variables (a `.env` file is honored).

use std::path::Path;
use std::time::Duration;

use ethers_core::types::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::abi::{parse_address, parse_u256};
use crate::erc4337::{FeePolicy, GasEstimate, PollPolicy, BASE_CHAIN_ID, ENTRY_POINT_V06};
use crate::error::{ErrorCode, TraderError, TraderResult};

pub const DEFAULT_API_BASE_URL: &str = "https://api.pro.football.fun";
pub const DEFAULT_NODE_RPC_URL: &str = "https://mainnet.base.org";
/// USDC on Base
pub const DEFAULT_TOKEN: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
pub const DEFAULT_TRADE_CONTRACT: &str = "0x9da1bb4e725acc0d96010b7ce2a7244cda446617";
pub const DEFAULT_EXPLORER_TX_URL: &str = "https://basescan.org/tx/";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "TRADER_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraderConfig {
    pub api_base_url: String,
    pub node_rpc_url: String,
    pub bundler_rpc_url: String,
    /// Falls back to the bundler URL when empty
    pub paymaster_rpc_url: String,
    /// Sponsorship context passed to the paymaster, e.g. `{"policyId": "..."}`
    pub paymaster_context: Option<serde_json::Value>,

    pub chain_id: u64,
    pub entry_point: String,
    pub smart_wallet: String,
    pub token: String,
    pub trade_contract: String,
    /// Owner slot of the signing key in the smart wallet
    pub owner_index: u64,
    /// Decimal or 0x-hex uint192
    pub nonce_key: String,

    pub fee_buffer_pct: u64,
    pub priority_buffer_pct: u64,
    pub fallback_pre_verification_gas: u64,
    pub fallback_verification_gas_limit: u64,
    pub fallback_call_gas_limit: u64,

    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,
    pub http_timeout_secs: u64,
    pub slippage_bps: u32,
    pub explorer_tx_url: String,
}

impl Default for TraderConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            node_rpc_url: DEFAULT_NODE_RPC_URL.to_string(),
            bundler_rpc_url: String::new(),
            paymaster_rpc_url: String::new(),
            paymaster_context: None,
            chain_id: BASE_CHAIN_ID,
            entry_point: ENTRY_POINT_V06.to_string(),
            smart_wallet: String::new(),
            token: DEFAULT_TOKEN.to_string(),
            trade_contract: DEFAULT_TRADE_CONTRACT.to_string(),
            owner_index: 0,
            nonce_key: "0".to_string(),
            fee_buffer_pct: 150,
            priority_buffer_pct: 180,
            fallback_pre_verification_gas: 0xdd0a,
            fallback_verification_gas_limit: 0x141e9,
            fallback_call_gas_limit: 0x39bb8,
            poll_interval_secs: 5,
            poll_timeout_secs: 120,
            http_timeout_secs: 30,
            slippage_bps: 500,
            explorer_tx_url: DEFAULT_EXPLORER_TX_URL.to_string(),
        }
    }
}

/// Parsed addresses and policies derived from a validated config
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseSettings {
    pub chain_id: u64,
    pub entry_point: Address,
    pub smart_wallet: Address,
    pub token: Address,
    pub trade_contract: Address,
    pub owner_index: u64,
    pub nonce_key: U256,
    pub fee_policy: FeePolicy,
    pub fallback_gas: GasEstimate,
    pub poll_policy: PollPolicy,
    pub explorer_tx_url: String,
}

impl TraderConfig {
    /// Defaults, overlaid with `path` (if any), overlaid with the environment.
    /// Not validated: commands check what they use.
    pub fn load(path: Option<&Path>) -> TraderResult<Self> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> TraderResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TraderError::invalid_config(format!("Cannot read {}", path.display())).with_details(e.to_string())
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            TraderError::invalid_config(format!("Invalid config file {}", path.display())).with_details(e.to_string())
        })
    }

    /// Override fields from `TRADER_<FIELD>` variables
    pub fn apply_env<F>(&mut self, lookup: F) -> TraderResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty());

        macro_rules! text {
            ($($field:ident => $name:literal),* $(,)?) => {
                $(if let Some(value) = get($name) {
                    debug!(variable = $name, "config override");
                    self.$field = value.trim().to_string();
                })*
            };
        }
        macro_rules! number {
            ($($field:ident => $name:literal),* $(,)?) => {
                $(if let Some(value) = get($name) {
                    debug!(variable = $name, "config override");
                    self.$field = value.trim().parse().map_err(|_| {
                        TraderError::invalid_config(format!("{}{} is not a number: {}", ENV_PREFIX, $name, value))
                    })?;
                })*
            };
        }

        text!(
            api_base_url => "API_BASE_URL",
            node_rpc_url => "NODE_RPC_URL",
            bundler_rpc_url => "BUNDLER_RPC_URL",
            paymaster_rpc_url => "PAYMASTER_RPC_URL",
            entry_point => "ENTRY_POINT",
            smart_wallet => "SMART_WALLET",
            token => "TOKEN",
            trade_contract => "TRADE_CONTRACT",
            nonce_key => "NONCE_KEY",
            explorer_tx_url => "EXPLORER_TX_URL",
        );
        number!(
            chain_id => "CHAIN_ID",
            owner_index => "OWNER_INDEX",
            fee_buffer_pct => "FEE_BUFFER_PCT",
            priority_buffer_pct => "PRIORITY_BUFFER_PCT",
            poll_interval_secs => "POLL_INTERVAL_SECS",
            poll_timeout_secs => "POLL_TIMEOUT_SECS",
            http_timeout_secs => "HTTP_TIMEOUT_SECS",
            slippage_bps => "SLIPPAGE_BPS",
            fallback_pre_verification_gas => "FALLBACK_PRE_VERIFICATION_GAS",
            fallback_verification_gas_limit => "FALLBACK_VERIFICATION_GAS_LIMIT",
            fallback_call_gas_limit => "FALLBACK_CALL_GAS_LIMIT",
        );

        if let Some(value) = get("PAYMASTER_CONTEXT") {
            debug!(variable = "PAYMASTER_CONTEXT", "config override");
            let context = serde_json::from_str(value.trim()).map_err(|e| {
                TraderError::invalid_config(format!("{}PAYMASTER_CONTEXT is not JSON", ENV_PREFIX))
                    .with_details(e.to_string())
            })?;
            self.paymaster_context = Some(context);
        }
        Ok(())
    }

    /// Paymaster endpoint, sharing the bundler's when not set
    pub fn paymaster_url(&self) -> &str {
        if self.paymaster_rpc_url.is_empty() {
            &self.bundler_rpc_url
        } else {
            &self.paymaster_rpc_url
        }
    }

    pub fn validate(&self) -> TraderResult<()> {
        validate_endpoint("api_base_url", &self.api_base_url)?;
        validate_endpoint("node_rpc_url", &self.node_rpc_url)?;
        self.validate_bundler()?;
        validate_endpoint("paymaster_rpc_url", self.paymaster_url())?;

        if self.smart_wallet.is_empty() {
            return Err(TraderError::invalid_config(
                "smart_wallet is required (set TRADER_SMART_WALLET)",
            ));
        }
        for (name, value) in [
            ("entry_point", &self.entry_point),
            ("smart_wallet", &self.smart_wallet),
            ("token", &self.token),
            ("trade_contract", &self.trade_contract),
        ] {
            parse_address(value).map_err(|e| {
                TraderError::new(ErrorCode::InvalidAddress, format!("{} is not an address: {}", name, value))
                    .with_details(e.to_string())
            })?;
        }

        let nonce_key = parse_u256(&self.nonce_key)
            .map_err(|e| TraderError::invalid_config("nonce_key is not a number").with_details(e.to_string()))?;
        if nonce_key.bits() > 192 {
            return Err(TraderError::invalid_config("nonce_key exceeds 192 bits"));
        }

        if self.poll_interval_secs == 0 || self.poll_interval_secs > 60 {
            return Err(TraderError::invalid_config("poll_interval_secs must be between 1 and 60"));
        }
        if self.poll_timeout_secs < self.poll_interval_secs || self.poll_timeout_secs > 900 {
            return Err(TraderError::invalid_config(
                "poll_timeout_secs must be at least poll_interval_secs and at most 900",
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(TraderError::invalid_config("http_timeout_secs must be positive"));
        }
        if self.fee_buffer_pct < 100 || self.priority_buffer_pct < 100 {
            return Err(TraderError::invalid_config("fee buffers must be at least 100 percent"));
        }
        if self.slippage_bps > 10_000 {
            return Err(TraderError::invalid_config("slippage_bps must not exceed 10000"));
        }
        Ok(())
    }

    /// Enough to poll receipts
    pub fn validate_bundler(&self) -> TraderResult<()> {
        if self.bundler_rpc_url.is_empty() {
            return Err(TraderError::invalid_config(
                "bundler_rpc_url is required (set TRADER_BUNDLER_RPC_URL)",
            ));
        }
        validate_endpoint("bundler_rpc_url", &self.bundler_rpc_url)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn settings(&self) -> TraderResult<PurchaseSettings> {
        let address = |name: &str, value: &str| {
            parse_address(value).map_err(|e| {
                TraderError::new(ErrorCode::InvalidAddress, format!("{} is not an address", name))
                    .with_details(e.to_string())
            })
        };

        Ok(PurchaseSettings {
            chain_id: self.chain_id,
            entry_point: address("entry_point", &self.entry_point)?,
            smart_wallet: address("smart_wallet", &self.smart_wallet)?,
            token: address("token", &self.token)?,
            trade_contract: address("trade_contract", &self.trade_contract)?,
            owner_index: self.owner_index,
            nonce_key: parse_u256(&self.nonce_key)
                .map_err(|e| TraderError::invalid_config("nonce_key is not a number").with_details(e.to_string()))?,
            fee_policy: FeePolicy {
                fee_buffer_pct: self.fee_buffer_pct,
                priority_buffer_pct: self.priority_buffer_pct,
            },
            fallback_gas: GasEstimate::new(
                self.fallback_pre_verification_gas,
                self.fallback_verification_gas_limit,
                self.fallback_call_gas_limit,
            ),
            poll_policy: PollPolicy {
                interval: Duration::from_secs(self.poll_interval_secs),
                timeout: Duration::from_secs(self.poll_timeout_secs),
            },
            explorer_tx_url: self.explorer_tx_url.clone(),
        })
    }
}

/// https only; plain http is accepted for local endpoints
pub fn validate_endpoint(name: &str, value: &str) -> TraderResult<()> {
    let url = Url::parse(value)
        .map_err(|e| TraderError::invalid_config(format!("{} is not a valid URL", name)).with_details(e.to_string()))?;

    let local = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1") | Some("[::1]"));
    match url.scheme() {
        "https" => Ok(()),
        "http" if local => Ok(()),
        scheme => Err(TraderError::invalid_config(format!(
            "{} must use https (got {})",
            name, scheme
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn valid() -> TraderConfig {
        TraderConfig {
            bundler_rpc_url: "https://bundler.test/rpc".to_string(),
            smart_wallet: "0x1111111111111111111111111111111111111111".to_string(),
            ..TraderConfig::default()
        }
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = TraderConfig::default();
        assert_eq!(config.chain_id, 8453);
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.poll_timeout_secs, 120);
        assert_eq!(config.slippage_bps, 500);
        assert_eq!(config.fallback_pre_verification_gas, 0xdd0a);
    }

    #[test]
    fn test_missing_required_fields() {
        let err = TraderConfig::default().validate().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
        assert!(err.message.contains("bundler_rpc_url"));

        let config = TraderConfig {
            smart_wallet: String::new(),
            ..valid()
        };
        assert!(config.validate().unwrap_err().message.contains("smart_wallet"));
    }

    #[test]
    fn test_valid_config() {
        let config = valid();
        config.validate().unwrap();
        assert_eq!(config.paymaster_url(), "https://bundler.test/rpc");
    }

    #[test]
    fn test_url_rules() {
        let mut config = valid();
        config.node_rpc_url = "http://node.example.com".to_string();
        assert_eq!(config.validate().unwrap_err().code, ErrorCode::InvalidConfig);

        config.node_rpc_url = "http://localhost:8545".to_string();
        config.validate().unwrap();

        config.node_rpc_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_address() {
        let config = TraderConfig {
            token: "0x1234".to_string(),
            ..valid()
        };
        assert_eq!(config.validate().unwrap_err().code, ErrorCode::InvalidAddress);
    }

    #[test]
    fn test_poll_range() {
        let mut config = valid();
        config.poll_interval_secs = 0;
        assert!(config.validate().is_err());

        config.poll_interval_secs = 10;
        config.poll_timeout_secs = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = valid();
        config
            .apply_env(env(&[
                ("TRADER_CHAIN_ID", "84532"),
                ("TRADER_POLL_TIMEOUT_SECS", " 60 "),
                ("TRADER_PAYMASTER_RPC_URL", "https://paymaster.test"),
                ("TRADER_TOKEN", ""),
            ]))
            .unwrap();

        assert_eq!(config.chain_id, 84532);
        assert_eq!(config.poll_timeout_secs, 60);
        assert_eq!(config.paymaster_url(), "https://paymaster.test");
        assert_eq!(config.token, DEFAULT_TOKEN);
    }

    #[test]
    fn test_env_fallback_gas() {
        let mut config = valid();
        config
            .apply_env(env(&[
                ("TRADER_FALLBACK_PRE_VERIFICATION_GAS", "60000"),
                ("TRADER_FALLBACK_VERIFICATION_GAS_LIMIT", "90000"),
                ("TRADER_FALLBACK_CALL_GAS_LIMIT", "300000"),
            ]))
            .unwrap();

        let settings = config.settings().unwrap();
        assert_eq!(settings.fallback_gas, GasEstimate::new(60_000, 90_000, 300_000));
    }

    #[test]
    fn test_env_paymaster_context() {
        let mut config = valid();
        config
            .apply_env(env(&[("TRADER_PAYMASTER_CONTEXT", r#"{"policyId": "p-1"}"#)]))
            .unwrap();
        assert_eq!(config.paymaster_context, Some(serde_json::json!({"policyId": "p-1"})));

        let err = config
            .apply_env(env(&[("TRADER_PAYMASTER_CONTEXT", "policy p-1")]))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
    }

    #[test]
    fn test_env_bad_number() {
        let mut config = valid();
        let err = config.apply_env(env(&[("TRADER_SLIPPAGE_BPS", "lots")])).unwrap_err();
        assert!(err.message.contains("TRADER_SLIPPAGE_BPS"));
    }

    #[test]
    fn test_partial_json_file() {
        let config: TraderConfig =
            serde_json::from_str(r#"{"smart_wallet": "0x2222222222222222222222222222222222222222", "nonce_key": "0x10"}"#)
                .unwrap();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.nonce_key, "0x10");
    }

    #[test]
    fn test_settings() {
        let config = TraderConfig {
            nonce_key: "0x10".to_string(),
            ..valid()
        };
        let settings = config.settings().unwrap();
        assert_eq!(settings.nonce_key, U256::from(16u64));
        assert_eq!(settings.smart_wallet, Address::repeat_byte(0x11));
        assert_eq!(settings.fallback_gas, GasEstimate::new(0xdd0a, 0x141e9, 0x39bb8));
        assert_eq!(settings.poll_policy, PollPolicy::default());
        assert_eq!(settings.fee_policy, FeePolicy::default());
    }

    #[test]
    fn test_oversized_nonce_key() {
        let config = TraderConfig {
            nonce_key: format!("0x1{}", "0".repeat(48)),
            ..valid()
        };
        assert!(config.validate().unwrap_err().message.contains("192"));
    }
}
