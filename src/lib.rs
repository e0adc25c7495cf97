//! Share Trader Core Library
//!
//! Buys player shares on the trading platform through an ERC-4337 v0.6 smart
//! wallet on Base.
//!
//! # Architecture
//!
//! - **abi**: type-driven ABI codec, contract call data, call-data inspection
//! - **erc4337**: user operations and node, bundler and paymaster clients
//! - **trading**: quotes and trade signatures from the trading API
//! - **purchase**: the end-to-end purchase pipeline
//! - **config**: defaults, JSON file and `TRADER_*` environment overrides
//! - **utils**: HTTP transport, JSON helpers, logging
//!
//! # Example
//!
//! ```rust,ignore
//! use share_trader::{ReqwestTransport, ShareBuyer, TraderConfig};
//!
//! let config = TraderConfig::load(None)?;
//! config.validate()?;
//! let transport = ReqwestTransport::shared(config.http_timeout())?;
//! let outcome = ShareBuyer::new(&config, &token, transport)?.buy(123, 1);
//! println!("{}", serde_json::to_string_pretty(&outcome)?);
//! ```

pub mod abi;
pub mod config;
pub mod erc4337;
pub mod error;
pub mod purchase;
pub mod trading;
pub mod utils;

pub use config::{PurchaseSettings, TraderConfig};
pub use error::{ErrorCode, TraderError, TraderResult};
pub use purchase::{purchase_call_data, PresignedSigner, PurchaseOutcome, ShareBuyer, UserOpSigner};
pub use trading::{Quote, TradeSignature, TradingClient};
pub use utils::{HttpTransport, ReqwestTransport, SharedTransport};
