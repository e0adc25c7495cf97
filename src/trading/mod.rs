//! Trading platform REST API
//!
//! A purchase needs two answers from the platform: a priced quote, then a
//! signature over that quote which the trade contract verifies on-chain.

pub mod client;
pub mod types;

pub use client::*;
pub use types::*;
