//! ERC-4337 Account Abstraction clients
//!
//! - UserOperation (v0.6) building and hashing
//! - Node queries: account nonce and gas fees
//! - Bundler interaction: estimate, submit, receipt polling
//! - Paymaster sponsorship data

pub mod bundler;
pub mod node;
pub mod paymaster;
pub mod rpc;
pub mod user_operation;

pub use bundler::*;
pub use node::*;
pub use paymaster::*;
pub use rpc::*;
pub use user_operation::*;

/// ERC-4337 v0.6 EntryPoint (same on all chains)
pub const ENTRY_POINT_V06: &str = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789";

/// Base mainnet
pub const BASE_CHAIN_ID: u64 = 8453;

/// Chain id as the 0x-prefixed quantity paymaster methods expect
pub fn chain_id_hex(chain_id: u64) -> String {
    format!("{:#x}", chain_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_hex() {
        assert_eq!(chain_id_hex(BASE_CHAIN_ID), "0x2105");
        assert_eq!(chain_id_hex(1), "0x1");
    }

    #[test]
    fn test_entry_point_parses() {
        let parsed = crate::abi::parse_address(ENTRY_POINT_V06).unwrap();
        assert_eq!(format!("{:?}", parsed), ENTRY_POINT_V06.to_lowercase());
    }
}
