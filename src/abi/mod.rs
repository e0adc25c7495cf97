//! ABI (Application Binary Interface) codec for the contract calls of a purchase
//!
//! - Type model (`AbiType`) and tagged value model (`AbiValue`)
//! - Head/tail encoding and bounds-checked decoding
//! - Selectors derived from canonical signatures
//! - Builders for `approve`, `buyShares`, `executeBatch`, `getNonce`
//! - Call-data inspection

pub mod calldata;
pub mod decoder;
pub mod encoder;
pub mod inspect;
pub mod selector;
pub mod types;


pub use calldata::*;
pub use decoder::*;
pub use encoder::*;
pub use inspect::*;
pub use selector::*;
pub use types::*;
