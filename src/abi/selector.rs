//! Function selector calculation and the registry of calls the trader knows

use sha3::{Digest, Keccak256};

use super::types::{parse_signature, AbiError, AbiType};

/// Calculate keccak256 hash
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Function selector: first 4 bytes of keccak256 of the canonical signature
pub fn selector_from_signature(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Selector as `0x`-prefixed hex
pub fn selector_hex(signature: &str) -> String {
    format!("0x{}", hex::encode(selector_from_signature(signature)))
}

/// A function the call-data tools can recognize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownFunction {
    pub name: String,
    pub signature: String,
    pub selector: [u8; 4],
    pub inputs: Vec<AbiType>,
}

impl KnownFunction {
    pub fn from_signature(signature: &str) -> Result<Self, AbiError> {
        let (name, inputs) = parse_signature(signature)?;
        // Normalize so `uint` and `uint256` hash the same
        let canonical = format!(
            "{}({})",
            name,
            inputs.iter().map(|t| t.canonical_type()).collect::<Vec<_>>().join(",")
        );
        Ok(Self {
            name,
            selector: selector_from_signature(&canonical),
            signature: canonical,
            inputs,
        })
    }
}

/// Registry of known functions, keyed by selector
#[derive(Debug, Clone)]
pub struct KnownFunctions {
    functions: Vec<KnownFunction>,
}

impl KnownFunctions {
    // ERC-20
    pub const APPROVE: &'static str = "approve(address,uint256)";
    pub const TRANSFER: &'static str = "transfer(address,uint256)";

    // Entry point v0.6
    pub const GET_NONCE: &'static str = "getNonce(address,uint192)";

    // Smart wallet
    pub const EXECUTE: &'static str = "execute(address,uint256,bytes)";
    pub const EXECUTE_BATCH: &'static str = "executeBatch((address,uint256,bytes)[])";

    // Trade contract
    pub const BUY_SHARES: &'static str = "buyShares(uint256[],uint256[],uint256,uint256,address,bytes)";

    /// Registry with the built-in signatures
    pub fn builtin() -> Self {
        let functions = [
            Self::APPROVE,
            Self::TRANSFER,
            Self::GET_NONCE,
            Self::EXECUTE,
            Self::EXECUTE_BATCH,
            Self::BUY_SHARES,
        ]
        .iter()
        .filter_map(|sig| KnownFunction::from_signature(sig).ok())
        .collect();

        Self { functions }
    }

    /// Add a signature, replacing any entry with the same selector
    pub fn register(&mut self, signature: &str) -> Result<(), AbiError> {
        let function = KnownFunction::from_signature(signature)?;
        self.functions.retain(|f| f.selector != function.selector);
        self.functions.push(function);
        Ok(())
    }

    /// Identify a function by its selector
    pub fn identify(&self, selector: &[u8; 4]) -> Option<&KnownFunction> {
        self.functions.iter().find(|f| &f.selector == selector)
    }

    pub fn iter(&self) -> impl Iterator<Item = &KnownFunction> {
        self.functions.iter()
    }
}

impl Default for KnownFunctions {
    fn default() -> Self {
        Self::builtin()
    }
}
