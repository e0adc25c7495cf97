//! ERC-4337 UserOperation structure and hashing
//!
//! Implements the v0.6 UserOperation format expected by entry point
//! `0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789`.

use ethers_core::types::{Address, Bytes, H256, U256};
use serde::{Deserialize, Serialize};

use crate::abi::{keccak256, AbiEncoder, AbiType, AbiValue};
use crate::error::TraderResult;
use crate::utils::{u256_flexible, u256_flexible_opt};

/// UserOperation for ERC-4337 v0.6
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// The account making the operation
    pub sender: Address,
    /// Anti-replay parameter (key << 64 | sequence)
    pub nonce: U256,
    /// Factory address + init data; empty for deployed accounts
    pub init_code: Bytes,
    /// The encoded calls to execute
    pub call_data: Bytes,
    /// Gas limit for executing callData
    pub call_gas_limit: U256,
    /// Gas for account validation
    pub verification_gas_limit: U256,
    /// Gas to compensate bundler for overhead
    pub pre_verification_gas: U256,
    /// Maximum total fee per gas
    pub max_fee_per_gas: U256,
    /// Maximum priority fee per gas
    pub max_priority_fee_per_gas: U256,
    /// Paymaster address + paymaster-specific data
    pub paymaster_and_data: Bytes,
    /// Signature over the userOp hash, in the account's format
    pub signature: Bytes,
}

impl UserOperation {
    /// Create an unsigned, unsponsored operation with zero gas values
    pub fn new(sender: Address, nonce: U256, call_data: Vec<u8>) -> Self {
        Self {
            sender,
            nonce,
            init_code: Bytes::new(),
            call_data: call_data.into(),
            call_gas_limit: U256::zero(),
            verification_gas_limit: U256::zero(),
            pre_verification_gas: U256::zero(),
            max_fee_per_gas: U256::zero(),
            max_priority_fee_per_gas: U256::zero(),
            paymaster_and_data: Bytes::new(),
            signature: Bytes::new(),
        }
    }

    /// Set fee parameters
    pub fn with_fees(mut self, fees: &FeeQuote) -> Self {
        self.max_fee_per_gas = fees.max_fee_per_gas;
        self.max_priority_fee_per_gas = fees.max_priority_fee_per_gas;
        self
    }

    /// Set gas limits from an estimate
    pub fn with_gas(mut self, gas: &GasEstimate) -> Self {
        self.call_gas_limit = gas.call_gas_limit;
        self.verification_gas_limit = gas.verification_gas_limit;
        self.pre_verification_gas = gas.pre_verification_gas;
        self
    }

    pub fn with_paymaster_and_data(mut self, paymaster_and_data: Bytes) -> Self {
        self.paymaster_and_data = paymaster_and_data;
        self
    }

    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = signature.into();
        self
    }

    /// Pack the fields covered by the hash (v0.6 format).
    /// Dynamic fields are replaced by their keccak256, the signature is excluded.
    pub fn pack_for_hash(&self) -> TraderResult<Vec<u8>> {
        let word = |bytes: &[u8]| AbiValue::FixedBytes(keccak256(bytes).to_vec());

        let values = [
            AbiValue::Address(self.sender),
            AbiValue::Uint(self.nonce),
            word(&self.init_code),
            word(&self.call_data),
            AbiValue::Uint(self.call_gas_limit),
            AbiValue::Uint(self.verification_gas_limit),
            AbiValue::Uint(self.pre_verification_gas),
            AbiValue::Uint(self.max_fee_per_gas),
            AbiValue::Uint(self.max_priority_fee_per_gas),
            word(&self.paymaster_and_data),
        ];
        let types = [
            AbiType::Address,
            AbiType::uint256(),
            AbiType::FixedBytes(32),
            AbiType::FixedBytes(32),
            AbiType::uint256(),
            AbiType::uint256(),
            AbiType::uint256(),
            AbiType::uint256(),
            AbiType::uint256(),
            AbiType::FixedBytes(32),
        ];

        Ok(AbiEncoder::encode(&values, &types)?)
    }

    /// Get the hash the account owner signs:
    /// `keccak256(abi.encode(keccak256(pack), entryPoint, chainId))`
    pub fn hash(&self, entry_point: Address, chain_id: u64) -> TraderResult<H256> {
        let inner = keccak256(&self.pack_for_hash()?);

        let outer = AbiEncoder::encode(
            &[
                AbiValue::FixedBytes(inner.to_vec()),
                AbiValue::Address(entry_point),
                AbiValue::uint(chain_id),
            ],
            &[AbiType::FixedBytes(32), AbiType::Address, AbiType::uint256()],
        )?;

        Ok(H256::from(keccak256(&outer)))
    }
}

/// Fee parameters for a UserOperation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeQuote {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// Gas estimate from bundler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    #[serde(deserialize_with = "u256_flexible")]
    pub pre_verification_gas: U256,
    #[serde(deserialize_with = "u256_flexible")]
    pub verification_gas_limit: U256,
    #[serde(deserialize_with = "u256_flexible")]
    pub call_gas_limit: U256,
}

impl GasEstimate {
    pub fn new(pre_verification_gas: u64, verification_gas_limit: u64, call_gas_limit: u64) -> Self {
        Self {
            pre_verification_gas: U256::from(pre_verification_gas),
            verification_gas_limit: U256::from(verification_gas_limit),
            call_gas_limit: U256::from(call_gas_limit),
        }
    }
}

/// UserOperation receipt from bundler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    pub user_op_hash: H256,
    #[serde(default)]
    pub entry_point: Option<Address>,
    #[serde(default)]
    pub sender: Option<Address>,
    #[serde(default, deserialize_with = "u256_flexible_opt")]
    pub actual_gas_cost: Option<U256>,
    #[serde(default, deserialize_with = "u256_flexible_opt")]
    pub actual_gas_used: Option<U256>,
    /// Whether the inner call succeeded
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
    pub receipt: TransactionReceipt,
}

impl UserOperationReceipt {
    pub fn transaction_hash(&self) -> H256 {
        self.receipt.transaction_hash
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: H256,
    #[serde(default)]
    pub block_hash: Option<H256>,
    #[serde(default, deserialize_with = "u256_flexible_opt")]
    pub block_number: Option<U256>,
    #[serde(default, deserialize_with = "u256_flexible_opt")]
    pub gas_used: Option<U256>,
    #[serde(default)]
    pub status: Option<String>,
}
