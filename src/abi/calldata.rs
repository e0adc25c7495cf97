//! Call data for the contracts a share purchase touches
//!
//! A purchase is one `executeBatch` on the smart wallet holding two calls:
//! an ERC-20 `approve` of the trade contract, then `buyShares` on it.

use ethers_core::types::{Address, U256};

use super::decoder::AbiDecoder;
use super::encoder::AbiEncoder;
use super::selector::{selector_from_signature, KnownFunctions};
use super::types::*;

/// 65-byte ECDSA placeholder accepted by bundlers and paymasters during
/// simulation. r and s are well-formed so signature recovery does not revert.
pub const DUMMY_ECDSA_SIGNATURE: &str = "fffffffffffffffffffffffffffffff0000000000000000000000000000000007aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1c";

/// One call inside an `executeBatch`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCall {
    pub target: Address,
    pub value: U256,
    pub data: Vec<u8>,
}

impl BatchCall {
    pub fn new(target: Address, data: Vec<u8>) -> Self {
        Self {
            target,
            value: U256::zero(),
            data,
        }
    }

    fn abi_type() -> AbiType {
        AbiType::Tuple(vec![AbiType::Address, AbiType::uint256(), AbiType::Bytes])
    }

    fn to_value(&self) -> AbiValue {
        AbiValue::Tuple(vec![
            AbiValue::Address(self.target),
            AbiValue::Uint(self.value),
            AbiValue::Bytes(self.data.clone()),
        ])
    }

    fn from_value(value: &AbiValue) -> Result<Self, AbiError> {
        match value.as_list() {
            Some([AbiValue::Address(target), AbiValue::Uint(value), AbiValue::Bytes(data)]) => Ok(Self {
                target: *target,
                value: *value,
                data: data.clone(),
            }),
            _ => Err(AbiError::TypeMismatch {
                expected: Self::abi_type().canonical_type(),
                got: value.get_type().canonical_type(),
            }),
        }
    }
}

/// Arguments of `buyShares`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuySharesCall {
    pub player_ids: Vec<U256>,
    pub max_gold_amounts: Vec<U256>,
    /// Nonce issued with the trade signature
    pub nonce: U256,
    pub deadline: U256,
    /// Account receiving the shares (the smart wallet)
    pub user: Address,
    pub signature: Vec<u8>,
}

impl BuySharesCall {
    pub fn encode(&self) -> Result<Vec<u8>, AbiError> {
        if self.player_ids.len() != self.max_gold_amounts.len() {
            return Err(AbiError::InvalidValue(format!(
                "{} player ids but {} max gold amounts",
                self.player_ids.len(),
                self.max_gold_amounts.len()
            )));
        }

        let uints = |values: &[U256]| AbiValue::Array(values.iter().copied().map(AbiValue::Uint).collect());
        AbiEncoder::encode_function_call(
            KnownFunctions::BUY_SHARES,
            &[
                uints(&self.player_ids),
                uints(&self.max_gold_amounts),
                AbiValue::Uint(self.nonce),
                AbiValue::Uint(self.deadline),
                AbiValue::Address(self.user),
                AbiValue::Bytes(self.signature.clone()),
            ],
        )
    }
}

/// `approve(spender, amount)` on an ERC-20 token
pub fn approve(spender: Address, amount: U256) -> Result<Vec<u8>, AbiError> {
    AbiEncoder::encode_function_call(
        KnownFunctions::APPROVE,
        &[AbiValue::Address(spender), AbiValue::Uint(amount)],
    )
}

/// `buyShares(...)` on the trade contract
pub fn buy_shares(call: &BuySharesCall) -> Result<Vec<u8>, AbiError> {
    call.encode()
}

/// `executeBatch((address,uint256,bytes)[])` on the smart wallet
pub fn execute_batch(calls: &[BatchCall]) -> Result<Vec<u8>, AbiError> {
    let batch = AbiValue::Array(calls.iter().map(BatchCall::to_value).collect());
    AbiEncoder::encode_function_call(KnownFunctions::EXECUTE_BATCH, &[batch])
}

/// Split `executeBatch` call data back into its calls
pub fn decode_execute_batch(calldata: &[u8]) -> Result<Vec<BatchCall>, AbiError> {
    let expected = selector_from_signature(KnownFunctions::EXECUTE_BATCH);
    if calldata.len() < 4 || calldata[..4] != expected {
        return Err(AbiError::DecodingError("Not executeBatch call data".to_string()));
    }

    let values = AbiDecoder::decode_call_arguments(calldata, &[AbiType::array(BatchCall::abi_type())])?;
    match values.first() {
        Some(AbiValue::Array(items)) => items.iter().map(BatchCall::from_value).collect(),
        _ => Err(AbiError::DecodingError("Missing batch array".to_string())),
    }
}

/// `getNonce(sender, key)` on the entry point; `key` is a uint192
pub fn get_nonce(sender: Address, key: U256) -> Result<Vec<u8>, AbiError> {
    AbiEncoder::encode_function_call(
        KnownFunctions::GET_NONCE,
        &[AbiValue::Address(sender), AbiValue::Uint(key)],
    )
}

/// Smart-wallet signature wrapper: `abi.encode((uint256 ownerIndex, bytes signatureData))`
pub fn wrap_owner_signature(owner_index: u64, signature: &[u8]) -> Result<Vec<u8>, AbiError> {
    let wrapper = AbiType::Tuple(vec![AbiType::uint256(), AbiType::Bytes]);
    let value = AbiValue::Tuple(vec![AbiValue::uint(owner_index), AbiValue::Bytes(signature.to_vec())]);
    AbiEncoder::encode(&[value], &[wrapper])
}

/// Placeholder signature for stub, estimate and paymaster requests
pub fn dummy_owner_signature() -> Result<Vec<u8>, AbiError> {
    wrap_owner_signature(0, &decode_hex(DUMMY_ECDSA_SIGNATURE)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_buy() -> BuySharesCall {
        BuySharesCall {
            player_ids: vec![U256::from(123u64)],
            max_gold_amounts: vec![U256::from(5_000_000u64)],
            nonce: U256::from(9u64),
            deadline: U256::from(1_700_000_000u64),
            user: Address::repeat_byte(0x22),
            signature: vec![0x33; 65],
        }
    }

    #[test]
    fn test_approve_length() {
        let data = approve(Address::repeat_byte(0x11), U256::MAX).unwrap();
        assert_eq!(data.len(), 68);
        assert_eq!(&data[..4], &[0x09, 0x5e, 0xa7, 0xb3]);
        assert!(data[36..68].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn test_buy_shares_layout() {
        let data = buy_shares(&sample_buy()).unwrap();
        assert_eq!(hex::encode(&data[..4]), "d3dff0a5");
        // 6 head words, two single-element arrays (2 words each), signature (1 + 3 words)
        assert_eq!(data.len(), 4 + 6 * 32 + 2 * 64 + 4 * 32);
        // playerIds array sits right after the six head words
        assert_eq!(data[4 + 31], 0xc0);
    }

    #[test]
    fn test_buy_shares_length_mismatch() {
        let mut call = sample_buy();
        call.max_gold_amounts.clear();
        assert!(matches!(buy_shares(&call), Err(AbiError::InvalidValue(_))));
    }

    #[test]
    fn test_execute_batch_decodes_back() {
        let calls = vec![
            BatchCall::new(Address::repeat_byte(0x01), approve(Address::repeat_byte(0x02), U256::from(10u64)).unwrap()),
            BatchCall::new(Address::repeat_byte(0x02), buy_shares(&sample_buy()).unwrap()),
        ];
        let data = execute_batch(&calls).unwrap();
        assert_eq!(decode_execute_batch(&data).unwrap(), calls);
    }

    #[test]
    fn test_decode_execute_batch_wrong_selector() {
        let data = approve(Address::zero(), U256::one()).unwrap();
        assert!(decode_execute_batch(&data).is_err());
    }

    #[test]
    fn test_get_nonce_key_range() {
        let data = get_nonce(Address::repeat_byte(0x05), U256::one() << 191).unwrap();
        assert_eq!(data.len(), 68);
        assert!(get_nonce(Address::zero(), U256::one() << 192).is_err());
    }

    #[test]
    fn test_dummy_owner_signature_layout() {
        let wrapped = dummy_owner_signature().unwrap();
        let words: Vec<String> = wrapped.chunks(32).map(hex::encode).collect();

        assert_eq!(wrapped.len(), 7 * 32);
        assert!(words[0].ends_with("20"));
        assert_eq!(words[1], "0".repeat(64));
        assert!(words[2].ends_with("40"));
        assert!(words[3].ends_with("41"));
        assert_eq!(hex::encode(&wrapped[128..193]), DUMMY_ECDSA_SIGNATURE);
        assert!(wrapped[193..].iter().all(|&b| b == 0));
    }
}
