//! ABI encoder for contract call data

use ethers_core::types::U256;

use super::selector::selector_from_signature;
use super::types::*;

/// ABI encoder
pub struct AbiEncoder;

impl AbiEncoder {
    /// Encode a single value according to its type
    pub fn encode_value(value: &AbiValue, abi_type: &AbiType) -> Result<Vec<u8>, AbiError> {
        match (value, abi_type) {
            (AbiValue::Uint(u), AbiType::Uint(bits)) => {
                if u.bits() > *bits {
                    return Err(AbiError::OutOfRange(format!("uint{} (value {})", bits, u)));
                }
                Ok(u256_to_word(*u).to_vec())
            }

            (AbiValue::Address(addr), AbiType::Address) => {
                let mut result = [0u8; 32];
                result[12..].copy_from_slice(addr.as_bytes());
                Ok(result.to_vec())
            }

            (AbiValue::Bool(b), AbiType::Bool) => {
                let mut result = [0u8; 32];
                result[31] = u8::from(*b);
                Ok(result.to_vec())
            }

            // bytesN is left-aligned and must have exactly N bytes
            (AbiValue::FixedBytes(bytes), AbiType::FixedBytes(size)) => {
                if bytes.len() != *size {
                    return Err(AbiError::TypeMismatch {
                        expected: format!("bytes{}", size),
                        got: format!("{} bytes", bytes.len()),
                    });
                }
                let mut result = [0u8; 32];
                result[..bytes.len()].copy_from_slice(bytes);
                Ok(result.to_vec())
            }

            (AbiValue::Bytes(bytes), AbiType::Bytes) => Ok(Self::encode_dynamic_bytes(bytes)),

            (AbiValue::String(s), AbiType::String) => Ok(Self::encode_dynamic_bytes(s.as_bytes())),

            (AbiValue::Array(values), AbiType::Array(inner_type)) => {
                Self::encode_dynamic_array(values, inner_type)
            }

            (AbiValue::Array(values), AbiType::FixedArray(inner_type, size)) => {
                if values.len() != *size {
                    return Err(AbiError::TypeMismatch {
                        expected: format!("array of size {}", size),
                        got: format!("array of size {}", values.len()),
                    });
                }
                Self::encode_fixed_array(values, inner_type)
            }

            (AbiValue::Tuple(values), AbiType::Tuple(types)) => {
                if values.len() != types.len() {
                    return Err(AbiError::TypeMismatch {
                        expected: format!("tuple of {} elements", types.len()),
                        got: format!("tuple of {} elements", values.len()),
                    });
                }
                Self::encode_tuple(values, types)
            }

            _ => Err(AbiError::TypeMismatch {
                expected: abi_type.canonical_type(),
                got: value.get_type().canonical_type(),
            }),
        }
    }

    /// Encode multiple values as a parameter list
    pub fn encode(values: &[AbiValue], types: &[AbiType]) -> Result<Vec<u8>, AbiError> {
        if values.len() != types.len() {
            return Err(AbiError::EncodingError(format!(
                "Value count {} doesn't match type count {}",
                values.len(),
                types.len()
            )));
        }

        Self::encode_tuple(values, types)
    }

    /// Encode a tuple (also used for function parameters)
    pub fn encode_tuple(values: &[AbiValue], types: &[AbiType]) -> Result<Vec<u8>, AbiError> {
        let head_size: usize = types.iter().map(|t| t.head_size()).sum();

        let mut head = Vec::with_capacity(head_size);
        let mut tail = Vec::new();

        for (value, abi_type) in values.iter().zip(types.iter()) {
            let encoded = Self::encode_value(value, abi_type)?;
            if abi_type.is_dynamic() {
                // Head slot holds the offset of the tail entry, relative to the tuple start
                let offset = U256::from(head_size + tail.len());
                head.extend_from_slice(&u256_to_word(offset));
                tail.extend_from_slice(&encoded);
            } else {
                head.extend_from_slice(&encoded);
            }
        }

        head.extend_from_slice(&tail);
        Ok(head)
    }

    /// Encode dynamic bytes: length word followed by right-padded data
    pub fn encode_dynamic_bytes(bytes: &[u8]) -> Vec<u8> {
        let padded_len = padded_len(bytes.len());
        let mut result = Vec::with_capacity(32 + padded_len);

        result.extend_from_slice(&u256_to_word(U256::from(bytes.len())));
        result.extend_from_slice(bytes);
        result.resize(32 + padded_len, 0);

        result
    }

    fn encode_dynamic_array(values: &[AbiValue], inner_type: &AbiType) -> Result<Vec<u8>, AbiError> {
        let mut result = u256_to_word(U256::from(values.len())).to_vec();

        // Elements are encoded as a tuple after the length word
        let types = vec![inner_type.clone(); values.len()];
        result.extend_from_slice(&Self::encode_tuple(values, &types)?);

        Ok(result)
    }

    fn encode_fixed_array(values: &[AbiValue], inner_type: &AbiType) -> Result<Vec<u8>, AbiError> {
        let types = vec![inner_type.clone(); values.len()];
        Self::encode_tuple(values, &types)
    }

    /// Encode a function call (selector + parameters) from its signature,
    /// e.g. `approve(address,uint256)`
    pub fn encode_function_call(signature: &str, values: &[AbiValue]) -> Result<Vec<u8>, AbiError> {
        let (_, types) = parse_signature(signature)?;
        let selector = selector_from_signature(signature);

        let mut result = selector.to_vec();
        result.extend_from_slice(&Self::encode(values, &types)?);

        Ok(result)
    }
}

/// Round a byte length up to the next multiple of 32
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(32) * 32
}
