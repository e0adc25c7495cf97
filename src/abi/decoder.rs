//! ABI decoder for contract call data and return values

use ethers_core::types::{Address, U256};

use super::types::*;

/// ABI decoder
///
/// Offsets and lengths come from untrusted input, so every read is checked
/// against the buffer before slicing.
pub struct AbiDecoder;

impl AbiDecoder {
    /// Decode a single value at `offset`; returns the value and the offset after its head slot
    pub fn decode_value(data: &[u8], abi_type: &AbiType, offset: usize) -> Result<(AbiValue, usize), AbiError> {
        match abi_type {
            AbiType::Uint(bits) => {
                let value = U256::from_big_endian(read_word(data, offset)?);
                if value.bits() > *bits {
                    return Err(AbiError::OutOfRange(format!("uint{} at offset {}", bits, offset)));
                }
                Ok((AbiValue::Uint(value), offset + 32))
            }

            AbiType::Address => {
                let word = read_word(data, offset)?;
                if word[..12].iter().any(|&b| b != 0) {
                    return Err(AbiError::DecodingError(format!(
                        "Dirty address padding at offset {}",
                        offset
                    )));
                }
                Ok((AbiValue::Address(Address::from_slice(&word[12..])), offset + 32))
            }

            AbiType::Bool => {
                let word = read_word(data, offset)?;
                let value = match U256::from_big_endian(word).low_u64() {
                    0 if word.iter().all(|&b| b == 0) => false,
                    1 if word[..31].iter().all(|&b| b == 0) => true,
                    _ => {
                        return Err(AbiError::DecodingError(format!(
                            "Invalid bool at offset {}",
                            offset
                        )))
                    }
                };
                Ok((AbiValue::Bool(value), offset + 32))
            }

            AbiType::FixedBytes(size) => {
                let word = read_word(data, offset)?;
                Ok((AbiValue::FixedBytes(word[..*size].to_vec()), offset + 32))
            }

            AbiType::Bytes => {
                let bytes = Self::decode_dynamic_bytes(data, offset)?;
                Ok((AbiValue::Bytes(bytes), offset + 32))
            }

            AbiType::String => {
                let bytes = Self::decode_dynamic_bytes(data, offset)?;
                let s = String::from_utf8(bytes)
                    .map_err(|_| AbiError::DecodingError("Invalid UTF-8 in string".to_string()))?;
                Ok((AbiValue::String(s), offset + 32))
            }

            AbiType::Array(inner_type) => {
                let count = read_usize(data, offset)?;
                let start = offset + 32;
                // Every element occupies at least one head word
                let remaining = data.len().saturating_sub(start);
                if count > remaining / 32 {
                    return Err(AbiError::DecodingError(format!(
                        "Array length {} exceeds available data",
                        count
                    )));
                }
                let types = vec![(**inner_type).clone(); count];
                let values = Self::decode_tuple(data, start, &types)?;
                Ok((AbiValue::Array(values), offset + 32))
            }

            AbiType::FixedArray(inner_type, size) => {
                let types = vec![(**inner_type).clone(); *size];
                let values = Self::decode_tuple(data, offset, &types)?;
                Ok((AbiValue::Array(values), offset + abi_type.head_size()))
            }

            AbiType::Tuple(types) => {
                let values = Self::decode_tuple(data, offset, types)?;
                Ok((AbiValue::Tuple(values), offset + abi_type.head_size()))
            }
        }
    }

    /// Decode a parameter list
    pub fn decode(data: &[u8], types: &[AbiType]) -> Result<Vec<AbiValue>, AbiError> {
        Self::decode_tuple(data, 0, types)
    }

    /// Decode the arguments of a call, given its parameter types; the 4-byte selector is skipped
    pub fn decode_call_arguments(calldata: &[u8], types: &[AbiType]) -> Result<Vec<AbiValue>, AbiError> {
        if calldata.len() < 4 {
            return Err(AbiError::DecodingError("Call data shorter than a selector".to_string()));
        }
        Self::decode(&calldata[4..], types)
    }

    /// Decode a tuple whose head starts at `base_offset`
    fn decode_tuple(data: &[u8], base_offset: usize, types: &[AbiType]) -> Result<Vec<AbiValue>, AbiError> {
        let mut values = Vec::with_capacity(types.len());
        let mut head_offset = base_offset;

        for abi_type in types {
            if abi_type.is_dynamic() {
                // Head slot holds the offset of the tail entry, relative to the tuple start
                let relative = read_usize(data, head_offset)?;
                let data_offset = base_offset
                    .checked_add(relative)
                    .filter(|o| *o < data.len())
                    .ok_or_else(|| {
                        AbiError::DecodingError(format!("Offset {:#x} points outside the data", relative))
                    })?;

                let (value, _) = Self::decode_value(data, abi_type, data_offset)?;
                values.push(value);
                head_offset += 32;
            } else {
                let (value, next) = Self::decode_value(data, abi_type, head_offset)?;
                values.push(value);
                head_offset = next;
            }
        }

        Ok(values)
    }

    /// Decode length-prefixed bytes at `offset`
    fn decode_dynamic_bytes(data: &[u8], offset: usize) -> Result<Vec<u8>, AbiError> {
        let len = read_usize(data, offset)?;
        let start = offset + 32;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| {
                AbiError::DecodingError(format!("Byte length {} exceeds available data", len))
            })?;

        Ok(data[start..end].to_vec())
    }
}

/// Borrow the 32-byte word at `offset`
pub fn read_word(data: &[u8], offset: usize) -> Result<&[u8], AbiError> {
    offset
        .checked_add(32)
        .filter(|end| *end <= data.len())
        .map(|end| &data[offset..end])
        .ok_or_else(|| AbiError::DecodingError(format!("Insufficient data at offset {}", offset)))
}

/// Read a word that must hold an offset or a length
fn read_usize(data: &[u8], offset: usize) -> Result<usize, AbiError> {
    let value = U256::from_big_endian(read_word(data, offset)?);
    if value.bits() > 32 {
        return Err(AbiError::DecodingError(format!(
            "Offset or length {:#x} at {} is too large",
            value, offset
        )));
    }
    Ok(value.low_u64() as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::encoder::AbiEncoder;

    #[test]
    fn test_decode_uint256() {
        let mut data = [0u8; 32];
        data[31] = 42;
        let (value, next) = AbiDecoder::decode_value(&data, &AbiType::uint256(), 0).unwrap();
        assert_eq!(value, AbiValue::uint(42));
        assert_eq!(next, 32);
    }

    #[test]
    fn test_decode_rejects_short_input() {
        let data = [0u8; 31];
        assert!(AbiDecoder::decode_value(&data, &AbiType::uint256(), 0).is_err());
        assert!(AbiDecoder::decode_value(&[0u8; 64], &AbiType::uint256(), 40).is_err());
    }

    #[test]
    fn test_decode_dirty_address() {
        let data = [0xffu8; 32];
        assert!(AbiDecoder::decode_value(&data, &AbiType::Address, 0).is_err());
    }

    #[test]
    fn test_decode_bool() {
        let mut data = [0u8; 32];
        data[31] = 1;
        let (value, _) = AbiDecoder::decode_value(&data, &AbiType::Bool, 0).unwrap();
        assert_eq!(value, AbiValue::Bool(true));

        data[31] = 2;
        assert!(AbiDecoder::decode_value(&data, &AbiType::Bool, 0).is_err());
    }

    #[test]
    fn test_decode_bytes_and_array() {
        let types = vec![AbiType::array(AbiType::uint256()), AbiType::Bytes];
        let values = vec![
            AbiValue::Array(vec![AbiValue::uint(7), AbiValue::uint(8)]),
            AbiValue::Bytes(vec![0xaa; 33]),
        ];
        let encoded = AbiEncoder::encode(&values, &types).unwrap();
        assert_eq!(AbiDecoder::decode(&encoded, &types).unwrap(), values);
    }

    #[test]
    fn test_decode_offset_out_of_bounds() {
        // Single bytes parameter whose offset points past the end
        let mut data = vec![0u8; 64];
        data[31] = 0xff;
        let result = AbiDecoder::decode(&data, &[AbiType::Bytes]);
        assert!(matches!(result, Err(AbiError::DecodingError(_))));
    }

    #[test]
    fn test_decode_length_overflow() {
        // Offset 0x20 then a length of 2^255
        let mut data = vec![0u8; 64];
        data[31] = 0x20;
        data[32] = 0x80;
        assert!(AbiDecoder::decode(&data, &[AbiType::Bytes]).is_err());

        // Array length larger than remaining words
        let mut data = vec![0u8; 64];
        data[31] = 0x20;
        data[63] = 0x10;
        assert!(AbiDecoder::decode(&data, &[AbiType::array(AbiType::uint256())]).is_err());
    }

    #[test]
    fn test_decode_call_arguments() {
        let data = AbiEncoder::encode_function_call("getNonce(address,uint192)", &[
            AbiValue::Address(Address::repeat_byte(0x01)),
            AbiValue::uint(0),
        ])
        .unwrap();
        let values =
            AbiDecoder::decode_call_arguments(&data, &[AbiType::Address, AbiType::Uint(192)]).unwrap();
        assert_eq!(values[0], AbiValue::Address(Address::repeat_byte(0x01)));

        assert!(AbiDecoder::decode_call_arguments(&[0x12, 0x34], &[]).is_err());
    }
}
