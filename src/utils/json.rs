//! JSON Parsing Utilities
//!
//! Safe JSON parsing with proper error handling, plus serde adapters for
//! integers that remote services send either as numbers or as strings.

use ethers_core::types::U256;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};

use crate::error::{TraderError, TraderResult};

/// Safely parse JSON string into a type
pub fn parse_json<T: DeserializeOwned>(json_str: &str) -> TraderResult<T> {
    serde_json::from_str(json_str).map_err(|e| TraderError::parse_error(format!("JSON parse error: {}", e)))
}

/// Parse a quantity given as decimal or 0x-prefixed hex
pub fn parse_quantity(s: &str) -> TraderResult<U256> {
    crate::abi::parse_u256(s).map_err(|_| TraderError::parse_error(format!("Invalid integer '{}'", s)))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(serde_json::Number),
    String(String),
}

fn number_or_string_to_u256(raw: NumberOrString) -> Result<U256, String> {
    match raw {
        NumberOrString::Number(n) => match n.as_u64() {
            Some(v) => Ok(U256::from(v)),
            // Beyond u64 serde_json only has floats; such amounts must be sent as strings
            None => Err(format!("not an unsigned 64-bit integer: {}", n)),
        },
        NumberOrString::String(s) => parse_quantity(&s).map_err(|e| e.message),
    }
}

/// Deserialize a U256 from a JSON number, a decimal string, or a hex string
pub fn u256_flexible<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    number_or_string_to_u256(NumberOrString::deserialize(deserializer)?).map_err(D::Error::custom)
}

/// Same as [`u256_flexible`] for optional fields
pub fn u256_flexible_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<U256>, D::Error> {
    match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(raw) => number_or_string_to_u256(raw).map(Some).map_err(D::Error::custom),
        None => Ok(None),
    }
}

/// Deserialize a u64 from a JSON number or a decimal/hex string
pub fn u64_flexible<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = u256_flexible(deserializer)?;
    if value.bits() > 64 {
        return Err(D::Error::custom(format!("{} does not fit in u64", value)));
    }
    Ok(value.low_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "u256_flexible")]
        amount: U256,
        #[serde(deserialize_with = "u64_flexible")]
        deadline: u64,
        #[serde(default, deserialize_with = "u256_flexible_opt")]
        optional: Option<U256>,
    }

    #[test]
    fn test_flexible_integers() {
        let s: Sample = parse_json(r#"{"amount": "0x2a", "deadline": 1700000000}"#).unwrap();
        assert_eq!(s.amount, U256::from(42u64));
        assert_eq!(s.deadline, 1_700_000_000);
        assert!(s.optional.is_none());

        let s: Sample =
            parse_json(r#"{"amount": "1000000000000000000000", "deadline": "12", "optional": 5}"#).unwrap();
        assert_eq!(s.amount, U256::exp10(21));
        assert_eq!(s.deadline, 12);
        assert_eq!(s.optional, Some(U256::from(5u64)));
    }

    #[test]
    fn test_flexible_rejects_garbage() {
        assert!(parse_json::<Sample>(r#"{"amount": "abc", "deadline": 1}"#).is_err());
        assert!(parse_json::<Sample>(r#"{"amount": -1, "deadline": 1}"#).is_err());
        assert!(parse_json::<Sample>(r#"{"amount": 1, "deadline": "0x10000000000000000"}"#).is_err());
    }
}
