//! ABI type and value model for the contract calls the trader makes

use std::fmt;
use std::str::FromStr;

use ethers_core::types::{Address, U256};
use thiserror::Error;

/// Solidity types understood by the codec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    /// `uint<bits>`, bits in 8..=256 and a multiple of 8
    Uint(usize),

    /// Address (20 bytes)
    Address,

    /// Boolean
    Bool,

    /// `bytes<N>`, N in 1..=32
    FixedBytes(usize),

    /// Dynamic bytes
    Bytes,

    /// Dynamic string
    String,

    /// Dynamic array T[]
    Array(Box<AbiType>),

    /// Fixed-size array T[N]
    FixedArray(Box<AbiType>, usize),

    /// Tuple (struct)
    Tuple(Vec<AbiType>),
}

impl AbiType {
    pub fn uint256() -> Self {
        AbiType::Uint(256)
    }

    pub fn array(inner: AbiType) -> Self {
        AbiType::Array(Box::new(inner))
    }

    /// Check if the type is dynamic (requires offset encoding)
    pub fn is_dynamic(&self) -> bool {
        match self {
            AbiType::Bytes | AbiType::String | AbiType::Array(_) => true,
            AbiType::FixedArray(inner, _) => inner.is_dynamic(),
            AbiType::Tuple(components) => components.iter().any(|t| t.is_dynamic()),
            _ => false,
        }
    }

    /// Size in bytes this type occupies in the head of an enclosing tuple
    pub fn head_size(&self) -> usize {
        match self {
            AbiType::Tuple(components) if !self.is_dynamic() => {
                components.iter().map(|t| t.head_size()).sum()
            }
            AbiType::FixedArray(inner, size) if !self.is_dynamic() => inner.head_size() * size,
            _ => 32,
        }
    }

    /// Get the canonical type string for signature calculation
    pub fn canonical_type(&self) -> String {
        match self {
            AbiType::Uint(bits) => format!("uint{}", bits),
            AbiType::Address => "address".to_string(),
            AbiType::Bool => "bool".to_string(),
            AbiType::FixedBytes(size) => format!("bytes{}", size),
            AbiType::Bytes => "bytes".to_string(),
            AbiType::String => "string".to_string(),
            AbiType::Array(inner) => format!("{}[]", inner.canonical_type()),
            AbiType::FixedArray(inner, size) => format!("{}[{}]", inner.canonical_type(), size),
            AbiType::Tuple(components) => {
                let inner = components
                    .iter()
                    .map(|t| t.canonical_type())
                    .collect::<Vec<_>>()
                    .join(",");
                format!("({})", inner)
            }
        }
    }

    /// Parse tuple components handling nested parentheses
    fn parse_tuple_components(s: &str) -> Result<Vec<AbiType>, AbiError> {
        let mut components = Vec::new();
        let mut current = String::new();
        let mut depth = 0i32;

        for c in s.chars() {
            match c {
                '(' => {
                    depth += 1;
                    current.push(c);
                }
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(AbiError::InvalidType(format!("Unbalanced parentheses: {}", s)));
                    }
                    current.push(c);
                }
                ',' if depth == 0 => {
                    components.push(current.trim().parse()?);
                    current.clear();
                }
                _ => current.push(c),
            }
        }

        if depth != 0 {
            return Err(AbiError::InvalidType(format!("Unbalanced parentheses: {}", s)));
        }
        components.push(current.trim().parse()?);

        Ok(components)
    }
}

impl FromStr for AbiType {
    type Err = AbiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AbiError::InvalidType("Empty type".to_string()));
        }

        // Arrays first so that `(a,b)[]` is not mistaken for a tuple
        if let Some(inner) = s.strip_suffix("[]") {
            return Ok(AbiType::Array(Box::new(inner.parse()?)));
        }

        if s.ends_with(']') {
            if let Some(idx) = s.rfind('[') {
                let size_str = &s[idx + 1..s.len() - 1];
                let size: usize = size_str
                    .parse()
                    .map_err(|_| AbiError::InvalidType(format!("Invalid array size: {}", size_str)))?;
                if size == 0 {
                    return Err(AbiError::InvalidType(format!("Zero-length array: {}", s)));
                }
                return Ok(AbiType::FixedArray(Box::new(s[..idx].parse()?), size));
            }
        }

        if s.starts_with('(') && s.ends_with(')') {
            let inner = &s[1..s.len() - 1];
            if inner.trim().is_empty() {
                return Ok(AbiType::Tuple(vec![]));
            }
            return Ok(AbiType::Tuple(Self::parse_tuple_components(inner)?));
        }

        match s {
            "address" => Ok(AbiType::Address),
            "bool" => Ok(AbiType::Bool),
            "bytes" => Ok(AbiType::Bytes),
            "string" => Ok(AbiType::String),
            "uint" => Ok(AbiType::Uint(256)),

            s if s.starts_with("uint") => {
                let bits: usize = s[4..]
                    .parse()
                    .map_err(|_| AbiError::InvalidType(format!("Invalid uint size: {}", s)))?;
                if bits == 0 || bits > 256 || bits % 8 != 0 {
                    return Err(AbiError::InvalidType(format!("Unsupported uint size: {}", bits)));
                }
                Ok(AbiType::Uint(bits))
            }

            s if s.starts_with("bytes") => {
                let size: usize = s[5..]
                    .parse()
                    .map_err(|_| AbiError::InvalidType(format!("Invalid bytes size: {}", s)))?;
                if size == 0 || size > 32 {
                    return Err(AbiError::InvalidType(format!("bytes size must be 1-32: {}", size)));
                }
                Ok(AbiType::FixedBytes(size))
            }

            _ => Err(AbiError::InvalidType(format!("Unknown type: {}", s))),
        }
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_type())
    }
}

/// Split `name(type1,type2)` into the name and parameter types
pub fn parse_signature(signature: &str) -> Result<(String, Vec<AbiType>), AbiError> {
    let signature = signature.trim();
    let start = signature
        .find('(')
        .ok_or_else(|| AbiError::InvalidType(format!("Missing '(' in signature: {}", signature)))?;
    if !signature.ends_with(')') {
        return Err(AbiError::InvalidType(format!("Missing ')' in signature: {}", signature)));
    }

    let name = signature[..start].trim();
    if name.is_empty() {
        return Err(AbiError::InvalidType(format!("Missing function name: {}", signature)));
    }

    match signature[start..].parse::<AbiType>()? {
        AbiType::Tuple(types) => Ok((name.to_string(), types)),
        _ => Err(AbiError::InvalidType(format!("Malformed parameter list: {}", signature))),
    }
}

/// ABI value - runtime representation of Solidity values
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Uint(U256),
    Address(Address),
    Bool(bool),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    /// Elements of a dynamic or fixed array
    Array(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    /// Create a uint value from a u64
    pub fn uint(value: u64) -> Self {
        AbiValue::Uint(U256::from(value))
    }

    /// Create a uint value from a string (decimal or 0x-prefixed hex)
    pub fn uint_from_str(s: &str) -> Result<Self, AbiError> {
        parse_u256(s).map(AbiValue::Uint)
    }

    /// Create an Address value from a hex string
    pub fn address_from_str(s: &str) -> Result<Self, AbiError> {
        parse_address(s).map(AbiValue::Address)
    }

    /// Create bytes value from hex string
    pub fn bytes_from_hex(s: &str) -> Result<Self, AbiError> {
        decode_hex(s).map(AbiValue::Bytes)
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            AbiValue::Uint(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            AbiValue::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AbiValue::Bytes(b) | AbiValue::FixedBytes(b) => Some(b),
            _ => None,
        }
    }

    /// Elements of an array or fields of a tuple
    pub fn as_list(&self) -> Option<&[AbiValue]> {
        match self {
            AbiValue::Array(values) | AbiValue::Tuple(values) => Some(values),
            _ => None,
        }
    }

    /// Best-effort type of this value, used in mismatch reports
    pub fn get_type(&self) -> AbiType {
        match self {
            AbiValue::Uint(_) => AbiType::Uint(256),
            AbiValue::Address(_) => AbiType::Address,
            AbiValue::Bool(_) => AbiType::Bool,
            AbiValue::FixedBytes(b) => AbiType::FixedBytes(b.len()),
            AbiValue::Bytes(_) => AbiType::Bytes,
            AbiValue::String(_) => AbiType::String,
            AbiValue::Array(values) => match values.first() {
                Some(first) => AbiType::Array(Box::new(first.get_type())),
                None => AbiType::Array(Box::new(AbiType::Uint(256))),
            },
            AbiValue::Tuple(values) => AbiType::Tuple(values.iter().map(|v| v.get_type()).collect()),
        }
    }
}

impl fmt::Display for AbiValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiValue::Uint(u) => write!(f, "{}", u),
            AbiValue::Address(a) => write!(f, "{:?}", a),
            AbiValue::Bool(b) => write!(f, "{}", b),
            AbiValue::FixedBytes(b) | AbiValue::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            AbiValue::String(s) => write!(f, "{:?}", s),
            AbiValue::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            AbiValue::Tuple(values) => {
                write!(f, "(")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Strip an optional `0x`/`0X` prefix
pub fn strip_0x(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Decode a hex string with or without `0x` prefix
pub fn decode_hex(s: &str) -> Result<Vec<u8>, AbiError> {
    hex::decode(strip_0x(s)).map_err(|e| AbiError::InvalidValue(format!("Invalid hex: {}", e)))
}

/// Parse a 20-byte address from hex
pub fn parse_address(s: &str) -> Result<Address, AbiError> {
    let bytes = decode_hex(s)?;
    if bytes.len() != 20 {
        return Err(AbiError::InvalidValue(format!(
            "Address must be 20 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes))
}

/// Parse a 256-bit integer from decimal or 0x-prefixed hex
pub fn parse_u256(s: &str) -> Result<U256, AbiError> {
    let s = s.trim();
    if s.starts_with("0x") || s.starts_with("0X") {
        let digits = strip_0x(s);
        if digits.is_empty() {
            return Ok(U256::zero());
        }
        U256::from_str_radix(digits, 16)
            .map_err(|_| AbiError::InvalidValue(format!("Invalid hex integer: {}", s)))
    } else {
        U256::from_dec_str(s).map_err(|_| AbiError::InvalidValue(format!("Invalid decimal integer: {}", s)))
    }
}

/// Encode a U256 as a 32-byte big-endian word
pub fn u256_to_word(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

/// ABI errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("Invalid type: {0}")]
    InvalidType(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Value does not fit in {0}")]
    OutOfRange(String),
}
