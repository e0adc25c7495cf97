//! Human-readable breakdown of call data

use std::fmt;

use ethers_core::types::{Address, U256};
use serde::Serialize;

use super::calldata::decode_execute_batch;
use super::decoder::AbiDecoder;
use super::selector::KnownFunctions;
use super::types::AbiError;

/// One 32-byte argument word
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordView {
    pub index: usize,
    /// Offset relative to the start of the arguments
    pub offset: usize,
    pub hex: String,
    pub uint: String,
    /// Present when the top 12 bytes are zero and the rest is not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Decoded view of a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalldataReport {
    pub selector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    pub arguments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<String>,
    pub words: Vec<WordView>,
    /// Trailing bytes that do not fill a whole word
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remainder: Option<String>,
    /// Calls inside an `executeBatch`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inner_calls: Vec<InnerCallReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InnerCallReport {
    pub target: String,
    pub value: String,
    pub call: CalldataReport,
}

/// Inspect call data against the built-in registry
pub fn inspect_calldata(calldata: &[u8]) -> Result<CalldataReport, AbiError> {
    inspect_with(&KnownFunctions::builtin(), calldata)
}

/// Inspect call data against a caller-supplied registry
pub fn inspect_with(registry: &KnownFunctions, calldata: &[u8]) -> Result<CalldataReport, AbiError> {
    if calldata.len() < 4 {
        return Err(AbiError::DecodingError(format!(
            "Call data must be at least 4 bytes, got {}",
            calldata.len()
        )));
    }

    let mut selector = [0u8; 4];
    selector.copy_from_slice(&calldata[..4]);
    let args = &calldata[4..];

    let mut report = CalldataReport {
        selector: format!("0x{}", hex::encode(selector)),
        function: None,
        arguments: Vec::new(),
        decode_error: None,
        words: word_dump(args),
        remainder: None,
        inner_calls: Vec::new(),
    };

    let whole = args.len() / 32 * 32;
    if whole < args.len() {
        report.remainder = Some(format!("0x{}", hex::encode(&args[whole..])));
    }

    if let Some(function) = registry.identify(&selector) {
        report.function = Some(function.signature.clone());
        match AbiDecoder::decode(args, &function.inputs) {
            Ok(values) => report.arguments = values.iter().map(|v| v.to_string()).collect(),
            Err(e) => report.decode_error = Some(e.to_string()),
        }

        if function.signature == KnownFunctions::EXECUTE_BATCH {
            if let Ok(calls) = decode_execute_batch(calldata) {
                for call in calls {
                    // Inner calls without a selector are plain transfers
                    if call.data.len() < 4 {
                        continue;
                    }
                    report.inner_calls.push(InnerCallReport {
                        target: format!("{:?}", call.target),
                        value: call.value.to_string(),
                        call: inspect_with(registry, &call.data)?,
                    });
                }
            }
        }
    }

    Ok(report)
}

fn word_dump(args: &[u8]) -> Vec<WordView> {
    args.chunks_exact(32)
        .enumerate()
        .map(|(index, word)| {
            let looks_like_address = word[..12].iter().all(|&b| b == 0) && word[12..].iter().any(|&b| b != 0);
            WordView {
                index,
                offset: index * 32,
                hex: hex::encode(word),
                uint: U256::from_big_endian(word).to_string(),
                address: looks_like_address.then(|| format!("{:?}", Address::from_slice(&word[12..]))),
            }
        })
        .collect()
}

impl fmt::Display for CalldataReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

impl CalldataReport {
    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match &self.function {
            Some(function) => writeln!(f, "{}selector {} {}", pad, self.selector, function)?,
            None => writeln!(f, "{}selector {} (unknown)", pad, self.selector)?,
        }
        for (i, arg) in self.arguments.iter().enumerate() {
            writeln!(f, "{}  arg[{}] = {}", pad, i, arg)?;
        }
        if let Some(ref err) = self.decode_error {
            writeln!(f, "{}  decode failed: {}", pad, err)?;
        }
        for word in &self.words {
            write!(f, "{}  [{:>3}] 0x{:04x} {}  {}", pad, word.index, word.offset, word.hex, word.uint)?;
            if let Some(ref addr) = word.address {
                write!(f, "  {}", addr)?;
            }
            writeln!(f)?;
        }
        if let Some(ref rest) = self.remainder {
            writeln!(f, "{}  trailing {}", pad, rest)?;
        }
        for (i, inner) in self.inner_calls.iter().enumerate() {
            writeln!(f, "{}  call[{}] -> {} value {}", pad, i, inner.target, inner.value)?;
            inner.call.write_indented(f, depth + 2)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::calldata::{approve, execute_batch, get_nonce, BatchCall};

    #[test]
    fn test_inspect_get_nonce() {
        let sender = Address::repeat_byte(0xab);
        let data = get_nonce(sender, U256::zero()).unwrap();
        let report = inspect_calldata(&data).unwrap();

        assert_eq!(report.selector, "0x35567e1a");
        assert_eq!(report.function.as_deref(), Some("getNonce(address,uint192)"));
        assert_eq!(report.arguments.len(), 2);
        assert_eq!(report.words.len(), 2);
        assert_eq!(report.words[0].address.as_deref(), Some(format!("{:?}", sender).as_str()));
        assert_eq!(report.words[1].uint, "0");
        assert!(report.words[1].address.is_none());
    }

    #[test]
    fn test_inspect_unknown_selector() {
        let mut data = vec![0xde, 0xad, 0xbe, 0xef];
        let mut word = [0u8; 32];
        word[31] = 7;
        data.extend_from_slice(&word);
        data.extend_from_slice(&[0x01, 0x02]);
        let report = inspect_calldata(&data).unwrap();
        assert!(report.function.is_none());
        assert_eq!(report.words[0].uint, "7");
        assert_eq!(report.remainder.as_deref(), Some("0x0102"));
        assert!(report.to_string().contains("(unknown)"));
    }

    #[test]
    fn test_inspect_batch_lists_inner_calls() {
        let token = Address::repeat_byte(0x01);
        let inner = approve(Address::repeat_byte(0x02), U256::from(99u64)).unwrap();
        let data = execute_batch(&[BatchCall::new(token, inner)]).unwrap();

        let report = inspect_calldata(&data).unwrap();
        assert_eq!(report.inner_calls.len(), 1);
        assert_eq!(report.inner_calls[0].call.selector, "0x095ea7b3");
        assert_eq!(report.inner_calls[0].call.arguments[1], "99");
    }

    #[test]
    fn test_inspect_known_selector_bad_args() {
        // approve selector followed by a single word
        let mut data = hex::decode("095ea7b3").unwrap();
        data.extend_from_slice(&[0u8; 32]);
        let report = inspect_calldata(&data).unwrap();
        assert!(report.decode_error.is_some());
        assert!(report.arguments.is_empty());
    }

    #[test]
    fn test_inspect_too_short() {
        assert!(inspect_calldata(&[0x01, 0x02]).is_err());
    }
}
