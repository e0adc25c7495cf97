//! Logging setup and redaction of sensitive values
//!
//! Log records go to stderr through `tracing`; stdout is reserved for the
//! operator-facing progress lines and the final outcome. Bearer tokens,
//! signatures and similar secrets pass through the helpers below before they
//! reach a log field.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbose` selects debug over info.
/// Calling twice is harmless: the second install is ignored.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("share_trader={}", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Fully redact a sensitive value
pub fn redact_value(value: &str) -> String {
    if value.is_empty() {
        return "[EMPTY]".to_string();
    }

    let len = value.len();
    if len <= 4 {
        "[REDACTED]".to_string()
    } else {
        format!("[REDACTED:{}chars]", len)
    }
}

/// Redact a bearer token, keeping only its last 4 characters
pub fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.len() <= 12 || !trimmed.is_char_boundary(trimmed.len() - 4) {
        return redact_value(trimmed);
    }
    format!("...{} ({} chars)", &trimmed[trimmed.len() - 4..], trimmed.len())
}

/// Shorten hex data (signatures, call data, hashes) to its head and tail
pub fn redact_hex(data: &str) -> String {
    let trimmed = data.trim();

    if trimmed.is_empty() {
        return "[EMPTY]".to_string();
    }

    if trimmed.len() <= 20 || !trimmed.is_ascii() {
        return trimmed.to_string();
    }

    let prefix_len = if trimmed.starts_with("0x") { 12 } else { 10 };
    let suffix_len = 6;

    format!(
        "{}...{} ({} bytes)",
        &trimmed[..prefix_len],
        &trimmed[trimmed.len() - suffix_len..],
        crate::abi::strip_0x(trimmed).len() / 2
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_value() {
        assert_eq!(redact_value(""), "[EMPTY]");
        assert_eq!(redact_value("abc"), "[REDACTED]");
        assert_eq!(redact_value("secret_key_12345"), "[REDACTED:16chars]");
    }

    #[test]
    fn test_redact_token() {
        let token = "eyJhbGciOiJIUzI1NiJ9.payload.signatureWXYZ";
        let redacted = redact_token(token);
        assert_eq!(redacted, format!("...WXYZ ({} chars)", token.len()));
        assert!(!redacted.contains("eyJ"));

        assert_eq!(redact_token("short"), "[REDACTED:5chars]");
    }

    #[test]
    fn test_redact_hex() {
        let sig = format!("0x{}", "ab".repeat(65));
        let redacted = redact_hex(&sig);
        assert!(redacted.starts_with("0xabababab"));
        assert!(redacted.ends_with("(65 bytes)"));

        assert_eq!(redact_hex("0x1234"), "0x1234");
        assert_eq!(redact_hex(""), "[EMPTY]");
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(false);
        init_logging(true);
    }
}
