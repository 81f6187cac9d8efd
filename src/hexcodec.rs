//! Hex text encoding for protected secrets
//!
//! The per-user file is line-oriented text, so ciphertext is stored as
//! lowercase hex: two zero-padded digits per byte, in order.

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};

/// Encode bytes as lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode a hex string. Exact inverse of [`to_hex`]; upper-case digits are
/// accepted as well.
pub fn from_hex(text: &str) -> Result<Vec<u8>> {
    hex::decode(text).map_err(|e| {
        let msg = match &e {
            hex::FromHexError::OddLength => "hex string has odd length".to_string(),
            hex::FromHexError::InvalidHexCharacter { c, index } => {
                format!("invalid hex character {:?} at position {}", c, index)
            }
            other => format!("hex decoding failed: {}", other),
        };
        VaultError::with_kind_and_source(ErrorCategory::User, ErrorKind::Format, msg, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_zero_padded() {
        assert_eq!(to_hex(&[0x00, 0x0a, 0xff, 0x10]), "000aff10");
    }

    #[test]
    fn test_empty() {
        assert_eq!(to_hex(&[]), "");
        assert!(from_hex("").unwrap().is_empty());
    }

    #[test]
    fn test_all_byte_values() {
        let bytes: Vec<u8> = (0..=255).collect();
        let encoded = to_hex(&bytes);
        assert_eq!(encoded.len(), 512);
        assert!(encoded.starts_with("000102"));
        assert!(encoded.ends_with("fdfeff"));
        assert_eq!(from_hex(&encoded).unwrap(), bytes);
    }

    #[test]
    fn test_uppercase_accepted() {
        assert_eq!(from_hex("ABcd").unwrap(), vec![0xab, 0xcd]);
    }

    #[test]
    fn test_odd_length() {
        let err = from_hex("abc").expect_err("expected odd length error");
        assert_eq!(err.kind, Some(ErrorKind::Format));
        assert!(err.message().contains("odd length"));
    }

    #[test]
    fn test_non_hex_character() {
        let err = from_hex("zz").expect_err("expected invalid character error");
        assert_eq!(err.kind, Some(ErrorKind::Format));
        assert!(err.message().contains("invalid hex character"));
    }
}
