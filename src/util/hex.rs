//! # Hex Helpers
//!
//! Compact hex formatting for the tx/rx trace dumps the protocol layers
//! emit, and lenient hex parsing for CLI arguments and test data.

use thiserror::Error;

/// Errors that can occur while parsing hex input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Empty hex string")]
    EmptyString,

    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Hex decoding error: {0}")]
    DecodeError(String),
}

/// Format bytes as "01 00 fe fd 10 03" for trace logs.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode a hex string to bytes, ignoring whitespace.
///
/// Accepts both uppercase and lowercase hex characters.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(HexError::EmptyString);
    }
    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }
    hex::decode(&cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Parse a single two-digit hex byte ("fb" -> 0xFB).
pub fn hex_byte(s: &str) -> Result<u8, HexError> {
    if s.len() != 2 {
        return Err(HexError::OddLength(s.len()));
    }
    u8::from_str_radix(s, 16).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Helper for creating test data from hex strings.
///
/// Panics on invalid hex (intended for test code only).
pub fn hex_to_bytes(hex: &str) -> Vec<u8> {
    decode_hex(hex).expect("Invalid hex in test data")
}
