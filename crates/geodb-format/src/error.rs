//! Error types for snapshot container decoding

use std::fmt;

/// Errors that can occur while decoding a snapshot container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Input ended in the middle of a field
    Truncated,
    /// Varint ran past its maximum width
    VarintOverflow,
    /// Field carried a wire type the decoder cannot skip
    InvalidWireType(u8),
    /// Length-delimited field overruns the remaining buffer
    BadLength(u64),
    /// String field was not valid UTF-8
    InvalidString(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::Truncated => write!(f, "truncated input"),
            FormatError::VarintOverflow => write!(f, "varint longer than 10 bytes"),
            FormatError::InvalidWireType(t) => write!(f, "invalid wire type {}", t),
            FormatError::BadLength(n) => write!(f, "field length {} overruns buffer", n),
            FormatError::InvalidString(msg) => write!(f, "invalid string field: {}", msg),
        }
    }
}

impl std::error::Error for FormatError {}
