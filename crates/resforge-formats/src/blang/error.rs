//! Error types for blang string table parsing and building

use crate::reader::Truncated;
use thiserror::Error;

/// Errors that can occur when parsing or building blang string tables
#[derive(Error, Debug)]
pub enum BlangError {
    /// Input ended before a field could be read
    #[error("Truncated blang data at offset {offset} (wanted {wanted} bytes)")]
    Truncated {
        /// Offset of the failed read
        offset: usize,
        /// Bytes the read needed
        wanted: usize,
    },

    /// A string field is not valid UTF-8
    #[error("Invalid UTF-8 in {field} at offset {offset}")]
    InvalidUtf8 {
        /// Which field failed to decode
        field: &'static str,
        /// Offset of the field's bytes
        offset: usize,
    },

    /// More strings than the count field can describe
    #[error("Too many strings for a blang table: {0}")]
    TooManyStrings(usize),

    /// A single field exceeds the 32-bit length prefix
    #[error("Field too large for a 32-bit length prefix: {0} bytes")]
    FieldTooLarge(usize),

    /// Mod-side JSON could not be decoded
    #[error("Invalid blang JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<Truncated> for BlangError {
    fn from(t: Truncated) -> Self {
        Self::Truncated {
            offset: t.offset,
            wanted: t.wanted,
        }
    }
}

/// Type alias for blang operation results
pub type Result<T> = std::result::Result<T, BlangError>;
