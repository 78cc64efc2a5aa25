//! Error types for mapresources parsing and building

use crate::reader::Truncated;
use thiserror::Error;

/// Errors that can occur when parsing or building mapresources manifests
#[derive(Error, Debug)]
pub enum MapResourcesError {
    /// Input ended before a field could be read
    #[error("Truncated mapresources data at offset {offset} (wanted {wanted} bytes)")]
    Truncated {
        /// Offset of the failed read
        offset: usize,
        /// Bytes the read needed
        wanted: usize,
    },

    /// A string is not valid UTF-8
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Bytes remained after the maps list
    #[error("{0} trailing bytes after mapresources data")]
    TrailingData(usize),

    /// A list or string is too long for its length prefix
    #[error("{what} too large: {len}")]
    TooLarge {
        /// Which list or field overflowed
        what: &'static str,
        /// Its length
        len: usize,
    },

    /// An asset refers to a type index outside the asset type list
    #[error("Asset {name} has type index {index} but only {types} types exist")]
    InvalidTypeIndex {
        /// Asset name
        name: String,
        /// Stored type index
        index: i32,
        /// Number of asset types
        types: usize,
    },
}

impl From<Truncated> for MapResourcesError {
    fn from(t: Truncated) -> Self {
        Self::Truncated {
            offset: t.offset,
            wanted: t.wanted,
        }
    }
}

/// Type alias for mapresources operation results
pub type Result<T> = std::result::Result<T, MapResourcesError>;
