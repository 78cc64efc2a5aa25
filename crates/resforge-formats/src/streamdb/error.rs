//! Error types for streamdb parsing and building

use thiserror::Error;

/// Errors that can occur when parsing or building streamdb archives
#[derive(Error, Debug)]
pub enum StreamDbError {
    /// Archive magic did not match
    #[error("Invalid streamdb magic: {0:#018x}")]
    InvalidMagic(u64),

    /// Mod-side streamdb file has the wrong magic
    #[error("Invalid stream mod magic: {0:?}")]
    InvalidModMagic([u8; 8]),

    /// Input shorter than a declared structure
    #[error("Truncated streamdb data: need {needed} bytes, have {actual}")]
    Truncated {
        /// Bytes required
        needed: u64,
        /// Bytes available
        actual: u64,
    },

    /// A LOD's byte range lies outside its mod file
    #[error("LOD {file_id:#x} range {offset}+{length} exceeds file size {size}")]
    LodOutOfRange {
        /// LOD file id
        file_id: u64,
        /// Declared start
        offset: u32,
        /// Declared length
        length: u32,
        /// Mod file size
        size: usize,
    },

    /// Entry offsets are inconsistent with the payload stream
    #[error("Entry {file_id:#x}: expected data at {expected}, stream is at {position}")]
    OffsetMismatch {
        /// Entry whose payload could not be placed
        file_id: u64,
        /// Offset recorded in the entry table
        expected: u64,
        /// Current write position
        position: u64,
    },

    /// Archive would exceed what 32-bit offset fields can address
    #[error("StreamDB too large: {0} bytes")]
    TooLarge(u64),

    /// Entry table is not sorted by file id
    #[error("Entry table not sorted at index {0}")]
    Unsorted(usize),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `BinRW` parsing/writing error
    #[error("Binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Type alias for streamdb operation results
pub type Result<T> = std::result::Result<T, StreamDbError>;
