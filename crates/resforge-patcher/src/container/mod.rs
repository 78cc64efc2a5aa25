//! Resource container model
//!
//! A container is parsed once into a [`Container`]: the decoded header, the
//! name table and one [`Chunk`] per info record. Replacement and append
//! code mutate the mapped file through the offsets recorded here and keep
//! the in-memory view in step with what they write.
//!
//! Every info record is [`INFO_RECORD_SIZE`] bytes. The `RECORD_*`
//! constants are field offsets inside one record.

pub mod header;
pub mod model;
pub mod name;

pub use header::{ContainerHeader, HEADER_SIZE};
pub use model::{Chunk, Container};
pub use name::{ResourceName, is_texture, normalize};

/// Size of one info record
pub const INFO_RECORD_SIZE: u64 = 0x90;

/// u64 slot in the name id table
pub const RECORD_NAME_ID: u64 = 0x20;
/// u64 absolute payload offset
pub const RECORD_DATA_OFFSET: u64 = 0x38;
/// u64 stored size
pub const RECORD_SIZE_Z: u64 = 0x40;
/// u64 logical size
pub const RECORD_UNCOMPRESSED_SIZE: u64 = 0x48;
/// u64 FNV-1a 64 of the stored payload
pub const RECORD_CONTENT_HASH: u64 = 0x50;
/// First u64 stream hash
pub const RECORD_STREAM_HASH: u64 = 0x58;
/// Second u64 stream hash
pub const RECORD_STREAM_HASH2: u64 = 0x60;
/// u32 record version
pub const RECORD_VERSION: u64 = 0x68;
/// Three special bytes
pub const RECORD_SPECIAL: u64 = 0x6C;
/// u8 compression mode
pub const RECORD_COMPRESSION: u64 = 0x70;

/// Payload stored as-is
pub const COMPRESSION_NONE: u8 = 0;
/// Payload compressed by the codec
pub const COMPRESSION_CODEC: u8 = 2;

/// Tag on texture payloads that carry their own uncompressed size
pub const TEXTURE_MAGIC: [u8; 8] = *b"DIVINITY";

/// Padding inserted before an appended payload: up to the next 16-byte
/// boundary plus 0x30 bytes of slack
pub const fn padded_offset(end: u64) -> u64 {
    end + 0x10 - end % 0x10 + 0x30
}
