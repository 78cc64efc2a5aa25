//! Fixed-size streamdb header and entry records

use binrw::{BinRead, BinWrite};

/// Archive magic
pub const STREAMDB_MAGIC: u64 = 0x61C7_F32E_29C2_A550;

/// Encoded size of [`StreamDbHeader`]
pub const HEADER_SIZE: u64 = 32;

/// Encoded size of [`StreamDbRecord`]
pub const RECORD_SIZE: u64 = 16;

/// Payload alignment
pub const DATA_ALIGNMENT: u64 = 16;

/// StreamDB header (32 bytes)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct StreamDbHeader {
    /// Magic, [`STREAMDB_MAGIC`]
    pub magic: u64,
    /// Offset of the first payload
    pub data_start_offset: u32,
    /// Zero
    pub padding: [u32; 3],
    /// Entry record count
    pub num_entries: u32,
    /// Archive flags
    pub flags: u32,
}

impl StreamDbHeader {
    /// Header for `num_entries` entries whose data starts at `data_start_offset`
    pub fn new(num_entries: u32, data_start_offset: u32, flags: u32) -> Self {
        Self {
            magic: STREAMDB_MAGIC,
            data_start_offset,
            padding: [0; 3],
            num_entries,
            flags,
        }
    }
}

/// One entry table record (16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct StreamDbRecord {
    /// Streaming file id
    pub file_id: u64,
    /// Payload offset divided by 16
    pub data_offset16: u32,
    /// Payload length in bytes
    pub data_length: u32,
}

impl StreamDbRecord {
    /// Absolute payload offset
    pub fn data_offset(&self) -> u64 {
        u64::from(self.data_offset16) * DATA_ALIGNMENT
    }
}

/// Round `value` up to the next multiple of 16
pub const fn align16(value: u64) -> u64 {
    value.div_ceil(DATA_ALIGNMENT) * DATA_ALIGNMENT
}
