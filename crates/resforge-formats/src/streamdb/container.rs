//! StreamDB archive model, builder and parser

use crate::streamdb::error::{Result, StreamDbError};
use crate::streamdb::header::{
    DATA_ALIGNMENT, HEADER_SIZE, RECORD_SIZE, STREAMDB_MAGIC, StreamDbHeader, StreamDbRecord,
    align16,
};
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};
use std::collections::BTreeMap;
use std::io::Write;

/// One payload keyed by its streaming file id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDbEntry {
    /// Streaming file id
    pub file_id: u64,
    /// Raw payload
    pub data: Vec<u8>,
}

/// Computed header and entry table for a set of payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDbLayout {
    /// Archive header
    pub header: StreamDbHeader,
    /// Records in ascending file id order
    pub records: Vec<StreamDbRecord>,
}

impl StreamDbLayout {
    /// Offset of the first payload byte
    pub fn data_start(&self) -> u64 {
        u64::from(self.header.data_start_offset)
    }

    /// Total archive size
    pub fn total_size(&self) -> u64 {
        self.records
            .last()
            .map_or(self.data_start(), |r| r.data_offset() + u64::from(r.data_length))
    }
}

/// A streamdb archive assembled from payloads
///
/// Entries are keyed by file id; the first entry added for an id wins,
/// so callers add in descending priority.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDbContainer {
    /// Archive flags
    pub flags: u32,
    entries: BTreeMap<u64, Vec<u8>>,
}

impl StreamDbContainer {
    /// Empty archive
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a payload; false if the id is already present
    pub fn add(&mut self, file_id: u64, data: Vec<u8>) -> bool {
        if self.entries.contains_key(&file_id) {
            return false;
        }
        self.entries.insert(file_id, data);
        true
    }

    /// Whether a payload exists for `file_id`
    pub fn contains(&self, file_id: u64) -> bool {
        self.entries.contains_key(&file_id)
    }

    /// Payload for `file_id`
    pub fn get(&self, file_id: u64) -> Option<&[u8]> {
        self.entries.get(&file_id).map(Vec::as_slice)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending file id order
    pub fn entries(&self) -> impl Iterator<Item = StreamDbEntry> + '_ {
        self.entries.iter().map(|(&file_id, data)| StreamDbEntry {
            file_id,
            data: data.clone(),
        })
    }

    /// Compute the header and 16-byte aligned entry offsets
    ///
    /// Data starts after the entry table rounded up to 16; each entry
    /// starts at the previous entry's end rounded up to 16.
    pub fn layout(&self) -> Result<StreamDbLayout> {
        let count = self.entries.len() as u64;
        let data_start = align16(HEADER_SIZE + count * RECORD_SIZE);

        let mut records = Vec::with_capacity(self.entries.len());
        let mut offset = data_start;
        for (&file_id, data) in &self.entries {
            let data_length =
                u32::try_from(data.len()).map_err(|_| StreamDbError::TooLarge(data.len() as u64))?;
            let data_offset16 = u32::try_from(offset / DATA_ALIGNMENT)
                .map_err(|_| StreamDbError::TooLarge(offset))?;
            records.push(StreamDbRecord {
                file_id,
                data_offset16,
                data_length,
            });
            offset = align16(offset + u64::from(data_length));
        }

        let num_entries = u32::try_from(count).map_err(|_| StreamDbError::TooLarge(count))?;
        let data_start_offset =
            u32::try_from(data_start).map_err(|_| StreamDbError::TooLarge(data_start))?;

        Ok(StreamDbLayout {
            header: StreamDbHeader::new(num_entries, data_start_offset, self.flags),
            records,
        })
    }

    /// Stream the archive to `writer`, returning the bytes written
    ///
    /// Payloads are placed by zero-filling up to each record's offset. A
    /// gap that is negative or a full alignment unit wide means the table
    /// and the payload stream disagree, and writing stops.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<u64> {
        let layout = self.layout()?;

        let mut table = Cursor::new(Vec::with_capacity(
            (HEADER_SIZE + RECORD_SIZE * layout.records.len() as u64) as usize,
        ));
        layout.header.write(&mut table)?;
        for record in &layout.records {
            record.write(&mut table)?;
        }
        let table = table.into_inner();
        writer.write_all(&table)?;

        let mut position = table.len() as u64;
        let zeros = [0u8; DATA_ALIGNMENT as usize];

        for (record, data) in layout.records.iter().zip(self.entries.values()) {
            let expected = record.data_offset();
            let gap = expected
                .checked_sub(position)
                .filter(|gap| *gap < DATA_ALIGNMENT)
                .ok_or(StreamDbError::OffsetMismatch {
                    file_id: record.file_id,
                    expected,
                    position,
                })?;
            writer.write_all(&zeros[..gap as usize])?;
            writer.write_all(data)?;
            position = expected + data.len() as u64;
        }

        // An archive with no entries still ends at its aligned data start
        if layout.records.is_empty() {
            let gap = layout.data_start() - position;
            writer.write_all(&zeros[..gap as usize])?;
            position += gap;
        }

        writer.flush()?;
        Ok(position)
    }

    /// Serialize to a byte vector
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Parse an archive, checking that its table is sorted and in bounds
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        if (data.len() as u64) < HEADER_SIZE {
            return Err(StreamDbError::Truncated {
                needed: HEADER_SIZE,
                actual: data.len() as u64,
            });
        }
        let header = StreamDbHeader::read(&mut cursor)?;
        if header.magic != STREAMDB_MAGIC {
            return Err(StreamDbError::InvalidMagic(header.magic));
        }

        let table_end = HEADER_SIZE + u64::from(header.num_entries) * RECORD_SIZE;
        if (data.len() as u64) < table_end {
            return Err(StreamDbError::Truncated {
                needed: table_end,
                actual: data.len() as u64,
            });
        }

        let mut container = Self {
            flags: header.flags,
            entries: BTreeMap::new(),
        };
        let mut previous: Option<u64> = None;
        for index in 0..header.num_entries as usize {
            let record = StreamDbRecord::read(&mut cursor)?;
            if previous.is_some_and(|p| p >= record.file_id) {
                return Err(StreamDbError::Unsorted(index));
            }
            previous = Some(record.file_id);

            let start = record.data_offset();
            let end = start + u64::from(record.data_length);
            if end > data.len() as u64 {
                return Err(StreamDbError::Truncated {
                    needed: end,
                    actual: data.len() as u64,
                });
            }
            container
                .entries
                .insert(record.file_id, data[start as usize..end as usize].to_vec());
        }

        Ok(container)
    }
}
