//! Fixed container header

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};

/// Encoded header size
pub const HEADER_SIZE: u64 = 0x7C;

/// Container header (0x7C bytes, little-endian)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little, magic = b"IDCL")]
pub struct ContainerHeader {
    /// Format version
    pub version: u32,
    /// Header flags
    pub flags: u32,
    /// Segment count
    pub segment_count: u32,
    /// Segment size
    pub segment_size: u64,
    /// Metadata hash
    pub metadata_hash: u64,
    /// Number of info records
    pub file_count: u32,
    /// Dependency count
    pub dependency_count: u32,
    /// Number of 4-byte type id slots
    pub type_count: u32,
    /// Number of 8-byte name id slots (two per file)
    pub file_count2: u32,
    /// Special hash count
    pub special_hash_count: u32,
    /// Meta entry count
    pub meta_entry_count: u32,
    /// Size of the name offset table plus names blob
    pub strings_size: u32,
    /// Meta entries size
    pub meta_size: u32,
    /// Start of the name offset table
    pub names_offset: u64,
    /// End of the names blob
    pub unknown_offset: u64,
    /// Start of the info records
    pub info_offset: u64,
    /// Dependencies, inside the unknown section
    pub dependencies_offset: u64,
    /// Start of the type id table
    pub type_ids_offset: u64,
    /// Start of the data section
    pub data_offset: u64,
    /// Reserved
    pub reserved: u32,
    /// Start of the idcl section
    pub idcl_offset: u64,
}

impl ContainerHeader {
    /// Decode from the start of a container
    pub fn parse(data: &[u8]) -> binrw::BinResult<Self> {
        Self::read(&mut Cursor::new(data))
    }

    /// Encode to exactly [`HEADER_SIZE`] bytes
    pub fn to_bytes(&self) -> binrw::BinResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(HEADER_SIZE as usize));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Start of the name id table, `None` when the header overflows it
    pub fn name_ids_offset(&self) -> Option<u64> {
        u64::from(self.type_count)
            .checked_mul(4)
            .and_then(|len| self.type_ids_offset.checked_add(len))
    }

    /// End of the info records, `None` when the header overflows it
    pub fn info_end(&self) -> Option<u64> {
        u64::from(self.file_count)
            .checked_mul(super::INFO_RECORD_SIZE)
            .and_then(|len| self.info_offset.checked_add(len))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> ContainerHeader {
        ContainerHeader {
            version: 12,
            flags: 0,
            segment_count: 1,
            segment_size: 0x1000,
            metadata_hash: 0xDEAD_BEEF,
            file_count: 2,
            dependency_count: 0,
            type_count: 1,
            file_count2: 4,
            special_hash_count: 0,
            meta_entry_count: 0,
            strings_size: 48,
            meta_size: 0,
            names_offset: 0x19C,
            unknown_offset: 0x1CC,
            info_offset: 0x7C,
            dependencies_offset: 0x1CC,
            type_ids_offset: 0x1CC,
            data_offset: 0x200,
            reserved: 0,
            idcl_offset: 0x1F0,
        }
    }

    #[test]
    fn test_header_is_0x7c_bytes_with_documented_offsets() {
        let header = sample();
        let bytes = header.to_bytes().expect("encode");
        assert_eq!(bytes.len() as u64, HEADER_SIZE);
        assert_eq!(&bytes[..4], b"IDCL");
        assert_eq!(&bytes[0x20..0x24], &2u32.to_le_bytes());
        assert_eq!(&bytes[0x28..0x2C], &1u32.to_le_bytes());
        assert_eq!(&bytes[0x2C..0x30], &4u32.to_le_bytes());
        assert_eq!(&bytes[0x38..0x3C], &48u32.to_le_bytes());
        assert_eq!(&bytes[0x40..0x48], &0x19Cu64.to_le_bytes());
        assert_eq!(&bytes[0x50..0x58], &0x7Cu64.to_le_bytes());
        assert_eq!(&bytes[0x68..0x70], &0x200u64.to_le_bytes());
        assert_eq!(&bytes[0x74..0x7C], &0x1F0u64.to_le_bytes());

        assert_eq!(ContainerHeader::parse(&bytes).expect("decode"), header);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = sample().to_bytes().expect("encode");
        bytes[0] = b'X';
        assert!(ContainerHeader::parse(&bytes).is_err());
    }

    #[test]
    fn test_derived_offsets() {
        let header = sample();
        assert_eq!(header.name_ids_offset(), Some(0x1D0));
        assert_eq!(header.info_end(), Some(0x7C + 2 * 0x90));
    }

    #[test]
    fn test_derived_offsets_overflow() {
        let mut header = sample();
        header.info_offset = u64::MAX - 0x10;
        header.type_ids_offset = u64::MAX;
        assert_eq!(header.info_end(), None);
        assert_eq!(header.name_ids_offset(), None);
    }
}
