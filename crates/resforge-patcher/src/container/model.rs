//! Parsed view of a container's tables

use crate::codec::Codec;
use crate::container::header::{ContainerHeader, HEADER_SIZE};
use crate::container::name::{ResourceName, normalize};
use crate::container::{
    COMPRESSION_NONE, INFO_RECORD_SIZE, RECORD_COMPRESSION, RECORD_DATA_OFFSET, RECORD_NAME_ID,
    RECORD_SIZE_Z, RECORD_UNCOMPRESSED_SIZE,
};
use crate::{PatchError, Result};

/// One existing asset
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Resolved name
    pub name: ResourceName,
    /// Start of the chunk's info record
    pub record_offset: u64,
    /// Location of the offset/size_z/size triple inside the info record
    pub file_offset: u64,
    /// Absolute offset of the payload
    pub data_offset: u64,
    /// Stored (possibly compressed) size
    pub size_z: u64,
    /// Logical size
    pub size: u64,
    /// 0 = stored, 2 = codec-compressed
    pub compression_mode: u8,
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.name.full == other.name.full && self.file_offset == other.file_offset
    }
}

impl Eq for Chunk {}

/// A parsed container: header, name table and chunk index
#[derive(Debug, Clone)]
pub struct Container {
    /// Decoded header
    pub header: ContainerHeader,
    /// Name table in index order
    pub names: Vec<ResourceName>,
    /// One chunk per info record, in record order
    pub chunks: Vec<Chunk>,
    /// File length when parsed
    pub file_len: u64,
}

fn corruption(what: impl Into<String>) -> PatchError {
    PatchError::Corruption(what.into())
}

fn slice_at<'a>(data: &'a [u8], offset: u64, len: u64, what: &str) -> Result<&'a [u8]> {
    match offset.checked_add(len) {
        Some(end) if end <= data.len() as u64 => Ok(&data[offset as usize..end as usize]),
        _ => Err(corruption(format!(
            "{what} at {offset:#x}+{len:#x} runs past end of file ({:#x})",
            data.len()
        ))),
    }
}

/// A derived section offset, or corruption when the header overflows it
pub(crate) fn section_offset(offset: Option<u64>, what: &str) -> Result<u64> {
    offset.ok_or_else(|| corruption(format!("{what} offset overflows")))
}

fn u64_at(data: &[u8], offset: u64, what: &str) -> Result<u64> {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(slice_at(data, offset, 8, what)?);
    Ok(u64::from_le_bytes(bytes))
}

impl Container {
    /// Parse the tables of a mapped container
    pub fn parse(data: &[u8]) -> Result<Self> {
        if (data.len() as u64) < HEADER_SIZE {
            return Err(corruption(format!(
                "file is {} bytes, smaller than the header",
                data.len()
            )));
        }
        let header = ContainerHeader::parse(data)?;
        check_section_order(&header, data.len() as u64)?;

        let names = parse_names(data, &header)?;

        let mut chunks = Vec::with_capacity(header.file_count as usize);
        let name_ids = section_offset(header.name_ids_offset(), "name ids")?;
        for index in 0..u64::from(header.file_count) {
            let record = header.info_offset + index * INFO_RECORD_SIZE;
            let record_bytes = slice_at(data, record, INFO_RECORD_SIZE, "info record")?;

            let name_id = u64_at(record_bytes, RECORD_NAME_ID, "name id")?;
            let slot = name_id
                .checked_add(1)
                .and_then(|n| n.checked_mul(8))
                .and_then(|n| n.checked_add(name_ids))
                .filter(|slot| slot.checked_add(8).is_some_and(|end| end <= header.idcl_offset))
                .ok_or_else(|| {
                    corruption(format!("record {index} has name id {name_id} outside the table"))
                })?;
            let name_index = u64_at(data, slot, "name id slot")?;
            let name = names
                .get(name_index as usize)
                .cloned()
                .ok_or_else(|| corruption(format!("record {index} names missing entry {name_index}")))?;

            let data_offset = u64_at(record_bytes, RECORD_DATA_OFFSET, "data offset")?;
            let size_z = u64_at(record_bytes, RECORD_SIZE_Z, "size_z")?;
            slice_at(data, data_offset, size_z, &name.full)?;

            chunks.push(Chunk {
                name,
                record_offset: record,
                file_offset: record + RECORD_DATA_OFFSET,
                data_offset,
                size_z,
                size: u64_at(record_bytes, RECORD_UNCOMPRESSED_SIZE, "size")?,
                compression_mode: record_bytes[RECORD_COMPRESSION as usize],
            });
        }

        Ok(Self {
            header,
            names,
            chunks,
            file_len: data.len() as u64,
        })
    }

    /// Start of the names blob
    pub fn names_end(&self) -> u64 {
        self.header.names_offset + 8 + self.names.len() as u64 * 8
    }

    /// Index of the chunk `target` names, exactly or by normalized form
    pub fn find_chunk(&self, target: &str) -> Option<usize> {
        self.chunks
            .iter()
            .position(|c| c.name.full.eq_ignore_ascii_case(target))
            .or_else(|| {
                let normalized = normalize(target);
                self.chunks.iter().position(|c| c.name.matches(&normalized))
            })
    }

    /// Index of the name table entry stored exactly as `full`
    pub fn name_index(&self, full: &str) -> Option<usize> {
        self.names.iter().position(|n| n.full == full)
    }

    /// The level's mapresources chunk, if the container has one
    pub fn mapresources_chunk(&self) -> Option<usize> {
        self.chunks.iter().position(|c| {
            c.name
                .normalized
                .to_ascii_lowercase()
                .ends_with(".mapresources")
        })
    }

    /// Read a chunk's payload, decompressing it when stored compressed
    pub fn chunk_payload(&self, data: &[u8], index: usize, codec: &dyn Codec) -> Result<Vec<u8>> {
        let chunk = self
            .chunks
            .get(index)
            .ok_or_else(|| PatchError::ChunkNotFound(format!("#{index}")))?;
        let stored = slice_at(data, chunk.data_offset, chunk.size_z, &chunk.name.full)?;
        if chunk.compression_mode == COMPRESSION_NONE {
            return Ok(stored.to_vec());
        }
        Ok(codec.decompress(stored, chunk.size as usize)?)
    }
}

fn check_section_order(header: &ContainerHeader, file_len: u64) -> Result<()> {
    let bounds = [
        ("header", HEADER_SIZE),
        ("info records", header.info_offset),
        ("info end", section_offset(header.info_end(), "info end")?),
        ("name table", header.names_offset),
        ("unknown section", header.unknown_offset),
        ("type ids", header.type_ids_offset),
        ("name ids", section_offset(header.name_ids_offset(), "name ids")?),
        ("idcl section", header.idcl_offset),
        ("data section", header.data_offset),
        ("end of file", file_len),
    ];
    for pair in bounds.windows(2) {
        let (before, start) = pair[0];
        let (after, next) = pair[1];
        if next < start {
            return Err(corruption(format!(
                "{after} ({next:#x}) starts before {before} ({start:#x})"
            )));
        }
    }
    Ok(())
}

fn parse_names(data: &[u8], header: &ContainerHeader) -> Result<Vec<ResourceName>> {
    let count = u64_at(data, header.names_offset, "name count")?;
    let blob_start = count
        .checked_mul(8)
        .and_then(|n| n.checked_add(header.names_offset.checked_add(8)?))
        .filter(|start| *start <= header.unknown_offset)
        .ok_or_else(|| corruption(format!("name count {count} overruns the name table")))?;
    let blob = slice_at(
        data,
        blob_start,
        header.unknown_offset - blob_start,
        "names blob",
    )?;

    // Anything after the declared count is padding, not names
    let mut names = Vec::with_capacity(count as usize);
    let mut rest = blob;
    for index in 0..count {
        let end = rest.iter().position(|&b| b == 0).ok_or_else(|| {
            corruption(format!("names blob ends inside name {index} of {count}"))
        })?;
        names.push(ResourceName::new(String::from_utf8_lossy(&rest[..end])));
        rest = &rest[end + 1..];
    }
    Ok(names)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::codec::FlateCodec;
    use resforge_test_utils::{ContainerFixture, FIXTURE_TYPE};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_two_chunks() {
        let data = ContainerFixture::new()
            .file_at("a.txt", &[1; 10], 1000)
            .file_at("b.txt$mtlkind=ui", &[2; 20], 2000)
            .file_len(3000)
            .build();
        let container = Container::parse(&data).expect("parse");

        assert_eq!(container.file_len, 3000);
        assert_eq!(container.names.len(), 3);
        assert_eq!(container.names[0].full, FIXTURE_TYPE);
        assert_eq!(container.chunks.len(), 2);

        let a = &container.chunks[0];
        assert_eq!(a.name.full, "a.txt");
        assert_eq!(a.data_offset, 1000);
        assert_eq!(a.size_z, 10);
        assert_eq!(a.size, 10);
        assert_eq!(a.compression_mode, COMPRESSION_NONE);
        assert_eq!(a.file_offset, a.record_offset + 0x38);

        let b = &container.chunks[1];
        assert_eq!(b.name.normalized, "b.txt");
        assert_eq!(b.data_offset, 2000);
        assert_eq!(b.record_offset, HEADER_SIZE + INFO_RECORD_SIZE);
    }

    #[test]
    fn test_find_chunk_exact_then_normalized() {
        let data = ContainerFixture::new()
            .file("art/logo.tga$mtlkind=ui", b"x")
            .file("decls/a.decl", b"y")
            .build();
        let container = Container::parse(&data).expect("parse");

        assert_eq!(container.find_chunk("art/logo.tga$mtlkind=ui"), Some(0));
        assert_eq!(container.find_chunk("art/logo.tga"), Some(0));
        assert_eq!(container.find_chunk("DECLS/A.DECL"), Some(1));
        assert_eq!(container.find_chunk("decls/b.decl"), None);
        assert_eq!(container.name_index("decls/a.decl"), Some(2));
        assert_eq!(container.name_index("DECLS/A.DECL"), None);
    }

    #[test]
    fn test_trailing_blob_bytes_are_not_names() {
        let data = ContainerFixture::new()
            .file("a.txt", b"abc")
            .names_padding(5)
            .build();
        let container = Container::parse(&data).expect("parse");
        assert_eq!(container.names.len(), 2);
        assert_eq!(container.names_end(), container.header.names_offset + 8 + 16);
    }

    #[test]
    fn test_mapresources_chunk() {
        let data = ContainerFixture::new()
            .file("a.txt", b"abc")
            .file("maps/e1m1.mapresources#v1", b"def")
            .build();
        let container = Container::parse(&data).expect("parse");
        assert_eq!(container.mapresources_chunk(), Some(1));
    }

    #[test]
    fn test_chunk_payload_decompresses() {
        let codec = FlateCodec::default();
        let raw = b"compressed payload ".repeat(4);
        let packed = codec.compress(&raw).expect("compress");
        let data = ContainerFixture::new()
            .file("plain.txt", b"plain")
            .compressed("packed.bin", &packed, raw.len() as u64)
            .build();
        let container = Container::parse(&data).expect("parse");

        assert_eq!(container.chunk_payload(&data, 0, &codec).expect("plain"), b"plain");
        assert_eq!(container.chunk_payload(&data, 1, &codec).expect("packed"), raw);
        assert!(matches!(
            container.chunk_payload(&data, 9, &codec),
            Err(PatchError::ChunkNotFound(_))
        ));
    }

    #[test]
    fn test_truncated_file_is_corruption() {
        let data = ContainerFixture::new()
            .file_at("a.txt", &[1; 10], 1000)
            .build();
        assert!(matches!(
            Container::parse(&data[..900]),
            Err(PatchError::Corruption(_))
        ));
        assert!(matches!(
            Container::parse(&data[..0x40]),
            Err(PatchError::Corruption(_))
        ));
    }

    #[test]
    fn test_bad_name_id_is_corruption() {
        let mut data = ContainerFixture::new().file("a.txt", b"abc").build();
        let record = HEADER_SIZE as usize;
        data[record + 0x20..record + 0x28].copy_from_slice(&50u64.to_le_bytes());
        assert!(matches!(
            Container::parse(&data),
            Err(PatchError::Corruption(_))
        ));
    }

    fn with_header_field(data: &[u8], at: usize, value: u64) -> Vec<u8> {
        let mut broken = data.to_vec();
        broken[at..at + 8].copy_from_slice(&value.to_le_bytes());
        broken
    }

    #[test]
    fn test_overflowing_info_offset_is_corruption() {
        let data = ContainerFixture::new().file("a.txt", b"abc").build();
        let broken = with_header_field(&data, 0x50, u64::MAX - 0x10);
        assert!(matches!(
            Container::parse(&broken),
            Err(PatchError::Corruption(_))
        ));
    }

    #[test]
    fn test_overflowing_type_ids_offset_is_corruption() {
        let data = ContainerFixture::new().file("a.txt", b"abc").build();
        let broken = with_header_field(&data, 0x60, u64::MAX);
        assert!(matches!(
            Container::parse(&broken),
            Err(PatchError::Corruption(_))
        ));
    }

    #[test]
    fn test_overflowing_names_offset_is_corruption() {
        let data = ContainerFixture::new().file("a.txt", b"abc").build();
        let broken = with_header_field(&data, 0x40, u64::MAX - 4);
        assert!(matches!(
            Container::parse(&broken),
            Err(PatchError::Corruption(_))
        ));
    }

    #[test]
    fn test_bad_name_count_is_corruption() {
        let data = ContainerFixture::new().file("a.txt", b"abc").build();
        let mut broken = data.clone();
        let header = ContainerHeader::parse(&data).expect("header");
        let at = header.names_offset as usize;
        broken[at..at + 8].copy_from_slice(&9u64.to_le_bytes());
        assert!(matches!(
            Container::parse(&broken),
            Err(PatchError::Corruption(_))
        ));
    }
}
