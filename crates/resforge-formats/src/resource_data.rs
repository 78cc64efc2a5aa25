//! Resource-data side file
//!
//! The side file ships with the patcher and supplies default metadata for
//! files mods add to a container. On disk it is an 8-byte little-endian
//! decompressed size followed by a compressed body; the decompressed body
//! is a flat stream of records:
//!
//! ```text
//! [u64 path hash][u64 stream hash][u8 version][u8 special x3]
//! [u16 len][resource type]
//! [u16 len][map resource type]   len 0 = none
//! [u16 len][map resource name]   len 0 = none
//! ```
//!
//! All integers are little-endian. The path hash is FNV-1a 64 over the
//! path exactly as written, with no case folding.

use crate::reader::{ByteReader, Truncated};
use resforge_crypto::resource_path_hash;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur when reading or writing resource-data records
#[derive(Error, Debug)]
pub enum ResourceDataError {
    /// Input ended inside a record
    #[error("Truncated resource data at offset {offset} (wanted {wanted} bytes)")]
    Truncated {
        /// Offset of the failed read
        offset: usize,
        /// Bytes the read needed
        wanted: usize,
    },

    /// A string is not valid UTF-8
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// A string exceeds the 16-bit length prefix
    #[error("String too long for resource data: {0} bytes")]
    StringTooLong(usize),

    /// Decompressed body length disagrees with the header
    #[error("Decompressed size mismatch: header says {expected}, got {actual}")]
    SizeMismatch {
        /// Size recorded in the header
        expected: u64,
        /// Size produced
        actual: u64,
    },
}

impl From<Truncated> for ResourceDataError {
    fn from(t: Truncated) -> Self {
        Self::Truncated {
            offset: t.offset,
            wanted: t.wanted,
        }
    }
}

/// Type alias for resource-data operation results
pub type Result<T> = std::result::Result<T, ResourceDataError>;

/// Resource type used when nothing better is known
pub const DEFAULT_RESOURCE_TYPE: &str = "rs_streamfile";

/// Default metadata for one resource path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDataEntry {
    /// FNV-1a 64 of the resource path
    pub hash: u64,
    /// Stream hash written into the info record
    pub stream_hash: u64,
    /// Record version
    pub version: u8,
    /// Three opaque flag bytes written into the info record
    pub special_bytes: [u8; 3],
    /// Type name registered in the container
    pub resource_type: String,
    /// Asset type to use in a level's mapresources
    pub map_resource_type: Option<String>,
    /// Asset name to use in a level's mapresources
    pub map_resource_name: Option<String>,
}

impl ResourceDataEntry {
    /// Metadata for paths with no side-file record
    pub fn fallback(path: &str) -> Self {
        Self {
            hash: resource_path_hash(path),
            stream_hash: 0,
            version: 0,
            special_bytes: [0; 3],
            resource_type: DEFAULT_RESOURCE_TYPE.to_string(),
            map_resource_type: None,
            map_resource_name: None,
        }
    }
}

/// Side-file records keyed by path hash
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceDataMap(HashMap<u64, ResourceDataEntry>);

impl ResourceDataMap {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a decompressed record stream; later duplicates replace earlier ones
    pub fn parse_records(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let mut map = HashMap::new();

        while reader.remaining() > 0 {
            let hash = reader.u64_le()?;
            let stream_hash = reader.u64_le()?;
            let version = reader.u8()?;
            let special_bytes = [reader.u8()?, reader.u8()?, reader.u8()?];
            let resource_type = read_string(&mut reader)?;
            let map_resource_type = Some(read_string(&mut reader)?).filter(|s| !s.is_empty());
            let map_resource_name = Some(read_string(&mut reader)?).filter(|s| !s.is_empty());

            map.insert(
                hash,
                ResourceDataEntry {
                    hash,
                    stream_hash,
                    version,
                    special_bytes,
                    resource_type,
                    map_resource_type,
                    map_resource_name,
                },
            );
        }

        Ok(Self(map))
    }

    /// Serialize to a record stream, ordered by hash
    pub fn build_records(&self) -> Result<Vec<u8>> {
        let mut entries: Vec<&ResourceDataEntry> = self.0.values().collect();
        entries.sort_by_key(|e| e.hash);

        let mut out = Vec::new();
        for entry in entries {
            out.extend_from_slice(&entry.hash.to_le_bytes());
            out.extend_from_slice(&entry.stream_hash.to_le_bytes());
            out.push(entry.version);
            out.extend_from_slice(&entry.special_bytes);
            write_string(&mut out, &entry.resource_type)?;
            write_string(&mut out, entry.map_resource_type.as_deref().unwrap_or(""))?;
            write_string(&mut out, entry.map_resource_name.as_deref().unwrap_or(""))?;
        }
        Ok(out)
    }

    /// Insert an entry under its own hash
    pub fn insert(&mut self, entry: ResourceDataEntry) -> Option<ResourceDataEntry> {
        self.0.insert(entry.hash, entry)
    }

    /// Entry by precomputed hash
    pub fn get(&self, hash: u64) -> Option<&ResourceDataEntry> {
        self.0.get(&hash)
    }

    /// Entry for a resource path
    pub fn get_by_path(&self, path: &str) -> Option<&ResourceDataEntry> {
        self.get(resource_path_hash(path))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Split a side file into its decompressed size and compressed body
pub fn split_header(data: &[u8]) -> Result<(u64, &[u8])> {
    let mut reader = ByteReader::new(data);
    let size = reader.u64_le()?;
    Ok((size, &data[8..]))
}

/// Assemble a side file from a decompressed size and compressed body
pub fn join_header(decompressed_size: u64, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + body.len());
    out.extend_from_slice(&decompressed_size.to_le_bytes());
    out.extend_from_slice(body);
    out
}

fn read_string(reader: &mut ByteReader<'_>) -> Result<String> {
    let len = reader.u16_le()? as usize;
    let offset = reader.offset();
    let bytes = reader.take(len)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| ResourceDataError::InvalidUtf8(offset))
}

fn write_string(out: &mut Vec<u8>, value: &str) -> Result<()> {
    let len = u16::try_from(value.len()).map_err(|_| ResourceDataError::StringTooLong(value.len()))?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(path: &str, map_type: Option<&str>) -> ResourceDataEntry {
        ResourceDataEntry {
            hash: resource_path_hash(path),
            stream_hash: 0x1122_3344,
            version: 2,
            special_bytes: [1, 0, 3],
            resource_type: "image".into(),
            map_resource_type: map_type.map(str::to_string),
            map_resource_name: map_type.map(|_| path.to_string()),
        }
    }

    #[test]
    fn test_record_layout() {
        let mut map = ResourceDataMap::new();
        map.insert(ResourceDataEntry {
            hash: 1,
            stream_hash: 2,
            version: 3,
            special_bytes: [4, 5, 6],
            resource_type: "t".into(),
            map_resource_type: None,
            map_resource_name: None,
        });
        let bytes = map.build_records().expect("build");
        let mut expected = Vec::new();
        expected.extend_from_slice(&1u64.to_le_bytes());
        expected.extend_from_slice(&2u64.to_le_bytes());
        expected.extend_from_slice(&[3, 4, 5, 6]);
        expected.extend_from_slice(&[1, 0, b't', 0, 0, 0, 0]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_records_round_trip_and_lookup() {
        let mut map = ResourceDataMap::new();
        map.insert(entry("art/a.tga", Some("image")));
        map.insert(entry("decls/b.decl", None));

        let parsed = ResourceDataMap::parse_records(&map.build_records().expect("build"))
            .expect("parse");
        assert_eq!(parsed, map);

        let found = parsed.get_by_path("art/a.tga").expect("present");
        assert_eq!(found.map_resource_name.as_deref(), Some("art/a.tga"));
        // Lookups hash the path verbatim
        assert!(parsed.get_by_path("ART/a.tga").is_none());
    }

    #[test]
    fn test_truncated_record() {
        let mut map = ResourceDataMap::new();
        map.insert(entry("x", None));
        let bytes = map.build_records().expect("build");
        assert!(matches!(
            ResourceDataMap::parse_records(&bytes[..bytes.len() - 2]),
            Err(ResourceDataError::Truncated { .. })
        ));
    }

    #[test]
    fn test_fallback_defaults() {
        let fallback = ResourceDataEntry::fallback("new/file.bin");
        assert_eq!(fallback.resource_type, "rs_streamfile");
        assert_eq!(fallback.version, 0);
        assert_eq!(fallback.stream_hash, 0);
        assert_eq!(fallback.special_bytes, [0, 0, 0]);
    }

    #[test]
    fn test_header_split() {
        let file = join_header(42, b"body");
        let (size, body) = split_header(&file).expect("split");
        assert_eq!(size, 42);
        assert_eq!(body, b"body");
        assert!(split_header(&[0; 7]).is_err());
    }
}
