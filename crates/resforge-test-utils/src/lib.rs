//! Test utilities for resforge
//!
//! Builds small, valid resource containers in memory so tests never depend
//! on game files. The header is encoded by hand from the documented layout,
//! which keeps the builder independent of the parser it feeds.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::io::Write;
use std::path::{Path, PathBuf};

/// Encoded header size
pub const HEADER_SIZE: u64 = 0x7C;

/// Size of one info record
pub const INFO_RECORD_SIZE: u64 = 0x90;

/// Type name every fixture file is registered under
pub const FIXTURE_TYPE: &str = "rs_streamfile";

struct FixtureFile {
    name: String,
    stored: Vec<u8>,
    size: u64,
    compression: u8,
    offset: Option<u64>,
}

/// Builds a container with one type name, one name per file and payloads
/// in the data section
#[derive(Default)]
pub struct ContainerFixture {
    files: Vec<FixtureFile>,
    file_len: Option<u64>,
    names_padding: usize,
}

impl ContainerFixture {
    /// Empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored file placed after the previous one on a 16-byte boundary
    #[must_use]
    pub fn file(mut self, name: &str, data: &[u8]) -> Self {
        self.files.push(FixtureFile {
            name: name.to_string(),
            stored: data.to_vec(),
            size: data.len() as u64,
            compression: 0,
            offset: None,
        });
        self
    }

    /// Stored file at an explicit offset
    #[must_use]
    pub fn file_at(mut self, name: &str, data: &[u8], offset: u64) -> Self {
        self = self.file(name, data);
        if let Some(last) = self.files.last_mut() {
            last.offset = Some(offset);
        }
        self
    }

    /// Codec-compressed file whose logical size is `size`
    #[must_use]
    pub fn compressed(mut self, name: &str, stored: &[u8], size: u64) -> Self {
        self = self.file(name, stored);
        if let Some(last) = self.files.last_mut() {
            last.size = size;
            last.compression = 2;
        }
        self
    }

    /// Pad the file to `len` bytes
    #[must_use]
    pub fn file_len(mut self, len: u64) -> Self {
        self.file_len = Some(len);
        self
    }

    /// Garbage bytes after the last declared name
    #[must_use]
    pub fn names_padding(mut self, bytes: usize) -> Self {
        self.names_padding = bytes;
        self
    }

    /// Encode the container
    pub fn build(&self) -> Vec<u8> {
        let count = self.files.len() as u64;
        let info_offset = HEADER_SIZE;
        let names_offset = info_offset + count * INFO_RECORD_SIZE;

        let mut names = vec![FIXTURE_TYPE.to_string()];
        names.extend(self.files.iter().map(|f| f.name.clone()));
        let mut table = (names.len() as u64).to_le_bytes().to_vec();
        let mut blob = Vec::new();
        for name in &names {
            table.extend_from_slice(&(blob.len() as u64).to_le_bytes());
            blob.extend_from_slice(name.as_bytes());
            blob.push(0);
        }
        blob.extend(std::iter::repeat_n(0xAB, self.names_padding));

        let unknown_offset = names_offset + table.len() as u64 + blob.len() as u64;
        let type_ids_offset = unknown_offset + 8;
        let name_ids_offset = type_ids_offset + 4;
        let idcl_offset = name_ids_offset + count * 16;
        let data_offset = idcl_offset + 16;

        let mut offsets = Vec::new();
        let mut cursor = data_offset;
        for file in &self.files {
            let offset = file.offset.unwrap_or_else(|| cursor.next_multiple_of(16));
            offsets.push(offset);
            cursor = cursor.max(offset + file.stored.len() as u64);
        }
        let file_len = self.file_len.unwrap_or(cursor).max(cursor);

        let mut out = vec![0u8; file_len as usize];
        let put_u32 = |out: &mut [u8], at: usize, v: u64| {
            out[at..at + 4].copy_from_slice(&(v as u32).to_le_bytes());
        };
        let put_u64 = |out: &mut [u8], at: usize, v: u64| {
            out[at..at + 8].copy_from_slice(&v.to_le_bytes());
        };

        out[..4].copy_from_slice(b"IDCL");
        put_u32(&mut out[..], 0x04, 12);
        put_u32(&mut out[..], 0x0C, 1);
        put_u64(&mut out[..], 0x10, 0x1000);
        put_u32(&mut out[..], 0x20, count);
        put_u32(&mut out[..], 0x28, 1);
        put_u32(&mut out[..], 0x2C, count * 2);
        put_u32(&mut out[..], 0x38, unknown_offset - names_offset);
        put_u64(&mut out[..], 0x40, names_offset);
        put_u64(&mut out[..], 0x48, unknown_offset);
        put_u64(&mut out[..], 0x50, info_offset);
        put_u64(&mut out[..], 0x58, unknown_offset);
        put_u64(&mut out[..], 0x60, type_ids_offset);
        put_u64(&mut out[..], 0x68, data_offset);
        put_u64(&mut out[..], 0x74, idcl_offset);

        for (index, (file, offset)) in self.files.iter().zip(&offsets).enumerate() {
            let record = (info_offset + index as u64 * INFO_RECORD_SIZE) as usize;
            put_u64(&mut out[..], record + 0x20, index as u64 * 2);
            put_u64(&mut out[..], record + 0x38, *offset);
            put_u64(&mut out[..], record + 0x40, file.stored.len() as u64);
            put_u64(&mut out[..], record + 0x48, file.size);
            out[record + 0x70] = file.compression;

            let slot = (name_ids_offset + index as u64 * 16) as usize;
            put_u64(&mut out[..], slot + 8, index as u64 + 1);

            let start = *offset as usize;
            out[start..start + file.stored.len()].copy_from_slice(&file.stored);
        }

        let names_start = names_offset as usize;
        out[names_start..names_start + table.len()].copy_from_slice(&table);
        let blob_start = names_start + table.len();
        out[blob_start..blob_start + blob.len()].copy_from_slice(&blob);
        out[idcl_offset as usize..idcl_offset as usize + 4].copy_from_slice(b"IDCL");

        out
    }

    /// Write the container to a temporary file
    pub fn write_temp(&self) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(&self.build()).expect("write");
        file.flush().expect("flush");
        file
    }

    /// Write the container to `dir/file_name`
    pub fn write(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.build()).expect("write container");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_are_contiguous() {
        let data = ContainerFixture::new()
            .file("a.txt", b"abc")
            .file_at("b.txt", b"defg", 0x400)
            .build();
        let u64_at = |at: usize| u64::from_le_bytes(data[at..at + 8].try_into().unwrap());

        assert_eq!(&data[..4], b"IDCL");
        assert_eq!(u64_at(0x50), HEADER_SIZE);
        assert_eq!(u64_at(0x40), HEADER_SIZE + 2 * INFO_RECORD_SIZE);
        assert_eq!(u64_at(0x60), u64_at(0x48) + 8);
        assert_eq!(u64_at(0x68), u64_at(0x74) + 16);
        assert_eq!(data.len(), 0x404);

        let second = (HEADER_SIZE + INFO_RECORD_SIZE) as usize;
        assert_eq!(u64_at(second + 0x38), 0x400);
        assert_eq!(&data[0x400..], b"defg");
    }
}
