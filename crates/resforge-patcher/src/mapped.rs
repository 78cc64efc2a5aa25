//! Memory-mapped, resizable container buffer
//!
//! The container file is mapped read-write for the duration of a patch.
//! Growing or shrinking it is a single sequence of flush, unmap,
//! `set_len` and remap; nothing else touches the file in between.

use crate::{PatchError, Result};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Chunked mover for overlapping ranges inside one buffer
///
/// Copies go through a fixed scratch buffer. Moves toward higher offsets
/// run from the tail backward so no source byte is overwritten before it
/// is read.
pub struct TailMover {
    buffer: Vec<u8>,
    bytes_moved: u64,
}

impl TailMover {
    /// Mover with a `chunk_size` scratch buffer, at least one byte
    pub fn new(chunk_size: usize) -> Self {
        Self {
            buffer: vec![0u8; chunk_size.max(1)],
            bytes_moved: 0,
        }
    }

    /// Scratch buffer size
    pub fn chunk_size(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes moved so far
    pub const fn bytes_moved(&self) -> u64 {
        self.bytes_moved
    }

    /// Move `len` bytes from `src` to `dest` within `data`
    pub fn move_range(&mut self, data: &mut [u8], src: usize, dest: usize, len: usize) {
        if src == dest || len == 0 {
            return;
        }

        let step = self.buffer.len();
        let mut remaining = len;

        if dest > src {
            while remaining > 0 {
                let chunk = remaining.min(step);
                let offset = remaining - chunk;
                self.buffer[..chunk].copy_from_slice(&data[src + offset..src + offset + chunk]);
                data[dest + offset..dest + offset + chunk].copy_from_slice(&self.buffer[..chunk]);
                remaining -= chunk;
            }
        } else {
            let mut offset = 0;
            while remaining > 0 {
                let chunk = remaining.min(step);
                self.buffer[..chunk].copy_from_slice(&data[src + offset..src + offset + chunk]);
                data[dest + offset..dest + offset + chunk].copy_from_slice(&self.buffer[..chunk]);
                offset += chunk;
                remaining -= chunk;
            }
        }

        self.bytes_moved += len as u64;
    }
}

/// A container file mapped read-write
pub struct MappedFile {
    path: PathBuf,
    file: File,
    /// `None` while the file is empty; zero-length mappings are not portable
    mmap: Option<MmapMut>,
    len: u64,
}

impl MappedFile {
    /// Open and map an existing file for exclusive read/write access
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();

        let mut mapped = Self {
            path,
            file,
            mmap: None,
            len,
        };
        mapped.remap()?;
        debug!("Mapped {} ({} bytes)", mapped.path.display(), len);
        Ok(mapped)
    }

    fn mapping_error(&self, source: std::io::Error) -> PatchError {
        PatchError::Mapping {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn remap(&mut self) -> Result<()> {
        self.mmap = if self.len == 0 {
            None
        } else {
            // The worker owns this file exclusively for the whole run
            #[allow(unsafe_code)]
            let mmap = unsafe { MmapOptions::new().map_mut(&self.file) }
                .map_err(|e| self.mapping_error(e))?;
            Some(mmap)
        };
        Ok(())
    }

    /// Path of the mapped file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file length
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Whether the file is empty
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whole file contents
    pub fn as_slice(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        self.mmap.as_deref_mut().unwrap_or(&mut [])
    }

    fn range(&self, offset: u64, len: u64) -> Result<Range<usize>> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(offset as usize..end as usize),
            _ => Err(PatchError::OutOfBounds {
                offset,
                len,
                size: self.len,
            }),
        }
    }

    /// Borrow `len` bytes at `offset`
    pub fn read_bytes_at(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let range = self.range(offset, len)?;
        Ok(&self.as_slice()[range])
    }

    /// Read a little-endian u64
    pub fn read_u64_at(&self, offset: u64) -> Result<u64> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.read_bytes_at(offset, 8)?);
        Ok(u64::from_le_bytes(bytes))
    }

    /// Read a little-endian u32
    pub fn read_u32_at(&self, offset: u64) -> Result<u32> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.read_bytes_at(offset, 4)?);
        Ok(u32::from_le_bytes(bytes))
    }

    /// Read one byte
    pub fn read_u8_at(&self, offset: u64) -> Result<u8> {
        Ok(self.read_bytes_at(offset, 1)?[0])
    }

    /// Overwrite bytes at `offset`
    pub fn write_bytes_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let range = self.range(offset, bytes.len() as u64)?;
        self.as_mut_slice()[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Write a little-endian u64
    pub fn write_u64_at(&mut self, offset: u64, value: u64) -> Result<()> {
        self.write_bytes_at(offset, &value.to_le_bytes())
    }

    /// Write a little-endian u32
    pub fn write_u32_at(&mut self, offset: u64, value: u32) -> Result<()> {
        self.write_bytes_at(offset, &value.to_le_bytes())
    }

    /// Write one byte
    pub fn write_u8_at(&mut self, offset: u64, value: u8) -> Result<()> {
        self.write_bytes_at(offset, &[value])
    }

    /// Fill `len` bytes at `offset` with `byte`
    pub fn fill_at(&mut self, offset: u64, len: u64, byte: u8) -> Result<()> {
        let range = self.range(offset, len)?;
        self.as_mut_slice()[range].fill(byte);
        Ok(())
    }

    /// Move `len` bytes from `src` to `dest` through `mover`
    pub fn move_within(
        &mut self,
        mover: &mut TailMover,
        src: u64,
        dest: u64,
        len: u64,
    ) -> Result<()> {
        let src_range = self.range(src, len)?;
        let dest_range = self.range(dest, len)?;
        mover.move_range(
            self.as_mut_slice(),
            src_range.start,
            dest_range.start,
            len as usize,
        );
        Ok(())
    }

    /// Resize the file and remap it
    ///
    /// New bytes read as zero. On failure the mapping is gone and the
    /// container must be abandoned.
    pub fn resize(&mut self, new_len: u64) -> Result<()> {
        if new_len == self.len {
            return Ok(());
        }

        self.flush()?;
        self.mmap = None;
        self.file
            .set_len(new_len)
            .map_err(|e| self.mapping_error(e))?;
        self.len = new_len;
        self.remap()?;

        debug!("Resized {} to {} bytes", self.path.display(), new_len);
        Ok(())
    }

    /// Flush dirty pages to disk
    pub fn flush(&self) -> Result<()> {
        if let Some(mmap) = &self.mmap {
            mmap.flush().map_err(|e| self.mapping_error(e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents).expect("write");
        file.flush().expect("flush");
        file
    }

    #[test]
    fn test_read_write_round_trip() {
        let file = temp_file(&[0u8; 32]);
        let mut mapped = MappedFile::open(file.path()).expect("open");

        mapped.write_u64_at(0, 0x0102_0304_0506_0708).expect("write");
        mapped.write_u32_at(8, 0xAABB_CCDD).expect("write");
        mapped.write_u8_at(12, 7).expect("write");

        assert_eq!(mapped.read_u64_at(0).expect("read"), 0x0102_0304_0506_0708);
        assert_eq!(mapped.read_u32_at(8).expect("read"), 0xAABB_CCDD);
        assert_eq!(mapped.read_u8_at(12).expect("read"), 7);
        mapped.flush().expect("flush");

        let on_disk = std::fs::read(file.path()).expect("read back");
        assert_eq!(&on_disk[..8], &0x0102_0304_0506_0708u64.to_le_bytes());
    }

    #[test]
    fn test_out_of_bounds_is_error() {
        let file = temp_file(&[0u8; 8]);
        let mut mapped = MappedFile::open(file.path()).expect("open");
        assert!(matches!(
            mapped.read_u64_at(1),
            Err(PatchError::OutOfBounds {
                offset: 1,
                len: 8,
                size: 8
            })
        ));
        assert!(mapped.write_bytes_at(u64::MAX, &[1]).is_err());
    }

    #[test]
    fn test_resize_grows_with_zeros_and_shrinks() {
        let file = temp_file(&[0xFF; 16]);
        let mut mapped = MappedFile::open(file.path()).expect("open");

        mapped.resize(40).expect("grow");
        assert_eq!(mapped.len(), 40);
        assert!(mapped.as_slice()[16..].iter().all(|&b| b == 0));

        mapped.resize(4).expect("shrink");
        assert_eq!(mapped.as_slice(), &[0xFF; 4]);
        assert_eq!(std::fs::metadata(file.path()).expect("stat").len(), 4);
    }

    #[test]
    fn test_empty_file_maps() {
        let file = temp_file(&[]);
        let mut mapped = MappedFile::open(file.path()).expect("open");
        assert!(mapped.is_empty());
        assert!(mapped.as_slice().is_empty());
        mapped.resize(8).expect("grow");
        mapped.write_u64_at(0, 5).expect("write");
        assert_eq!(mapped.read_u64_at(0).expect("read"), 5);
    }

    #[test]
    fn test_mover_overlapping_shift_right() {
        let mut data: Vec<u8> = (0..20).collect();
        let mut mover = TailMover::new(3);
        mover.move_range(&mut data, 2, 5, 10);
        assert_eq!(&data[5..15], &[2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
        assert_eq!(mover.bytes_moved(), 10);
    }

    #[test]
    fn test_mover_overlapping_shift_left() {
        let mut data: Vec<u8> = (0..20).collect();
        let mut mover = TailMover::new(4);
        mover.move_range(&mut data, 6, 1, 12);
        assert_eq!(&data[1..13], &[6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17]);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Chunked moves agree with `copy_within` for any chunk size
            #[test]
            fn mover_matches_copy_within(
                data in prop::collection::vec(any::<u8>(), 1..256),
                src_seed in any::<prop::sample::Index>(),
                dest_seed in any::<prop::sample::Index>(),
                len_seed in any::<prop::sample::Index>(),
                chunk in 1usize..64,
            ) {
                let src = src_seed.index(data.len());
                let dest = dest_seed.index(data.len());
                let max_len = data.len() - src.max(dest);
                let len = if max_len == 0 { 0 } else { len_seed.index(max_len + 1) };

                let mut expected = data.clone();
                expected.copy_within(src..src + len, dest);

                let mut actual = data;
                TailMover::new(chunk).move_range(&mut actual, src, dest, len);
                prop_assert_eq!(actual, expected);
            }
        }
    }
}
