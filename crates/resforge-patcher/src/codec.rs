//! Compression capability used for container payloads
//!
//! The game's payload compressor is proprietary and ships as a shared
//! library; [`NativeCodec`] loads it at run time. [`FlateCodec`] implements
//! the same trait with zlib for tooling and tests.

use crate::{PatchError, Result};
use dlopen::symbor::Library;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::ffi::c_void;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors returned by a codec
#[derive(Debug, Error)]
pub enum CodecError {
    /// Decompression failed or produced the wrong length
    #[error("Decompression failed: expected {expected} bytes, got {actual}")]
    Decompress {
        /// Requested output size
        expected: usize,
        /// Bytes produced, 0 when the codec reported failure
        actual: usize,
    },

    /// Compression failed
    #[error("Compression of {0} bytes failed")]
    Compress(usize),

    /// Stream error from a pure-Rust codec
    #[error("Codec I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Compress/decompress capability shared by all workers
pub trait Codec: Send + Sync {
    /// Decompress `data` into exactly `expected_size` bytes
    fn decompress(&self, data: &[u8], expected_size: usize) -> std::result::Result<Vec<u8>, CodecError>;

    /// Compress `data`
    fn compress(&self, data: &[u8]) -> std::result::Result<Vec<u8>, CodecError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// zlib codec
#[derive(Debug, Clone, Copy)]
pub struct FlateCodec {
    level: Compression,
}

impl Default for FlateCodec {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl FlateCodec {
    /// Codec with an explicit compression level (0-9)
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Codec for FlateCodec {
    fn decompress(&self, data: &[u8], expected_size: usize) -> std::result::Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(expected_size);
        ZlibDecoder::new(data).read_to_end(&mut out)?;
        if out.len() != expected_size {
            return Err(CodecError::Decompress {
                expected: expected_size,
                actual: out.len(),
            });
        }
        Ok(out)
    }

    fn compress(&self, data: &[u8]) -> std::result::Result<Vec<u8>, CodecError> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn name(&self) -> &'static str {
        "zlib"
    }
}

type DecompressFn = unsafe extern "C" fn(
    comp_buf: *const u8,
    comp_len: isize,
    raw_buf: *mut u8,
    raw_len: isize,
    fuzz_safe: i32,
    check_crc: i32,
    verbosity: i32,
    dec_buf_base: *mut u8,
    dec_buf_size: isize,
    callback: *mut c_void,
    callback_data: *mut c_void,
    decoder_memory: *mut c_void,
    decoder_memory_size: isize,
    thread_phase: i32,
) -> isize;

type CompressFn = unsafe extern "C" fn(
    compressor: i32,
    raw_buf: *const u8,
    raw_len: isize,
    comp_buf: *mut u8,
    level: i32,
    options: *const c_void,
    dictionary_base: *const u8,
    lrm: *const c_void,
    scratch: *mut c_void,
    scratch_size: isize,
) -> isize;

/// Kraken compressor id
const COMPRESSOR_KRAKEN: i32 = 8;

/// "Normal" compression level
const LEVEL_NORMAL: i32 = 4;

/// Worst-case compressed size for `raw_len` input bytes
fn compressed_bound(raw_len: usize) -> usize {
    raw_len + 274 * raw_len.div_ceil(0x40000).max(1)
}

/// Proprietary codec loaded from a shared library
pub struct NativeCodec {
    decompress_fn: DecompressFn,
    compress_fn: CompressFn,
    // Keeps the symbols above valid
    _library: Library,
}

impl NativeCodec {
    /// Load the codec library and resolve its entry points
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let library = Library::open(path)
            .map_err(|e| PatchError::CodecInit(format!("{}: {e}", path.display())))?;

        #[allow(unsafe_code)]
        let decompress_fn = *unsafe { library.symbol::<DecompressFn>("OodleLZ_Decompress") }
            .map_err(|e| PatchError::CodecInit(format!("OodleLZ_Decompress: {e}")))?;
        #[allow(unsafe_code)]
        let compress_fn = *unsafe { library.symbol::<CompressFn>("OodleLZ_Compress") }
            .map_err(|e| PatchError::CodecInit(format!("OodleLZ_Compress: {e}")))?;

        info!("Loaded native codec from {}", path.display());
        Ok(Self {
            decompress_fn,
            compress_fn,
            _library: library,
        })
    }
}

impl Codec for NativeCodec {
    fn decompress(&self, data: &[u8], expected_size: usize) -> std::result::Result<Vec<u8>, CodecError> {
        let mut out = vec![0u8; expected_size];
        #[allow(unsafe_code)]
        let written = unsafe {
            (self.decompress_fn)(
                data.as_ptr(),
                data.len() as isize,
                out.as_mut_ptr(),
                expected_size as isize,
                1,
                0,
                0,
                std::ptr::null_mut(),
                0,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                0,
                3,
            )
        };
        if written < 0 || written as usize != expected_size {
            return Err(CodecError::Decompress {
                expected: expected_size,
                actual: written.max(0) as usize,
            });
        }
        Ok(out)
    }

    fn compress(&self, data: &[u8]) -> std::result::Result<Vec<u8>, CodecError> {
        let mut out = vec![0u8; compressed_bound(data.len())];
        #[allow(unsafe_code)]
        let written = unsafe {
            (self.compress_fn)(
                COMPRESSOR_KRAKEN,
                data.as_ptr(),
                data.len() as isize,
                out.as_mut_ptr(),
                LEVEL_NORMAL,
                std::ptr::null(),
                std::ptr::null(),
                std::ptr::null(),
                std::ptr::null_mut(),
                0,
            )
        };
        if written <= 0 {
            return Err(CodecError::Compress(data.len()));
        }
        out.truncate(written as usize);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

// Entry points are plain C functions with no thread affinity
#[allow(unsafe_code)]
unsafe impl Send for NativeCodec {}
#[allow(unsafe_code)]
unsafe impl Sync for NativeCodec {}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flate_round_trip() {
        let codec = FlateCodec::default();
        let data = b"payload payload payload payload".repeat(8);
        let packed = codec.compress(&data).expect("compress");
        assert!(packed.len() < data.len());
        assert_eq!(codec.decompress(&packed, data.len()).expect("decompress"), data);
    }

    #[test]
    fn test_flate_size_mismatch() {
        let codec = FlateCodec::with_level(1);
        let packed = codec.compress(b"abc").expect("compress");
        assert!(matches!(
            codec.decompress(&packed, 4),
            Err(CodecError::Decompress {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_flate_rejects_garbage() {
        assert!(FlateCodec::default().decompress(b"not zlib", 8).is_err());
    }

    #[test]
    fn test_native_missing_library() {
        let result = NativeCodec::load("/nonexistent/liboo2core.so");
        assert!(matches!(result, Err(PatchError::CodecInit(_))));
    }

    #[test]
    fn test_compressed_bound() {
        assert_eq!(compressed_bound(0), 274);
        assert_eq!(compressed_bound(0x40000), 0x40000 + 274);
        assert_eq!(compressed_bound(0x40001), 0x40001 + 548);
    }
}
