//! Blang localized string tables
//!
//! A blang chunk is an encrypted envelope (see `resforge_crypto::blang`)
//! around a plaintext table with the following layout:
//!
//! ```text
//! [u64 BE header]          only in gameresources_patch1
//! [u32 BE string count]
//! repeated:
//!   [u32 LE FNV-1a(lowercase identifier)]
//!   [u32 LE len][identifier]
//!   [u32 LE len][text]
//!   [u32 LE len][unknown bytes]
//! ```
//!
//! Mods edit tables through a small JSON document ([`BlangJson`]) whose
//! file stem names the table (`english.json` edits `strings/english.blang`).
//!
//! # Example
//!
//! ```
//! use resforge_formats::blang::{BlangFile, StringEdit};
//!
//! let mut table = BlangFile::default();
//! assert_eq!(table.set_text("#str_hello", "Hello"), StringEdit::Added);
//! let bytes = table.to_bytes().unwrap();
//! let parsed = BlangFile::parse_with(&bytes, false).unwrap();
//! assert_eq!(parsed.find("#str_hello").unwrap().text, "Hello");
//! ```

pub mod error;
pub mod file;
pub mod json;

pub use error::{BlangError, Result};
pub use file::{BlangFile, BlangString, HEADER_CONTAINER, StringEdit, has_unknown_header};
pub use json::{BlangJson, BlangJsonString, STRINGS_DIR, target_chunk_name};
