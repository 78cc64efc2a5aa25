//! Cryptographic operations for resource containers
//!
//! This crate provides the hashing and encryption primitives the patcher
//! relies on when it touches container metadata and string tables.
//!
//! # Components
//!
//! - **Hashing**: FNV-1a 32-bit for string-table identifiers, FNV-1a 64-bit
//!   for resource paths in the resource-data side file
//! - **Encryption**: the blang envelope (salted SHA-256 key derivation,
//!   AES-128-CBC, HMAC-SHA256 authentication)
//!
//! # Examples
//!
//! ## String Identifier Hashing
//!
//! ```
//! use resforge_crypto::fnv::string_hash;
//!
//! // Identifiers are hashed case-insensitively
//! assert_eq!(string_hash("#STR_Hello"), string_hash("#str_hello"));
//! ```
//!
//! ## Blang Envelope Round Trip
//!
//! ```
//! use resforge_crypto::blang::{decrypt, encrypt};
//!
//! let sealed = encrypt(b"plain string table", "strings/english.blang")?;
//! let opened = decrypt(&sealed, "strings/english.blang")?;
//! assert_eq!(opened, b"plain string table");
//! # Ok::<(), resforge_crypto::CryptoError>(())
//! ```

#![warn(missing_docs)]

pub mod blang;
pub mod error;
pub mod fnv;

pub use error::CryptoError;

// Re-export commonly used functions
pub use fnv::{fnv1a32, fnv1a64, resource_path_hash, string_hash};
