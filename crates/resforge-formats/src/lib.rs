//! Parsers and builders for the satellite formats of resource containers
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::derive_partial_eq_without_eq)] // Binary format structs
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! This crate provides symmetric (parser and builder) implementations for
//! the binary formats a resource container patch depends on, plus the JSON
//! shapes mod packages use to describe edits to them.
//!
//! # Supported Formats
//!
//! - **Blang**: localized string tables (plaintext side; the encrypted
//!   envelope lives in `resforge-crypto`)
//! - **MapResources**: per-level manifest of layers, asset types, assets
//!   and maps
//! - **StreamDB**: streaming-payload archive keyed by numeric file ids
//! - **Resource data**: side-file records with default metadata for new
//!   container entries
//! - **AssetsInfo**: mod-side JSON describing manifest edits
//!
//! # Design Principles
//!
//! - **Symmetric Operations**: Both parsing and building supported
//! - **Checked Reads**: Every length prefix is validated against the
//!   remaining input before allocation
//! - **Round-Trip Guarantee**: parse(build(data)) == data

#![warn(missing_docs)]

/// Mod-side JSON describing mapresources and package manifest edits
pub mod assets_info;
/// Localized string tables
///
/// See the [`blang`] module for the binary layout and the mod-side JSON.
pub mod blang;
/// Per-level asset manifests
///
/// Parsing, building and the asset insertion/removal algorithm used when
/// mods register new assets with a level.
pub mod mapresources;
mod reader;
/// Resource-data side file records keyed by resource path hash
pub mod resource_data;
/// StreamDB archives built from mod-supplied streaming payloads
pub mod streamdb;

// Test utilities module
#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod test_utils;

/// Common format trait for formats whose layout depends only on their bytes
pub trait ResourceFormat: Sized {
    /// Parse from bytes
    fn parse(data: &[u8]) -> Result<Self, Box<dyn std::error::Error>>;

    /// Build to bytes
    fn build(&self) -> Result<Vec<u8>, Box<dyn std::error::Error>>;

    /// Verify round-trip correctness
    fn verify_round_trip(data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
        let parsed = Self::parse(data)?;
        let rebuilt = parsed.build()?;
        if data != rebuilt.as_slice() {
            return Err("Round-trip verification failed".into());
        }
        Ok(())
    }
}
