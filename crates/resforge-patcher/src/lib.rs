//! In-place patching of IDCL resource containers.
//!
//! A resource container is a single archive holding many named assets plus
//! the offset and name tables that locate them. This crate maps a container
//! into memory, replaces existing asset payloads, appends brand-new assets
//! and keeps every table consistent while doing so. It also rebuilds
//! streamdb archives from mod-supplied streaming payloads.
//!
//! # Container Layout
//!
//! Sections are contiguous and always in this order:
//!
//! ```text
//! header | info records | name offsets | names blob | unknown |
//! type ids | name ids | idcl | data
//! ```
//!
//! Any change to a section's length shifts every later section and every
//! absolute data offset stored in the info records.
//!
//! # Example
//!
//! ```rust,no_run
//! use resforge_patcher::{FlateCodec, ModFile, ModParent, PatchContext, PatchJob, run_jobs};
//! use std::sync::Arc;
//!
//! let parent = Arc::new(ModParent::new("my-mod", 10));
//! let file = ModFile::new(parent, "gameresources.resources", "decls/x.decl", b"{}".to_vec());
//! let ctx = PatchContext::new(Default::default(), Arc::new(FlateCodec::default()));
//! let results = run_jobs(
//!     vec![PatchJob::Resource { path: "base/gameresources.resources".into(), mod_files: vec![file] }],
//!     &ctx,
//! );
//! assert!(results.iter().all(|r| r.outcome.is_ok()));
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)] // Offsets are bounds-checked against the mapping
#![allow(clippy::cast_possible_wrap)] // FFI lengths are isize
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]

use resforge_crypto::CryptoError;
use resforge_formats::blang::BlangError;
use resforge_formats::mapresources::MapResourcesError;
use resforge_formats::resource_data::ResourceDataError;
use resforge_formats::streamdb::StreamDbError;
use thiserror::Error;

// Chunk placement
mod append;
mod replace;

// Compression capability
pub mod codec;

// Configuration
pub mod config;

// Container model
pub mod container;

// Per-worker log buffers
pub mod log;

// Level manifest editing
pub mod manifest;

// Memory-mapped container access
pub mod mapped;

// Caller-supplied mod files
pub mod mod_file;

// Package manifest collaborator
pub mod package;

// Patch orchestration
pub mod pipeline;

// Resource-data side file
pub mod resource_data;

// StreamDB rebuilding
pub mod streamdb;

pub use codec::{Codec, CodecError, FlateCodec, NativeCodec};
pub use config::{PatchConfig, PlacementStrategy};
pub use container::{Chunk, Container, ContainerHeader, ResourceName};
pub use log::{LogPool, WorkerLog};
pub use mapped::{MappedFile, TailMover};
pub use mod_file::{ModFile, ModParent, sort_by_priority};
pub use package::{MapFileRef, PackageManifest, PackageMapSpec};
pub use pipeline::{JobResult, PatchContext, PatchJob, PatchReport, patch_container, run_jobs};
pub use resource_data::load_resource_data;
pub use streamdb::build_streamdb;

/// Result type for patch operations.
pub type Result<T> = std::result::Result<T, PatchError>;

/// Errors that can occur while patching.
#[derive(Debug, Error)]
pub enum PatchError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Mapping, unmapping or remapping a container failed.
    #[error("Memory map error on {path}: {source}")]
    Mapping {
        /// Container path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// A read or write fell outside the mapped file.
    #[error("Access out of bounds: {offset}+{len} > {size}")]
    OutOfBounds {
        /// Start of the access
        offset: u64,
        /// Access length
        len: u64,
        /// Mapped file size
        size: u64,
    },

    /// Container tables are inconsistent.
    #[error("Container corruption: {0}")]
    Corruption(String),

    /// Container header could not be decoded.
    #[error("Header error: {0}")]
    Header(#[from] binrw::Error),

    /// The native codec could not be loaded.
    #[error("Codec initialization failed: {0}")]
    CodecInit(String),

    /// Compression or decompression failed.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Blang envelope could not be opened or sealed.
    #[error("Blang crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Blang string table error.
    #[error("Blang error: {0}")]
    Blang(#[from] BlangError),

    /// MapResources manifest error.
    #[error("MapResources error: {0}")]
    MapResources(#[from] MapResourcesError),

    /// StreamDB archive error.
    #[error("StreamDB error: {0}")]
    StreamDb(#[from] StreamDbError),

    /// Resource-data side file error.
    #[error("Resource data error: {0}")]
    ResourceData(#[from] ResourceDataError),

    /// JSON document could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A mod file's contents cannot be used.
    #[error("Invalid mod file {name}: {reason}")]
    InvalidModFile {
        /// Target name of the mod file
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// A named chunk does not exist.
    #[error("Chunk not found: {0}")]
    ChunkNotFound(String),

    /// Package manifest error.
    #[error("Package manifest error: {0}")]
    Package(String),

    /// A worker thread panicked.
    #[error("Worker for {0} panicked")]
    WorkerPanicked(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PatchError {
    /// Whether this error aborts the whole container rather than one item.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Mapping { .. }
                | Self::OutOfBounds { .. }
                | Self::Corruption(_)
                | Self::Header(_)
                | Self::CodecInit(_)
                | Self::StreamDb(_)
                | Self::WorkerPanicked(_)
        )
    }
}

/// Version information for the patcher.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
