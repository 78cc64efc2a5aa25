//! MapResources per-level manifests
//!
//! All integers are big-endian. Strings are a `u32` length followed by the
//! bytes, with no terminator.
//!
//! ```text
//! [u32 magic]
//! [u32 count] layers
//! [u64 count] asset types
//! [u32 count] assets: [i32 type index][string][i32][i32][i64][i64]
//! [u32 count] maps
//! ```

pub mod edit;
pub mod error;
pub mod file;

pub use edit::{AssetInsert, AssetPlacement};
pub use error::{MapResourcesError, Result};
pub use file::{MapAsset, MapResourcesFile, NEW_ASSET_UNKNOWN4};
