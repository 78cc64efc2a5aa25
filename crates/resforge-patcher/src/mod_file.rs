//! Caller-supplied mod files
//!
//! Discovery and extraction live outside this crate. They hand over one
//! [`ModFile`] per file a mod wants to place in a container, already
//! flagged as string-table JSON or manifest JSON where that applies.

use resforge_formats::mapresources::AssetPlacement;
use resforge_formats::resource_data::ResourceDataEntry;
use std::sync::Arc;

/// The mod a file came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModParent {
    /// Mod name for log lines
    pub name: String,
    /// Higher priorities are applied first and win conflicts
    pub priority: i32,
    /// Minimum patcher version the mod asks for
    pub required_version: u32,
}

impl ModParent {
    /// Mod with no version requirement
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            required_version: 0,
        }
    }

    /// Set the required patcher version
    #[must_use]
    pub const fn with_required_version(mut self, version: u32) -> Self {
        self.required_version = version;
        self
    }
}

/// One file a mod places in a container
#[derive(Debug, Clone)]
pub struct ModFile {
    /// Owning mod
    pub parent: Arc<ModParent>,
    /// Container file the mod file belongs to
    pub resource_name: String,
    /// Chunk name inside the container, or the JSON file name for
    /// string-table and manifest edits
    pub target_name: String,
    /// File contents
    pub data: Vec<u8>,
    /// String-table edit JSON
    pub is_blang_json: bool,
    /// Manifest edit JSON
    pub is_assets_info_json: bool,
    /// Metadata for new chunks; resolved from resource data when unset
    pub metadata: Option<ResourceDataEntry>,
    /// Position of the new chunk's asset in the level manifest
    pub placement: AssetPlacement,
}

impl ModFile {
    /// Plain replacement or new chunk
    pub fn new(
        parent: Arc<ModParent>,
        resource_name: impl Into<String>,
        target_name: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            parent,
            resource_name: resource_name.into(),
            target_name: target_name.into(),
            data,
            is_blang_json: false,
            is_assets_info_json: false,
            metadata: None,
            placement: AssetPlacement::default(),
        }
    }

    /// Mark as string-table edit JSON
    #[must_use]
    pub fn blang_json(mut self) -> Self {
        self.is_blang_json = true;
        self
    }

    /// Mark as manifest edit JSON
    #[must_use]
    pub fn assets_info_json(mut self) -> Self {
        self.is_assets_info_json = true;
        self
    }

    /// Attach explicit metadata for a new chunk
    #[must_use]
    pub fn with_metadata(mut self, metadata: ResourceDataEntry) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Attach a manifest placement hint for a new chunk
    #[must_use]
    pub fn with_placement(mut self, placement: AssetPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Priority of the owning mod
    pub fn priority(&self) -> i32 {
        self.parent.priority
    }

    /// Whether the placement hint names an anchor asset
    pub fn has_placement_hint(&self) -> bool {
        self.placement.place_by_name.is_some()
    }
}

/// Order mod files by descending priority, keeping input order for ties
pub fn sort_by_priority(files: &mut [ModFile]) {
    files.sort_by_key(|f| std::cmp::Reverse(f.priority()));
}
