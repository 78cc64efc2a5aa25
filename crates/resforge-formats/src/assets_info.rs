//! Mod-side manifest edit descriptions
//!
//! A mod ships one of these JSON documents per container to add or remove
//! layers, maps and assets in the level's mapresources, and to register
//! extra resource containers in the package manifest:
//!
//! ```json
//! {
//!   "layers": [{ "name": "spawn/custom" }],
//!   "maps": [{ "name": "maps/game/e1m1", "remove": true }],
//!   "extraResources": [{ "name": "mod_assets.resources", "placeFirst": true }],
//!   "assets": [{ "path": "art/new.tga", "mapResourceType": "image",
//!                "placeByName": "art/old.tga", "placeBefore": true }]
//! }
//! ```

use crate::mapresources::AssetPlacement;
use serde::{Deserialize, Serialize};

/// Errors decoding an `AssetsInfo` document
pub type Result<T> = std::result::Result<T, serde_json::Error>;

/// Complete manifest edit description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetsInfo {
    /// Layer additions and removals
    #[serde(default)]
    pub layers: Vec<NamedEdit>,
    /// Map additions and removals
    #[serde(default)]
    pub maps: Vec<NamedEdit>,
    /// Containers to register with the package manifest
    #[serde(default, alias = "resources")]
    pub extra_resources: Vec<ExtraResource>,
    /// Asset additions and removals
    #[serde(default)]
    pub assets: Vec<AssetEdit>,
}

impl AssetsInfo {
    /// Decode from JSON bytes
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
    }

    /// Whether the document asks for any mapresources change
    pub fn touches_mapresources(&self) -> bool {
        !(self.layers.is_empty() && self.maps.is_empty() && self.assets.is_empty())
    }
}

/// Add or remove a layer or map by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedEdit {
    /// Layer or map name
    pub name: String,
    /// Remove instead of add
    #[serde(default)]
    pub remove: bool,
}

/// Register a container with the package manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraResource {
    /// Container file name or a unique part of it
    pub name: String,
    /// Remove the reference instead of adding it
    #[serde(default)]
    pub remove: bool,
    /// Place before the map's first reference
    #[serde(default)]
    pub place_first: bool,
    /// With `place_by_name`, place before instead of after the anchor
    #[serde(default)]
    pub place_before: bool,
    /// Anchor container name
    #[serde(default)]
    pub place_by_name: Option<String>,
}

/// Add or remove one mapresources asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEdit {
    /// Asset path
    #[serde(alias = "name")]
    pub path: String,
    /// Asset type; resolved from resource data when omitted
    #[serde(default)]
    pub map_resource_type: Option<String>,
    /// Remove instead of add
    #[serde(default)]
    pub remove: bool,
    /// Insert before the anchor instead of after it
    #[serde(default)]
    pub place_before: bool,
    /// Anchor asset name
    #[serde(default)]
    pub place_by_name: Option<String>,
    /// Anchor asset type
    #[serde(default)]
    pub place_by_type: Option<String>,
}

impl AssetEdit {
    /// Placement hint for the mapresources insertion
    pub fn placement(&self) -> AssetPlacement {
        AssetPlacement {
            place_by_name: self.place_by_name.clone(),
            place_by_type: self.place_by_type.clone(),
            place_before: self.place_before,
        }
    }
}
