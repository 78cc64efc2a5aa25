//! Layer, map and asset edits on a manifest

use crate::mapresources::file::{MapAsset, MapResourcesFile};

/// Where a new asset goes relative to an existing one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetPlacement {
    /// Name of the anchor asset
    pub place_by_name: Option<String>,
    /// Type of the anchor asset; any type matches when unset
    pub place_by_type: Option<String>,
    /// Insert before the anchor instead of after it
    pub place_before: bool,
}

impl AssetPlacement {
    /// Placement that appends at the end of the asset list
    pub fn append() -> Self {
        Self::default()
    }

    /// Anchor on an asset name
    pub fn by_name(name: impl Into<String>, place_before: bool) -> Self {
        Self {
            place_by_name: Some(name.into()),
            place_by_type: None,
            place_before,
        }
    }

    /// Restrict the anchor to a type
    pub fn with_type(mut self, asset_type: impl Into<String>) -> Self {
        self.place_by_type = Some(asset_type.into());
        self
    }
}

/// Outcome of [`MapResourcesFile::add_asset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetInsert {
    /// Inserted at `index`; `anchored` is false when a placement hint was
    /// given but matched nothing and the asset was appended instead
    Inserted {
        /// Position of the new asset
        index: usize,
        /// Whether the placement hint was honored
        anchored: bool,
    },
    /// An asset with the same name and type already exists
    Duplicate,
}

impl MapResourcesFile {
    /// Add a layer; false if it already exists
    pub fn add_layer(&mut self, layer: &str) -> bool {
        push_unique(&mut self.layers, layer)
    }

    /// Remove a layer; false if it was not present
    pub fn remove_layer(&mut self, layer: &str) -> bool {
        remove_exact(&mut self.layers, layer)
    }

    /// Add a map; false if it already exists
    pub fn add_map(&mut self, map: &str) -> bool {
        push_unique(&mut self.maps, map)
    }

    /// Remove a map; false if it was not present
    pub fn remove_map(&mut self, map: &str) -> bool {
        remove_exact(&mut self.maps, map)
    }

    /// Index of a type name, appending it if missing
    pub fn asset_type_index(&mut self, asset_type: &str) -> i32 {
        let index = match self.asset_types.iter().position(|t| t == asset_type) {
            Some(index) => index,
            None => {
                self.asset_types.push(asset_type.to_string());
                self.asset_types.len() - 1
            }
        };
        // Type lists never approach i32::MAX entries
        i32::try_from(index).unwrap_or(i32::MAX)
    }

    /// Position of the asset with this name and type
    pub fn find_asset(&self, asset_type: &str, name: &str) -> Option<usize> {
        let type_index = self.asset_types.iter().position(|t| t == asset_type)?;
        self.assets.iter().position(|a| {
            a.name == name && usize::try_from(a.asset_type_index).ok() == Some(type_index)
        })
    }

    /// Insert a new asset according to `placement`
    ///
    /// The type is registered first so a duplicate check and the new
    /// record agree on its index.
    pub fn add_asset(
        &mut self,
        asset_type: &str,
        name: &str,
        placement: &AssetPlacement,
    ) -> AssetInsert {
        let type_index = self.asset_type_index(asset_type);
        if self
            .assets
            .iter()
            .any(|a| a.name == name && a.asset_type_index == type_index)
        {
            return AssetInsert::Duplicate;
        }

        let asset = MapAsset::new(type_index, name);

        if let Some(anchor) = self.find_anchor(placement) {
            let index = if placement.place_before {
                anchor
            } else {
                anchor + 1
            };
            self.assets.insert(index, asset);
            return AssetInsert::Inserted {
                index,
                anchored: true,
            };
        }

        self.assets.push(asset);
        AssetInsert::Inserted {
            index: self.assets.len() - 1,
            anchored: placement.place_by_name.is_none(),
        }
    }

    /// Remove the asset with this name and type; false on a miss
    pub fn remove_asset(&mut self, asset_type: &str, name: &str) -> bool {
        match self.find_asset(asset_type, name) {
            Some(index) => {
                self.assets.remove(index);
                true
            }
            None => false,
        }
    }

    fn find_anchor(&self, placement: &AssetPlacement) -> Option<usize> {
        let anchor_name = placement.place_by_name.as_deref()?;
        match placement.place_by_type.as_deref() {
            Some(anchor_type) => self.find_asset(anchor_type, anchor_name),
            None => self.assets.iter().position(|a| a.name == anchor_name),
        }
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) -> bool {
    if list.iter().any(|v| v == value) {
        return false;
    }
    list.push(value.to_string());
    true
}

fn remove_exact(list: &mut Vec<String>, value: &str) -> bool {
    match list.iter().position(|v| v == value) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}
