//! Level manifest (mapresources) editing
//!
//! A container holds at most one `.mapresources` chunk. It is decoded on
//! first use, edited in memory by every mod in priority order and written
//! back once at the end of the patch, and only when the serialized form
//! differs from what was loaded.

use crate::codec::Codec;
use crate::container::Container;
use crate::log::WorkerLog;
use crate::replace::{ChunkStore, PreparedPayload};
use crate::{PatchError, Result};
use resforge_formats::assets_info::{AssetsInfo, NamedEdit};
use resforge_formats::mapresources::{AssetInsert, AssetPlacement, MapResourcesFile};
use resforge_formats::resource_data::ResourceDataMap;
use tracing::debug;

/// A decoded mapresources chunk and the bytes it was decoded from
#[derive(Debug, Clone)]
pub struct MapResourcesSession {
    chunk_name: String,
    original: Vec<u8>,
    file: MapResourcesFile,
}

impl MapResourcesSession {
    /// Decode the container's mapresources chunk, if it has one
    pub fn load(container: &Container, data: &[u8], codec: &dyn Codec) -> Result<Option<Self>> {
        let Some(index) = container.mapresources_chunk() else {
            return Ok(None);
        };
        let original = container.chunk_payload(data, index, codec)?;
        let file = MapResourcesFile::parse_bytes(&original)?;
        let chunk_name = container.chunks[index].name.full.clone();
        debug!(
            "Loaded {} ({} layers, {} assets, {} maps)",
            chunk_name,
            file.layers.len(),
            file.assets.len(),
            file.maps.len()
        );
        Ok(Some(Self {
            chunk_name,
            original,
            file,
        }))
    }

    /// Name of the chunk this session was loaded from
    pub fn chunk_name(&self) -> &str {
        &self.chunk_name
    }

    /// Current manifest
    pub fn file(&self) -> &MapResourcesFile {
        &self.file
    }

    /// Whether the manifest serializes differently from what was loaded
    pub fn is_modified(&self) -> Result<bool> {
        Ok(self.file.to_bytes()? != self.original)
    }

    /// Apply the layer, map and asset edits of one manifest description
    pub fn apply_assets_info(
        &mut self,
        info: &AssetsInfo,
        resource_data: &ResourceDataMap,
        log: &mut WorkerLog,
    ) {
        for layer in &info.layers {
            edit_named(
                &mut self.file,
                layer,
                "Layer",
                log,
                MapResourcesFile::add_layer,
                MapResourcesFile::remove_layer,
            );
        }
        for map in &info.maps {
            edit_named(
                &mut self.file,
                map,
                "Map",
                log,
                MapResourcesFile::add_map,
                MapResourcesFile::remove_map,
            );
        }

        for asset in &info.assets {
            let asset_type = asset.map_resource_type.clone().or_else(|| {
                resource_data
                    .get_by_path(&asset.path)
                    .and_then(|entry| entry.map_resource_type.clone())
            });
            let Some(asset_type) = asset_type else {
                log.warn(format!(
                    "No mapresources type known for {}, asset skipped",
                    asset.path
                ));
                continue;
            };

            if asset.remove {
                if self.file.remove_asset(&asset_type, &asset.path) {
                    log.info(format!("Removed asset {} ({asset_type})", asset.path));
                } else {
                    log.warn(format!(
                        "Asset {} ({asset_type}) not found for removal",
                        asset.path
                    ));
                }
            } else {
                self.add_asset(&asset_type, &asset.path, &asset.placement(), log);
            }
        }
    }

    /// Insert one asset, logging duplicates and unmatched anchors
    pub fn add_asset(
        &mut self,
        asset_type: &str,
        name: &str,
        placement: &AssetPlacement,
        log: &mut WorkerLog,
    ) -> bool {
        match self.file.add_asset(asset_type, name, placement) {
            AssetInsert::Duplicate => {
                log.detail(format!("Asset {name} ({asset_type}) already present"));
                false
            }
            AssetInsert::Inserted { index, anchored } => {
                if !anchored {
                    log.warn(format!(
                        "Placement anchor {} not found for {name}, appended instead",
                        placement.place_by_name.as_deref().unwrap_or_default()
                    ));
                }
                log.info(format!("Added asset {name} ({asset_type}) at {index}"));
                true
            }
        }
    }

    /// Write the manifest back if it changed
    ///
    /// The chunk is looked up by name in `store`'s current container, so
    /// this works after the container has been re-parsed. Returns whether
    /// anything was written.
    pub(crate) fn write_back(&self, store: &mut ChunkStore<'_>, codec: &dyn Codec) -> Result<bool> {
        let bytes = self.file.to_bytes()?;
        if bytes == self.original {
            return Ok(false);
        }

        let index = store
            .container
            .find_chunk(&self.chunk_name)
            .ok_or_else(|| PatchError::ChunkNotFound(self.chunk_name.clone()))?;
        let mode = store.container.chunks[index].compression_mode;
        let payload = PreparedPayload::matching(bytes, mode, codec)?;
        store.store(index, &payload)?;
        Ok(true)
    }
}

fn edit_named(
    file: &mut MapResourcesFile,
    edit: &NamedEdit,
    what: &str,
    log: &mut WorkerLog,
    add: fn(&mut MapResourcesFile, &str) -> bool,
    remove: fn(&mut MapResourcesFile, &str) -> bool,
) {
    if edit.remove {
        if remove(file, &edit.name) {
            log.info(format!("Removed {} {}", what.to_ascii_lowercase(), edit.name));
        } else {
            log.warn(format!("{what} {} not found for removal", edit.name));
        }
    } else if add(file, &edit.name) {
        log.info(format!("Added {} {}", what.to_ascii_lowercase(), edit.name));
    } else {
        log.detail(format!("{what} {} already present", edit.name));
    }
}

#[derive(Debug, Default)]
enum SlotState {
    #[default]
    Unloaded,
    Absent,
    Loaded(Box<MapResourcesSession>),
}

/// Lazily loaded mapresources session for one container patch
#[derive(Debug, Default)]
pub struct ManifestSlot {
    state: SlotState,
}

impl ManifestSlot {
    /// Slot that loads on first use
    pub fn new() -> Self {
        Self::default()
    }

    /// The session, loading it on first call
    ///
    /// A load failure or a container without a mapresources chunk leaves
    /// the slot empty for the rest of the patch.
    pub fn session(
        &mut self,
        container: &Container,
        data: &[u8],
        codec: &dyn Codec,
    ) -> Result<Option<&mut MapResourcesSession>> {
        if matches!(self.state, SlotState::Unloaded) {
            self.state = SlotState::Absent;
            if let Some(session) = MapResourcesSession::load(container, data, codec)? {
                self.state = SlotState::Loaded(Box::new(session));
            }
        }
        match &mut self.state {
            SlotState::Loaded(session) => Ok(Some(&mut **session)),
            _ => Ok(None),
        }
    }

    /// Whether a session holds edits from this patch
    pub fn is_loaded(&self) -> bool {
        matches!(self.state, SlotState::Loaded(_))
    }

    /// The loaded session, if any
    pub fn take(self) -> Option<MapResourcesSession> {
        match self.state {
            SlotState::Loaded(session) => Some(*session),
            _ => None,
        }
    }
}
