//! Package manifest collaborator
//!
//! The package manifest lists every container the game knows about and,
//! per map, which of them it loads and in what order. Mods register extra
//! containers through the `extraResources` list of their manifest edit
//! JSON. Containers only collect those requests; [`apply_edit`] resolves
//! them against a [`PackageManifest`] once every worker has finished.
//!
//! ```json
//! {
//!   "files": [{ "name": "gameresources.resources" }, { "name": "e1m1_intro.resources" }],
//!   "mapFileRefs": [{ "file": 0, "map": 0 }, { "file": 1, "map": 0 }],
//!   "maps": [{ "name": "game/sp/e1m1_intro/e1m1_intro" }]
//! }
//! ```

use crate::log::WorkerLog;
use crate::{PatchError, Result};
use resforge_formats::assets_info::ExtraResource;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One map's reference to one container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapFileRef {
    /// Index into the file list
    pub file: usize,
    /// Index into the map list
    pub map: usize,
}

/// Ordered file, map and reference lists a package edit works on
///
/// Implementations own persistence; edits only go through these methods.
pub trait PackageManifest {
    /// Container names in index order
    fn files(&self) -> Vec<&str>;

    /// Map names in index order
    fn maps(&self) -> Vec<&str>;

    /// References in load order
    fn references(&self) -> &[MapFileRef];

    /// Append a container name and return its index
    fn add_file(&mut self, name: &str) -> usize;

    /// Insert `reference` so it ends up at `position`
    fn insert_reference(&mut self, position: usize, reference: MapFileRef);

    /// Remove the reference at `position`
    fn remove_reference(&mut self, position: usize) -> Option<MapFileRef>;
}

/// Named entry in the file or map list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    /// File or map name
    pub name: String,
}

/// JSON package manifest as shipped with the game
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMapSpec {
    /// Known containers
    #[serde(default)]
    pub files: Vec<PackageEntry>,
    /// Per-map container references in load order
    #[serde(rename = "mapFileRefs", default)]
    pub map_file_refs: Vec<MapFileRef>,
    /// Known maps
    #[serde(default)]
    pub maps: Vec<PackageEntry>,
}

impl PackageMapSpec {
    /// Decode from JSON bytes
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Read from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_slice(&data)
    }

    /// Write as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        std::fs::write(path.as_ref(), data)?;
        Ok(())
    }
}

impl PackageManifest for PackageMapSpec {
    fn files(&self) -> Vec<&str> {
        self.files.iter().map(|f| f.name.as_str()).collect()
    }

    fn maps(&self) -> Vec<&str> {
        self.maps.iter().map(|m| m.name.as_str()).collect()
    }

    fn references(&self) -> &[MapFileRef] {
        &self.map_file_refs
    }

    fn add_file(&mut self, name: &str) -> usize {
        self.files.push(PackageEntry {
            name: name.to_string(),
        });
        self.files.len() - 1
    }

    fn insert_reference(&mut self, position: usize, reference: MapFileRef) {
        let position = position.min(self.map_file_refs.len());
        self.map_file_refs.insert(position, reference);
    }

    fn remove_reference(&mut self, position: usize) -> Option<MapFileRef> {
        (position < self.map_file_refs.len()).then(|| self.map_file_refs.remove(position))
    }
}

/// An `extraResources` request raised while patching one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEdit {
    /// File name of the container whose mods asked for the edit
    pub container: String,
    /// Requested change
    pub resource: ExtraResource,
}

impl PackageEdit {
    /// Edit requested by mods of `container`
    pub fn new(container: impl Into<String>, resource: ExtraResource) -> Self {
        Self {
            container: container.into(),
            resource,
        }
    }
}

/// Map name a container belongs to: its file stem without a patch suffix
fn map_stem(container: &str) -> &str {
    let file_name = container.rsplit(['/', '\\']).next().unwrap_or(container);
    let stem = file_name
        .rsplit_once('.')
        .map_or(file_name, |(stem, _)| stem);
    match stem.rsplit_once("_patch") {
        Some((base, digits)) if digits.chars().all(|c| c.is_ascii_digit()) => base,
        _ => stem,
    }
}

fn find_map(manifest: &dyn PackageManifest, container: &str) -> Option<usize> {
    let stem = map_stem(container);
    manifest
        .maps()
        .iter()
        .position(|m| *m == stem || m.strip_suffix(stem).is_some_and(|p| p.ends_with('/')))
}

/// Index of the file named `name`, or the first one containing it
fn find_file(manifest: &dyn PackageManifest, name: &str) -> Option<usize> {
    let files = manifest.files();
    files
        .iter()
        .position(|f| *f == name)
        .or_else(|| files.iter().position(|f| f.contains(name)))
}

/// Apply one package edit
///
/// Unresolvable requests degrade to warnings; an error means the edit's
/// container has no map in the manifest.
pub fn apply_edit(
    manifest: &mut dyn PackageManifest,
    edit: &PackageEdit,
    log: &mut WorkerLog,
) -> Result<()> {
    let resource = &edit.resource;
    if resource.name.trim().is_empty() {
        log.warn(format!("Ignoring unnamed extra resource from {}", edit.container));
        return Ok(());
    }

    let map = find_map(manifest, &edit.container).ok_or_else(|| {
        PatchError::Package(format!("no map for container {}", edit.container))
    })?;

    let file = match find_file(manifest, &resource.name) {
        Some(file) => file,
        None if resource.remove => {
            log.warn(format!("{} not in package manifest, nothing to remove", resource.name));
            return Ok(());
        }
        None => manifest.add_file(&resource.name),
    };

    let reference = MapFileRef { file, map };
    let existing = manifest.references().iter().position(|r| *r == reference);

    if resource.remove {
        match existing.and_then(|pos| manifest.remove_reference(pos)) {
            Some(_) => log.info(format!("Removed {} from map {map}", resource.name)),
            None => log.warn(format!("{} not referenced by map {map}", resource.name)),
        }
        return Ok(());
    }

    if existing.is_some() {
        log.detail(format!("{} already referenced by map {map}", resource.name));
        return Ok(());
    }

    let position = insert_position(manifest, resource, map, log);
    manifest.insert_reference(position, reference);
    log.info(format!("Added {} to map {map} at {position}", resource.name));
    Ok(())
}

fn insert_position(
    manifest: &dyn PackageManifest,
    resource: &ExtraResource,
    map: usize,
    log: &mut WorkerLog,
) -> usize {
    let references = manifest.references();
    let after_last = references
        .iter()
        .rposition(|r| r.map == map)
        .map_or(references.len(), |pos| pos + 1);

    if resource.place_first {
        return references
            .iter()
            .position(|r| r.map == map)
            .unwrap_or(after_last);
    }

    if let Some(anchor) = &resource.place_by_name {
        let anchor_pos = find_file(manifest, anchor).and_then(|file| {
            references
                .iter()
                .position(|r| *r == MapFileRef { file, map })
        });
        return match anchor_pos {
            Some(pos) if resource.place_before => pos,
            Some(pos) => pos + 1,
            None => {
                log.warn(format!(
                    "Anchor {anchor} for {} not found in map {map}, placing last",
                    resource.name
                ));
                after_last
            }
        };
    }

    after_last
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::log::LogLevel;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const PACKAGE_JSON: &[u8] = br#"{
        "files": [
            {"name": "gameresources.resources"},
            {"name": "e1m1_intro.resources"},
            {"name": "e1m2_battle.resources"},
            {"name": "warehouse.resources"}
        ],
        "mapFileRefs": [
            {"file": 0, "map": 0},
            {"file": 1, "map": 0},
            {"file": 0, "map": 1},
            {"file": 2, "map": 1}
        ],
        "maps": [
            {"name": "game/sp/e1m1_intro/e1m1_intro"},
            {"name": "game/sp/e1m2_battle/e1m2_battle"}
        ]
    }"#;

    fn resource(name: &str) -> ExtraResource {
        ExtraResource {
            name: name.to_string(),
            remove: false,
            place_first: false,
            place_before: false,
            place_by_name: None,
        }
    }

    fn apply(spec: &mut PackageMapSpec, container: &str, resource: ExtraResource) -> WorkerLog {
        let mut log = WorkerLog::new("package", true);
        apply_edit(spec, &PackageEdit::new(container, resource), &mut log).expect("apply");
        log
    }

    fn refs(spec: &PackageMapSpec) -> Vec<(usize, usize)> {
        spec.map_file_refs.iter().map(|r| (r.file, r.map)).collect()
    }

    #[test]
    fn test_map_stem() {
        assert_eq!(map_stem("base/e1m1_intro.resources"), "e1m1_intro");
        assert_eq!(map_stem("e1m1_intro_patch2.resources"), "e1m1_intro");
        assert_eq!(map_stem("e1m1_patchwork.resources"), "e1m1_patchwork");
    }

    #[test]
    fn test_default_places_after_last_reference() {
        let mut spec = PackageMapSpec::from_slice(PACKAGE_JSON).expect("parse");
        apply(&mut spec, "e1m1_intro.resources", resource("warehouse"));

        assert_eq!(refs(&spec), [(0, 0), (1, 0), (3, 0), (0, 1), (2, 1)]);
    }

    #[test]
    fn test_place_first() {
        let mut spec = PackageMapSpec::from_slice(PACKAGE_JSON).expect("parse");
        let mut first = resource("warehouse.resources");
        first.place_first = true;
        apply(&mut spec, "e1m2_battle.resources", first);

        assert_eq!(refs(&spec), [(0, 0), (1, 0), (3, 1), (0, 1), (2, 1)]);
    }

    #[test]
    fn test_place_by_name() {
        let mut spec = PackageMapSpec::from_slice(PACKAGE_JSON).expect("parse");
        let mut before = resource("warehouse.resources");
        before.place_by_name = Some("e1m1_intro.resources".into());
        before.place_before = true;
        apply(&mut spec, "e1m1_intro_patch1.resources", before);
        assert_eq!(refs(&spec), [(0, 0), (3, 0), (1, 0), (0, 1), (2, 1)]);

        let mut spec = PackageMapSpec::from_slice(PACKAGE_JSON).expect("parse");
        let mut after = resource("warehouse.resources");
        after.place_by_name = Some("gameresources".into());
        apply(&mut spec, "e1m2_battle.resources", after);
        assert_eq!(refs(&spec), [(0, 0), (1, 0), (0, 1), (3, 1), (2, 1)]);
    }

    #[test]
    fn test_unresolved_anchor_warns_and_places_last() {
        let mut spec = PackageMapSpec::from_slice(PACKAGE_JSON).expect("parse");
        let mut hinted = resource("warehouse.resources");
        hinted.place_by_name = Some("nowhere.resources".into());
        let log = apply(&mut spec, "e1m1_intro.resources", hinted);

        assert_eq!(refs(&spec), [(0, 0), (1, 0), (3, 0), (0, 1), (2, 1)]);
        assert!(log.lines().iter().any(|l| l.level == LogLevel::Warn));
    }

    #[test]
    fn test_new_file_is_registered() {
        let mut spec = PackageMapSpec::from_slice(PACKAGE_JSON).expect("parse");
        apply(&mut spec, "e1m1_intro.resources", resource("mod_assets.resources"));

        assert_eq!(spec.files.len(), 5);
        assert_eq!(spec.files[4].name, "mod_assets.resources");
        assert_eq!(spec.map_file_refs[2], MapFileRef { file: 4, map: 0 });
    }

    #[test]
    fn test_duplicate_and_removal() {
        let mut spec = PackageMapSpec::from_slice(PACKAGE_JSON).expect("parse");
        let before = spec.clone();
        let log = apply(&mut spec, "e1m1_intro.resources", resource("e1m1_intro.resources"));
        assert_eq!(spec, before);
        assert!(log.lines().iter().all(|l| l.level != LogLevel::Error));

        let mut remove = resource("e1m1_intro.resources");
        remove.remove = true;
        apply(&mut spec, "e1m1_intro.resources", remove.clone());
        assert_eq!(refs(&spec), [(0, 0), (0, 1), (2, 1)]);

        let log = apply(&mut spec, "e1m1_intro.resources", remove);
        assert_eq!(refs(&spec), [(0, 0), (0, 1), (2, 1)]);
        assert_eq!(log.lines()[0].level, LogLevel::Warn);
    }

    #[test]
    fn test_container_without_map_is_an_error() {
        let mut spec = PackageMapSpec::from_slice(PACKAGE_JSON).expect("parse");
        let mut log = WorkerLog::new("package", false);
        let edit = PackageEdit::new("unknown.resources", resource("warehouse"));

        let err = apply_edit(&mut spec, &edit, &mut log).expect_err("no map");
        assert!(matches!(err, PatchError::Package(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("packagemapspec.json");
        let mut spec = PackageMapSpec::from_slice(PACKAGE_JSON).expect("parse");
        apply(&mut spec, "e1m1_intro.resources", resource("warehouse"));

        spec.save(&path).expect("save");
        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.contains("\"mapFileRefs\""));
        assert_eq!(PackageMapSpec::load(&path).expect("load"), spec);
    }
}
