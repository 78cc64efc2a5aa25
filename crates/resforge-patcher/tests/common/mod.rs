//! Helpers shared by the patcher integration tests
#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use resforge_formats::blang::{BlangFile, BlangString};
use resforge_formats::mapresources::{MapAsset, MapResourcesFile};
use resforge_patcher::{Container, FlateCodec, ModFile, ModParent};
use std::path::Path;
use std::sync::Arc;

/// Parsed container and its bytes
pub fn open(path: &Path) -> (Container, Vec<u8>) {
    let data = std::fs::read(path).expect("read container");
    let container = Container::parse(&data).expect("parse container");
    (container, data)
}

/// Payload of the chunk named `name`
pub fn read_chunk(path: &Path, name: &str) -> Vec<u8> {
    let (container, data) = open(path);
    let index = container.find_chunk(name).expect("chunk present");
    container
        .chunk_payload(&data, index, &FlateCodec::default())
        .expect("chunk payload")
}

pub fn mod_file(priority: i32, container: &str, target: &str, data: &[u8]) -> ModFile {
    let parent = Arc::new(ModParent::new(format!("mod-{priority}"), priority));
    ModFile::new(parent, container, target, data.to_vec())
}

/// Sealed string table holding `strings`
pub fn sealed_blang(path: &str, strings: &[(&str, &str)]) -> Vec<u8> {
    let file = BlangFile {
        unknown_data: None,
        strings: strings
            .iter()
            .map(|(id, text)| BlangString::new(*id, *text))
            .collect(),
    };
    resforge_crypto::blang::encrypt(&file.to_bytes().expect("blang bytes"), path).expect("seal")
}

/// Open a sealed string table read back from a container
pub fn open_blang(sealed: &[u8], path: &str, container_name: &str) -> BlangFile {
    let plain = resforge_crypto::blang::decrypt(sealed, path).expect("decrypt");
    BlangFile::parse_for(&plain, container_name).expect("parse blang")
}

/// Level manifest with one layer, one image asset and one map
pub fn mapresources_bytes() -> Vec<u8> {
    MapResourcesFile {
        magic: 0x0000_0005,
        layers: vec!["spawn/base".into()],
        asset_types: vec!["image".into()],
        assets: vec![MapAsset::new(0, "art/old.tga")],
        maps: vec!["maps/game/e1m1_intro".into()],
    }
    .to_bytes()
    .expect("mapresources bytes")
}
