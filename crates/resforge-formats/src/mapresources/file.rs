//! MapResources manifest parsing and building

use crate::ResourceFormat;
use crate::mapresources::error::{MapResourcesError, Result};
use crate::reader::ByteReader;

/// `unknown4` value given to assets registered by mods
pub const NEW_ASSET_UNKNOWN4: i64 = 128;

/// One typed asset reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapAsset {
    /// Index into [`MapResourcesFile::asset_types`]
    pub asset_type_index: i32,
    /// Resource path of the asset
    pub name: String,
    /// Opaque
    pub unknown1: i32,
    /// Opaque
    pub unknown2: i32,
    /// Opaque
    pub unknown3: i64,
    /// Opaque; 128 for mod-registered assets
    pub unknown4: i64,
}

impl MapAsset {
    /// An asset as mods register it
    pub fn new(asset_type_index: i32, name: impl Into<String>) -> Self {
        Self {
            asset_type_index,
            name: name.into(),
            unknown1: 0,
            unknown2: 0,
            unknown3: 0,
            unknown4: NEW_ASSET_UNKNOWN4,
        }
    }
}

/// A per-level asset manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapResourcesFile {
    /// Leading magic, preserved as read
    pub magic: u32,
    /// Layer names
    pub layers: Vec<String>,
    /// Asset type names (count is stored as u64)
    pub asset_types: Vec<String>,
    /// Asset references
    pub assets: Vec<MapAsset>,
    /// Map names
    pub maps: Vec<String>,
}

impl MapResourcesFile {
    /// Parse a decompressed manifest
    pub fn parse_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let magic = reader.u32_be()?;

        let layer_count = reader.u32_be()? as usize;
        let layers = read_strings(&mut reader, layer_count)?;

        let type_count = usize::try_from(reader.u64_be()?).map_err(|_| {
            MapResourcesError::TooLarge {
                what: "asset type count",
                len: usize::MAX,
            }
        })?;
        let asset_types = read_strings(&mut reader, type_count)?;

        let asset_count = reader.u32_be()? as usize;
        // 28 bytes is the smallest possible asset record
        let mut assets = Vec::with_capacity(asset_count.min(reader.remaining() / 28));
        for _ in 0..asset_count {
            let asset_type_index = reader.i32_be()?;
            let name = read_string(&mut reader)?;
            assets.push(MapAsset {
                asset_type_index,
                name,
                unknown1: reader.i32_be()?,
                unknown2: reader.i32_be()?,
                unknown3: reader.i64_be()?,
                unknown4: reader.i64_be()?,
            });
        }

        let map_count = reader.u32_be()? as usize;
        let maps = read_strings(&mut reader, map_count)?;

        if reader.remaining() != 0 {
            return Err(MapResourcesError::TrailingData(reader.remaining()));
        }

        Ok(Self {
            magic,
            layers,
            asset_types,
            assets,
            maps,
        })
    }

    /// Serialize the manifest
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.magic.to_be_bytes());

        write_count_u32(&mut out, "layer list", self.layers.len())?;
        for layer in &self.layers {
            write_string(&mut out, layer)?;
        }

        out.extend_from_slice(&(self.asset_types.len() as u64).to_be_bytes());
        for asset_type in &self.asset_types {
            write_string(&mut out, asset_type)?;
        }

        write_count_u32(&mut out, "asset list", self.assets.len())?;
        for asset in &self.assets {
            out.extend_from_slice(&asset.asset_type_index.to_be_bytes());
            write_string(&mut out, &asset.name)?;
            out.extend_from_slice(&asset.unknown1.to_be_bytes());
            out.extend_from_slice(&asset.unknown2.to_be_bytes());
            out.extend_from_slice(&asset.unknown3.to_be_bytes());
            out.extend_from_slice(&asset.unknown4.to_be_bytes());
        }

        write_count_u32(&mut out, "map list", self.maps.len())?;
        for map in &self.maps {
            write_string(&mut out, map)?;
        }

        Ok(out)
    }

    /// Check that every asset's type index resolves
    pub fn validate(&self) -> Result<()> {
        for asset in &self.assets {
            if self.asset_type_name(asset.asset_type_index).is_none() {
                return Err(MapResourcesError::InvalidTypeIndex {
                    name: asset.name.clone(),
                    index: asset.asset_type_index,
                    types: self.asset_types.len(),
                });
            }
        }
        Ok(())
    }

    /// Type name for a stored type index
    pub fn asset_type_name(&self, index: i32) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.asset_types.get(i))
            .map(String::as_str)
    }
}

fn read_string(reader: &mut ByteReader<'_>) -> Result<String> {
    let len = reader.u32_be()? as usize;
    let offset = reader.offset();
    let bytes = reader.take(len)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| MapResourcesError::InvalidUtf8(offset))
}

fn read_strings(reader: &mut ByteReader<'_>, count: usize) -> Result<Vec<String>> {
    let mut strings = Vec::with_capacity(count.min(reader.remaining() / 4));
    for _ in 0..count {
        strings.push(read_string(reader)?);
    }
    Ok(strings)
}

fn write_count_u32(out: &mut Vec<u8>, what: &'static str, len: usize) -> Result<()> {
    let count = u32::try_from(len).map_err(|_| MapResourcesError::TooLarge { what, len })?;
    out.extend_from_slice(&count.to_be_bytes());
    Ok(())
}

fn write_string(out: &mut Vec<u8>, value: &str) -> Result<()> {
    write_count_u32(out, "string", value.len())?;
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

impl ResourceFormat for MapResourcesFile {
    fn parse(data: &[u8]) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        Ok(Self::parse_bytes(data)?)
    }

    fn build(&self) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error>> {
        Ok(self.to_bytes()?)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{assert_invalid_data_rejected, assert_round_trip};
    use pretty_assertions::assert_eq;

    fn sample() -> MapResourcesFile {
        MapResourcesFile {
            magic: 0x0000_0004,
            layers: vec!["spawn/default".into(), "game/sp".into()],
            asset_types: vec!["model".into(), "image".into()],
            assets: vec![
                MapAsset {
                    unknown4: 0,
                    ..MapAsset::new(0, "models/a.lwo")
                },
                MapAsset::new(1, "art/b.tga"),
            ],
            maps: vec!["maps/game/e1m1".into()],
        }
    }

    #[test]
    fn test_asset_types_count_is_eight_bytes() {
        let file = MapResourcesFile {
            magic: 1,
            asset_types: vec!["x".into()],
            ..Default::default()
        };
        let bytes = file.to_bytes().expect("build");
        let expected: Vec<u8> = [
            &[0, 0, 0, 1][..],             // magic
            &[0, 0, 0, 0],                 // layers
            &[0, 0, 0, 0, 0, 0, 0, 1],     // asset type count
            &[0, 0, 0, 1, b'x'],           // "x"
            &[0, 0, 0, 0],                 // assets
            &[0, 0, 0, 0],                 // maps
        ]
        .concat();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_asset_record_layout() {
        let file = MapResourcesFile {
            asset_types: vec!["t".into()],
            assets: vec![MapAsset::new(0, "n")],
            ..Default::default()
        };
        let bytes = file.to_bytes().expect("build");
        // magic + layers + types(8 + 5) + asset count
        let asset = &bytes[4 + 4 + 13 + 4..];
        assert_eq!(&asset[..4], &[0, 0, 0, 0]);
        assert_eq!(&asset[4..9], &[0, 0, 0, 1, b'n']);
        assert_eq!(&asset[25..33], &128i64.to_be_bytes());
    }

    #[test]
    fn test_round_trip() {
        assert_round_trip!(sample());
    }

    #[test]
    fn test_trailing_data_rejected() {
        let mut bytes = sample().to_bytes().expect("build");
        bytes.push(0);
        assert!(matches!(
            MapResourcesFile::parse_bytes(&bytes),
            Err(MapResourcesError::TrailingData(1))
        ));
    }

    #[test]
    fn test_truncated_rejected() {
        let bytes = sample().to_bytes().expect("build");
        assert_invalid_data_rejected!(MapResourcesFile, &bytes[..bytes.len() - 3]);
    }

    #[test]
    fn test_validate_catches_bad_type_index() {
        let mut file = sample();
        assert!(file.validate().is_ok());
        file.assets[0].asset_type_index = 7;
        assert!(matches!(
            file.validate(),
            Err(MapResourcesError::InvalidTypeIndex { index: 7, .. })
        ));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn manifest() -> impl Strategy<Value = MapResourcesFile> {
            let names = || prop::collection::vec("[a-z/_.]{0,20}", 0..6);
            let asset = (
                any::<i32>(),
                "[a-z/_.]{1,20}",
                any::<i32>(),
                any::<i32>(),
                any::<i64>(),
                any::<i64>(),
            )
                .prop_map(|(asset_type_index, name, unknown1, unknown2, unknown3, unknown4)| {
                    MapAsset {
                        asset_type_index,
                        name,
                        unknown1,
                        unknown2,
                        unknown3,
                        unknown4,
                    }
                });
            (
                any::<u32>(),
                names(),
                names(),
                prop::collection::vec(asset, 0..8),
                names(),
            )
                .prop_map(|(magic, layers, asset_types, assets, maps)| MapResourcesFile {
                    magic,
                    layers,
                    asset_types,
                    assets,
                    maps,
                })
        }

        proptest! {
            #[test]
            fn build_parse_round_trip(file in manifest()) {
                let bytes = file.to_bytes().unwrap();
                prop_assert_eq!(MapResourcesFile::parse_bytes(&bytes).unwrap(), file);
            }
        }
    }
}
