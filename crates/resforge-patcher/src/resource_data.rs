//! Loading the resource-data side file
//!
//! The side file is read once before any worker starts; the map it yields
//! is shared read-only through the patch context.

use crate::codec::Codec;
use crate::{PatchError, Result};
use resforge_formats::resource_data::{ResourceDataError, ResourceDataMap, split_header};
use std::path::Path;
use tracing::info;

/// Read, decompress and parse the side file at `path`
pub fn load_resource_data(path: impl AsRef<Path>, codec: &dyn Codec) -> Result<ResourceDataMap> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let (size, body) = split_header(&data)?;

    let expected = usize::try_from(size).map_err(|_| {
        PatchError::ResourceData(ResourceDataError::SizeMismatch {
            expected: size,
            actual: body.len() as u64,
        })
    })?;
    let records = codec.decompress(body, expected)?;
    if records.len() != expected {
        return Err(ResourceDataError::SizeMismatch {
            expected: size,
            actual: records.len() as u64,
        }
        .into());
    }

    let map = ResourceDataMap::parse_records(&records)?;
    info!("Loaded {} resource-data entries from {}", map.len(), path.display());
    Ok(map)
}
