//! Replacement of existing chunk payloads
//!
//! [`ChunkStore`] writes a new payload for an existing chunk under either
//! placement strategy and keeps the info records and the in-memory
//! [`Container`] in step. [`replace_chunks`] routes each mod file: manifest
//! JSON to the mapresources session and the package manifest, string-table
//! JSON to a per-table merge that is sealed once at the end, everything
//! else to a direct replacement. Files naming no existing chunk are handed
//! back for the appender.

use crate::codec::Codec;
use crate::config::{PatchConfig, PlacementStrategy};
use crate::container::{
    COMPRESSION_CODEC, COMPRESSION_NONE, Container, RECORD_COMPRESSION, RECORD_DATA_OFFSET,
    RECORD_SIZE_Z, RECORD_UNCOMPRESSED_SIZE, TEXTURE_MAGIC, is_texture, padded_offset,
};
use crate::log::WorkerLog;
use crate::manifest::ManifestSlot;
use crate::mapped::{MappedFile, TailMover};
use crate::mod_file::ModFile;
use crate::package::PackageEdit;
use crate::pipeline::{PatchContext, PatchReport};
use crate::{PatchError, Result};
use resforge_formats::assets_info::AssetsInfo;
use resforge_formats::blang::{BlangFile, BlangJson, target_chunk_name};
use std::collections::HashSet;
use tracing::debug;

/// A payload in the form it is stored in a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PreparedPayload {
    /// Bytes written to the data section
    pub(crate) bytes: Vec<u8>,
    /// Logical size recorded in the info record
    pub(crate) size: u64,
    /// Compression mode recorded in the info record
    pub(crate) mode: u8,
}

impl PreparedPayload {
    pub(crate) fn raw(bytes: Vec<u8>) -> Self {
        let size = bytes.len() as u64;
        Self {
            bytes,
            size,
            mode: COMPRESSION_NONE,
        }
    }

    /// Compress `bytes` if the chunk being rewritten was stored compressed
    pub(crate) fn matching(bytes: Vec<u8>, mode: u8, codec: &dyn Codec) -> Result<Self> {
        if mode == COMPRESSION_NONE {
            return Ok(Self::raw(bytes));
        }
        Ok(Self {
            size: bytes.len() as u64,
            bytes: codec.compress(&bytes)?,
            mode: COMPRESSION_CODEC,
        })
    }
}

/// Turn mod file contents into a stored payload
///
/// Textures tagged with [`TEXTURE_MAGIC`] are already compressed and carry
/// their logical size; the 16-byte tag is stripped. Other textures go
/// through the codec when texture compression is on.
pub(crate) fn prepare_payload(
    target: &str,
    data: &[u8],
    config: &PatchConfig,
    codec: &dyn Codec,
) -> Result<PreparedPayload> {
    if !is_texture(target) {
        return Ok(PreparedPayload::raw(data.to_vec()));
    }

    if data.starts_with(&TEXTURE_MAGIC) {
        let size_bytes = data.get(8..16).ok_or_else(|| PatchError::InvalidModFile {
            name: target.to_string(),
            reason: "texture header is truncated".into(),
        })?;
        let mut size = [0u8; 8];
        size.copy_from_slice(size_bytes);
        return Ok(PreparedPayload {
            bytes: data[16..].to_vec(),
            size: u64::from_le_bytes(size),
            mode: COMPRESSION_CODEC,
        });
    }

    if config.compress_textures {
        return Ok(PreparedPayload {
            bytes: codec.compress(data)?,
            size: data.len() as u64,
            mode: COMPRESSION_CODEC,
        });
    }

    Ok(PreparedPayload::raw(data.to_vec()))
}

/// Writes payloads for existing chunks
pub(crate) struct ChunkStore<'a> {
    pub(crate) mapped: &'a mut MappedFile,
    pub(crate) container: &'a mut Container,
    placement: PlacementStrategy,
    mover: TailMover,
}

impl<'a> ChunkStore<'a> {
    pub(crate) fn new(
        mapped: &'a mut MappedFile,
        container: &'a mut Container,
        config: &PatchConfig,
    ) -> Self {
        Self {
            mapped,
            container,
            placement: config.placement,
            mover: TailMover::new(config.copy_chunk_size),
        }
    }

    /// Name of the mapped container file
    pub(crate) fn container_name(&self) -> String {
        self.mapped
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Replace the payload of chunk `index`
    pub(crate) fn store(&mut self, index: usize, payload: &PreparedPayload) -> Result<()> {
        let chunk = self
            .container
            .chunks
            .get(index)
            .ok_or_else(|| PatchError::ChunkNotFound(format!("#{index}")))?;
        let (file_offset, record_offset) = (chunk.file_offset, chunk.record_offset);
        let (old_offset, old_len) = (chunk.data_offset, chunk.size_z);
        let new_len = payload.bytes.len() as u64;

        let new_offset = match self.placement {
            PlacementStrategy::Append => self.append_payload(&payload.bytes)?,
            PlacementStrategy::InPlace => {
                self.overwrite_payload(old_offset, old_len, &payload.bytes)?
            }
        };

        self.mapped.write_u64_at(file_offset, new_offset)?;
        self.mapped
            .write_u64_at(record_offset + RECORD_SIZE_Z, new_len)?;
        self.mapped
            .write_u64_at(record_offset + RECORD_UNCOMPRESSED_SIZE, payload.size)?;
        self.mapped
            .write_u8_at(record_offset + RECORD_COMPRESSION, payload.mode)?;

        if let Some(chunk) = self.container.chunks.get_mut(index) {
            chunk.data_offset = new_offset;
            chunk.size_z = new_len;
            chunk.size = payload.size;
            chunk.compression_mode = payload.mode;
        }
        self.container.file_len = self.mapped.len();

        debug!(
            "Stored {} bytes at {:#x} (was {} bytes at {:#x})",
            new_len, new_offset, old_len, old_offset
        );
        Ok(())
    }

    fn append_payload(&mut self, bytes: &[u8]) -> Result<u64> {
        let offset = padded_offset(self.mapped.len());
        self.mapped.resize(offset + bytes.len() as u64)?;
        self.mapped.write_bytes_at(offset, bytes)?;
        Ok(offset)
    }

    fn overwrite_payload(&mut self, start: u64, old_len: u64, bytes: &[u8]) -> Result<u64> {
        let new_len = bytes.len() as u64;
        let old_end = start + old_len;
        let eof = self.mapped.len();
        let tail_len = eof.saturating_sub(old_end);

        if new_len > old_len {
            let grow = new_len - old_len;
            self.mapped.resize(eof + grow)?;
            self.mapped
                .move_within(&mut self.mover, old_end, old_end + grow, tail_len)?;
            self.mapped.write_bytes_at(start, bytes)?;
            self.shift_following(start, grow, true)?;
        } else if new_len < old_len {
            let shrink = old_len - new_len;
            self.mapped.write_bytes_at(start, bytes)?;
            self.mapped
                .move_within(&mut self.mover, old_end, old_end - shrink, tail_len)?;
            self.mapped.resize(eof - shrink)?;
            self.shift_following(start, shrink, false)?;
        } else {
            self.mapped.write_bytes_at(start, bytes)?;
        }

        Ok(start)
    }

    /// Move the recorded offset of every chunk stored after `start`
    fn shift_following(&mut self, start: u64, delta: u64, grow: bool) -> Result<()> {
        for chunk in self
            .container
            .chunks
            .iter_mut()
            .filter(|c| c.data_offset > start)
        {
            let moved = if grow {
                chunk.data_offset + delta
            } else {
                chunk.data_offset.checked_sub(delta).ok_or_else(|| {
                    PatchError::Corruption(format!(
                        "{} at {:#x} overlaps a shrunk payload",
                        chunk.name.full, chunk.data_offset
                    ))
                })?
            };
            self.mapped
                .write_u64_at(chunk.record_offset + RECORD_DATA_OFFSET, moved)?;
            chunk.data_offset = moved;
        }
        Ok(())
    }
}

/// Log a per-item failure and carry on; fatal errors propagate
pub(crate) fn absorb(
    result: Result<()>,
    what: &str,
    log: &mut WorkerLog,
    report: &mut PatchReport,
) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_fatal() => Err(e),
        Err(e @ PatchError::Crypto(_)) => {
            log.error(format!("Failed to open {what}: {e}"));
            report.skipped += 1;
            Ok(())
        }
        Err(e) => {
            log.warn(format!("Skipping {what}: {e}"));
            report.skipped += 1;
            Ok(())
        }
    }
}

/// Apply every mod file that edits an existing chunk
///
/// Files arrive in descending priority, so the first replacement of a
/// chunk is the one that sticks. Returns the files whose target names no
/// chunk, in input order.
pub(crate) fn replace_chunks(
    store: &mut ChunkStore<'_>,
    files: &[ModFile],
    ctx: &PatchContext,
    manifest: &mut ManifestSlot,
    log: &mut WorkerLog,
    report: &mut PatchReport,
) -> Result<Vec<ModFile>> {
    let container_name = store.container_name();
    let mut tables = BlangTables::default();
    let mut unmatched = Vec::new();
    let mut replaced = HashSet::new();

    for file in files {
        let result = if file.is_assets_info_json {
            route_assets_info(store, file, ctx, &container_name, manifest, log, report)
        } else if file.is_blang_json {
            tables.merge(store, file, ctx.codec.as_ref(), &container_name, log)
        } else {
            match store.container.find_chunk(&file.target_name) {
                Some(index) if replaced.contains(&index) => {
                    log.detail(format!(
                        "{} already replaced by a higher-priority mod, skipping {}",
                        file.target_name, file.parent.name
                    ));
                    report.skipped += 1;
                    Ok(())
                }
                Some(index) => replace_one(store, index, file, ctx, manifest, log, report)
                    .inspect(|()| {
                        replaced.insert(index);
                    }),
                None => {
                    unmatched.push(file.clone());
                    Ok(())
                }
            }
        };
        absorb(result, &file.target_name, log, report)?;
    }

    tables.write_back(store, ctx.codec.as_ref(), log, report)?;
    Ok(unmatched)
}

fn replace_one(
    store: &mut ChunkStore<'_>,
    index: usize,
    file: &ModFile,
    ctx: &PatchContext,
    manifest: &ManifestSlot,
    log: &mut WorkerLog,
    report: &mut PatchReport,
) -> Result<()> {
    let name = store.container.chunks[index].name.full.clone();

    if manifest.is_loaded() && store.container.mapresources_chunk() == Some(index) {
        log.warn(format!(
            "{name} was edited by a higher-priority mod; ignoring the replacement from {}",
            file.parent.name
        ));
        report.skipped += 1;
        return Ok(());
    }

    let payload = prepare_payload(&name, &file.data, &ctx.config, ctx.codec.as_ref())?;
    store.store(index, &payload)?;
    log.info(format!("Replaced {name}"));
    report.replaced += 1;
    Ok(())
}

fn route_assets_info(
    store: &ChunkStore<'_>,
    file: &ModFile,
    ctx: &PatchContext,
    container_name: &str,
    manifest: &mut ManifestSlot,
    log: &mut WorkerLog,
    report: &mut PatchReport,
) -> Result<()> {
    let info = AssetsInfo::from_slice(&file.data)?;

    if info.touches_mapresources() {
        match manifest.session(&*store.container, store.mapped.as_slice(), ctx.codec.as_ref())? {
            Some(session) => session.apply_assets_info(&info, &ctx.resource_data, log),
            None => log.warn(format!(
                "{}: container has no mapresources, layer/map/asset edits skipped",
                file.target_name
            )),
        }
    }

    report.package_edits.extend(
        info.extra_resources
            .into_iter()
            .map(|resource| PackageEdit::new(container_name, resource)),
    );
    Ok(())
}

/// One decrypted string table with pending edits
struct BlangTable {
    chunk: usize,
    path: String,
    file: BlangFile,
    mode: u8,
    edits: usize,
}

/// String tables touched during one container patch
///
/// Each table is decrypted once and sealed once. An identifier is written
/// by the first (highest-priority) mod that sets it.
#[derive(Default)]
struct BlangTables {
    tables: Vec<BlangTable>,
    written: HashSet<(usize, String)>,
}

impl BlangTables {
    fn merge(
        &mut self,
        store: &ChunkStore<'_>,
        file: &ModFile,
        codec: &dyn Codec,
        container_name: &str,
        log: &mut WorkerLog,
    ) -> Result<()> {
        let edits = BlangJson::from_slice(&file.data)?;
        let chunk_name = target_chunk_name(&file.target_name);
        let index = store
            .container
            .find_chunk(&chunk_name)
            .ok_or(PatchError::ChunkNotFound(chunk_name))?;
        let position = self.load(store, index, codec, container_name)?;
        let table = &mut self.tables[position];

        for string in edits.strings {
            if string.name.trim().is_empty() {
                log.warn(format!("{}: empty string identifier skipped", file.target_name));
                continue;
            }
            if !self
                .written
                .insert((index, string.name.to_ascii_lowercase()))
            {
                log.detail(format!(
                    "{}: {} already set by a higher-priority mod",
                    table.path, string.name
                ));
                continue;
            }
            table.file.set_text(&string.name, &string.text);
            table.edits += 1;
        }
        Ok(())
    }

    fn load(
        &mut self,
        store: &ChunkStore<'_>,
        index: usize,
        codec: &dyn Codec,
        container_name: &str,
    ) -> Result<usize> {
        if let Some(position) = self.tables.iter().position(|t| t.chunk == index) {
            return Ok(position);
        }

        let chunk = &store.container.chunks[index];
        let sealed = store
            .container
            .chunk_payload(store.mapped.as_slice(), index, codec)?;
        let plain = resforge_crypto::blang::decrypt(&sealed, &chunk.name.full)?;
        let file = BlangFile::parse_for(&plain, container_name)?;
        debug!("Loaded {} ({} strings)", chunk.name.full, file.len());

        self.tables.push(BlangTable {
            chunk: index,
            path: chunk.name.full.clone(),
            file,
            mode: chunk.compression_mode,
            edits: 0,
        });
        Ok(self.tables.len() - 1)
    }

    fn write_back(
        self,
        store: &mut ChunkStore<'_>,
        codec: &dyn Codec,
        log: &mut WorkerLog,
        report: &mut PatchReport,
    ) -> Result<()> {
        for table in self.tables.into_iter().filter(|t| t.edits > 0) {
            let result = seal(&table, codec).and_then(|payload| store.store(table.chunk, &payload));
            if result.is_ok() {
                log.info(format!("Wrote {} string edits to {}", table.edits, table.path));
                report.blang_written += 1;
            }
            absorb(result, &table.path, log, report)?;
        }
        Ok(())
    }
}

fn seal(table: &BlangTable, codec: &dyn Codec) -> Result<PreparedPayload> {
    let plain = table.file.to_bytes()?;
    let sealed = resforge_crypto::blang::encrypt(&plain, &table.path)?;
    PreparedPayload::matching(sealed, table.mode, codec)
}
