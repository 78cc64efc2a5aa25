//! Registration of brand-new chunks
//!
//! Appending K files grows four tables that all sit before the data
//! section: K info records, one name-table slot and one blob entry per new
//! name, and K name-id pairs. Everything from the growing section onward
//! moves, so the header offsets are rewritten and every existing record's
//! data offset gains the total growth. The data section itself is moved
//! once, through the tail mover, and the new payloads go after it.

use crate::container::{
    Container, INFO_RECORD_SIZE, RECORD_COMPRESSION, RECORD_CONTENT_HASH,
    RECORD_DATA_OFFSET, RECORD_NAME_ID, RECORD_SIZE_Z, RECORD_SPECIAL, RECORD_STREAM_HASH,
    RECORD_STREAM_HASH2, RECORD_UNCOMPRESSED_SIZE, RECORD_VERSION, padded_offset,
};
use crate::container::model::section_offset;
use crate::log::WorkerLog;
use crate::mapped::{MappedFile, TailMover};
use crate::mod_file::ModFile;
use crate::pipeline::{PatchContext, PatchReport};
use crate::replace::{PreparedPayload, absorb, prepare_payload};
use crate::{PatchError, Result};
use resforge_crypto::fnv1a64;
use resforge_formats::mapresources::AssetPlacement;
use resforge_formats::resource_data::ResourceDataEntry;
use tracing::debug;

/// A new chunk's asset to add to the level manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AssetRegistration {
    pub(crate) asset_type: String,
    pub(crate) name: String,
    pub(crate) placement: AssetPlacement,
}

/// One file accepted for appending
struct PendingChunk {
    record: Vec<u8>,
    payload: Vec<u8>,
}

/// Section contents between the info records and the data section
struct Sections {
    info: Vec<u8>,
    info_tail: Vec<u8>,
    name_offsets: Vec<u64>,
    blob_head: Vec<u8>,
    blob_tail: Vec<u8>,
    middle: Vec<u8>,
    name_ids: Vec<u8>,
    idcl: Vec<u8>,
}

impl Sections {
    fn read(data: &[u8], container: &Container) -> Result<Self> {
        let header = &container.header;
        let slice = |start: u64, end: u64, what: &str| -> Result<Vec<u8>> {
            data.get(start as usize..end as usize)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| {
                    PatchError::Corruption(format!("{what} {start:#x}..{end:#x} is out of range"))
                })
        };

        let info_end = section_offset(header.info_end(), "info end")?;
        let name_ids = section_offset(header.name_ids_offset(), "name ids")?;

        let mut name_offsets = Vec::with_capacity(container.names.len());
        for slot in 0..container.names.len() as u64 {
            let at = header.names_offset + 8 + slot * 8;
            let bytes = slice(at, at + 8, "name offset")?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes);
            name_offsets.push(u64::from_le_bytes(raw));
        }

        let blob = slice(container.names_end(), header.unknown_offset, "names blob")?;
        let declared = declared_blob_len(&blob, container.names.len());
        let (blob_head, blob_tail) = blob.split_at(declared);

        Ok(Self {
            info: slice(header.info_offset, info_end, "info records")?,
            info_tail: slice(info_end, header.names_offset, "info padding")?,
            name_offsets,
            blob_head: blob_head.to_vec(),
            blob_tail: blob_tail.to_vec(),
            middle: slice(header.unknown_offset, name_ids, "unknown section")?,
            name_ids: slice(name_ids, header.idcl_offset, "name ids")?,
            idcl: slice(header.idcl_offset, header.data_offset, "idcl section")?,
        })
    }

    fn name_table(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.name_offsets.len() * 8);
        out.extend_from_slice(&(self.name_offsets.len() as u64).to_le_bytes());
        for offset in &self.name_offsets {
            out.extend_from_slice(&offset.to_le_bytes());
        }
        out
    }
}

/// Length of the blob up to and including the `count`-th NUL
fn declared_blob_len(blob: &[u8], count: usize) -> usize {
    blob.iter()
        .enumerate()
        .filter(|(_, b)| **b == 0)
        .nth(count.wrapping_sub(1))
        .map_or(0, |(at, _)| at + 1)
}

/// Name table being extended during one append pass
struct NameTable<'a> {
    existing: &'a Container,
    added: Vec<String>,
}

impl NameTable<'_> {
    fn position(&self, name: &str) -> Option<usize> {
        self.existing.name_index(name).or_else(|| {
            self.added
                .iter()
                .position(|n| n == name)
                .map(|i| self.existing.names.len() + i)
        })
    }

    fn intern(&mut self, name: &str, sections: &mut Sections) -> usize {
        if let Some(index) = self.position(name) {
            return index;
        }
        let relative = sections.blob_head.len() as u64;
        sections.name_offsets.push(relative);
        sections.blob_head.extend_from_slice(name.as_bytes());
        sections.blob_head.push(0);
        self.added.push(name.to_string());
        self.existing.names.len() + self.added.len() - 1
    }
}

/// Append every file in `files` as a new chunk
///
/// Returns the manifest registrations the new chunks ask for.
pub(crate) fn append_chunks(
    mapped: &mut MappedFile,
    container: &Container,
    files: &[ModFile],
    ctx: &PatchContext,
    log: &mut WorkerLog,
    report: &mut PatchReport,
) -> Result<Vec<AssetRegistration>> {
    let mut sections = Sections::read(mapped.as_slice(), container)?;
    let mut names = NameTable {
        existing: container,
        added: Vec::new(),
    };
    let template = template_record(&sections.info, container.chunks.len());
    let mut pending: Vec<PendingChunk> = Vec::new();
    let mut registrations = Vec::new();

    for file in files {
        if names.position(&file.target_name).is_some() {
            log.warn(format!("{} already exists, not added again", file.target_name));
            report.skipped += 1;
            continue;
        }

        let entry = file
            .metadata
            .clone()
            .or_else(|| ctx.resource_data.get_by_path(&file.target_name).cloned())
            .unwrap_or_else(|| ResourceDataEntry::fallback(&file.target_name));

        let prepared = match prepare_payload(
            &file.target_name,
            &file.data,
            &ctx.config,
            ctx.codec.as_ref(),
        ) {
            Ok(prepared) => prepared,
            Err(e) => {
                absorb(Err(e), &file.target_name, log, report)?;
                continue;
            }
        };

        let type_index = names.intern(&entry.resource_type, &mut sections);
        let name_index = names.intern(&file.target_name, &mut sections);
        let name_id = sections.name_ids.len() as u64 / 8;
        sections.name_ids.extend_from_slice(&(type_index as u64).to_le_bytes());
        sections.name_ids.extend_from_slice(&(name_index as u64).to_le_bytes());

        pending.push(PendingChunk {
            record: new_record(&template, name_id, &entry, &prepared),
            payload: prepared.bytes,
        });

        if entry.map_resource_type.is_some() || file.has_placement_hint() {
            registrations.push(AssetRegistration {
                asset_type: entry
                    .map_resource_type
                    .clone()
                    .unwrap_or_else(|| entry.resource_type.clone()),
                name: entry
                    .map_resource_name
                    .clone()
                    .unwrap_or_else(|| file.target_name.clone()),
                placement: file.placement.clone(),
            });
        }
        log.info(format!("Added {}", file.target_name));
    }

    if pending.is_empty() {
        return Ok(registrations);
    }

    write_sections(mapped, container, sections, pending, ctx, report)?;
    Ok(registrations)
}

fn template_record(info: &[u8], count: usize) -> Vec<u8> {
    let record = INFO_RECORD_SIZE as usize;
    if count == 0 {
        return vec![0u8; record];
    }
    let start = (count - 1) * record;
    info.get(start..start + record)
        .map_or_else(|| vec![0u8; record], <[u8]>::to_vec)
}

fn put(record: &mut [u8], at: u64, bytes: &[u8]) {
    let at = at as usize;
    record[at..at + bytes.len()].copy_from_slice(bytes);
}

fn new_record(
    template: &[u8],
    name_id: u64,
    entry: &ResourceDataEntry,
    payload: &PreparedPayload,
) -> Vec<u8> {
    let mut record = template.to_vec();
    put(&mut record, RECORD_NAME_ID, &name_id.to_le_bytes());
    put(&mut record, RECORD_DATA_OFFSET, &0u64.to_le_bytes());
    put(&mut record, RECORD_SIZE_Z, &(payload.bytes.len() as u64).to_le_bytes());
    put(&mut record, RECORD_UNCOMPRESSED_SIZE, &payload.size.to_le_bytes());
    put(&mut record, RECORD_CONTENT_HASH, &fnv1a64(&payload.bytes).to_le_bytes());
    put(&mut record, RECORD_STREAM_HASH, &entry.stream_hash.to_le_bytes());
    put(&mut record, RECORD_STREAM_HASH2, &entry.stream_hash.to_le_bytes());
    put(&mut record, RECORD_VERSION, &u32::from(entry.version).to_le_bytes());
    put(&mut record, RECORD_SPECIAL, &entry.special_bytes);
    put(&mut record, RECORD_COMPRESSION, &[payload.mode]);
    record
}

fn write_sections(
    mapped: &mut MappedFile,
    container: &Container,
    mut sections: Sections,
    pending: Vec<PendingChunk>,
    ctx: &PatchContext,
    report: &mut PatchReport,
) -> Result<()> {
    let old = &container.header;
    let added = pending.len() as u64;
    let added_names = (sections.name_offsets.len() - container.names.len()) as u64;
    let old_blob_len = container.header.unknown_offset - container.names_end();

    let info_growth = added * INFO_RECORD_SIZE;
    let table_growth = added_names * 8;
    let blob_growth =
        (sections.blob_head.len() + sections.blob_tail.len()) as u64 - old_blob_len;
    let ids_growth = added * 16;
    let names_shift = info_growth;
    let middle_shift = info_growth + table_growth + blob_growth;
    let data_shift = middle_shift + ids_growth;

    let mut header = old.clone();
    header.names_offset += names_shift;
    header.unknown_offset += middle_shift;
    header.dependencies_offset += middle_shift;
    header.type_ids_offset += middle_shift;
    header.idcl_offset += data_shift;
    header.data_offset += data_shift;
    header.file_count = checked_u32(u64::from(old.file_count) + added, "file count")?;
    header.file_count2 = checked_u32(u64::from(old.file_count2) + added * 2, "name id count")?;
    header.strings_size = checked_u32(
        u64::from(old.strings_size) + table_growth + blob_growth,
        "strings size",
    )?;

    // Existing payloads all sit in the data section, which moves as a block
    for index in 0..container.chunks.len() {
        let at = index * INFO_RECORD_SIZE as usize + RECORD_DATA_OFFSET as usize;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&sections.info[at..at + 8]);
        let moved = u64::from_le_bytes(raw) + data_shift;
        sections.info[at..at + 8].copy_from_slice(&moved.to_le_bytes());
    }

    let old_len = mapped.len();
    let mut cursor = old_len + data_shift;
    let mut placed = Vec::with_capacity(pending.len());
    for chunk in pending {
        let offset = padded_offset(cursor);
        cursor = offset + chunk.payload.len() as u64;
        let mut record = chunk.record;
        put(&mut record, RECORD_DATA_OFFSET, &offset.to_le_bytes());
        sections.info.extend_from_slice(&record);
        placed.push((offset, chunk.payload));
    }

    mapped.resize(cursor)?;
    let mut mover = TailMover::new(ctx.config.copy_chunk_size);
    mapped.move_within(
        &mut mover,
        old.data_offset,
        old.data_offset + data_shift,
        old_len - old.data_offset,
    )?;

    let mut tables = Vec::with_capacity((header.data_offset - old.info_offset) as usize);
    tables.extend_from_slice(&sections.info);
    tables.extend_from_slice(&sections.info_tail);
    tables.extend_from_slice(&sections.name_table());
    tables.extend_from_slice(&sections.blob_head);
    tables.extend_from_slice(&sections.blob_tail);
    tables.extend_from_slice(&sections.middle);
    tables.extend_from_slice(&sections.name_ids);
    tables.extend_from_slice(&sections.idcl);

    let tables_end = old.info_offset + tables.len() as u64;
    if tables_end != header.data_offset {
        return Err(PatchError::Corruption(format!(
            "sections end at {tables_end:#x} but data starts at {:#x}",
            header.data_offset
        )));
    }

    mapped.write_bytes_at(old.info_offset, &tables)?;
    mapped.write_bytes_at(0, &header.to_bytes()?)?;
    for (offset, payload) in &placed {
        mapped.write_bytes_at(*offset, payload)?;
    }

    debug!(
        "Appended {} chunks; tables grew by {:#x}, file is now {} bytes",
        added,
        data_shift,
        mapped.len()
    );
    report.appended += placed.len();
    Ok(())
}

fn checked_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| PatchError::Corruption(format!("{what} {value} overflows")))
}
