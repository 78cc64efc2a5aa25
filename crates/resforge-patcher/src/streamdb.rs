//! StreamDB rebuilding
//!
//! A streamdb archive is never patched in place. Every run rebuilds it from
//! the mod-side streaming files that target it: each file carries an
//! `_id#<N>` token in its name and a LOD table whose entries become archive
//! entries. Higher-priority files win both per file id and per LOD id.

use crate::log::WorkerLog;
use crate::mod_file::{ModFile, sort_by_priority};
use crate::pipeline::PatchReport;
use crate::{PatchError, Result};
use resforge_formats::streamdb::{StreamDbContainer, StreamModFile, parse_stream_id};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::debug;

/// Build the archive at `output` from `mod_files`
///
/// Unusable mod files are logged and skipped. A failed write removes the
/// partial archive and returns the error.
pub fn build_streamdb(
    output: &Path,
    mod_files: &[ModFile],
    log: &mut WorkerLog,
) -> Result<PatchReport> {
    let mut files = mod_files.to_vec();
    sort_by_priority(&mut files);

    let mut report = PatchReport::default();
    let mut archive = StreamDbContainer::new();
    let mut seen_ids = HashSet::new();

    for file in &files {
        let Some(stream_id) = parse_stream_id(&file.target_name) else {
            log.warn(format!("Skipping {}: no stream id in name", file.target_name));
            report.skipped += 1;
            continue;
        };
        if !seen_ids.insert(stream_id) {
            log.detail(format!(
                "Skipping {}: stream id {stream_id} already provided by a higher-priority mod",
                file.target_name
            ));
            report.skipped += 1;
            continue;
        }

        let parsed = match StreamModFile::parse(&file.data) {
            Ok(parsed) => parsed,
            Err(e) => {
                log.warn(format!("Skipping {}: {e}", file.target_name));
                report.skipped += 1;
                continue;
            }
        };

        for (lod_id, payload) in parsed.payloads() {
            if !archive.add(lod_id, payload.to_vec()) {
                log.detail(format!(
                    "LOD {lod_id:#x} from {} shadowed by a higher-priority mod",
                    file.target_name
                ));
            }
        }
    }

    let written = write_streamdb(output, &archive).inspect_err(|e| {
        log.error(format!("Failed to write {}: {e}", output.display()));
    })?;
    debug!("Wrote {} bytes to {}", written, output.display());

    report.streamdb_entries = archive.len();
    log.info(format!("Built streamdb with {} entries", archive.len()));
    Ok(report)
}

fn write_streamdb(output: &Path, archive: &StreamDbContainer) -> Result<u64> {
    let result = File::create(output)
        .map_err(PatchError::from)
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            Ok(archive.write_to(&mut writer)?)
        });
    if result.is_err() {
        // Leave nothing behind for the game to load
        let _ = std::fs::remove_file(output);
    }
    result
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::log::LogLevel;
    use crate::mod_file::ModParent;
    use pretty_assertions::assert_eq;
    use resforge_formats::streamdb::build_stream_mod;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn stream_file(priority: i32, name: &str, lods: &[(u64, &[u8])]) -> ModFile {
        let parent = Arc::new(ModParent::new(format!("mod{priority}"), priority));
        let data = build_stream_mod(lods).expect("build mod file");
        ModFile::new(parent, "models.streamdb", name, data)
    }

    #[test]
    fn test_entries_sorted_and_aligned() {
        let dir = TempDir::new().expect("tempdir");
        let output = dir.path().join("models.streamdb");
        let files = [
            stream_file(0, "rock_id#5.streamdb", &[(5, &[1u8; 10][..])]),
            stream_file(0, "tree_id#3.streamdb", &[(3, &[2u8; 37][..])]),
        ];
        let mut log = WorkerLog::new("models.streamdb", false);

        let report = build_streamdb(&output, &files, &mut log).expect("build");
        assert_eq!(report.streamdb_entries, 2);

        let bytes = std::fs::read(&output).expect("read");
        let archive = StreamDbContainer::parse(&bytes).expect("parse");
        let layout = archive.layout().expect("layout");
        let data_start = layout.data_start();

        assert_eq!(layout.records[0].file_id, 3);
        assert_eq!(u64::from(layout.records[0].data_offset16), data_start / 16);
        assert_eq!(layout.records[1].file_id, 5);
        assert_eq!(layout.records[1].data_offset(), (data_start + 37).next_multiple_of(16));
        assert_eq!(archive.get(3), Some(&[2u8; 37][..]));
        assert_eq!(archive.get(5), Some(&[1u8; 10][..]));
    }

    #[test]
    fn test_higher_priority_wins() {
        let dir = TempDir::new().expect("tempdir");
        let output = dir.path().join("a.streamdb");
        let files = [
            stream_file(1, "low_id#7.streamdb", &[(7, &b"low"[..])]),
            stream_file(9, "high_id#7.streamdb", &[(7, &b"high"[..])]),
            stream_file(5, "other_id#8.streamdb", &[(7, &b"mid"[..]), (8, &b"eight"[..])]),
        ];
        let mut log = WorkerLog::new("a.streamdb", true);

        let report = build_streamdb(&output, &files, &mut log).expect("build");
        assert_eq!(report.streamdb_entries, 2);
        assert_eq!(report.skipped, 1);

        let archive = StreamDbContainer::parse(&std::fs::read(&output).expect("read"))
            .expect("parse");
        assert_eq!(archive.get(7), Some(&b"high"[..]));
        assert_eq!(archive.get(8), Some(&b"eight"[..]));
    }

    #[test]
    fn test_unusable_files_skipped() {
        let dir = TempDir::new().expect("tempdir");
        let output = dir.path().join("b.streamdb");
        let parent = Arc::new(ModParent::new("broken", 0));
        let files = [
            stream_file(0, "no_token.streamdb", &[(1, &b"x"[..])]),
            ModFile::new(parent, "b.streamdb", "bad_id#2.streamdb", b"NOTSTREAM".to_vec()),
            stream_file(0, "good_id#3.streamdb", &[(3, &b"ok"[..])]),
        ];
        let mut log = WorkerLog::new("b.streamdb", false);

        let report = build_streamdb(&output, &files, &mut log).expect("build");
        assert_eq!(report.streamdb_entries, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(log.lines().iter().filter(|l| l.level == LogLevel::Warn).count(), 2);
    }

    #[test]
    fn test_failed_write_reports_error() {
        let dir = TempDir::new().expect("tempdir");
        let output = dir.path().join("missing").join("c.streamdb");
        let files = [stream_file(0, "a_id#1.streamdb", &[(1, &b"x"[..])])];
        let mut log = WorkerLog::new("c.streamdb", false);

        let err = build_streamdb(&output, &files, &mut log).expect_err("no parent dir");
        assert!(err.is_fatal());
        assert!(!output.exists());
        assert_eq!(log.lines().last().map(|l| l.level), Some(LogLevel::Error));
    }
}
