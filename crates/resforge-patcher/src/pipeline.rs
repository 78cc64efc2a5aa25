//! Patch orchestration
//!
//! [`patch_container`] runs the full sequence on one container: map and
//! parse, replace existing chunks, append new ones, re-parse, write the
//! level manifest back if it changed, flush. [`run_jobs`] runs one worker
//! per container or streamdb archive, on scoped threads when
//! multithreading is enabled, and flushes every worker's log in
//! completion order once all of them have joined.

use crate::append::append_chunks;
use crate::codec::{Codec, FlateCodec, NativeCodec};
use crate::config::PatchConfig;
use crate::container::Container;
use crate::log::{LogPool, WorkerLog};
use crate::manifest::ManifestSlot;
use crate::mapped::MappedFile;
use crate::mod_file::{ModFile, sort_by_priority};
use crate::package::{PackageEdit, PackageManifest, apply_edit};
use crate::replace::{ChunkStore, absorb, replace_chunks};
use crate::streamdb::build_streamdb;
use crate::{PatchError, Result};
use parking_lot::Mutex;
use resforge_formats::resource_data::ResourceDataMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Read-only state shared by every worker
pub struct PatchContext {
    /// Run configuration
    pub config: PatchConfig,
    /// Payload codec
    pub codec: Arc<dyn Codec>,
    /// Default metadata for new chunks
    pub resource_data: Arc<ResourceDataMap>,
    /// Package manifest receiving extra-resource edits
    pub package: Option<Arc<Mutex<dyn PackageManifest + Send>>>,
}

impl PatchContext {
    /// Context with an empty resource-data map and no package manifest
    pub fn new(config: PatchConfig, codec: Arc<dyn Codec>) -> Self {
        Self {
            config,
            codec,
            resource_data: Arc::new(ResourceDataMap::new()),
            package: None,
        }
    }

    /// Context whose codec is chosen by the configuration
    ///
    /// Loads the native codec when `codec_library` is set and falls back
    /// to zlib otherwise.
    pub fn from_config(config: PatchConfig) -> Result<Self> {
        config.validate()?;
        let codec: Arc<dyn Codec> = match &config.codec_library {
            Some(path) => Arc::new(NativeCodec::load(path)?),
            None => {
                info!("No codec library configured, using zlib");
                Arc::new(FlateCodec::default())
            }
        };
        Ok(Self::new(config, codec))
    }

    /// Use `resource_data` for new-chunk metadata
    #[must_use]
    pub fn with_resource_data(mut self, resource_data: Arc<ResourceDataMap>) -> Self {
        self.resource_data = resource_data;
        self
    }

    /// Route extra-resource edits to `package`
    #[must_use]
    pub fn with_package(mut self, package: Arc<Mutex<dyn PackageManifest + Send>>) -> Self {
        self.package = Some(package);
        self
    }
}

/// What one worker did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Existing chunks whose payload was replaced
    pub replaced: usize,
    /// New chunks appended
    pub appended: usize,
    /// String tables re-sealed
    pub blang_written: usize,
    /// Whether the level manifest was rewritten
    pub mapresources_updated: bool,
    /// Mod files or edits that were skipped
    pub skipped: usize,
    /// Entries in a rebuilt streamdb archive
    pub streamdb_entries: usize,
    /// Package manifest edits requested by this container's mods
    pub package_edits: Vec<PackageEdit>,
}

impl PatchReport {
    /// Whether the worker changed anything on disk
    pub fn is_empty(&self) -> bool {
        self.replaced == 0
            && self.appended == 0
            && self.blang_written == 0
            && !self.mapresources_updated
            && self.streamdb_entries == 0
    }
}

/// Unit of work for one worker
#[derive(Debug, Clone)]
pub enum PatchJob {
    /// Patch an existing resource container in place
    Resource {
        /// Container file
        path: PathBuf,
        /// Mod files targeting this container
        mod_files: Vec<ModFile>,
    },
    /// Build a streamdb archive from scratch
    StreamDb {
        /// Archive to create or overwrite
        output: PathBuf,
        /// Streaming payloads for the archive
        mod_files: Vec<ModFile>,
    },
}

impl PatchJob {
    /// File the job writes
    pub fn path(&self) -> &Path {
        match self {
            Self::Resource { path, .. } => path,
            Self::StreamDb { output, .. } => output,
        }
    }

    fn label(&self) -> String {
        self.path()
            .file_name()
            .map_or_else(|| self.path().display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// Outcome of one job
#[derive(Debug)]
pub struct JobResult {
    /// File the job wrote
    pub path: PathBuf,
    /// Report, or the error that stopped the job
    pub outcome: Result<PatchReport>,
}

/// Apply `mod_files` to the container at `path`
///
/// Per-item problems are logged and counted in the report; only errors
/// that leave the container unusable are returned.
pub fn patch_container(
    path: &Path,
    mod_files: &[ModFile],
    ctx: &PatchContext,
    log: &mut WorkerLog,
) -> Result<PatchReport> {
    let mut files = mod_files.to_vec();
    sort_by_priority(&mut files);

    let mut mapped = MappedFile::open(path)?;
    let mut container = Container::parse(mapped.as_slice())?;
    debug!(
        "Parsed {}: {} chunks, {} names",
        path.display(),
        container.chunks.len(),
        container.names.len()
    );

    let mut report = PatchReport::default();
    let mut manifest = ManifestSlot::new();

    let new_files = {
        let mut store = ChunkStore::new(&mut mapped, &mut container, &ctx.config);
        replace_chunks(&mut store, &files, ctx, &mut manifest, log, &mut report)?
    };

    if !new_files.is_empty() {
        let registrations =
            append_chunks(&mut mapped, &container, &new_files, ctx, log, &mut report)?;
        container = Container::parse(mapped.as_slice())?;

        if !registrations.is_empty() {
            match manifest.session(&container, mapped.as_slice(), ctx.codec.as_ref()) {
                Ok(Some(session)) => {
                    for registration in &registrations {
                        session.add_asset(
                            &registration.asset_type,
                            &registration.name,
                            &registration.placement,
                            log,
                        );
                    }
                }
                Ok(None) => log.warn(format!(
                    "Container has no mapresources, {} new assets not registered",
                    registrations.len()
                )),
                Err(e) => absorb(Err(e), "mapresources", log, &mut report)?,
            }
        }
    }

    if let Some(session) = manifest.take() {
        let mut store = ChunkStore::new(&mut mapped, &mut container, &ctx.config);
        let result = session
            .write_back(&mut store, ctx.codec.as_ref())
            .map(|written| report.mapresources_updated = written);
        absorb(result, session.chunk_name(), log, &mut report)?;
        if report.mapresources_updated {
            log.info(format!("Updated {}", session.chunk_name()));
        }
    }

    mapped.flush()?;
    log.info(format!(
        "{} replaced, {} added, {} string tables, {} skipped",
        report.replaced, report.appended, report.blang_written, report.skipped
    ));
    Ok(report)
}

fn run_job(job: &PatchJob, ctx: &PatchContext, pool: &LogPool) -> JobResult {
    let label = job.label();
    let mut log = WorkerLog::new(&label, ctx.config.verbose);

    let outcome = match job {
        PatchJob::Resource { path, mod_files } => patch_container(path, mod_files, ctx, &mut log),
        PatchJob::StreamDb { output, mod_files } => build_streamdb(output, mod_files, &mut log),
    };
    if let Err(e) = &outcome {
        log.error(format!("Failed to patch {label}: {e}"));
    }

    pool.submit(log);
    JobResult {
        path: job.path().to_path_buf(),
        outcome,
    }
}

/// Run every job and return their results in job order
///
/// Each job owns its file exclusively; two jobs naming the same file is a
/// caller error. Package manifest edits are applied after all workers
/// have joined, in job order.
pub fn run_jobs(jobs: Vec<PatchJob>, ctx: &PatchContext) -> Vec<JobResult> {
    let pool = LogPool::new();

    let results: Vec<JobResult> = if ctx.config.multithreading && jobs.len() > 1 {
        std::thread::scope(|scope| {
            let pool = &pool;
            let handles: Vec<_> = jobs
                .iter()
                .map(|job| scope.spawn(move || run_job(job, ctx, pool)))
                .collect();
            handles
                .into_iter()
                .zip(&jobs)
                .map(|(handle, job)| {
                    handle.join().unwrap_or_else(|_| JobResult {
                        path: job.path().to_path_buf(),
                        outcome: Err(PatchError::WorkerPanicked(job.label())),
                    })
                })
                .collect()
        })
    } else {
        jobs.iter().map(|job| run_job(job, ctx, &pool)).collect()
    };

    let lines = pool.flush();
    debug!("Flushed {lines} log lines from {} workers", results.len());

    apply_package_edits(ctx, &results);
    results
}

fn apply_package_edits(ctx: &PatchContext, results: &[JobResult]) {
    let edits: Vec<&PackageEdit> = results
        .iter()
        .filter_map(|r| r.outcome.as_ref().ok())
        .flat_map(|report| &report.package_edits)
        .collect();
    if edits.is_empty() {
        return;
    }

    let Some(package) = &ctx.package else {
        warn!(
            "{} package manifest edits requested but no package manifest was supplied",
            edits.len()
        );
        return;
    };

    let mut log = WorkerLog::new("package manifest", ctx.config.verbose);
    {
        let mut manifest = package.lock();
        for edit in edits {
            if let Err(e) = apply_edit(&mut *manifest, edit, &mut log) {
                log.warn(format!("{}: {e}", edit.resource.name));
            }
        }
    }
    log.emit();
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use resforge_test_utils::ContainerFixture;
    use crate::mod_file::ModParent;
    use crate::package::PackageMapSpec;
    use resforge_formats::assets_info::ExtraResource;

    fn context() -> PatchContext {
        PatchContext::new(
            PatchConfig::default().with_multithreading(false),
            Arc::new(FlateCodec::default()),
        )
    }

    #[test]
    fn test_from_config_defaults_to_zlib() {
        let ctx = PatchContext::from_config(PatchConfig::default()).expect("context");
        assert_eq!(ctx.codec.name(), "zlib");
        assert!(ctx.package.is_none());

        let bad = PatchConfig::default().with_copy_chunk_size(0);
        assert!(matches!(PatchContext::from_config(bad), Err(PatchError::Config(_))));
    }

    #[test]
    fn test_missing_codec_library_is_fatal() {
        let config = PatchConfig::default().with_codec_library("/nonexistent/libcodec.so");
        let err = PatchContext::from_config(config).err().expect("load fails");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_job_label_and_path() {
        let job = PatchJob::StreamDb {
            output: PathBuf::from("base/streamdb/models.streamdb"),
            mod_files: Vec::new(),
        };
        assert_eq!(job.label(), "models.streamdb");
        assert_eq!(job.path(), Path::new("base/streamdb/models.streamdb"));
    }

    #[test]
    fn test_untouched_container_reports_nothing() {
        let file = ContainerFixture::new().file("a.txt", b"hello").write_temp();
        let before = std::fs::read(file.path()).expect("read");
        let mut log = WorkerLog::new("a", false);

        let report = patch_container(file.path(), &[], &context(), &mut log).expect("patch");
        assert!(report.is_empty());
        assert_eq!(std::fs::read(file.path()).expect("read"), before);
    }

    #[test]
    fn test_package_edits_without_manifest_are_dropped() {
        let file = ContainerFixture::new().file("a.txt", b"hello").write_temp();
        let info = br#"{"extraResources": [{"name": "extra.resources"}]}"#;
        let parent = Arc::new(ModParent::new("m", 0));
        let mod_file = ModFile::new(parent, "x", "x.json", info.to_vec()).assets_info_json();
        let jobs = vec![PatchJob::Resource {
            path: file.path().to_path_buf(),
            mod_files: vec![mod_file],
        }];

        let results = run_jobs(jobs, &context());
        let report = results[0].outcome.as_ref().expect("patched");
        assert_eq!(report.package_edits.len(), 1);
        assert!(report.is_empty());
    }

    #[test]
    fn test_package_edits_follow_job_order() {
        let spec = PackageMapSpec::from_slice(
            br#"{"files": [{"name": "one.resources"}, {"name": "two.resources"}],
                 "mapFileRefs": [],
                 "maps": [{"name": "one"}, {"name": "two"}]}"#,
        )
        .expect("spec");
        let package = Arc::new(Mutex::new(spec));
        let ctx = context().with_package(package.clone());

        let edit = |name: &str| ExtraResource {
            name: name.into(),
            remove: false,
            place_first: false,
            place_before: false,
            place_by_name: None,
        };
        let results = vec![
            JobResult {
                path: PathBuf::from("two.resources"),
                outcome: Ok(PatchReport {
                    package_edits: vec![PackageEdit::new("two.resources", edit("shared"))],
                    ..PatchReport::default()
                }),
            },
            JobResult {
                path: PathBuf::from("one.resources"),
                outcome: Ok(PatchReport {
                    package_edits: vec![PackageEdit::new("one.resources", edit("shared"))],
                    ..PatchReport::default()
                }),
            },
            JobResult {
                path: PathBuf::from("broken.resources"),
                outcome: Err(PatchError::Corruption("bad".into())),
            },
        ];
        apply_package_edits(&ctx, &results);

        let spec = package.lock();
        assert_eq!(spec.files[2].name, "shared");
        let refs: Vec<(usize, usize)> = spec.map_file_refs.iter().map(|r| (r.file, r.map)).collect();
        assert_eq!(refs, [(2, 1), (2, 0)]);
    }
}
