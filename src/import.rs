//! Import-job orchestration.
//!
//! One import run is a staged pipeline over a durable job row:
//!
//! ```text
//! detection -> parsing -> units -> media -> linking -> embedding
//! ```
//!
//! Errors split into two severities. [`ImportError`] covers the fatal
//! cases where no partial result would be useful (unreadable source, no
//! matching parser); everything item-shaped is appended to the job's
//! error log and skipped, so one corrupt conversation or missing image
//! never sinks the other nine thousand. Embedding is best-effort and can
//! never regress a job below completed.
//!
//! Progress is a single non-decreasing fraction in [0, 1] over fixed
//! per-phase bands, persisted on the job row and mirrored to a
//! [`ProgressReporter`].

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::Config;
use crate::detect;
use crate::embedding;
use crate::hash;
use crate::jobs;
use crate::links;
use crate::manifest::{self, PointerManifest};
use crate::models::{ContentUnit, ImportOptions, ImportResult, JobStatus, MediaRef};
use crate::parser::{ParseContext, ParserRegistry};
use crate::progress::{ImportEvent, ProgressReporter};
use crate::store::MediaStore;

/// Conditions that abort an import run outright. Anything not listed here
/// is an item-level error: logged on the job and skipped.
#[derive(Debug)]
pub enum ImportError {
    /// Source exists but matches no known export layout.
    UnrecognizedSource(String),
    /// Source missing, empty, or unreadable.
    SourceIo(String),
    /// Detection succeeded but no registered parser accepted the source.
    NoParser(String),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::UnrecognizedSource(s) => write!(f, "unrecognized source: {}", s),
            ImportError::SourceIo(s) => write!(f, "source unreadable: {}", s),
            ImportError::NoParser(s) => write!(f, "no parser for source: {}", s),
        }
    }
}

impl std::error::Error for ImportError {}

// Phase bands on the overall progress scale. Each phase fills its band
// proportionally to items done; phase boundaries land exactly on these.
const DETECTION_END: f64 = 0.10;
const PARSING_END: f64 = 0.30;
const UNITS_END: f64 = 0.60;
const MEDIA_END: f64 = 0.80;
const LINKING_END: f64 = 0.90;

/// Counters accumulated across phases; survive a mid-pipeline fatal error
/// so the final result still reports what did land.
#[derive(Default)]
struct Counters {
    units_created: u64,
    media_stored: u64,
    media_processed: u64,
    links_created: u64,
}

/// Monotonic progress over the phase bands. Clamps so a recomputed value
/// can never move backwards, and mirrors every change to the reporter.
struct ProgressTracker<'a> {
    job_id: String,
    last: f64,
    reporter: &'a dyn ProgressReporter,
}

impl<'a> ProgressTracker<'a> {
    fn new(job_id: &str, reporter: &'a dyn ProgressReporter) -> Self {
        Self {
            job_id: job_id.to_string(),
            last: 0.0,
            reporter,
        }
    }

    fn phase_started(&self, phase: &str) {
        self.reporter.report(ImportEvent::PhaseStarted {
            job_id: self.job_id.clone(),
            phase: phase.to_string(),
        });
    }

    /// Advance to `band_start + fraction * band_width`, never backwards.
    fn step(&mut self, phase: &str, band_start: f64, band_end: f64, n: u64, total: u64) -> f64 {
        let fraction = if total == 0 {
            1.0
        } else {
            n as f64 / total as f64
        };
        let target = band_start + fraction * (band_end - band_start);
        self.last = target.max(self.last).min(1.0);
        self.reporter.report(ImportEvent::Progress {
            job_id: self.job_id.clone(),
            phase: phase.to_string(),
            progress: self.last,
            n,
            total,
        });
        self.last
    }
}

/// Run one import end to end. Always leaves the job row terminal
/// (completed or failed); only infrastructure faults (lost database)
/// surface as `Err`.
pub async fn run_import(
    config: &Config,
    pool: &SqlitePool,
    source: &Path,
    options: &ImportOptions,
    reporter: &dyn ProgressReporter,
) -> Result<ImportResult> {
    let started = Instant::now();
    let job_id = Uuid::new_v4().to_string();

    let source_name = options.source_name.clone().unwrap_or_else(|| {
        source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| source.display().to_string())
    });
    let declared_type = options.source_type.as_deref().unwrap_or("unknown");

    jobs::create_job(
        pool,
        &job_id,
        declared_type,
        &source.display().to_string(),
        &source_name,
    )
    .await?;

    let mut counters = Counters::default();
    let mut tracker = ProgressTracker::new(&job_id, reporter);

    let outcome = run_pipeline(
        config,
        pool,
        source,
        options,
        &job_id,
        &mut counters,
        &mut tracker,
    )
    .await;

    let status = match outcome {
        Ok(()) => JobStatus::Completed,
        Err(e) => {
            jobs::append_error(pool, &job_id, &e.to_string()).await?;
            JobStatus::Failed
        }
    };
    let final_progress = if status == JobStatus::Completed {
        1.0
    } else {
        tracker.last
    };
    jobs::finish_job(pool, &job_id, status, final_progress).await?;

    let job = jobs::get_job(pool, &job_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("job row vanished: {}", job_id))?;

    Ok(ImportResult {
        job_id,
        status: job.status,
        units_created: counters.units_created,
        media_stored: counters.media_stored,
        links_created: counters.links_created,
        errors: job.error_log,
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

async fn run_pipeline(
    config: &Config,
    pool: &SqlitePool,
    source: &Path,
    options: &ImportOptions,
    job_id: &str,
    counters: &mut Counters,
    tracker: &mut ProgressTracker<'_>,
) -> Result<()> {
    // Detection + extraction.
    tracker.phase_started("detection");
    jobs::set_phase(pool, job_id, JobStatus::Extracting, "detection", 0.0).await?;

    let workspace_dir = config.archive.root.join("extract").join(job_id);
    let detected = detect::detect_source(source, options.source_type.as_deref(), &workspace_dir)?;
    jobs::set_source_type(pool, job_id, &detected.source_type).await?;
    tracker.step("detection", 0.0, DETECTION_END, 1, 1);

    // Parsing.
    tracker.phase_started("parsing");
    jobs::set_phase(pool, job_id, JobStatus::Parsing, "parsing", DETECTION_END).await?;

    let registry = ParserRegistry::with_builtins();
    let ctx = ParseContext {
        source_type: detected.source_type.clone(),
        preserve_ids: options.preserve_ids,
    };
    let (parser_name, mut output) = registry.parse_first(&detected.parse_root, &ctx).await?;

    for err in &output.errors {
        jobs::append_error(pool, job_id, err).await?;
    }
    if parser_name.is_none() {
        return Err(ImportError::NoParser(detected.parse_root.display().to_string()).into());
    }

    jobs::set_totals(
        pool,
        job_id,
        output.units.len() as i64,
        output.media_refs.len() as i64,
    )
    .await?;
    tracker.step("parsing", DETECTION_END, PARSING_END, 1, 1);

    // Dry run stops here: totals and parse errors are on the job, nothing
    // is persisted.
    if options.dry_run {
        tracker.step("parsing", PARSING_END, 1.0, 1, 1);
        return Ok(());
    }

    // Unit storage.
    tracker.phase_started("units");
    jobs::set_phase(pool, job_id, JobStatus::Indexing, "units", PARSING_END).await?;

    let mut created_units: Vec<ContentUnit> = Vec::with_capacity(output.units.len());
    let mut created_ids: HashSet<String> = HashSet::new();
    let units_total = output.units.len() as u64;

    for (i, unit) in output.units.iter_mut().enumerate() {
        if unit.content_hash.is_empty() {
            unit.content_hash = hash::hash_bytes(unit.content.as_bytes());
        }
        match insert_unit(pool, unit).await {
            Ok(()) => {
                created_ids.insert(unit.id.clone());
                created_units.push(unit.clone());
                counters.units_created += 1;
            }
            Err(e) => {
                jobs::append_error(pool, job_id, &format!("unit {}: {}", unit.uri, e)).await?;
            }
        }
        jobs::set_counters(
            pool,
            job_id,
            (i + 1) as i64,
            0,
            counters.links_created as i64,
        )
        .await?;
        tracker.step("units", PARSING_END, UNITS_END, (i + 1) as u64, units_total);
    }
    tracker.step("units", PARSING_END, UNITS_END, units_total, units_total);

    // Media storage.
    tracker.phase_started("media");
    jobs::set_phase(pool, job_id, JobStatus::Indexing, "media", UNITS_END).await?;

    if !options.skip_media {
        store_media(
            config,
            pool,
            job_id,
            &detected,
            &output.media_refs,
            &created_ids,
            units_total as i64,
            counters,
            tracker,
        )
        .await?;
    }
    tracker.step("media", UNITS_END, MEDIA_END, 1, 1);

    // Linking.
    tracker.phase_started("linking");
    jobs::set_phase(pool, job_id, JobStatus::Indexing, "linking", MEDIA_END).await?;

    let links_total = output.links.len() as u64;
    for (i, link) in output.links.iter().enumerate() {
        match links::insert_link(pool, link).await {
            Ok(()) => counters.links_created += 1,
            Err(e) => {
                jobs::append_error(
                    pool,
                    job_id,
                    &format!("link {} -> {}: {}", link.source_uri, link.target_uri, e),
                )
                .await?;
            }
        }
        tracker.step("linking", MEDIA_END, LINKING_END, (i + 1) as u64, links_total);
    }
    jobs::set_counters(
        pool,
        job_id,
        units_total as i64,
        counters.media_processed as i64,
        counters.links_created as i64,
    )
    .await?;
    tracker.step("linking", MEDIA_END, LINKING_END, links_total, links_total);

    // Embedding, best-effort.
    tracker.phase_started("embedding");
    jobs::set_phase(pool, job_id, JobStatus::Embedding, "embedding", LINKING_END).await?;

    if !options.skip_embeddings && config.embedding.is_enabled() && !created_units.is_empty() {
        let (_embedded, failed) =
            embedding::embed_units_inline(&config.embedding, pool, &created_units).await;
        if failed > 0 {
            jobs::append_error(
                pool,
                job_id,
                &format!("embedding: {} of {} units failed", failed, created_units.len()),
            )
            .await?;
        }
    }
    tracker.step("embedding", LINKING_END, 1.0, 1, 1);

    Ok(())
}

async fn insert_unit(pool: &SqlitePool, unit: &ContentUnit) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO content_units
            (id, uri, unit_type, source_type, content, content_hash,
             word_count, char_count, parent_uri, position, depth, author,
             timestamp, metadata_json, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&unit.id)
    .bind(&unit.uri)
    .bind(unit.unit_type.as_str())
    .bind(&unit.source_type)
    .bind(&unit.content)
    .bind(&unit.content_hash)
    .bind(unit.word_count)
    .bind(unit.char_count)
    .bind(&unit.parent_uri)
    .bind(unit.position)
    .bind(unit.depth)
    .bind(&unit.author)
    .bind(unit.timestamp)
    .bind(&unit.metadata_json)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

/// Resolve and store every media reference. Unresolvable references are
/// logged and skipped; `media_stored` counts only physically new files.
#[allow(clippy::too_many_arguments)]
async fn store_media(
    config: &Config,
    pool: &SqlitePool,
    job_id: &str,
    detected: &detect::Detected,
    media_refs: &[MediaRef],
    created_ids: &HashSet<String>,
    units_processed: i64,
    counters: &mut Counters,
    tracker: &mut ProgressTracker<'_>,
) -> Result<()> {
    let store = MediaStore::new(config.archive.root.clone(), pool.clone());

    // The manifest walk is costly on large exports; build it only once a
    // reference actually needs indirect resolution.
    let mut pointer_manifest: Option<PointerManifest> = None;
    let manifest_root = manifest_root(detected);

    let total = media_refs.len() as u64;
    for m in media_refs {
        // The owning unit failed to insert; its failure is already logged.
        if created_ids.contains(&m.content_unit_id) {
            store_one_ref(
                config,
                pool,
                job_id,
                &store,
                m,
                &manifest_root,
                &mut pointer_manifest,
                counters,
            )
            .await?;
        }
        counters.media_processed += 1;
        jobs::set_counters(
            pool,
            job_id,
            units_processed,
            counters.media_processed as i64,
            counters.links_created as i64,
        )
        .await?;
        tracker.step("media", UNITS_END, MEDIA_END, counters.media_processed, total);
    }

    Ok(())
}

/// Handle a single media reference. Resolution failures, store failures
/// and reference-row failures are all item-level: they go to the job's
/// error log and the import carries on.
#[allow(clippy::too_many_arguments)]
async fn store_one_ref(
    config: &Config,
    pool: &SqlitePool,
    job_id: &str,
    store: &MediaStore,
    m: &MediaRef,
    manifest_root: &Path,
    pointer_manifest: &mut Option<PointerManifest>,
    counters: &mut Counters,
) -> Result<()> {
    let resolved = match resolve_media_path(m, manifest_root, pointer_manifest, config) {
        Ok(p) => p,
        Err(e) => {
            jobs::append_error(pool, job_id, &e).await?;
            return Ok(());
        }
    };
    let Some(path) = resolved else {
        jobs::append_error(
            pool,
            job_id,
            &format!(
                "unresolved media for unit {}: {}",
                m.content_unit_id,
                m.original_pointer
                    .as_deref()
                    .or(m.filename.as_deref())
                    .unwrap_or("<unnamed>")
            ),
        )
        .await?;
        return Ok(());
    };

    match store.store(&path, m.filename.as_deref()).await {
        Ok(result) => {
            if result.is_new {
                counters.media_stored += 1;
            }
            if let Err(e) = insert_media_reference(pool, m, &result.content_hash).await {
                jobs::append_error(
                    pool,
                    job_id,
                    &format!("media reference for unit {}: {}", m.content_unit_id, e),
                )
                .await?;
            }
        }
        Err(e) => {
            jobs::append_error(pool, job_id, &format!("media {}: {}", path.display(), e)).await?;
        }
    }
    Ok(())
}

/// Directory the pointer manifest is built from: the extraction workspace
/// for archive sources, otherwise the parse root (or its parent for
/// single-file sources).
fn manifest_root(detected: &detect::Detected) -> PathBuf {
    if let Some(ws) = &detected.workspace {
        return ws.clone();
    }
    if detected.parse_root.is_dir() {
        detected.parse_root.clone()
    } else {
        detected
            .parse_root
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| detected.parse_root.clone())
    }
}

/// Find the on-disk path for one media reference. Direct paths win; the
/// manifest handles opaque pointers and filename fallbacks. `Ok(None)`
/// means unresolved.
fn resolve_media_path(
    m: &MediaRef,
    manifest_root: &Path,
    pointer_manifest: &mut Option<PointerManifest>,
    config: &Config,
) -> Result<Option<PathBuf>, String> {
    if let Some(p) = &m.source_path {
        if p.exists() {
            return Ok(Some(p.clone()));
        }
    }

    if m.original_pointer.is_none() && m.size.is_none() && m.filename.is_none() {
        return Ok(None);
    }

    if pointer_manifest.is_none() {
        let built = manifest::build_manifest(manifest_root, &config.media)
            .map_err(|e| format!("manifest build failed: {}", e))?;
        *pointer_manifest = Some(built);
    }
    let mf = pointer_manifest.as_ref().unwrap();

    let hash = mf.resolve(m.original_pointer.as_deref(), m.size, m.filename.as_deref());
    Ok(hash.and_then(|h| mf.source_path(&h).map(|p| p.to_path_buf())))
}

async fn insert_media_reference(
    pool: &SqlitePool,
    m: &MediaRef,
    content_hash: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO media_references
            (id, content_unit_id, content_hash, reference_type, caption, position, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&m.content_unit_id)
    .bind(content_hash)
    .bind(m.reference_type.as_str())
    .bind(&m.caption)
    .bind(m.position)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;
    Ok(())
}

/// Load config, open the pool, run an import, and print the result. The
/// CLI entry point for `arv import`.
pub async fn run_import_cmd(
    config: &Config,
    source: &Path,
    options: &ImportOptions,
    reporter: &dyn ProgressReporter,
    json_output: bool,
) -> Result<()> {
    let pool = crate::db::connect(config).await?;
    let result = run_import(config, &pool, source, options, reporter).await?;
    pool.close().await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Import {}: {}", result.job_id, result.status);
        println!("  units created: {}", result.units_created);
        println!("  media stored:  {}", result.media_stored);
        println!("  links created: {}", result.links_created);
        if !result.errors.is_empty() {
            println!("  errors ({}):", result.errors.len());
            for e in result.errors.iter().take(10) {
                println!("    - {}", e);
            }
            if result.errors.len() > 10 {
                println!("    ... and {} more", result.errors.len() - 10);
            }
        }
        println!("  took {} ms", result.duration_ms);
    }

    if result.status == "failed" {
        anyhow::bail!("import failed");
    }
    Ok(())
}
