//! Durable import-job records.
//!
//! The `import_jobs` row is the source of truth for job status: the
//! orchestrator writes phase, progress, counters, and the error log here
//! as it goes, so a live observer disconnecting loses nothing. Each job
//! row has a single writer (its orchestrator); heartbeat-style updates are
//! last-write-wins.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::models::{ImportJob, JobStatus};

pub async fn create_job(
    pool: &SqlitePool,
    id: &str,
    source_type: &str,
    source_path: &str,
    source_name: &str,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO import_jobs (id, source_type, source_path, source_name, status, current_phase, progress, started_at)
        VALUES (?, ?, ?, ?, 'pending', 'pending', 0.0, ?)
        "#,
    )
    .bind(id)
    .bind(source_type)
    .bind(source_path)
    .bind(source_name)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Update status/phase/progress in one write. Called before and after each
/// phase's work.
pub async fn set_phase(
    pool: &SqlitePool,
    id: &str,
    status: JobStatus,
    phase: &str,
    progress: f64,
) -> Result<()> {
    sqlx::query(
        "UPDATE import_jobs SET status = ?, current_phase = ?, progress = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(phase)
    .bind(progress)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Re-detected source type once detection has run.
pub async fn set_source_type(pool: &SqlitePool, id: &str, source_type: &str) -> Result<()> {
    sqlx::query("UPDATE import_jobs SET source_type = ? WHERE id = ?")
        .bind(source_type)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_totals(
    pool: &SqlitePool,
    id: &str,
    units_total: i64,
    media_total: i64,
) -> Result<()> {
    sqlx::query("UPDATE import_jobs SET units_total = ?, media_total = ? WHERE id = ?")
        .bind(units_total)
        .bind(media_total)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Absolute counter write; the orchestrator is the only writer per job.
pub async fn set_counters(
    pool: &SqlitePool,
    id: &str,
    units_processed: i64,
    media_processed: i64,
    links_created: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE import_jobs SET units_processed = ?, media_processed = ?, links_created = ? WHERE id = ?",
    )
    .bind(units_processed)
    .bind(media_processed)
    .bind(links_created)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Append one item-level error to the job's JSON error log.
pub async fn append_error(pool: &SqlitePool, id: &str, message: &str) -> Result<()> {
    let current: Option<String> =
        sqlx::query_scalar("SELECT error_log FROM import_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    let mut log: Vec<String> = current
        .as_deref()
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default();
    log.push(message.to_string());
    let count = log.len() as i64;

    sqlx::query("UPDATE import_jobs SET error_log = ?, errors_count = ? WHERE id = ?")
        .bind(serde_json::to_string(&log)?)
        .bind(count)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Terminal transition; sets `completed_at` and the final progress.
pub async fn finish_job(
    pool: &SqlitePool,
    id: &str,
    status: JobStatus,
    progress: f64,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "UPDATE import_jobs SET status = ?, current_phase = ?, progress = ?, completed_at = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(status.as_str())
    .bind(progress)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

fn job_from_row(row: &sqlx::sqlite::SqliteRow) -> ImportJob {
    let error_log: Vec<String> = serde_json::from_str(row.get::<String, _>("error_log").as_str())
        .unwrap_or_default();
    ImportJob {
        id: row.get("id"),
        source_type: row.get("source_type"),
        source_path: row.get("source_path"),
        source_name: row.get("source_name"),
        status: row.get("status"),
        current_phase: row.get("current_phase"),
        progress: row.get("progress"),
        units_total: row.get("units_total"),
        units_processed: row.get("units_processed"),
        media_total: row.get("media_total"),
        media_processed: row.get("media_processed"),
        links_created: row.get("links_created"),
        errors_count: row.get("errors_count"),
        error_log,
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
    }
}

pub async fn get_job(pool: &SqlitePool, id: &str) -> Result<Option<ImportJob>> {
    let row = sqlx::query("SELECT * FROM import_jobs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(job_from_row))
}

pub async fn list_jobs(pool: &SqlitePool, limit: i64) -> Result<Vec<ImportJob>> {
    let rows = sqlx::query("SELECT * FROM import_jobs ORDER BY started_at DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(job_from_row).collect())
}

/// `arv jobs` — recent jobs, newest first.
pub async fn run_jobs(config: &Config, limit: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    let jobs = list_jobs(&pool, limit).await?;

    println!(
        "{:<36} {:<10} {:<10} {:>8} {:>7} {:>7} {:>6}",
        "JOB", "SOURCE", "STATUS", "PROGRESS", "UNITS", "MEDIA", "ERRORS"
    );
    for job in jobs {
        println!(
            "{:<36} {:<10} {:<10} {:>7.0}% {:>7} {:>7} {:>6}",
            job.id,
            job.source_type,
            job.status,
            job.progress * 100.0,
            job.units_processed,
            job.media_processed,
            job.errors_count
        );
    }

    pool.close().await;
    Ok(())
}

/// `arv job <id>` — full record for one job.
pub async fn run_job_show(config: &Config, id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let Some(job) = get_job(&pool, id).await? else {
        anyhow::bail!("no such job: {}", id);
    };

    println!("job {}", job.id);
    println!("  source:      {} ({})", job.source_name, job.source_type);
    println!("  path:        {}", job.source_path);
    println!("  status:      {} ({})", job.status, job.current_phase);
    println!("  progress:    {:.1}%", job.progress * 100.0);
    println!(
        "  units:       {} / {}",
        job.units_processed, job.units_total
    );
    println!(
        "  media:       {} / {}",
        job.media_processed, job.media_total
    );
    println!("  links:       {}", job.links_created);
    println!("  errors:      {}", job.errors_count);
    for err in &job.error_log {
        println!("    - {}", err);
    }
    println!("  started:     {}", job.started_at);
    if let Some(done) = job.completed_at {
        println!("  completed:   {}", done);
    }

    pool.close().await;
    Ok(())
}
