//! Archive statistics and health overview.
//!
//! A quick summary of what's in the archive: unit and link counts, media
//! bytes on disk, embedding coverage, and per-source breakdowns. Used by
//! `arv stats` to confirm imports landed what they claimed.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

/// Per-source breakdown of unit, media-reference, and link counts.
struct SourceStats {
    source_type: String,
    unit_count: i64,
    media_ref_count: i64,
    embedded_count: i64,
    last_import_ts: Option<i64>,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_units: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content_units")
        .fetch_one(&pool)
        .await?;

    let total_media: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media_files")
        .fetch_one(&pool)
        .await?;

    let media_bytes: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(file_size), 0) FROM media_files")
            .fetch_one(&pool)
            .await?;

    let total_links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM content_links")
        .fetch_one(&pool)
        .await?;

    let total_embedded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM unit_vectors")
        .fetch_one(&pool)
        .await?;

    let total_jobs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM import_jobs")
        .fetch_one(&pool)
        .await?;

    let failed_jobs: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM import_jobs WHERE status = 'failed'")
            .fetch_one(&pool)
            .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Archivum — Archive Stats");
    println!("========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Archive:     {}", config.archive.root.display());
    println!();
    println!("  Units:       {}", total_units);
    println!(
        "  Media files: {} ({})",
        total_media,
        format_bytes(media_bytes as u64)
    );
    println!("  Links:       {}", total_links);
    println!(
        "  Embedded:    {} / {} ({}%)",
        total_embedded,
        total_units,
        if total_units > 0 {
            (total_embedded * 100) / total_units
        } else {
            0
        }
    );
    println!(
        "  Jobs:        {} ({} failed)",
        total_jobs, failed_jobs
    );

    // Per-source breakdown
    let source_rows = sqlx::query(
        r#"
        SELECT
            u.source_type,
            COUNT(DISTINCT u.id) AS unit_count,
            COUNT(DISTINCT mr.id) AS media_ref_count,
            COUNT(DISTINCT uv.unit_id) AS embedded_count
        FROM content_units u
        LEFT JOIN media_references mr ON mr.content_unit_id = u.id
        LEFT JOIN unit_vectors uv ON uv.unit_id = u.id
        GROUP BY u.source_type
        ORDER BY unit_count DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    // Last completed import per source
    let job_rows = sqlx::query(
        r#"
        SELECT source_type, MAX(completed_at) AS last_completed
        FROM import_jobs
        WHERE status = 'completed'
        GROUP BY source_type
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let mut source_stats: Vec<SourceStats> = Vec::new();
    for row in &source_rows {
        let source_type: String = row.get("source_type");
        let last_import_ts = job_rows
            .iter()
            .find(|j| {
                let js: String = j.get("source_type");
                js == source_type
            })
            .and_then(|j| j.get::<Option<i64>, _>("last_completed"));

        source_stats.push(SourceStats {
            source_type,
            unit_count: row.get("unit_count"),
            media_ref_count: row.get("media_ref_count"),
            embedded_count: row.get("embedded_count"),
            last_import_ts,
        });
    }

    if !source_stats.is_empty() {
        println!();
        println!("  By source:");
        println!(
            "  {:<16} {:>7} {:>7} {:>10}   {}",
            "SOURCE", "UNITS", "MEDIA", "EMBEDDED", "LAST IMPORT"
        );
        println!("  {}", "-".repeat(64));

        for s in &source_stats {
            let import_display = match s.last_import_ts {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            println!(
                "  {:<16} {:>7} {:>7} {:>10}   {}",
                s.source_type, s.unit_count, s.media_ref_count, s.embedded_count, import_display
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
