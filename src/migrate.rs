use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Content-addressed media index. The UNIQUE constraint on content_hash
    // is the deduplication guard: concurrent writers race to one row.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media_files (
            id TEXT PRIMARY KEY,
            content_hash TEXT NOT NULL UNIQUE,
            file_path TEXT NOT NULL,
            mime_type TEXT,
            file_size INTEGER NOT NULL,
            original_name TEXT,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_units (
            id TEXT PRIMARY KEY,
            uri TEXT NOT NULL UNIQUE,
            unit_type TEXT NOT NULL,
            source_type TEXT NOT NULL,
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            word_count INTEGER NOT NULL,
            char_count INTEGER NOT NULL,
            parent_uri TEXT,
            position INTEGER,
            depth INTEGER,
            author TEXT,
            timestamp INTEGER,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // content_unit_id -> content_hash rows; the transient MediaRef is
    // discarded once one of these exists.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media_references (
            id TEXT PRIMARY KEY,
            content_unit_id TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            reference_type TEXT NOT NULL,
            caption TEXT,
            position INTEGER,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Append-only edge store. Deliberately no uniqueness on
    // (source_uri, target_uri, link_type): repeated detection across runs
    // is multiplicity signal for read-time traversal.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_links (
            id TEXT PRIMARY KEY,
            source_uri TEXT NOT NULL,
            target_uri TEXT NOT NULL,
            link_type TEXT NOT NULL,
            label TEXT,
            created_by TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_jobs (
            id TEXT PRIMARY KEY,
            source_type TEXT NOT NULL,
            source_path TEXT NOT NULL,
            source_name TEXT NOT NULL,
            status TEXT NOT NULL,
            current_phase TEXT NOT NULL,
            progress REAL NOT NULL DEFAULT 0.0,
            units_total INTEGER NOT NULL DEFAULT 0,
            units_processed INTEGER NOT NULL DEFAULT 0,
            media_total INTEGER NOT NULL DEFAULT 0,
            media_processed INTEGER NOT NULL DEFAULT 0,
            links_created INTEGER NOT NULL DEFAULT 0,
            errors_count INTEGER NOT NULL DEFAULT 0,
            error_log TEXT NOT NULL DEFAULT '[]',
            started_at INTEGER NOT NULL,
            completed_at INTEGER
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS unit_vectors (
            unit_id TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_units_parent_uri ON content_units(parent_uri)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_units_source_type ON content_units(source_type)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_media_refs_unit ON media_references(content_unit_id)",
    )
    .execute(&pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_source ON content_links(source_uri)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_target ON content_links(target_uri)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_started_at ON import_jobs(started_at DESC)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
