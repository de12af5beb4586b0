//! Content-addressable media store.
//!
//! Files are keyed by the SHA-256 of their bytes and written once into a
//! two-level sharded directory under the archive root:
//! `media/<hash[0:2]>/<hash[2:4]>/<hash><original-extension>`. The
//! `media_files` index row carries a UNIQUE constraint on the hash, so the
//! store is idempotent: identical bytes from any number of source files
//! produce exactly one physical copy and one index row, even under
//! concurrent jobs.
//!
//! The file copy and the index write are not a single transaction. A crash
//! in between leaves an orphan blob; re-running `store` for the same bytes
//! re-indexes it without writing a duplicate, because existence is keyed by
//! digest.

use std::fmt;
use std::path::{Path, PathBuf};

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::hash;
use crate::models::StoreResult;

/// Store failure, split the way the job pipeline needs it: source-side
/// errors are job-visible I/O problems, destination-side errors mean the
/// item is skipped and logged while the job continues.
#[derive(Debug)]
pub enum StoreError {
    /// Source file missing or unreadable.
    Source(String),
    /// Destination write or index write failed (disk full, permissions).
    Destination(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Source(e) => write!(f, "source unreadable: {}", e),
            StoreError::Destination(e) => write!(f, "store write failed: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Static extension → MIME table. Unknown extensions yield `None`; the
/// file is stored regardless.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        _ => return None,
    };
    Some(mime)
}

/// Extension of a filename, verbatim including the leading dot.
/// `None` for extensionless names and dotfiles.
fn extension_of(name: &str) -> Option<&str> {
    match name.rfind('.') {
        Some(idx) if idx > 0 => Some(&name[idx..]),
        _ => None,
    }
}

/// Sharded path relative to the archive root for a given digest.
pub fn shard_rel_path(content_hash: &str, extension: Option<&str>) -> String {
    format!(
        "media/{}/{}/{}{}",
        &content_hash[0..2],
        &content_hash[2..4],
        content_hash,
        extension.unwrap_or("")
    )
}

/// Handle on the blob store: archive root on disk plus the SQLite index.
pub struct MediaStore {
    root: PathBuf,
    pool: SqlitePool,
}

impl MediaStore {
    pub fn new(root: PathBuf, pool: SqlitePool) -> Self {
        Self { root, pool }
    }

    /// Store one file. Streams the digest, then copies the bytes only if
    /// this hash has never been seen. Repeated calls with identical
    /// content return the same record with `is_new = false`.
    pub async fn store(
        &self,
        path: &Path,
        original_name: Option<&str>,
    ) -> Result<StoreResult, StoreError> {
        let content_hash = hash::hash_file(path)
            .map_err(|e| StoreError::Source(format!("{}: {}", path.display(), e)))?;
        let file_size = std::fs::metadata(path)
            .map_err(|e| StoreError::Source(format!("{}: {}", path.display(), e)))?
            .len() as i64;

        if let Some(existing) = self
            .find_by_hash(&content_hash)
            .await
            .map_err(|e| StoreError::Destination(e.to_string()))?
        {
            return Ok(existing);
        }

        let name = original_name
            .map(|n| n.to_string())
            .or_else(|| path.file_name().map(|n| n.to_string_lossy().to_string()))
            .unwrap_or_default();
        let extension = extension_of(&name).map(|e| e.to_string());
        let mime_type = extension
            .as_deref()
            .and_then(|e| mime_for_extension(e.trim_start_matches('.')));

        let rel_path = shard_rel_path(&content_hash, extension.as_deref());
        let abs_path = self.root.join(&rel_path);

        if let Some(parent) = abs_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Destination(format!("{}: {}", parent.display(), e)))?;
        }
        // Two jobs may race on the same destination; writing identical
        // bytes to the same addressed path twice is a no-op in effect.
        if !abs_path.exists() {
            std::fs::copy(path, &abs_path)
                .map_err(|e| StoreError::Destination(format!("{}: {}", abs_path.display(), e)))?;
        }

        let id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO media_files (id, content_hash, file_path, mime_type, file_size, original_name, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(content_hash) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(&content_hash)
        .bind(&rel_path)
        .bind(mime_type)
        .bind(file_size)
        .bind(&name)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Destination(e.to_string()))?;

        // Re-read the winning row: a concurrent writer may have beaten us
        // to the UNIQUE slot, in which case this call did not create it.
        let winner = self
            .find_by_hash(&content_hash)
            .await
            .map_err(|e| StoreError::Destination(e.to_string()))?
            .ok_or_else(|| StoreError::Destination("index row vanished after upsert".into()))?;

        Ok(StoreResult {
            is_new: winner.id == id,
            ..winner
        })
    }

    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<StoreResult>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, content_hash, file_path, mime_type, file_size FROM media_files WHERE content_hash = ?",
        )
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| StoreResult {
            id: r.get("id"),
            content_hash: r.get("content_hash"),
            file_path: r.get("file_path"),
            is_new: false,
            file_size: r.get("file_size"),
            mime_type: r.get("mime_type"),
        }))
    }
}

/// Run the store command: add one file to the addressable store directly,
/// outside of any import job.
pub async fn run_store(config: &crate::config::Config, path: &Path) -> anyhow::Result<()> {
    let pool = crate::db::connect(config).await?;
    let store = MediaStore::new(config.archive.root.clone(), pool.clone());
    let result = store
        .store(path, None)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    pool.close().await;

    println!(
        "{} {} ({} bytes)",
        if result.is_new { "stored" } else { "duplicate" },
        result.content_hash,
        result.file_size
    );
    println!("  {}", result.file_path);
    Ok(())
}
