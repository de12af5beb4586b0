//! Link graph store.
//!
//! Persists directed, typed edges between content URIs, independent of how
//! the units were produced. Edges are append-only and deliberately carry
//! no uniqueness constraint: the same edge re-detected across import runs
//! accumulates, and read-time traversal treats multiplicity as
//! link-strength signal.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::ContentLink;

pub async fn insert_link(pool: &SqlitePool, link: &ContentLink) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO content_links (id, source_uri, target_uri, link_type, label, created_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&link.source_uri)
    .bind(&link.target_uri)
    .bind(link.link_type.as_str())
    .bind(&link.label)
    .bind(&link.created_by)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// An edge as stored, with its type flattened to the persisted label.
#[derive(Debug, Clone)]
pub struct StoredLink {
    pub source_uri: String,
    pub target_uri: String,
    pub link_type: String,
    pub label: Option<String>,
    pub created_by: String,
}

/// All edges touching a URI, outgoing first.
pub async fn links_for(pool: &SqlitePool, uri: &str) -> Result<Vec<StoredLink>> {
    let rows = sqlx::query(
        r#"
        SELECT source_uri, target_uri, link_type, label, created_by
        FROM content_links
        WHERE source_uri = ? OR target_uri = ?
        ORDER BY source_uri = ? DESC, created_at ASC
        "#,
    )
    .bind(uri)
    .bind(uri)
    .bind(uri)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| StoredLink {
            source_uri: r.get("source_uri"),
            target_uri: r.get("target_uri"),
            link_type: r.get("link_type"),
            label: r.get("label"),
            created_by: r.get("created_by"),
        })
        .collect())
}

/// Run the links command: print every edge touching a URI.
pub async fn run_links(config: &crate::config::Config, uri: &str) -> Result<()> {
    let pool = crate::db::connect(config).await?;
    let edges = links_for(&pool, uri).await?;
    pool.close().await;

    if edges.is_empty() {
        println!("No links for {}", uri);
        return Ok(());
    }

    println!("Links for {}:", uri);
    for e in &edges {
        let arrow = if e.source_uri == uri { "->" } else { "<-" };
        let other = if e.source_uri == uri {
            &e.target_uri
        } else {
            &e.source_uri
        };
        match &e.label {
            Some(label) => println!("  {} {} {} [{}] ({})", arrow, e.link_type, other, label, e.created_by),
            None => println!("  {} {} {} ({})", arrow, e.link_type, other, e.created_by),
        }
    }
    Ok(())
}
