//! Core data models used throughout Archivum.
//!
//! These types represent the normalized content units, media references,
//! links, and job records that flow through the import pipeline. Components
//! relate to each other only through identifiers (`content_hash`, `uri`,
//! `job_id`), never through shared in-memory references, so each store can
//! be restarted independently.

use std::path::PathBuf;

use serde::Serialize;

/// Kind of a normalized content unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitType {
    Document,
    Conversation,
    Message,
    Passage,
    Post,
    Comment,
}

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::Document => "document",
            UnitType::Conversation => "conversation",
            UnitType::Message => "message",
            UnitType::Passage => "passage",
            UnitType::Post => "post",
            UnitType::Comment => "comment",
        }
    }
}

/// How a media asset relates to its owning unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceType {
    Attachment,
    Embed,
    Generated,
    Upload,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Attachment => "attachment",
            ReferenceType::Embed => "embed",
            ReferenceType::Generated => "generated",
            ReferenceType::Upload => "upload",
        }
    }
}

/// Edge kind between two content URIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Parent,
    Child,
    Reference,
    Follows,
    RespondsTo,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Parent => "parent",
            LinkType::Child => "child",
            LinkType::Reference => "reference",
            LinkType::Follows => "follows",
            LinkType::RespondsTo => "responds_to",
        }
    }
}

/// Build a canonical `content://` URI.
///
/// The `content://` scheme is reserved for units produced by this crate;
/// sibling subsystems use `harvest://` and `arc://` and must not collide.
pub fn content_uri(source_type: &str, unit_type: UnitType, id: &str) -> String {
    format!("content://{}/{}/{}", source_type, unit_type.as_str(), id)
}

/// A normalized, atomic piece of imported content.
///
/// The `uri` is globally unique and immutable once assigned; `content_hash`
/// never changes for a given unit (content is replace-by-new-version,
/// never edited in place).
#[derive(Debug, Clone)]
pub struct ContentUnit {
    pub id: String,
    pub uri: String,
    pub unit_type: UnitType,
    pub source_type: String,
    pub content: String,
    /// SHA-256 of `content`; filled by the orchestrator if the parser
    /// leaves it empty.
    pub content_hash: String,
    pub word_count: i64,
    pub char_count: i64,
    pub parent_uri: Option<String>,
    pub position: Option<i64>,
    pub depth: Option<i64>,
    pub author: Option<String>,
    /// Unix seconds of the original content, when the source records one.
    pub timestamp: Option<i64>,
    pub metadata_json: String,
}

/// A reference from a content unit to a binary asset, produced by a parser
/// and consumed by the media-storage phase. Discarded once the bytes are in
/// the addressable store and a `media_references` row exists.
#[derive(Debug, Clone)]
pub struct MediaRef {
    pub content_unit_id: String,
    /// Location inside the extraction workspace, if the parser knows it.
    pub source_path: Option<PathBuf>,
    /// Legacy opaque reference (e.g. `file-service://file-…`) for the
    /// pointer manifest to resolve.
    pub original_pointer: Option<String>,
    /// Byte size declared by the source, used to match files whose names
    /// carry no usable token.
    pub size: Option<u64>,
    /// Filename hint for last-resort resolution.
    pub filename: Option<String>,
    pub reference_type: ReferenceType,
    pub caption: Option<String>,
    pub position: Option<i64>,
}

/// A directed, typed edge between two URIs. Append-only; duplicate edges
/// across import runs are permitted and read as link-strength signal.
#[derive(Debug, Clone)]
pub struct ContentLink {
    pub source_uri: String,
    pub target_uri: String,
    pub link_type: LinkType,
    pub label: Option<String>,
    pub created_by: String,
}

/// Outcome of storing one file in the addressable store.
///
/// For a fixed byte sequence, repeated stores return the same
/// `content_hash` and `file_path`, with `is_new = false` after the first.
#[derive(Debug, Clone)]
pub struct StoreResult {
    pub id: String,
    pub content_hash: String,
    /// Sharded path relative to the archive root,
    /// e.g. `media/ab/cd/abcd….jpg`.
    pub file_path: String,
    pub is_new: bool,
    pub file_size: i64,
    pub mime_type: Option<String>,
}

/// Everything one parser run produced for a source.
#[derive(Debug, Default)]
pub struct ParseOutput {
    pub units: Vec<ContentUnit>,
    pub media_refs: Vec<MediaRef>,
    pub links: Vec<ContentLink>,
    /// Per-item parser errors; accumulated on the job, never fatal.
    pub errors: Vec<String>,
}

/// Lifecycle state of an import job. Terminal once `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Extracting,
    Parsing,
    Indexing,
    Embedding,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Extracting => "extracting",
            JobStatus::Parsing => "parsing",
            JobStatus::Indexing => "indexing",
            JobStatus::Embedding => "embedding",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// Persisted job record, mutated only by the orchestrator.
#[derive(Debug, Clone)]
pub struct ImportJob {
    pub id: String,
    pub source_type: String,
    pub source_path: String,
    pub source_name: String,
    pub status: String,
    pub current_phase: String,
    pub progress: f64,
    pub units_total: i64,
    pub units_processed: i64,
    pub media_total: i64,
    pub media_processed: i64,
    pub links_created: i64,
    pub errors_count: i64,
    pub error_log: Vec<String>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
}

/// Caller-supplied import options; all independently togglable.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Override source-type detection (e.g. `"chatgpt"`).
    pub source_type: Option<String>,
    /// Human-readable name recorded on the job; defaults to the file name.
    pub source_name: Option<String>,
    pub skip_media: bool,
    pub skip_embeddings: bool,
    /// Preview: stop after parsing without persisting any item.
    pub dry_run: bool,
    /// Ask parsers for URIs stable across re-imports of the same item.
    pub preserve_ids: bool,
}

/// Final outcome of one import run. Partial success is a first-class
/// outcome: counts of what succeeded are always reported next to the
/// error list.
#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    pub job_id: String,
    pub status: String,
    pub units_created: u64,
    pub media_stored: u64,
    pub links_created: u64,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_uri_shape() {
        let uri = content_uri("chatgpt", UnitType::Conversation, "abc123");
        assert_eq!(uri, "content://chatgpt/conversation/abc123");
    }

    #[test]
    fn enum_labels() {
        assert_eq!(UnitType::Document.as_str(), "document");
        assert_eq!(LinkType::RespondsTo.as_str(), "responds_to");
        assert_eq!(ReferenceType::Attachment.as_str(), "attachment");
        assert_eq!(JobStatus::Completed.as_str(), "completed");
    }
}
