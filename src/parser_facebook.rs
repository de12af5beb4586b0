//! Facebook data-export parser.
//!
//! Reads `your_posts_1.json` from an extracted Facebook dump. Each post
//! becomes a post unit; attachment media URIs are resolved relative to the
//! export root when the file survived extraction, otherwise the filename
//! (with its embedded numeric file id) is left for the pointer manifest.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{content_uri, ContentUnit, MediaRef, ParseOutput, ReferenceType, UnitType};
use crate::parser::{ParseContext, Parser};
use crate::text;

const POSTS_FILES: [&str; 2] = ["your_posts_1.json", "your_posts.json"];

pub struct FacebookParser;

fn posts_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        let name = path.file_name()?.to_string_lossy();
        return POSTS_FILES.contains(&name.as_ref()).then(|| path.to_path_buf());
    }
    for name in POSTS_FILES {
        for candidate in [path.join(name), path.join("posts").join(name)] {
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Attachment URIs are relative to the dump root, which is one level above
/// the `posts/` directory when the file lives inside it.
fn export_root(file: &Path) -> PathBuf {
    let parent = file.parent().unwrap_or(Path::new("."));
    if parent.file_name().map(|n| n == "posts").unwrap_or(false) {
        if let Some(grand) = parent.parent() {
            return grand.to_path_buf();
        }
    }
    parent.to_path_buf()
}

#[async_trait]
impl Parser for FacebookParser {
    fn name(&self) -> &str {
        "facebook"
    }

    fn can_parse(&self, path: &Path) -> bool {
        posts_file(path).is_some()
    }

    async fn parse(&self, path: &Path, ctx: &ParseContext) -> Result<ParseOutput> {
        let file = posts_file(path)
            .with_context(|| format!("posts file not found under {}", path.display()))?;
        let raw = std::fs::read_to_string(&file)
            .with_context(|| format!("unreadable export: {}", file.display()))?;
        let json: Value = serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON: {}", file.display()))?;

        // Some dump generations wrap the array in {"status_updates": [...]}.
        let posts = json
            .as_array()
            .or_else(|| json.get("status_updates").and_then(|v| v.as_array()))
            .context("posts file: expected an array or status_updates")?;

        let root = export_root(&file);
        let mut output = ParseOutput::default();
        for (idx, post) in posts.iter().enumerate() {
            if let Err(e) = parse_post(post, idx, &root, ctx, &mut output) {
                output.errors.push(format!("post #{} skipped: {}", idx, e));
            }
        }
        Ok(output)
    }
}

fn parse_post(
    post: &Value,
    idx: usize,
    root: &Path,
    ctx: &ParseContext,
    output: &mut ParseOutput,
) -> Result<()> {
    let timestamp = post.get("timestamp").and_then(|v| v.as_i64());

    let mut body = String::new();
    if let Some(data) = post.get("data").and_then(|v| v.as_array()) {
        for entry in data {
            if let Some(text) = entry.get("post").and_then(|v| v.as_str()) {
                if !body.is_empty() {
                    body.push('\n');
                }
                body.push_str(text);
            }
        }
    }
    let title = post.get("title").and_then(|v| v.as_str());
    if body.is_empty() {
        body = title.unwrap_or_default().to_string();
    }

    let attachments = collect_attachments(post);
    if body.is_empty() && attachments.is_empty() {
        anyhow::bail!("empty post");
    }

    // Posts carry no native id; timestamp + index is stable for a given
    // export generation.
    let id = if ctx.preserve_ids {
        format!("{}-{}", timestamp.unwrap_or(0), idx)
    } else {
        Uuid::new_v4().to_string()
    };

    let uri = content_uri(&ctx.source_type, UnitType::Post, &id);
    output.units.push(ContentUnit {
        id: id.clone(),
        uri,
        unit_type: UnitType::Post,
        source_type: ctx.source_type.clone(),
        content_hash: String::new(),
        word_count: text::word_count(&body),
        char_count: text::char_count(&body),
        parent_uri: None,
        position: Some(idx as i64),
        depth: None,
        author: None,
        timestamp,
        metadata_json: serde_json::json!({ "title": title }).to_string(),
        content: body,
    });

    for (a_idx, (uri_rel, caption)) in attachments.into_iter().enumerate() {
        let candidate = root.join(&uri_rel);
        output.media_refs.push(MediaRef {
            content_unit_id: id.clone(),
            source_path: candidate.is_file().then_some(candidate),
            original_pointer: None,
            size: None,
            filename: Path::new(&uri_rel)
                .file_name()
                .map(|n| n.to_string_lossy().to_string()),
            reference_type: ReferenceType::Attachment,
            caption,
            position: Some(a_idx as i64),
        });
    }

    Ok(())
}

/// `(relative uri, caption)` for every media attachment on a post.
fn collect_attachments(post: &Value) -> Vec<(String, Option<String>)> {
    let mut found = Vec::new();
    let Some(attachments) = post.get("attachments").and_then(|v| v.as_array()) else {
        return found;
    };
    for attachment in attachments {
        let Some(data) = attachment.get("data").and_then(|v| v.as_array()) else {
            continue;
        };
        for entry in data {
            let Some(media) = entry.get("media") else { continue };
            let Some(uri) = media.get("uri").and_then(|v| v.as_str()) else {
                continue;
            };
            let caption = media
                .get("description")
                .or_else(|| media.get("title"))
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string());
            found.push((uri.to_string(), caption));
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ParseContext {
        ParseContext {
            source_type: "facebook".into(),
            preserve_ids: true,
        }
    }

    fn sample_dump(root: &Path) {
        std::fs::create_dir_all(root.join("posts/media")).unwrap();
        std::fs::write(root.join("posts/media/12345678_987_n.jpg"), b"jpeg bytes").unwrap();
        let posts = serde_json::json!([
            {
                "timestamp": 1600000000,
                "data": [ { "post": "Hello from the beach" } ],
                "attachments": [ { "data": [ { "media": {
                    "uri": "posts/media/12345678_987_n.jpg",
                    "description": "beach"
                } } ] } ]
            },
            {
                "timestamp": 1600000100,
                "title": "Updated their status.",
                "data": []
            }
        ]);
        std::fs::write(
            root.join("posts/your_posts_1.json"),
            posts.to_string(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn parses_posts_and_resolves_attachment_paths() {
        let tmp = tempfile::TempDir::new().unwrap();
        sample_dump(tmp.path());

        let output = FacebookParser.parse(tmp.path(), &ctx()).await.unwrap();
        assert_eq!(output.units.len(), 2);
        assert_eq!(output.units[0].unit_type, UnitType::Post);
        assert_eq!(output.units[0].uri, "content://facebook/post/1600000000-0");

        assert_eq!(output.media_refs.len(), 1);
        let m = &output.media_refs[0];
        assert!(m.source_path.as_ref().unwrap().is_file());
        assert_eq!(m.caption.as_deref(), Some("beach"));
        assert_eq!(m.filename.as_deref(), Some("12345678_987_n.jpg"));
    }

    #[tokio::test]
    async fn missing_attachment_file_keeps_filename_for_resolution() {
        let tmp = tempfile::TempDir::new().unwrap();
        sample_dump(tmp.path());
        std::fs::remove_file(tmp.path().join("posts/media/12345678_987_n.jpg")).unwrap();

        let output = FacebookParser.parse(tmp.path(), &ctx()).await.unwrap();
        let m = &output.media_refs[0];
        assert!(m.source_path.is_none());
        assert_eq!(m.filename.as_deref(), Some("12345678_987_n.jpg"));
    }

    #[tokio::test]
    async fn empty_posts_are_item_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("your_posts_1.json"),
            serde_json::json!([ { "timestamp": 1 } ]).to_string(),
        )
        .unwrap();

        let output = FacebookParser.parse(tmp.path(), &ctx()).await.unwrap();
        assert!(output.units.is_empty());
        assert_eq!(output.errors.len(), 1);
    }
}
