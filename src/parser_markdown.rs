//! Markdown / plain-text parser.
//!
//! Handles a single `.md`/`.markdown`/`.txt` file or a directory of them.
//! Each text file becomes one document unit. Media files sitting in the
//! same tree become attachment references on the first document; images
//! embedded with `![caption](path)` become embed references on the
//! document that embeds them.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::models::{content_uri, ContentUnit, MediaRef, ParseOutput, ReferenceType, UnitType};
use crate::parser::{ParseContext, Parser};
use crate::text;

const TEXT_EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .map(|e| {
            let e = e.to_string_lossy().to_lowercase();
            TEXT_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

fn is_media_file(path: &Path) -> bool {
    path.extension()
        .map(|e| {
            let e = e.to_string_lossy().to_lowercase();
            crate::config::MediaConfig::default()
                .extensions
                .iter()
                .any(|allowed| *allowed == e)
        })
        .unwrap_or(false)
}

pub struct MarkdownParser;

#[async_trait]
impl Parser for MarkdownParser {
    fn name(&self) -> &str {
        "markdown"
    }

    fn can_parse(&self, path: &Path) -> bool {
        if path.is_file() {
            return is_text_file(path);
        }
        if path.is_dir() {
            return WalkDir::new(path)
                .into_iter()
                .flatten()
                .any(|e| e.file_type().is_file() && is_text_file(e.path()));
        }
        false
    }

    async fn parse(&self, path: &Path, ctx: &ParseContext) -> Result<ParseOutput> {
        let mut output = ParseOutput::default();

        if path.is_file() {
            parse_file(path, path.parent().unwrap_or(path), ctx, &mut output);
            return Ok(output);
        }

        let mut text_files: Vec<PathBuf> = Vec::new();
        let mut media_files: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(path) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    output.errors.push(format!("walk error: {}", e));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let p = entry.path().to_path_buf();
            if is_text_file(&p) {
                text_files.push(p);
            } else if is_media_file(&p) {
                media_files.push(p);
            }
        }
        // Deterministic unit order regardless of walk order.
        text_files.sort();
        media_files.sort();

        for file in &text_files {
            parse_file(file, path, ctx, &mut output);
        }

        // Loose media files belong to the directory's lead document.
        if let Some(owner) = output.units.first().map(|u| u.id.clone()) {
            for (idx, media) in media_files.iter().enumerate() {
                output.media_refs.push(MediaRef {
                    content_unit_id: owner.clone(),
                    source_path: Some(media.clone()),
                    original_pointer: None,
                    size: None,
                    filename: media
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string()),
                    reference_type: ReferenceType::Attachment,
                    caption: None,
                    position: Some(idx as i64),
                });
            }
        } else {
            for media in &media_files {
                output
                    .errors
                    .push(format!("no owning document for media: {}", media.display()));
            }
        }

        Ok(output)
    }
}

fn parse_file(file: &Path, root: &Path, ctx: &ParseContext, output: &mut ParseOutput) {
    let content = match std::fs::read_to_string(file) {
        Ok(c) => c,
        Err(e) => {
            output
                .errors
                .push(format!("unreadable text file {}: {}", file.display(), e));
            return;
        }
    };

    let relative = file.strip_prefix(root).unwrap_or(file);
    let id = if ctx.preserve_ids {
        slug(&relative.with_extension("").to_string_lossy())
    } else {
        Uuid::new_v4().to_string()
    };

    let timestamp = std::fs::metadata(file)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64);

    let unit = ContentUnit {
        uri: content_uri(&ctx.source_type, UnitType::Document, &id),
        unit_type: UnitType::Document,
        source_type: ctx.source_type.clone(),
        content_hash: String::new(),
        word_count: text::word_count(&content),
        char_count: text::char_count(&content),
        parent_uri: None,
        position: None,
        depth: None,
        author: None,
        timestamp,
        metadata_json: serde_json::json!({ "relative_path": relative.to_string_lossy() })
            .to_string(),
        id: id.clone(),
        content: content.clone(),
    };
    output.units.push(unit);

    for (idx, (caption, target)) in embedded_images(&content).into_iter().enumerate() {
        let resolved = file.parent().unwrap_or(root).join(&target);
        output.media_refs.push(MediaRef {
            content_unit_id: id.clone(),
            source_path: resolved.exists().then_some(resolved),
            original_pointer: None,
            size: None,
            filename: Path::new(&target)
                .file_name()
                .map(|n| n.to_string_lossy().to_string()),
            reference_type: ReferenceType::Embed,
            caption: (!caption.is_empty()).then_some(caption),
            position: Some(idx as i64),
        });
    }
}

/// `![caption](target)` occurrences, in document order. Remote targets
/// (anything with a scheme) are skipped; only local files can be stored.
fn embedded_images(content: &str) -> Vec<(String, String)> {
    let mut found = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find("![") {
        rest = &rest[start + 2..];
        let Some(cap_end) = rest.find(']') else { break };
        if !rest[cap_end..].starts_with("](") {
            continue;
        }
        let caption = rest[..cap_end].to_string();
        let after = &rest[cap_end + 2..];
        let Some(tgt_end) = after.find(')') else { break };
        let target = after[..tgt_end].trim().to_string();
        rest = &after[tgt_end + 1..];
        if target.is_empty() || target.contains("://") {
            continue;
        }
        found.push((caption, target));
    }
    found
}

fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_dash = true;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ParseContext {
        ParseContext {
            source_type: "markdown".into(),
            preserve_ids: true,
        }
    }

    #[tokio::test]
    async fn single_file_yields_one_document() {
        let tmp = tempfile::TempDir::new().unwrap();
        let file = tmp.path().join("alpha.md");
        std::fs::write(&file, "# Alpha\n\nTwo short paragraphs here.").unwrap();

        let output = MarkdownParser.parse(&file, &ctx()).await.unwrap();
        assert_eq!(output.units.len(), 1);
        let unit = &output.units[0];
        assert_eq!(unit.uri, "content://markdown/document/alpha");
        assert_eq!(unit.word_count, 6);
        assert!(output.errors.is_empty());
    }

    #[tokio::test]
    async fn directory_attaches_loose_media_to_lead_document() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("doc.md"), "hello world").unwrap();
        std::fs::write(tmp.path().join("a.png"), b"img-1").unwrap();
        std::fs::write(tmp.path().join("b.png"), b"img-1").unwrap();

        let output = MarkdownParser.parse(tmp.path(), &ctx()).await.unwrap();
        assert_eq!(output.units.len(), 1);
        assert_eq!(output.media_refs.len(), 2);
        assert!(output
            .media_refs
            .iter()
            .all(|m| m.content_unit_id == output.units[0].id));
    }

    #[tokio::test]
    async fn embedded_image_becomes_embed_ref() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("pic.png"), b"bytes").unwrap();
        let file = tmp.path().join("doc.md");
        std::fs::write(&file, "Intro\n\n![a sunset](pic.png)\n").unwrap();

        let output = MarkdownParser.parse(&file, &ctx()).await.unwrap();
        assert_eq!(output.media_refs.len(), 1);
        let m = &output.media_refs[0];
        assert_eq!(m.reference_type, ReferenceType::Embed);
        assert_eq!(m.caption.as_deref(), Some("a sunset"));
        assert!(m.source_path.as_ref().unwrap().exists());
    }

    #[test]
    fn remote_images_are_skipped() {
        let imgs = embedded_images("![x](https://example.com/i.png) ![y](local.png)");
        assert_eq!(imgs.len(), 1);
        assert_eq!(imgs[0].1, "local.png");
    }

    #[test]
    fn slug_is_stable_and_clean() {
        assert_eq!(slug("notes/Alpha Beta"), "notes-alpha-beta");
        assert_eq!(slug("2023_01_02-log"), "2023-01-02-log");
    }
}
