//! ChatGPT export parser.
//!
//! Reads the `conversations.json` from an extracted ChatGPT data export.
//! Each conversation becomes a conversation unit; its messages become
//! message units parented under it, chained with `follows` links. Asset
//! pointers (`file-service://file-…`) inside message parts become media
//! references that the pointer manifest resolves later — the export never
//! stores media under the pointer name directly.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::models::{
    content_uri, ContentLink, ContentUnit, LinkType, MediaRef, ParseOutput, ReferenceType,
    UnitType,
};
use crate::parser::{ParseContext, Parser};
use crate::text;

pub struct ChatGptParser;

fn conversations_file(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        if path.file_name().map(|n| n == "conversations.json").unwrap_or(false) {
            return Some(path.to_path_buf());
        }
        return None;
    }
    let candidate = path.join("conversations.json");
    candidate.is_file().then_some(candidate)
}

#[async_trait]
impl Parser for ChatGptParser {
    fn name(&self) -> &str {
        "chatgpt"
    }

    fn can_parse(&self, path: &Path) -> bool {
        conversations_file(path).is_some()
    }

    async fn parse(&self, path: &Path, ctx: &ParseContext) -> Result<ParseOutput> {
        let file = conversations_file(path)
            .with_context(|| format!("conversations.json not found under {}", path.display()))?;
        let raw = std::fs::read_to_string(&file)
            .with_context(|| format!("unreadable export: {}", file.display()))?;
        let json: Value = serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON: {}", file.display()))?;

        let conversations = json
            .as_array()
            .context("conversations.json: expected a top-level array")?;

        let mut output = ParseOutput::default();
        for (idx, conv) in conversations.iter().enumerate() {
            if let Err(e) = parse_conversation(conv, idx, ctx, &mut output) {
                output
                    .errors
                    .push(format!("conversation #{} skipped: {}", idx, e));
            }
        }
        Ok(output)
    }
}

fn parse_conversation(
    conv: &Value,
    idx: usize,
    ctx: &ParseContext,
    output: &mut ParseOutput,
) -> Result<()> {
    let native_id = conv
        .get("conversation_id")
        .or_else(|| conv.get("id"))
        .and_then(|v| v.as_str());
    let conv_id = match (ctx.preserve_ids, native_id) {
        (true, Some(id)) => id.to_string(),
        _ => Uuid::new_v4().to_string(),
    };
    let title = conv
        .get("title")
        .and_then(|v| v.as_str())
        .unwrap_or("Untitled conversation")
        .to_string();
    let created = conv
        .get("create_time")
        .and_then(|v| v.as_f64())
        .map(|t| t as i64);

    let mapping = conv
        .get("mapping")
        .and_then(|v| v.as_object())
        .context("missing mapping")?;

    let conv_uri = content_uri(&ctx.source_type, UnitType::Conversation, &conv_id);
    output.units.push(ContentUnit {
        id: conv_id.clone(),
        uri: conv_uri.clone(),
        unit_type: UnitType::Conversation,
        source_type: ctx.source_type.clone(),
        content_hash: String::new(),
        word_count: text::word_count(&title),
        char_count: text::char_count(&title),
        parent_uri: None,
        position: Some(idx as i64),
        depth: Some(0),
        author: None,
        timestamp: created,
        metadata_json: serde_json::json!({ "title": title }).to_string(),
        content: title,
    });

    // Mapping order is arbitrary; message create_time gives the real
    // sequence.
    let mut messages: Vec<&Value> = mapping
        .values()
        .filter_map(|node| node.get("message"))
        .filter(|m| !m.is_null())
        .collect();
    messages.sort_by(|a, b| {
        let ta = a.get("create_time").and_then(|v| v.as_f64()).unwrap_or(0.0);
        let tb = b.get("create_time").and_then(|v| v.as_f64()).unwrap_or(0.0);
        ta.partial_cmp(&tb).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut prev_uri: Option<String> = None;
    let mut position: i64 = 0;
    for message in messages {
        let role = message
            .get("author")
            .and_then(|a| a.get("role"))
            .and_then(|r| r.as_str())
            .unwrap_or("unknown");
        // Tool/system plumbing nodes carry no user-visible content.
        if role == "system" {
            continue;
        }

        let (body, pointers) = message_content(message);
        if body.is_empty() && pointers.is_empty() {
            continue;
        }

        let native_msg_id = message.get("id").and_then(|v| v.as_str());
        let msg_id = match (ctx.preserve_ids, native_msg_id) {
            (true, Some(id)) => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        let msg_uri = content_uri(&ctx.source_type, UnitType::Message, &msg_id);
        let msg_time = message
            .get("create_time")
            .and_then(|v| v.as_f64())
            .map(|t| t as i64);

        output.units.push(ContentUnit {
            id: msg_id.clone(),
            uri: msg_uri.clone(),
            unit_type: UnitType::Message,
            source_type: ctx.source_type.clone(),
            content_hash: String::new(),
            word_count: text::word_count(&body),
            char_count: text::char_count(&body),
            parent_uri: Some(conv_uri.clone()),
            position: Some(position),
            depth: Some(1),
            author: Some(role.to_string()),
            timestamp: msg_time,
            metadata_json: "{}".to_string(),
            content: body,
        });

        output.links.push(ContentLink {
            source_uri: msg_uri.clone(),
            target_uri: conv_uri.clone(),
            link_type: LinkType::Parent,
            label: None,
            created_by: "chatgpt".to_string(),
        });
        if let Some(prev) = prev_uri.take() {
            output.links.push(ContentLink {
                source_uri: msg_uri.clone(),
                target_uri: prev,
                link_type: LinkType::Follows,
                label: None,
                created_by: "chatgpt".to_string(),
            });
        }
        prev_uri = Some(msg_uri);

        for (p_idx, (pointer, size)) in pointers.into_iter().enumerate() {
            output.media_refs.push(MediaRef {
                content_unit_id: msg_id.clone(),
                source_path: None,
                original_pointer: Some(pointer),
                size,
                filename: None,
                reference_type: if role == "assistant" {
                    ReferenceType::Generated
                } else {
                    ReferenceType::Upload
                },
                caption: None,
                position: Some(p_idx as i64),
            });
        }

        position += 1;
    }

    Ok(())
}

/// Flatten a message's content parts into text plus any asset pointers,
/// each paired with the byte size the export declares for it.
fn message_content(message: &Value) -> (String, Vec<(String, Option<u64>)>) {
    let mut body = String::new();
    let mut pointers = Vec::new();

    let parts = message
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array());
    let Some(parts) = parts else {
        return (body, pointers);
    };

    for part in parts {
        match part {
            Value::String(s) => {
                if !s.is_empty() {
                    if !body.is_empty() {
                        body.push('\n');
                    }
                    body.push_str(s);
                }
            }
            Value::Object(obj) => {
                if let Some(pointer) = obj.get("asset_pointer").and_then(|v| v.as_str()) {
                    let size = obj.get("size_bytes").and_then(|v| v.as_u64());
                    pointers.push((pointer.to_string(), size));
                }
            }
            _ => {}
        }
    }

    (body, pointers)
}
