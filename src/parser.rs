//! Pluggable source parsers and the first-match registry.
//!
//! A parser turns one source (file or extracted directory) into normalized
//! [`ParseOutput`]: content units, media references, links, and per-item
//! errors. The registry holds parsers in registration order and runs the
//! first one whose capability check succeeds.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │             ParserRegistry               │
//! │  ┌──────────┐ ┌─────────┐ ┌───────────┐ │
//! │  │ markdown │ │ chatgpt │ │ facebook  │ │
//! │  └──────────┘ └─────────┘ └───────────┘ │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!        run_import() → job pipeline
//! ```

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::ParseOutput;

/// Per-run context handed to every parser.
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Detected (or caller-forced) source type, e.g. `"chatgpt"`.
    pub source_type: String,
    /// When set, unit URIs must be stable across re-imports of the same
    /// logical item (derived from source-native ids, not random).
    pub preserve_ids: bool,
}

/// A source-format parser.
///
/// Implementations are responsible for populating word/char counts through
/// [`crate::text`] so statistics stay comparable across formats, and for
/// honoring [`ParseContext::preserve_ids`] when assigning unit ids.
#[async_trait]
pub trait Parser: Send + Sync {
    /// Short format name, used in errors and provenance tags.
    fn name(&self) -> &str;

    /// Capability check: can this parser handle the given source path?
    /// Must be cheap; called for every registered parser in order.
    fn can_parse(&self, path: &Path) -> bool;

    /// Parse the source into normalized output. Item-level problems go
    /// into [`ParseOutput::errors`]; only unreadable-source conditions
    /// should surface as `Err`.
    async fn parse(&self, path: &Path, ctx: &ParseContext) -> Result<ParseOutput>;
}

/// Ordered parser registry; selection is first `can_parse` hit.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Registry pre-loaded with the built-in parsers. More specific
    /// checks (export layouts) come before the catch-all markdown parser.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::parser_chatgpt::ChatGptParser));
        registry.register(Box::new(crate::parser_facebook::FacebookParser));
        registry.register(Box::new(crate::parser_markdown::MarkdownParser));
        registry
    }

    pub fn register(&mut self, parser: Box<dyn Parser>) {
        self.parsers.push(parser);
    }

    /// First registered parser whose check accepts the path.
    pub fn find_for(&self, path: &Path) -> Option<&dyn Parser> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(path))
            .map(|p| p.as_ref())
    }

    /// Run the first matching parser. When none matches, returns
    /// `(None, empty output)` with an explicit "no parser found" error
    /// annotated, rather than failing — the caller decides severity.
    pub async fn parse_first(
        &self,
        path: &Path,
        ctx: &ParseContext,
    ) -> Result<(Option<String>, ParseOutput)> {
        match self.find_for(path) {
            Some(parser) => {
                let output = parser.parse(path, ctx).await?;
                Ok((Some(parser.name().to_string()), output))
            }
            None => {
                let mut output = ParseOutput::default();
                output
                    .errors
                    .push(format!("no parser found for source: {}", path.display()));
                Ok((None, output))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{content_uri, ContentUnit, UnitType};
    use crate::text;

    struct StubParser {
        name: &'static str,
        accept_ext: &'static str,
    }

    #[async_trait]
    impl Parser for StubParser {
        fn name(&self) -> &str {
            self.name
        }

        fn can_parse(&self, path: &Path) -> bool {
            path.extension().map(|e| e == self.accept_ext).unwrap_or(false)
        }

        async fn parse(&self, _path: &Path, ctx: &ParseContext) -> Result<ParseOutput> {
            let content = "stub".to_string();
            let unit = ContentUnit {
                id: "u1".into(),
                uri: content_uri(&ctx.source_type, UnitType::Document, "u1"),
                unit_type: UnitType::Document,
                source_type: ctx.source_type.clone(),
                content_hash: String::new(),
                word_count: text::word_count(&content),
                char_count: text::char_count(&content),
                content,
                parent_uri: None,
                position: None,
                depth: None,
                author: None,
                timestamp: None,
                metadata_json: "{}".into(),
            };
            Ok(ParseOutput {
                units: vec![unit],
                ..Default::default()
            })
        }
    }

    fn ctx() -> ParseContext {
        ParseContext {
            source_type: "stub".into(),
            preserve_ids: true,
        }
    }

    #[tokio::test]
    async fn first_match_wins_in_registration_order() {
        let mut registry = ParserRegistry::new();
        registry.register(Box::new(StubParser {
            name: "first",
            accept_ext: "md",
        }));
        registry.register(Box::new(StubParser {
            name: "second",
            accept_ext: "md",
        }));

        let (name, output) = registry
            .parse_first(Path::new("notes.md"), &ctx())
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("first"));
        assert_eq!(output.units.len(), 1);
    }

    #[tokio::test]
    async fn no_match_yields_annotated_empty_output() {
        let registry = ParserRegistry::new();
        let (name, output) = registry
            .parse_first(Path::new("mystery.bin"), &ctx())
            .await
            .unwrap();
        assert!(name.is_none());
        assert!(output.units.is_empty());
        assert_eq!(output.errors.len(), 1);
        assert!(output.errors[0].contains("no parser found"));
    }
}
