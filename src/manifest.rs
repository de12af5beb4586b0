//! Pointer resolution manifest.
//!
//! Archive exports reference media through opaque, source-specific
//! identifiers (a blob-store pointer like `file-service://file-…`, or a
//! bare numeric file id) that stop meaning anything once the archive is
//! extracted. The manifest reconstructs the hash-keyed address space from
//! the extracted files themselves: one walk over the tree hashes every
//! recognized media file and fills four independent lookup maps.
//!
//! Built once per extraction workspace, then read-only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::MediaConfig;
use crate::hash;

/// Lookup tables mapping legacy references to content hashes, plus the
/// extracted source path for each hash so a resolved reference can still
/// be stored.
#[derive(Debug, Default)]
pub struct PointerManifest {
    by_pointer: HashMap<String, String>,
    by_file_id: HashMap<String, String>,
    by_size: HashMap<u64, Vec<String>>,
    by_filename: HashMap<String, String>,
    paths: HashMap<String, PathBuf>,
}

impl PointerManifest {
    /// Resolve a legacy reference to a content hash, trying strategies in
    /// strict priority order. The first strategy that *matches* decides:
    /// an ambiguous size match that filename cannot break gives up rather
    /// than falling through to a weaker strategy.
    ///
    /// `None` means "media unresolved" — callers log and skip, never fail.
    pub fn resolve(
        &self,
        pointer: Option<&str>,
        size: Option<u64>,
        filename: Option<&str>,
    ) -> Option<String> {
        // 1. Exact opaque-pointer match (highest confidence).
        if let Some(p) = pointer {
            if let Some(token) = pointer_token(p) {
                if let Some(hash) = self.by_pointer.get(&token) {
                    return Some(hash.clone());
                }
            }
        }

        // 2. Exact numeric-id match, from the pointer or the filename.
        for candidate in [pointer, filename].into_iter().flatten() {
            if let Some(id) = numeric_file_id(candidate) {
                if let Some(hash) = self.by_file_id.get(&id) {
                    return Some(hash.clone());
                }
            }
        }

        // 3. Size match, only when unambiguous; filename breaks ties.
        if let Some(s) = size {
            if let Some(candidates) = self.by_size.get(&s) {
                if candidates.len() == 1 {
                    return Some(candidates[0].clone());
                }
                if let Some(f) = filename {
                    if let Some(hash) = self.by_filename.get(&f.to_lowercase()) {
                        if candidates.contains(hash) {
                            return Some(hash.clone());
                        }
                    }
                }
                return None;
            }
        }

        // 4. Filename-only match, last resort.
        if let Some(f) = filename {
            if let Some(hash) = self.by_filename.get(&f.to_lowercase()) {
                return Some(hash.clone());
            }
        }

        None
    }

    /// Extracted location of a resolved hash, for handing to the store.
    pub fn source_path(&self, content_hash: &str) -> Option<&Path> {
        self.paths.get(content_hash).map(|p| p.as_path())
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn insert_file(&mut self, path: &Path, content_hash: String, size: u64) {
        let filename = match path.file_name() {
            Some(n) => n.to_string_lossy().to_string(),
            None => return,
        };
        let stem = filename
            .rsplit_once('.')
            .map(|(s, _)| s)
            .unwrap_or(&filename);

        if let Some(token) = pointer_token(stem) {
            self.by_pointer
                .entry(token)
                .or_insert_with(|| content_hash.clone());
        }
        if let Some(id) = numeric_file_id(stem) {
            self.by_file_id
                .entry(id)
                .or_insert_with(|| content_hash.clone());
        }
        let sizes = self.by_size.entry(size).or_default();
        if !sizes.contains(&content_hash) {
            sizes.push(content_hash.clone());
        }
        self.by_filename
            .entry(filename.to_lowercase())
            .or_insert_with(|| content_hash.clone());
        self.paths.insert(content_hash, path.to_path_buf());
    }
}

/// Normalized opaque-pointer token (`file-<alnum>`), parsed out of a
/// filename stem or a `file-service://` reference. Underscore and dash
/// separators are folded together, since exports use both spellings.
fn pointer_token(s: &str) -> Option<String> {
    let s = s.strip_prefix("file-service://").unwrap_or(s);
    let rest = s
        .strip_prefix("file-")
        .or_else(|| s.strip_prefix("file_"))?;
    let id: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if id.is_empty() {
        return None;
    }
    Some(format!("file-{}", id))
}

/// First digit run of length >= 6 in a name; the numeric-id syntax social
/// exports use for media files.
fn numeric_file_id(s: &str) -> Option<String> {
    let mut run = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() {
            run.push(c);
        } else {
            if run.len() >= 6 {
                return Some(run);
            }
            run.clear();
        }
    }
    if run.len() >= 6 {
        return Some(run);
    }
    None
}

/// Walk an extracted tree once and build the manifest from every file
/// whose extension is on the media allow-list.
pub fn build_manifest(dir: &Path, media: &MediaConfig) -> Result<PointerManifest> {
    let exclude_set = build_globset(&media.exclude_globs)?;
    let mut manifest = PointerManifest::default();

    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        if exclude_set.is_match(relative.to_string_lossy().as_ref()) {
            continue;
        }

        let ext = match path.extension().map(|e| e.to_string_lossy().to_lowercase()) {
            Some(e) => e,
            None => continue,
        };
        if !media.extensions.iter().any(|allowed| *allowed == ext) {
            continue;
        }

        let content_hash = hash::hash_file(path)?;
        let size = std::fs::metadata(path)?.len();
        manifest.insert_file(path, content_hash, size);
    }

    Ok(manifest)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaConfig;

    fn build_fixture(files: &[(&str, &[u8])]) -> (tempfile::TempDir, PointerManifest) {
        let tmp = tempfile::TempDir::new().unwrap();
        for (name, bytes) in files {
            let path = tmp.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, bytes).unwrap();
        }
        let manifest = build_manifest(tmp.path(), &MediaConfig::default()).unwrap();
        (tmp, manifest)
    }

    #[test]
    fn pointer_token_parsing() {
        assert_eq!(
            pointer_token("file-AbC123xyz-photo"),
            Some("file-AbC123xyz".to_string())
        );
        assert_eq!(
            pointer_token("file_0000abcd"),
            Some("file-0000abcd".to_string())
        );
        assert_eq!(
            pointer_token("file-service://file-XYZ789"),
            Some("file-XYZ789".to_string())
        );
        assert_eq!(pointer_token("photo-123"), None);
        assert_eq!(pointer_token("file-"), None);
    }

    #[test]
    fn numeric_id_parsing() {
        assert_eq!(
            numeric_file_id("12345678_987654321_n"),
            Some("12345678".to_string())
        );
        assert_eq!(numeric_file_id("img_123"), None);
        assert_eq!(numeric_file_id("994412"), Some("994412".to_string()));
    }

    #[test]
    fn build_indexes_media_files_only() {
        let (_tmp, manifest) = build_fixture(&[
            ("a/photo.png", b"png-bytes"),
            ("notes.txt", b"not media"),
        ]);
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn pointer_match_beats_size_match() {
        // Same size for both files; only one carries the pointer syntax.
        let (_tmp, manifest) = build_fixture(&[
            ("file-AAAA1111-img.png", b"12345"),
            ("other.png", b"54321"),
        ]);
        let expected = hash::hash_bytes(b"12345");
        let got = manifest.resolve(Some("file-service://file-AAAA1111"), Some(5), None);
        assert_eq!(got, Some(expected));
    }

    #[test]
    fn size_match_requires_single_candidate() {
        let (_tmp, manifest) =
            build_fixture(&[("one.png", b"aaaaa"), ("two.png", b"bbbbb")]);
        // Two distinct hashes share size 5: ambiguous without a filename.
        assert_eq!(manifest.resolve(None, Some(5), None), None);
        // Filename breaks the tie.
        let expected = hash::hash_bytes(b"bbbbb");
        assert_eq!(
            manifest.resolve(None, Some(5), Some("two.png")),
            Some(expected)
        );
    }

    #[test]
    fn unique_size_matches_without_filename() {
        let (_tmp, manifest) =
            build_fixture(&[("one.png", b"aaaaa"), ("two.png", b"bbbbbbb")]);
        let expected = hash::hash_bytes(b"aaaaa");
        assert_eq!(manifest.resolve(None, Some(5), None), Some(expected));
    }

    #[test]
    fn filename_is_last_resort_and_case_insensitive() {
        let (_tmp, manifest) = build_fixture(&[("Vacation.JPG", b"some image")]);
        let expected = hash::hash_bytes(b"some image");
        assert_eq!(
            manifest.resolve(None, None, Some("vacation.jpg")),
            Some(expected)
        );
    }

    #[test]
    fn unresolved_returns_none() {
        let (_tmp, manifest) = build_fixture(&[("a.png", b"bytes")]);
        assert_eq!(manifest.resolve(Some("file-ZZZZ"), Some(999), Some("nope.png")), None);
    }

    #[test]
    fn source_path_available_for_resolved_hash() {
        let (_tmp, manifest) = build_fixture(&[("a.png", b"bytes")]);
        let h = hash::hash_bytes(b"bytes");
        assert!(manifest.source_path(&h).is_some());
    }
}
