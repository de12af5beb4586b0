//! Source-type detection and archive extraction.
//!
//! Detection is extension-first: text extensions map straight to the
//! markdown source, `.json` and `.zip` get a lightweight content sniff to
//! pick the export sub-type, and directories are sniffed by their layout.
//! Zip sources are extracted into a per-job workspace under the archive
//! root before parsing; entries are bounded and traversal-checked.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::import::ImportError;

/// Decompression bound per zip entry. Anything larger than this inside a
/// personal-archive export is suspect.
const MAX_ENTRY_BYTES: u64 = 1024 * 1024 * 1024;

/// Where parsing should start after detection, plus the extraction
/// workspace when the source was an archive container.
#[derive(Debug)]
pub struct Detected {
    pub source_type: String,
    pub parse_root: PathBuf,
    pub workspace: Option<PathBuf>,
}

/// Detect the source type of `path` and, for archives, extract into
/// `workspace_dir`. A caller-supplied `override_type` skips inference but
/// not extraction or the basic readability checks.
pub fn detect_source(
    path: &Path,
    override_type: Option<&str>,
    workspace_dir: &Path,
) -> Result<Detected, ImportError> {
    let meta = std::fs::metadata(path)
        .map_err(|e| ImportError::SourceIo(format!("{}: {}", path.display(), e)))?;
    if meta.is_file() && meta.len() == 0 {
        return Err(ImportError::SourceIo(format!(
            "{}: source file is empty",
            path.display()
        )));
    }

    if meta.is_dir() {
        let source_type = match override_type {
            Some(t) => t.to_string(),
            None => sniff_dir(path)?,
        };
        return Ok(Detected {
            source_type,
            parse_root: path.to_path_buf(),
            workspace: None,
        });
    }

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "md" | "markdown" | "txt" => Ok(Detected {
            source_type: override_type.unwrap_or("markdown").to_string(),
            parse_root: path.to_path_buf(),
            workspace: None,
        }),
        "json" => {
            let source_type = match override_type {
                Some(t) => t.to_string(),
                None => sniff_json(path)?,
            };
            Ok(Detected {
                source_type,
                parse_root: path.to_path_buf(),
                workspace: None,
            })
        }
        "zip" => {
            let source_type = match override_type {
                Some(t) => t.to_string(),
                None => sniff_zip(path)?,
            };
            extract_zip(path, workspace_dir)?;
            Ok(Detected {
                source_type,
                parse_root: workspace_dir.to_path_buf(),
                workspace: Some(workspace_dir.to_path_buf()),
            })
        }
        other => match override_type {
            Some(t) => Ok(Detected {
                source_type: t.to_string(),
                parse_root: path.to_path_buf(),
                workspace: None,
            }),
            None => Err(ImportError::UnrecognizedSource(format!(
                "unknown extension '.{}' for {}",
                other,
                path.display()
            ))),
        },
    }
}

fn sniff_dir(path: &Path) -> Result<String, ImportError> {
    if path.join("conversations.json").is_file() {
        return Ok("chatgpt".to_string());
    }
    for posts in ["your_posts_1.json", "your_posts.json"] {
        if path.join(posts).is_file() || path.join("posts").join(posts).is_file() {
            return Ok("facebook".to_string());
        }
    }
    let has_content = walkdir::WalkDir::new(path)
        .into_iter()
        .flatten()
        .any(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .map(|x| {
                        let x = x.to_string_lossy().to_lowercase();
                        matches!(x.as_str(), "md" | "markdown" | "txt")
                            || crate::store::mime_for_extension(&x)
                                .map(|m| !m.starts_with("text/"))
                                .unwrap_or(false)
                    })
                    .unwrap_or(false)
        });
    if has_content {
        return Ok("markdown".to_string());
    }
    Err(ImportError::UnrecognizedSource(format!(
        "directory has no recognizable content: {}",
        path.display()
    )))
}

/// Distinguish export JSONs by a head sniff; a ChatGPT dump always carries
/// a "mapping" object near the top of each conversation.
fn sniff_json(path: &Path) -> Result<String, ImportError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    if name == "conversations.json" {
        return Ok("chatgpt".to_string());
    }
    if name.starts_with("your_posts") {
        return Ok("facebook".to_string());
    }

    let mut head = vec![0u8; 8192];
    let mut file = std::fs::File::open(path)
        .map_err(|e| ImportError::SourceIo(format!("{}: {}", path.display(), e)))?;
    let n = file
        .read(&mut head)
        .map_err(|e| ImportError::SourceIo(format!("{}: {}", path.display(), e)))?;
    let head = String::from_utf8_lossy(&head[..n]);
    if head.contains("\"mapping\"") {
        return Ok("chatgpt".to_string());
    }
    if head.contains("\"attachments\"") || head.contains("\"status_updates\"") {
        return Ok("facebook".to_string());
    }
    Err(ImportError::UnrecognizedSource(format!(
        "unrecognized JSON layout: {}",
        path.display()
    )))
}

fn sniff_zip(path: &Path) -> Result<String, ImportError> {
    let file = std::fs::File::open(path)
        .map_err(|e| ImportError::SourceIo(format!("{}: {}", path.display(), e)))?;
    let archive = zip::ZipArchive::new(file)
        .map_err(|e| ImportError::SourceIo(format!("{}: {}", path.display(), e)))?;

    let mut names = archive.file_names();
    if names.any(|n| n == "conversations.json" || n.ends_with("/conversations.json")) {
        return Ok("chatgpt".to_string());
    }
    let mut names = archive.file_names();
    if names.any(|n| n.contains("your_posts") || n.starts_with("posts/")) {
        return Ok("facebook".to_string());
    }
    Err(ImportError::UnrecognizedSource(format!(
        "unrecognized archive layout: {}",
        path.display()
    )))
}

/// Extract an archive into the job workspace. Entry paths are validated
/// against traversal and each entry is size-bounded.
pub fn extract_zip(path: &Path, dest: &Path) -> Result<(), ImportError> {
    let file = std::fs::File::open(path)
        .map_err(|e| ImportError::SourceIo(format!("{}: {}", path.display(), e)))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ImportError::SourceIo(format!("{}: {}", path.display(), e)))?;

    std::fs::create_dir_all(dest)
        .map_err(|e| ImportError::SourceIo(format!("{}: {}", dest.display(), e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ImportError::SourceIo(format!("{}: {}", path.display(), e)))?;
        let Some(rel) = entry.enclosed_name() else {
            // Traversal attempt; skip the entry rather than the archive.
            continue;
        };
        let out_path = dest.join(rel);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)
                .map_err(|e| ImportError::SourceIo(format!("{}: {}", out_path.display(), e)))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ImportError::SourceIo(format!("{}: {}", parent.display(), e)))?;
        }
        let mut out = std::fs::File::create(&out_path)
            .map_err(|e| ImportError::SourceIo(format!("{}: {}", out_path.display(), e)))?;
        let copied = std::io::copy(&mut (&mut entry).take(MAX_ENTRY_BYTES), &mut out)
            .map_err(|e| ImportError::SourceIo(format!("{}: {}", out_path.display(), e)))?;
        if copied >= MAX_ENTRY_BYTES {
            return Err(ImportError::SourceIo(format!(
                "archive entry exceeds size limit: {}",
                entry.name()
            )));
        }
    }

    Ok(())
}
