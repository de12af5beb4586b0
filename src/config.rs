use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Where the content-addressed blob store and extraction workspaces live.
/// Sharded media lands under `<root>/media/`, job workspaces under
/// `<root>/extract/<job-id>/`.
#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    /// Extension allow-list for manifest building and directory scans.
    #[serde(default = "default_media_extensions")]
    pub extensions: Vec<String>,
    /// Glob patterns skipped while walking extracted trees.
    #[serde(default = "default_exclude_globs")]
    pub exclude_globs: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            extensions: default_media_extensions(),
            exclude_globs: default_exclude_globs(),
        }
    }
}

fn default_media_extensions() -> Vec<String> {
    [
        "jpg", "jpeg", "png", "gif", "webp", "heic", "bmp", "svg", "mp4", "mov", "webm", "mp3",
        "m4a", "wav", "ogg", "pdf",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_exclude_globs() -> Vec<String> {
    vec!["**/__MACOSX/**".to_string(), "**/.DS_Store".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.media.extensions.is_empty() {
        anyhow::bail!("media.extensions must not be empty");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("arv.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            tmp.path(),
            "[db]\npath = \"/tmp/a.sqlite\"\n\n[archive]\nroot = \"/tmp/archive\"\n",
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.embedding.provider, "disabled");
        assert!(cfg.media.extensions.iter().any(|e| e == "jpg"));
    }

    #[test]
    fn enabled_embedding_requires_model_and_dims() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            tmp.path(),
            "[db]\npath = \"/tmp/a.sqlite\"\n\n[archive]\nroot = \"/tmp/archive\"\n\n[embedding]\nprovider = \"openai\"\n",
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = write_config(
            tmp.path(),
            "[db]\npath = \"/tmp/a.sqlite\"\n\n[archive]\nroot = \"/tmp/archive\"\n\n[embedding]\nprovider = \"quantum\"\nmodel = \"m\"\ndims = 4\n",
        );
        assert!(load_config(&path).is_err());
    }
}
