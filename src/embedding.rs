//! Embedding provider abstraction.
//!
//! The embedding phase is best-effort enrichment: the import pipeline
//! calls [`embed_units_inline`] after indexing, and any failure here is
//! logged without regressing the job below completed.
//!
//! Providers:
//! - **[`DisabledProvider`]** — returns errors; the default.
//! - **[`OpenAIProvider`]** — calls the OpenAI embeddings API with
//!   batching, retry, and exponential backoff (429/5xx/network retried,
//!   other 4xx fail immediately).

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::models::ContentUnit;

/// Trait for embedding providers. The actual computation is performed by
/// [`embed_texts`] (kept as a free function due to async trait
/// limitations).
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
}

/// A no-op provider that always errors; used when embeddings are not
/// configured.
pub struct DisabledProvider;

impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
}

/// Provider backed by `POST /v1/embeddings`. Requires `OPENAI_API_KEY`.
pub struct OpenAIProvider {
    model: String,
    dims: usize,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;

        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        Ok(Self { model, dims })
    }
}

impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embed a batch of texts using the configured provider.
pub async fn embed_texts(
    _provider: &dyn EmbeddingProvider,
    config: &EmbeddingConfig,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    match config.provider.as_str() {
        "openai" => embed_openai(config, texts).await,
        "disabled" => bail!("Embedding provider is disabled"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

async fn embed_openai(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

    let model = config
        .model
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("embedding.model required"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": model,
        "input": texts,
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1u64 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    return parse_openai_response(&json);
                }

                // Rate limited or server error, retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "OpenAI API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }

                // Client error (not 429), don't retry
                let body_text = response.text().await.unwrap_or_default();
                bail!("OpenAI API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
}

fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    Ok(embeddings)
}

/// Embed units in batches and upsert their vectors. Non-fatal: returns
/// `(embedded, failed)` counts and never errors past a batch.
pub async fn embed_units_inline(
    config: &EmbeddingConfig,
    pool: &SqlitePool,
    units: &[ContentUnit],
) -> (u64, u64) {
    let provider = match create_provider(config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Warning: embedding provider unavailable: {}", e);
            return (0, units.len() as u64);
        }
    };

    let mut embedded = 0u64;
    let mut failed = 0u64;

    for batch in units.chunks(config.batch_size) {
        let texts: Vec<String> = batch.iter().map(|u| u.content.clone()).collect();
        match embed_texts(provider.as_ref(), config, &texts).await {
            Ok(vectors) => {
                for (unit, vec) in batch.iter().zip(vectors.iter()) {
                    let blob = vec_to_blob(vec);
                    let result = sqlx::query(
                        r#"
                        INSERT INTO unit_vectors (unit_id, model, dims, embedding, updated_at)
                        VALUES (?, ?, ?, ?, ?)
                        ON CONFLICT(unit_id) DO UPDATE SET
                            model = excluded.model,
                            dims = excluded.dims,
                            embedding = excluded.embedding,
                            updated_at = excluded.updated_at
                        "#,
                    )
                    .bind(&unit.id)
                    .bind(provider.model_name())
                    .bind(provider.dims() as i64)
                    .bind(&blob)
                    .bind(chrono::Utc::now().timestamp())
                    .execute(pool)
                    .await;

                    match result {
                        Ok(_) => embedded += 1,
                        Err(e) => {
                            eprintln!("Warning: vector upsert failed: {}", e);
                            failed += 1;
                        }
                    }
                }
            }
            Err(e) => {
                eprintln!("Warning: embedding batch failed: {}", e);
                failed += batch.len() as u64;
            }
        }
    }

    (embedded, failed)
}

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }

    #[test]
    fn disabled_provider_reports_itself() {
        let provider = create_provider(&EmbeddingConfig::default()).unwrap();
        assert_eq!(provider.model_name(), "disabled");
        assert_eq!(provider.dims(), 0);
    }

    #[tokio::test]
    async fn disabled_provider_refuses_to_embed() {
        let config = EmbeddingConfig::default();
        let provider = create_provider(&config).unwrap();
        let err = embed_texts(provider.as_ref(), &config, &["x".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }
}
