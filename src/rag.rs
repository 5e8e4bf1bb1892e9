// src/rag.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::catalog::{self, CatalogEntry};
use crate::config::EmbeddingConfig;
use crate::textnorm;

#[derive(Debug)]
pub enum EmbedError {
    Http(String),
    Status(u16, String),
    Mismatch { expected: usize, got: usize },
}

impl fmt::Display for EmbedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbedError::Http(e) => write!(f, "embedding request failed: {e}"),
            EmbedError::Status(code, body) => write!(f, "embedding API error {code}: {body}"),
            EmbedError::Mismatch { expected, got } => {
                write!(f, "embedding count mismatch: expected {expected}, got {got}")
            }
        }
    }
}

impl std::error::Error for EmbedError {}

/// Sentence-embedding capability: one vector per input text.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Client for an Ollama-compatible `/api/embed` endpoint. Inputs are
/// sent in batches; the response length is validated per batch.
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    batch_size: usize,
}

impl OllamaEmbedder {
    pub fn new(cfg: &EmbeddingConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            batch_size: cfg.batch_size.max(1),
        })
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let request = EmbedRequest {
            model: &self.model,
            input: batch,
        };
        let url = format!("{}/api/embed", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbedError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Status(status.as_u16(), body));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Http(e.to_string()))?;
        if parsed.embeddings.len() != batch.len() {
            return Err(EmbedError::Mismatch {
                expected: batch.len(),
                got: parsed.embeddings.len(),
            });
        }
        Ok(parsed.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// In-memory retrieval index over the NCM catalog. Entries and the
/// embedding matrix share length and index alignment; both are
/// read-only after construction, so the index can be shared across
/// concurrent batches without locking.
pub struct NcmIndex {
    entries: Vec<CatalogEntry>,
    embeddings: Vec<Vec<f32>>,
    embedder: Arc<dyn Embedder>,
}

impl NcmIndex {
    /// Embed every catalog row's cleaned short description. This is the
    /// dominant one-time cost of the process.
    pub async fn build(
        entries: Vec<CatalogEntry>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, EmbedError> {
        let cleaned: Vec<String> = entries
            .iter()
            .map(|e| textnorm::clean_for_retrieval(&e.short_description))
            .collect();

        info!(rows = entries.len(), "embedding NCM catalog, this can take a while");
        let start = Instant::now();
        let embeddings = if cleaned.is_empty() {
            Vec::new()
        } else {
            embedder.embed(&cleaned).await?
        };
        info!(
            rows = entries.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "catalog embeddings ready"
        );

        Ok(Self {
            entries,
            embeddings,
            embedder,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top-k catalog entries by cosine similarity against the cleaned
    /// query. Ordering is non-increasing similarity; ties keep catalog
    /// row order (stable sort). Returns fewer than `k` entries only
    /// when the catalog itself is smaller.
    pub async fn find_top_k(&self, query: &str, k: usize) -> Result<Vec<CatalogEntry>, EmbedError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let cleaned = textnorm::clean_for_retrieval(query);
        let query_vecs = self.embedder.embed(&[cleaned]).await?;
        let query_vec = query_vecs.first().ok_or(EmbedError::Mismatch {
            expected: 1,
            got: 0,
        })?;

        let mut scored: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(i, emb)| (i, cosine(query_vec, emb)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, _)| self.entries[i].clone())
            .collect())
    }
}

/// Process-wide index registry, keyed by catalog source path. The
/// async mutex is the one-time initialization barrier: the first
/// caller builds the index (catalog load + embedding) while any
/// concurrent batch waits, and every later caller gets the shared
/// read-only `Arc`.
static INDEXES: LazyLock<Mutex<HashMap<String, Arc<NcmIndex>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

pub async fn shared_index(
    catalog_path: &str,
    embedder: Arc<dyn Embedder>,
) -> Result<Arc<NcmIndex>, Box<dyn std::error::Error>> {
    let mut indexes = INDEXES.lock().await;
    if let Some(index) = indexes.get(catalog_path) {
        return Ok(Arc::clone(index));
    }

    let entries = catalog::load_catalog(catalog_path)?;
    if entries.is_empty() {
        warn!(path = %catalog_path, "catalog is empty, retrieval will fail every item");
    }
    let index = Arc::new(NcmIndex::build(entries, embedder).await?);
    indexes.insert(catalog_path.to_string(), Arc::clone(&index));
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic fake: each text maps to counts of 'a', 'b', 'c'.
    pub(crate) struct CountingEmbedder;

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            Ok(texts
                .iter()
                .map(|t| {
                    ['a', 'b', 'c']
                        .iter()
                        .map(|c| t.chars().filter(|x| x == c).count() as f32)
                        .collect()
                })
                .collect())
        }
    }

    fn entry(ncm: &str, short: &str) -> CatalogEntry {
        CatalogEntry {
            ncm: ncm.to_string(),
            short_description: short.to_string(),
            long_description: format!("long {short}"),
        }
    }

    async fn index(entries: Vec<CatalogEntry>) -> NcmIndex {
        NcmIndex::build(entries, Arc::new(CountingEmbedder))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn results_are_ordered_by_similarity() {
        let idx = index(vec![
            entry("00000001", "ccc"),
            entry("00000002", "abab"),
            entry("00000003", "aaaa"),
        ])
        .await;

        let top = idx.find_top_k("aaaa", 3).await.unwrap();
        assert_eq!(top[0].ncm, "00000003"); // identical direction
        assert_eq!(top[1].ncm, "00000002"); // partial overlap
        assert_eq!(top[2].ncm, "00000001"); // orthogonal

        // non-increasing similarity, recomputed independently
        let q = vec![4.0, 0.0, 0.0];
        let sims: Vec<f32> = top
            .iter()
            .map(|e| {
                let v = ['a', 'b', 'c']
                    .iter()
                    .map(|c| {
                        e.short_description
                            .chars()
                            .filter(|x| x == c)
                            .count() as f32
                    })
                    .collect::<Vec<f32>>();
                cosine(&q, &v)
            })
            .collect();
        assert!(sims.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn k_larger_than_catalog_returns_everything() {
        let idx = index(vec![entry("00000001", "aa"), entry("00000002", "bb")]).await;
        let top = idx.find_top_k("aa", 10).await.unwrap();
        assert_eq!(top.len(), 2);
    }

    #[tokio::test]
    async fn ties_preserve_catalog_row_order() {
        let idx = index(vec![
            entry("00000001", "ab"),
            entry("00000002", "ab"),
            entry("00000003", "ab"),
        ])
        .await;
        let top = idx.find_top_k("ab", 3).await.unwrap();
        let ncms: Vec<&str> = top.iter().map(|e| e.ncm.as_str()).collect();
        assert_eq!(ncms, ["00000001", "00000002", "00000003"]);
    }

    #[tokio::test]
    async fn empty_catalog_returns_no_candidates() {
        let idx = index(vec![]).await;
        assert!(idx.is_empty());
        assert!(idx.find_top_k("anything", 5).await.unwrap().is_empty());
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }
}
