//! Page embeddings and pairwise cosine similarity.
//!
//! The semantic strategy orders pages purely from this signal; the
//! page-number and business-logic strategies borrow it to place pages their
//! own markers cannot pin down.
//!
//! ## Embedders
//!
//! | Type | Source | When |
//! |------|--------|------|
//! | [`ProviderEmbedder`] | edgequake-llm `EmbeddingProvider` (OpenAI, Gemini, …) | an API key is configured |
//! | `LocalEmbedder` | fastembed `all-MiniLM-L6-v2` | feature `local-embeddings` |
//! | [`LexicalEmbedder`] | hashed term frequencies, no model | opt-in offline fallback |
//!
//! All embedders must return one row per input text and be deterministic for
//! identical input.

use crate::error::ReorderError;
use crate::page::PageContent;
use async_trait::async_trait;
use edgequake_llm::EmbeddingProvider;
use std::sync::Arc;
use tracing::debug;

/// Placeholder embedded in place of pages with no text, so page count is
/// preserved.
pub const EMPTY_PAGE_SENTINEL: &str = "[empty page]";

/// Turns texts into fixed-width vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Short identifier for logs and reasoning.
    fn name(&self) -> &str;

    /// Embed `texts`, one row per input.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ReorderError>;
}

/// Cosine similarity; zero when either vector has zero norm or widths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

/// Dense n×n similarity matrix indexed by `page_index`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    n: usize,
    values: Vec<f64>,
}

impl SimilarityMatrix {
    /// Build from embedding rows.
    pub fn from_embeddings(rows: &[Vec<f32>]) -> Self {
        let n = rows.len();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            values[i * n + i] = 1.0;
            for j in (i + 1)..n {
                let s = cosine_similarity(&rows[i], &rows[j]);
                values[i * n + j] = s;
                values[j * n + i] = s;
            }
        }
        Self { n, values }
    }

    /// Build from a full row-major matrix. Returns `None` when not square.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Option<Self> {
        let n = rows.len();
        if rows.iter().any(|r| r.len() != n) {
            return None;
        }
        Some(Self {
            n,
            values: rows.into_iter().flatten().collect(),
        })
    }

    /// Embed every page and build the matrix.
    ///
    /// Empty pages are embedded as [`EMPTY_PAGE_SENTINEL`]. Fails when the
    /// embedder errors or returns the wrong number of rows or ragged widths.
    pub async fn compute(
        embedder: &dyn Embedder,
        pages: &[PageContent],
    ) -> Result<Self, ReorderError> {
        let texts: Vec<String> = pages
            .iter()
            .map(|p| {
                if p.content.trim().is_empty() {
                    EMPTY_PAGE_SENTINEL.to_string()
                } else {
                    p.content.clone()
                }
            })
            .collect();

        let rows = embedder.embed(&texts).await?;
        if rows.len() != pages.len() {
            return Err(ReorderError::EmbeddingFailed {
                detail: format!(
                    "{} returned {} vectors for {} pages",
                    embedder.name(),
                    rows.len(),
                    pages.len()
                ),
            });
        }
        if let Some(first) = rows.first() {
            if first.is_empty() || rows.iter().any(|r| r.len() != first.len()) {
                return Err(ReorderError::EmbeddingFailed {
                    detail: format!("{} returned ragged or empty vectors", embedder.name()),
                });
            }
        }
        debug!(
            "Embedded {} pages with {} ({} dims)",
            rows.len(),
            embedder.name(),
            rows.first().map(|r| r.len()).unwrap_or(0)
        );
        Ok(Self::from_embeddings(&rows))
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    /// Mean similarity of `i` to every other page (diagonal excluded).
    pub fn mean_to_others(&self, i: usize) -> f64 {
        if self.n < 2 {
            return 0.0;
        }
        let sum: f64 = (0..self.n).filter(|&j| j != i).map(|j| self.get(i, j)).sum();
        sum / (self.n - 1) as f64
    }

    /// The page least similar to the rest (presumed cover), ties → lowest index.
    pub fn outlier(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for i in 0..self.n {
            let m = self.mean_to_others(i);
            match best {
                Some((_, b)) if m >= b => {}
                _ => best = Some((i, m)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// The candidate most similar to `from`, ties → lowest index.
    pub fn nearest(&self, from: usize, candidates: &[usize]) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for &j in candidates {
            let s = self.get(from, j);
            match best {
                Some((bj, b)) if s < b || (s == b && j > bj) => {}
                _ => best = Some((j, s)),
            }
        }
        best
    }

    /// Greedy nearest-neighbour walk from `start` over `members`.
    ///
    /// Returns the visiting order (starting with `start`) and the similarity
    /// of each edge taken (one fewer than the order length).
    pub fn greedy_walk(&self, start: usize, members: &[usize]) -> (Vec<usize>, Vec<f64>) {
        let mut order = vec![start];
        let mut edges = Vec::with_capacity(members.len());
        let mut remaining: Vec<usize> = members.iter().copied().filter(|&m| m != start).collect();
        remaining.sort_unstable();
        remaining.dedup();

        while !remaining.is_empty() {
            let cur = order[order.len() - 1];
            let Some((next, score)) = self.nearest(cur, &remaining) else {
                break;
            };
            order.push(next);
            edges.push(score);
            remaining.retain(|&r| r != next);
        }
        (order, edges)
    }
}

// ── Lexical embedder ─────────────────────────────────────────────────────

/// Model-free embedder: hashed, log-scaled term frequencies, L2-normalised.
///
/// Much weaker than a sentence model but deterministic, instant and
/// available offline.
#[derive(Debug, Clone)]
pub struct LexicalEmbedder {
    dimensions: usize,
}

impl LexicalEmbedder {
    pub const DEFAULT_DIMENSIONS: usize = 512;

    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(16),
        }
    }

    /// Embed a single text synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for token in tokens(text) {
            let bucket = (fnv1a(token.as_bytes()) % self.dimensions as u64) as usize;
            v[bucket] += 1.0;
        }
        for x in v.iter_mut() {
            if *x > 0.0 {
                *x = 1.0 + x.ln();
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for LexicalEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl Embedder for LexicalEmbedder {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ReorderError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(|t| t.to_lowercase())
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

// ── Remote embedder (edgequake-llm) ─────────────────────────────────────

/// Adapter over an edgequake-llm [`EmbeddingProvider`].
pub struct ProviderEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ReorderError> {
        self.provider
            .embed(texts)
            .await
            .map_err(|e| ReorderError::EmbeddingFailed {
                detail: format!("{e}"),
            })
    }
}

// ── Local embedder (fastembed) ───────────────────────────────────────────

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use super::Embedder;
    use crate::error::ReorderError;
    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Arc;
    use tracing::info;

    /// Sentence embeddings computed in-process with fastembed.
    ///
    /// The model is downloaded on first use and cached by fastembed.
    /// Inference is CPU-bound, so it runs on the blocking pool.
    pub struct LocalEmbedder {
        model: Arc<TextEmbedding>,
        model_name: String,
    }

    impl LocalEmbedder {
        /// Load the named model. Only `all-MiniLM-L6-v2` variants are mapped.
        pub fn try_new(model_name: &str) -> Result<Self, ReorderError> {
            let model = match model_name.to_ascii_lowercase().as_str() {
                "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
                    EmbeddingModel::AllMiniLML6V2
                }
                other => {
                    return Err(ReorderError::EmbeddingFailed {
                        detail: format!("unsupported local embedding model '{other}'"),
                    })
                }
            };
            let embedding = TextEmbedding::try_new(InitOptions::new(model)).map_err(|e| {
                ReorderError::EmbeddingFailed {
                    detail: format!("failed to load '{model_name}': {e}"),
                }
            })?;
            info!("Embedding model '{}' loaded", model_name);
            Ok(Self {
                model: Arc::new(embedding),
                model_name: model_name.to_string(),
            })
        }
    }

    #[async_trait]
    impl Embedder for LocalEmbedder {
        fn name(&self) -> &str {
            &self.model_name
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ReorderError> {
            let model = Arc::clone(&self.model);
            let owned = texts.to_vec();
            tokio::task::spawn_blocking(move || {
                let refs: Vec<&str> = owned.iter().map(String::as_str).collect();
                model.embed(refs, None)
            })
            .await
            .map_err(|e| ReorderError::Internal(format!("Embedding task panicked: {e}")))?
            .map_err(|e| ReorderError::EmbeddingFailed {
                detail: format!("{e}"),
            })
        }
    }
}
