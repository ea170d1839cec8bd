//! Embedding-based tool retrieval.
//!
//! The index embeds every catalog description once, lazily, on the first
//! lookup. Construction is single-flight: concurrent first callers share one
//! build, and every later lookup reads the built index without locking.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::catalog::{ToolCatalog, ToolDescriptor};
use crate::llm::Embedder;

struct BuiltIndex {
    /// One vector per descriptor, in catalog order.
    vectors: Vec<Vec<f32>>,
}

/// Vector index over tool descriptions, shared process-wide.
pub struct ToolIndex {
    catalog: Arc<ToolCatalog>,
    embedder: Arc<dyn Embedder>,
    built: OnceCell<BuiltIndex>,
}

impl ToolIndex {
    pub fn new(catalog: Arc<ToolCatalog>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            catalog,
            embedder,
            built: OnceCell::new(),
        }
    }

    /// Find the catalog descriptor whose description best matches the query.
    ///
    /// Returns `None` iff the catalog is empty. Ties are broken by catalog
    /// order (first-loaded wins).
    ///
    /// # Errors
    ///
    /// Fails when the embedding capability is unavailable; no tool can be
    /// selected for any query until it recovers.
    pub async fn find_best(&self, query: &str) -> anyhow::Result<Option<(ToolDescriptor, f32)>> {
        if self.catalog.is_empty() {
            return Ok(None);
        }

        let built = self
            .built
            .get_or_try_init(|| self.build())
            .await?;

        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Embedder returned no vector for query"))?;

        let mut best: Option<(usize, f32)> = None;
        for (i, vector) in built.vectors.iter().enumerate() {
            let score = cosine_similarity(&query_vec, vector);
            // Strict comparison keeps the first-loaded descriptor on ties.
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((i, score)),
            }
        }

        Ok(best.and_then(|(i, score)| {
            self.catalog
                .get(i)
                .map(|descriptor| (descriptor.clone(), score))
        }))
    }

    async fn build(&self) -> anyhow::Result<BuiltIndex> {
        let descriptions: Vec<String> = self
            .catalog
            .tools()
            .iter()
            .map(|t| t.description.clone())
            .collect();

        info!("Building tool index over {} description(s)", descriptions.len());
        let vectors = self.embedder.embed(&descriptions).await?;
        if vectors.len() != descriptions.len() {
            anyhow::bail!(
                "Embedder returned {} vectors for {} descriptions",
                vectors.len(),
                descriptions.len()
            );
        }

        Ok(BuiltIndex { vectors })
    }
}

/// Cosine similarity in [-1, 1]; 0.0 for zero-length or mismatched vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
