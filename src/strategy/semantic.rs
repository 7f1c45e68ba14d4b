//! Content-only ordering by embedding similarity.
//!
//! The page least similar to the rest is taken as the cover; from there a
//! greedy walk always steps to the most similar unvisited page. Each edge's
//! similarity doubles as the confidence of the page it leads to, and the
//! first page's confidence is fixed at `1.0`.
//!
//! This is the one strategy that always yields a full permutation from
//! content alone, so it is the usual winner when pages carry no markers.

use super::{OrderingStrategy, StrategyKind};
use crate::error::StrategyFailure;
use crate::page::{OrderingResult, PageContent};
use crate::similarity::{Embedder, SimilarityMatrix};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct SemanticSimilarityStrategy {
    embedder: Option<Arc<dyn Embedder>>,
}

impl SemanticSimilarityStrategy {
    pub fn new(embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self { embedder }
    }

    /// Order from a precomputed matrix. Positions in `sim` correspond to
    /// positions in `pages`.
    pub fn order_from_matrix(&self, pages: &[PageContent], sim: &SimilarityMatrix) -> OrderingResult {
        let n = pages.len();
        let Some(start) = sim.outlier() else {
            return OrderingResult::new(self.name(), Vec::new(), 0.0, Vec::new());
        };
        let members: Vec<usize> = (0..n).collect();
        let (walk, edges) = sim.greedy_walk(start, &members);

        let mut reasoning = vec![format!(
            "Start: original page {} (lowest mean similarity {:.3})",
            pages[start].page_index,
            sim.mean_to_others(start)
        )];
        for (pair, score) in walk.windows(2).zip(&edges) {
            reasoning.push(format!(
                "{} → {} (similarity {:.3})",
                pages[pair[0]].page_index, pages[pair[1]].page_index, score
            ));
        }

        let mut transitions = Vec::with_capacity(n);
        transitions.push(1.0);
        transitions.extend(edges.iter().copied());
        let confidence = if edges.is_empty() {
            0.0
        } else {
            edges.iter().map(|e| e.clamp(0.0, 1.0)).sum::<f64>() / edges.len() as f64
        };
        debug!(
            "semantic: start {}, mean edge {:.3}",
            pages[start].page_index, confidence
        );

        let order = walk.into_iter().map(|pos| pages[pos].page_index).collect();
        OrderingResult::new(self.name(), order, confidence, reasoning)
            .with_transition_confidences(transitions)
    }
}

#[async_trait]
impl OrderingStrategy for SemanticSimilarityStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SemanticSimilarity
    }

    /// An embedder is configured and there are at least two pages.
    fn can_handle(&self, pages: &[PageContent]) -> bool {
        self.embedder.is_some() && pages.len() >= 2
    }

    async fn attempt_ordering(&self, pages: &[PageContent]) -> OrderingResult {
        let Some(embedder) = self.embedder.as_deref() else {
            return OrderingResult::degraded(
                self.name(),
                pages.len(),
                StrategyFailure::Embedding {
                    strategy: self.name().to_string(),
                    detail: "no embedder configured".into(),
                },
                Vec::new(),
            );
        };
        match SimilarityMatrix::compute(embedder, pages).await {
            Ok(sim) => self.order_from_matrix(pages, &sim),
            Err(e) => {
                let failure = StrategyFailure::Embedding {
                    strategy: self.name().to_string(),
                    detail: e.to_string(),
                };
                warn!("{}", failure);
                OrderingResult::degraded(self.name(), pages.len(), failure, Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReorderError;
    use crate::page::is_permutation;
    use crate::similarity::LexicalEmbedder;

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn name(&self) -> &str {
            "failing"
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ReorderError> {
            Err(ReorderError::EmbeddingFailed {
                detail: "model not loaded".into(),
            })
        }
    }

    fn matrix(rows: Vec<Vec<f64>>) -> SimilarityMatrix {
        SimilarityMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn similar_pair_stays_adjacent() {
        let s = SemanticSimilarityStrategy::new(None);
        let pages = PageContent::from_texts(&["A", "B", "C"]);
        let sim = matrix(vec![
            vec![1.0, 0.95, 0.1],
            vec![0.95, 1.0, 0.1],
            vec![0.1, 0.1, 1.0],
        ]);
        let r = s.order_from_matrix(&pages, &sim);
        assert!(is_permutation(&r.order, 3));
        // C is the outlier and starts; A and B follow together.
        assert_eq!(r.order, vec![2, 0, 1]);
        let t = r.transition_confidences.unwrap();
        assert_eq!(t[0], 1.0);
        assert!((t[2] - 0.95).abs() < 1e-9);
        assert!((r.confidence - (0.1 + 0.95) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn ties_break_to_lowest_index() {
        let s = SemanticSimilarityStrategy::new(None);
        let pages = PageContent::from_texts(&["a", "b", "c"]);
        let sim = matrix(vec![
            vec![1.0, 0.5, 0.5],
            vec![0.5, 1.0, 0.5],
            vec![0.5, 0.5, 1.0],
        ]);
        assert_eq!(s.order_from_matrix(&pages, &sim).order, vec![0, 1, 2]);
    }

    #[test]
    fn needs_embedder_and_two_pages() {
        let none = SemanticSimilarityStrategy::new(None);
        let some = SemanticSimilarityStrategy::new(Some(Arc::new(LexicalEmbedder::default())));
        let two = PageContent::from_texts(&["a", "b"]);
        assert!(!none.can_handle(&two));
        assert!(!some.can_handle(&two[..1]));
        assert!(!some.can_handle(&[]));
        assert!(some.can_handle(&two));
    }

    #[tokio::test]
    async fn empty_pages_are_kept() {
        let s = SemanticSimilarityStrategy::new(Some(Arc::new(LexicalEmbedder::default())));
        let pages = PageContent::from_texts(&["loan terms", "", "loan terms and interest", "  "]);
        let r = s.attempt_ordering(&pages).await;
        assert!(is_permutation(&r.order, 4));
        assert_eq!(r.transition_confidences.as_ref().map(Vec::len), Some(4));
    }

    #[tokio::test]
    async fn embedding_failure_degrades() {
        let s = SemanticSimilarityStrategy::new(Some(Arc::new(FailingEmbedder)));
        let pages = PageContent::from_texts(&["a", "b"]);
        let r = s.attempt_ordering(&pages).await;
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.order, vec![0, 1]);
        assert!(matches!(r.failure, Some(StrategyFailure::Embedding { .. })));
        assert!(r.reasoning.iter().any(|l| l.contains("model not loaded")));
    }
}
