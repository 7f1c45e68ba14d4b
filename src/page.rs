//! Value types flowing through the ordering engine.

use crate::error::StrategyFailure;
use serde::{Deserialize, Serialize};

/// One physical page of the shuffled input.
///
/// `page_index` is the page's position in the shuffled file and never
/// changes, no matter how many reorderings are proposed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    pub page_index: usize,
    pub content: String,
}

impl PageContent {
    /// Wrap extracted texts, assigning `page_index` from input position.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Vec<PageContent> {
        texts
            .iter()
            .enumerate()
            .map(|(page_index, t)| PageContent {
                page_index,
                content: t.as_ref().to_string(),
            })
            .collect()
    }
}

/// A candidate order proposed by one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderingResult {
    /// Name of the producing strategy.
    pub method: String,
    /// Proposed order as a sequence of `page_index` values.
    pub order: Vec<usize>,
    /// Strategy-defined quality estimate in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Human-readable trace of how the order was reached.
    pub reasoning: Vec<String>,
    /// Per-position confidences aligned with `order`, when the strategy
    /// computes them (the semantic strategy does).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_confidences: Option<Vec<f64>>,
    /// Set when the strategy degraded to a zero-confidence result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<StrategyFailure>,
}

impl OrderingResult {
    pub fn new(
        method: impl Into<String>,
        order: Vec<usize>,
        confidence: f64,
        reasoning: Vec<String>,
    ) -> Self {
        Self {
            method: method.into(),
            order,
            confidence: clamp_confidence(confidence),
            reasoning,
            transition_confidences: None,
            failure: None,
        }
    }

    /// A zero-confidence identity result recording `failure`.
    pub fn degraded(
        method: impl Into<String>,
        page_count: usize,
        failure: StrategyFailure,
        mut reasoning: Vec<String>,
    ) -> Self {
        reasoning.push(failure.to_string());
        Self {
            method: method.into(),
            order: identity_order(page_count),
            confidence: 0.0,
            reasoning,
            transition_confidences: None,
            failure: Some(failure),
        }
    }

    pub fn with_transition_confidences(mut self, confidences: Vec<f64>) -> Self {
        self.transition_confidences =
            Some(confidences.into_iter().map(clamp_confidence).collect());
        self
    }

    /// True when `order` is a permutation of `0..page_count`.
    pub fn is_valid_for(&self, page_count: usize) -> bool {
        is_permutation(&self.order, page_count)
    }
}

/// The engine's answer for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalOrdering {
    /// Permutation of `0..n`.
    pub final_order: Vec<usize>,
    /// One confidence per position of `final_order`.
    pub confidences: Vec<f64>,
    /// Winning strategy, `None` when the identity fallback was used.
    pub method: Option<String>,
    /// Every result produced during this request, in priority order.
    pub outcomes: Vec<OrderingResult>,
}

impl FinalOrdering {
    /// Identity order with zero confidence everywhere.
    pub fn fallback(page_count: usize, outcomes: Vec<OrderingResult>) -> Self {
        Self {
            final_order: identity_order(page_count),
            confidences: vec![0.0; page_count],
            method: None,
            outcomes,
        }
    }

    pub fn average_confidence(&self) -> f64 {
        if self.confidences.is_empty() {
            0.0
        } else {
            self.confidences.iter().sum::<f64>() / self.confidences.len() as f64
        }
    }

    /// Split into the `(final_order, confidences)` pair.
    pub fn into_parts(self) -> (Vec<usize>, Vec<f64>) {
        (self.final_order, self.confidences)
    }
}

/// `[0, 1, …, n-1]`.
pub fn identity_order(page_count: usize) -> Vec<usize> {
    (0..page_count).collect()
}

/// True when `order` contains every value of `0..page_count` exactly once.
pub fn is_permutation(order: &[usize], page_count: usize) -> bool {
    if order.len() != page_count {
        return false;
    }
    let mut seen = vec![false; page_count];
    for &idx in order {
        if idx >= page_count || seen[idx] {
            return false;
        }
        seen[idx] = true;
    }
    true
}

/// Map NaN to zero and clamp into `[0, 1]`.
pub(crate) fn clamp_confidence(c: f64) -> f64 {
    if c.is_nan() {
        0.0
    } else {
        c.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutation_checks() {
        assert!(is_permutation(&[], 0));
        assert!(is_permutation(&[2, 0, 1], 3));
        assert!(!is_permutation(&[0, 0, 1], 3));
        assert!(!is_permutation(&[0, 1], 3));
        assert!(!is_permutation(&[0, 1, 3], 3));
    }

    #[test]
    fn from_texts_assigns_indices() {
        let pages = PageContent::from_texts(&["a", "b"]);
        assert_eq!(pages[0].page_index, 0);
        assert_eq!(pages[1].page_index, 1);
        assert_eq!(pages[1].content, "b");
    }

    #[test]
    fn confidence_is_clamped() {
        let r = OrderingResult::new("x", vec![0], 1.7, vec![]);
        assert_eq!(r.confidence, 1.0);
        let r = OrderingResult::new("x", vec![0], f64::NAN, vec![]);
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn degraded_result_is_identity_with_reason() {
        let r = OrderingResult::degraded(
            "semantic_similarity",
            3,
            StrategyFailure::Embedding {
                strategy: "semantic_similarity".into(),
                detail: "boom".into(),
            },
            vec![],
        );
        assert_eq!(r.order, vec![0, 1, 2]);
        assert_eq!(r.confidence, 0.0);
        assert!(r.reasoning[0].contains("boom"));
    }

    #[test]
    fn average_confidence_of_empty_is_zero() {
        let f = FinalOrdering::fallback(0, vec![]);
        assert_eq!(f.average_confidence(), 0.0);
    }
}
