//! Ordering by explicit page-number markers.
//!
//! Patterns are tried in priority order and the first match whose number
//! lies in `1..=n` pins the page to slot `number - 1`. Pages without a
//! usable marker fill the remaining slots, guided by similarity to their
//! neighbours when an embedder is available.
//!
//! ## Collisions
//!
//! When two pages claim the same number, the later page keeps it and the
//! earlier one is demoted to unnumbered. Each collision is reported in the
//! reasoning and costs one page's worth of confidence: the demoted page no
//! longer counts as resolved.

use super::{OrderingStrategy, StrategyKind};
use crate::error::StrategyFailure;
use crate::page::{OrderingResult, PageContent};
use crate::similarity::{Embedder, SimilarityMatrix};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

struct NumberPattern {
    label: &'static str,
    regex: Regex,
}

/// Page-number forms, highest priority first.
static PATTERNS: Lazy<Vec<NumberPattern>> = Lazy::new(|| {
    vec![
        NumberPattern {
            label: "Page X of Y",
            regex: Regex::new(r"(?i)\bpage\s+(\d{1,5})\s+of\s+\d{1,5}\b").unwrap(),
        },
        NumberPattern {
            label: "Page: X",
            regex: Regex::new(r"(?i)\bpage\s*:\s*(\d{1,5})\b").unwrap(),
        },
        NumberPattern {
            label: "- X -",
            regex: Regex::new(r"(?m)^\s*[-–—]\s*(\d{1,5})\s*[-–—]\s*$").unwrap(),
        },
        NumberPattern {
            label: "bare number",
            regex: Regex::new(r"(?m)^\s*(\d{1,5})\s*$").unwrap(),
        },
    ]
});

/// Find the page number printed on `content`, if any lies in `1..=page_count`.
pub fn detect_page_number(content: &str, page_count: usize) -> Option<(usize, &'static str)> {
    for pattern in PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(content) {
            if let Ok(num) = caps[1].parse::<usize>() {
                if (1..=page_count).contains(&num) {
                    return Some((num, pattern.label));
                }
            }
        }
    }
    None
}

/// Orders pages by their printed page numbers.
pub struct PageNumberStrategy {
    embedder: Option<Arc<dyn Embedder>>,
}

impl PageNumberStrategy {
    pub fn new(embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self { embedder }
    }
}

/// Slot assignment before gap filling, in page positions.
struct Assignment {
    slots: Vec<Option<usize>>,
    unnumbered: Vec<usize>,
    collisions: usize,
    reasoning: Vec<String>,
}

fn assign_numbers(pages: &[PageContent]) -> Assignment {
    let n = pages.len();
    let mut slots: Vec<Option<usize>> = vec![None; n];
    let mut unnumbered = Vec::new();
    let mut collisions = 0;
    let mut reasoning = Vec::new();

    for (pos, page) in pages.iter().enumerate() {
        match detect_page_number(&page.content, n) {
            Some((num, label)) => {
                reasoning.push(format!(
                    "Original page {} carries page number {} ('{}')",
                    page.page_index, num, label
                ));
                if let Some(prev) = slots[num - 1].replace(pos) {
                    collisions += 1;
                    reasoning.push(format!(
                        "Collision: original pages {} and {} both claim page number {}; keeping {}, treating {} as unnumbered",
                        pages[prev].page_index, page.page_index, num, page.page_index, pages[prev].page_index
                    ));
                    unnumbered.push(prev);
                }
            }
            None => unnumbered.push(pos),
        }
    }
    unnumbered.sort_unstable();

    Assignment {
        slots,
        unnumbered,
        collisions,
        reasoning,
    }
}

/// Mean similarity of `page` to the filled slots immediately left and right
/// of `slot`. Empty neighbours do not contribute.
fn adjacency_score(
    slots: &[Option<usize>],
    slot: usize,
    page: usize,
    sim: &SimilarityMatrix,
) -> f64 {
    let left = slot.checked_sub(1).and_then(|s| slots[s]);
    let right = slots.get(slot + 1).copied().flatten();
    let scores: Vec<f64> = [left, right]
        .into_iter()
        .flatten()
        .map(|neighbour| sim.get(page, neighbour))
        .collect();
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

/// Fill empty slots with `unnumbered` pages, each taking its best-scoring slot.
fn fill_by_similarity(
    slots: &mut [Option<usize>],
    unnumbered: &[usize],
    sim: &SimilarityMatrix,
    pages: &[PageContent],
    reasoning: &mut Vec<String>,
) {
    for &page in unnumbered {
        let mut best: Option<(usize, f64)> = None;
        for slot in (0..slots.len()).filter(|&s| slots[s].is_none()) {
            let score = adjacency_score(slots, slot, page, sim);
            match best {
                Some((_, b)) if score <= b => {}
                _ => best = Some((slot, score)),
            }
        }
        if let Some((slot, score)) = best {
            slots[slot] = Some(page);
            reasoning.push(format!(
                "Placed unnumbered original page {} at position {} (adjacency {:.2})",
                pages[page].page_index, slot, score
            ));
        }
    }
}

fn fill_in_index_order(slots: &mut [Option<usize>], unnumbered: &[usize]) {
    let mut rest = unnumbered.iter();
    for slot in slots.iter_mut().filter(|s| s.is_none()) {
        *slot = rest.next().copied();
    }
}

#[async_trait]
impl OrderingStrategy for PageNumberStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PageNumber
    }

    fn can_handle(&self, pages: &[PageContent]) -> bool {
        let n = pages.len();
        if n == 0 {
            return false;
        }
        let detected = pages
            .iter()
            .filter(|p| detect_page_number(&p.content, n).is_some())
            .count();
        detected * 2 > n
    }

    async fn attempt_ordering(&self, pages: &[PageContent]) -> OrderingResult {
        let n = pages.len();
        let Assignment {
            mut slots,
            unnumbered,
            collisions,
            mut reasoning,
        } = assign_numbers(pages);

        let resolved = slots.iter().filter(|s| s.is_some()).count();
        reasoning.push(format!("{}/{} pages resolved by explicit numbering", resolved, n));

        if !unnumbered.is_empty() {
            let sim = match self.embedder.as_deref() {
                Some(embedder) => match SimilarityMatrix::compute(embedder, pages).await {
                    Ok(m) => Some(m),
                    Err(e) => {
                        let failure = StrategyFailure::Embedding {
                            strategy: self.name().to_string(),
                            detail: e.to_string(),
                        };
                        warn!("{}", failure);
                        reasoning.push(failure.to_string());
                        None
                    }
                },
                None => None,
            };
            match sim {
                Some(ref m) => fill_by_similarity(&mut slots, &unnumbered, m, pages, &mut reasoning),
                None => {
                    reasoning.push(
                        "No similarity signal; unnumbered pages fill the gaps in original index order"
                            .to_string(),
                    );
                    fill_in_index_order(&mut slots, &unnumbered);
                }
            }
        }

        let order: Vec<usize> = slots
            .into_iter()
            .flatten()
            .map(|pos| pages[pos].page_index)
            .collect();
        let confidence = resolved as f64 / n as f64;
        debug!(
            "page_number: {} resolved, {} collisions, confidence {:.2}",
            resolved, collisions, confidence
        );

        OrderingResult::new(self.name(), order, confidence, reasoning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::is_permutation;
    use crate::similarity::LexicalEmbedder;

    fn pages(texts: &[&str]) -> Vec<PageContent> {
        PageContent::from_texts(texts)
    }

    #[test]
    fn detects_each_form() {
        assert_eq!(detect_page_number("foo\nPage 2 of 9\n", 9), Some((2, "Page X of Y")));
        assert_eq!(detect_page_number("PAGE: 4", 9), Some((4, "Page: X")));
        assert_eq!(detect_page_number("text\n - 3 - \n", 9), Some((3, "- X -")));
        assert_eq!(detect_page_number("text\n7\n", 9), Some((7, "bare number")));
        assert_eq!(detect_page_number("nothing here", 9), None);
    }

    #[test]
    fn out_of_range_falls_through_to_next_form() {
        // "Page 12 of 40" is out of range for a 5-page input, the bare "3" is not.
        assert_eq!(
            detect_page_number("Page 12 of 40\n3\n", 5),
            Some((3, "bare number"))
        );
        assert_eq!(detect_page_number("Page 0 of 3", 3), None);
    }

    #[tokio::test]
    async fn page_x_of_y_orders_pages() {
        let s = PageNumberStrategy::new(None);
        let p = pages(&[
            "Terms continue...\nPage 2 of 3",
            "Cover\nPage 1 of 3",
            "Signatures\nPage 3 of 3",
        ]);
        assert!(s.can_handle(&p));
        let r = s.attempt_ordering(&p).await;
        assert_eq!(r.order, vec![1, 0, 2]);
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn needs_more_than_half_numbered() {
        let s = PageNumberStrategy::new(None);
        assert!(!s.can_handle(&[]));
        assert!(!s.can_handle(&pages(&["Page 1 of 4", "Page 2 of 4", "x", "y"])));
        assert!(s.can_handle(&pages(&["Page 1 of 3", "Page 2 of 3", "x"])));
    }

    #[tokio::test]
    async fn unnumbered_pages_fill_gaps_in_index_order_without_similarity() {
        let s = PageNumberStrategy::new(None);
        let p = pages(&["no marker a", "Page 3 of 5", "Page 1 of 5", "Page 5 of 5", "no marker b"]);
        let r = s.attempt_ordering(&p).await;
        assert_eq!(r.order, vec![2, 0, 1, 4, 3]);
        assert!((r.confidence - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn collision_demotes_earlier_page_and_lowers_confidence() {
        let s = PageNumberStrategy::new(None);
        let p = pages(&["Page 1 of 3", "Page 1 of 3", "Page 2 of 3"]);
        let r = s.attempt_ordering(&p).await;
        // Page 1 taken by original 1; original 0 demoted into the free slot.
        assert_eq!(r.order, vec![1, 2, 0]);
        assert!(is_permutation(&r.order, 3));
        assert!((r.confidence - 2.0 / 3.0).abs() < 1e-9);
        assert!(r.reasoning.iter().any(|l| l.contains("Collision")));
    }

    #[tokio::test]
    async fn similarity_guides_gap_placement() {
        let s = PageNumberStrategy::new(Some(Arc::new(LexicalEmbedder::default())));
        let p = pages(&[
            "Page 1 of 4\nborrower loan repay interest",
            "apples oranges fruit market",
            "borrower loan interest schedule",
            "Page 4 of 4\napples oranges fruit basket",
        ]);
        let r = s.attempt_ordering(&p).await;
        // The fruit page settles next to the fruit-numbered page 4, leaving
        // the loan page beside page 1.
        assert_eq!(r.order, vec![0, 2, 1, 3]);
        assert!((r.confidence - 0.5).abs() < 1e-9);
    }
}
