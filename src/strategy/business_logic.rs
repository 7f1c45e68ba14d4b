//! Ordering from configurable start/end heuristics.
//!
//! Each page gets a start score and an end score, the weighted sum of the
//! [`BusinessRules`] patterns it matches. The best start page opens the
//! document, the best end page closes it, and the pages in between follow a
//! nearest-neighbour similarity walk from the start anchor (original index
//! order when no embedder is available).
//!
//! The built-in rules target contracts and loan documents; other document
//! families load their own from JSON:
//!
//! ```json
//! {
//!   "start_patterns": [{ "pattern": "\\binvoice\\b", "weight": 2.0 }],
//!   "end_patterns":   [{ "pattern": "\\btotal due\\b", "weight": 2.0 }]
//! }
//! ```

use super::{OrderingStrategy, StrategyKind};
use crate::error::{ReorderError, StrategyFailure};
use crate::page::{OrderingResult, PageContent};
use crate::similarity::{Embedder, SimilarityMatrix};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// One scored heuristic. Patterns are case-insensitive regular expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedPattern {
    pub pattern: String,
    pub weight: f64,
}

impl WeightedPattern {
    pub fn new(pattern: impl Into<String>, weight: f64) -> Self {
        Self {
            pattern: pattern.into(),
            weight,
        }
    }
}

/// Start/end heuristics for [`BusinessLogicStrategy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessRules {
    /// Title and cover indicators.
    pub start_patterns: Vec<WeightedPattern>,
    /// Signature and witness indicators.
    pub end_patterns: Vec<WeightedPattern>,
    /// Start-score bonus for the shortest page, scaled down linearly to zero
    /// for the longest.
    pub short_page_bonus: f64,
    /// Confidence reported for an unambiguous winner on both anchors.
    pub confidence_ceiling: f64,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            start_patterns: vec![
                WeightedPattern::new(r"\bthis\s+agreement\s+is\s+(?:made|dated|entered)", 3.0),
                WeightedPattern::new(r"\bcover\s+(?:page|sheet)\b", 2.0),
                WeightedPattern::new(r"\btable\s+of\s+contents\b", 2.0),
                WeightedPattern::new(r"\bloan\s+agreement\b", 1.5),
                WeightedPattern::new(r"\btitle\b", 1.0),
                WeightedPattern::new(r"\bdated\b", 1.0),
                WeightedPattern::new(r"\bbetween\b", 0.5),
            ],
            end_patterns: vec![
                WeightedPattern::new(r"\bin\s+witness\s+whereof\b", 3.0),
                WeightedPattern::new(r"\bby:\s*_{3,}", 2.0),
                WeightedPattern::new(r"\bsignatures?(?:\s+page)?\b", 1.5),
                WeightedPattern::new(r"\bsigned\s+by\b", 1.5),
                WeightedPattern::new(r"\bwitness(?:ed|es)?\b", 1.0),
                WeightedPattern::new(r"\bexecuted\b", 1.0),
            ],
            short_page_bonus: 0.5,
            confidence_ceiling: 0.75,
        }
    }
}

impl BusinessRules {
    /// Parse rules from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ReorderError> {
        let rules: BusinessRules =
            serde_json::from_str(json).map_err(|e| ReorderError::InvalidRules(e.to_string()))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Check that every pattern compiles and every number is in range.
    pub fn validate(&self) -> Result<(), ReorderError> {
        for wp in self.start_patterns.iter().chain(&self.end_patterns) {
            compile(&wp.pattern)?;
            if !wp.weight.is_finite() || wp.weight <= 0.0 {
                return Err(ReorderError::InvalidRules(format!(
                    "weight for '{}' must be a positive number, got {}",
                    wp.pattern, wp.weight
                )));
            }
        }
        if !self.short_page_bonus.is_finite() || self.short_page_bonus < 0.0 {
            return Err(ReorderError::InvalidRules(
                "short_page_bonus must be ≥ 0".into(),
            ));
        }
        if !(self.confidence_ceiling > 0.0 && self.confidence_ceiling <= 1.0) {
            return Err(ReorderError::InvalidRules(
                "confidence_ceiling must be in (0, 1]".into(),
            ));
        }
        Ok(())
    }
}

fn compile(pattern: &str) -> Result<Regex, ReorderError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ReorderError::InvalidRules(format!("pattern '{pattern}': {e}")))
}

fn compile_all(patterns: &[WeightedPattern]) -> Result<Vec<(Regex, f64)>, ReorderError> {
    patterns
        .iter()
        .map(|wp| Ok((compile(&wp.pattern)?, wp.weight)))
        .collect()
}

/// Places pages between a scored start anchor and end anchor.
pub struct BusinessLogicStrategy {
    start: Vec<(Regex, f64)>,
    end: Vec<(Regex, f64)>,
    short_page_bonus: f64,
    confidence_ceiling: f64,
    embedder: Option<Arc<dyn Embedder>>,
}

impl BusinessLogicStrategy {
    pub fn new(
        rules: &BusinessRules,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Self, ReorderError> {
        rules.validate()?;
        Ok(Self {
            start: compile_all(&rules.start_patterns)?,
            end: compile_all(&rules.end_patterns)?,
            short_page_bonus: rules.short_page_bonus,
            confidence_ceiling: rules.confidence_ceiling,
            embedder,
        })
    }

    fn any_match(&self, content: &str) -> bool {
        self.start
            .iter()
            .chain(&self.end)
            .any(|(re, _)| re.is_match(content))
    }
}

fn pattern_score(patterns: &[(Regex, f64)], content: &str) -> f64 {
    patterns
        .iter()
        .filter(|(re, _)| re.is_match(content))
        .map(|(_, w)| w)
        .sum()
}

/// Highest-scoring position among `candidates` with a positive score, ties →
/// lowest position.
fn argmax(scores: &[f64], candidates: impl Iterator<Item = usize>) -> Option<usize> {
    let mut best: Option<usize> = None;
    for pos in candidates {
        if scores[pos] <= 0.0 {
            continue;
        }
        match best {
            Some(b) if scores[pos] <= scores[b] => {}
            _ => best = Some(pos),
        }
    }
    best
}

/// `(top - runner_up) / top` across all `scores`, excluding nothing.
fn margin(scores: &[f64], winner: usize) -> f64 {
    let top = scores[winner];
    if top <= 0.0 {
        return 0.0;
    }
    let runner_up = scores
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != winner)
        .map(|(_, s)| *s)
        .fold(0.0f64, f64::max);
    ((top - runner_up) / top).max(0.0)
}

#[async_trait]
impl OrderingStrategy for BusinessLogicStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BusinessLogic
    }

    /// Some configured pattern matches some page.
    fn can_handle(&self, pages: &[PageContent]) -> bool {
        pages.iter().any(|p| self.any_match(&p.content))
    }

    async fn attempt_ordering(&self, pages: &[PageContent]) -> OrderingResult {
        let n = pages.len();
        let lengths: Vec<usize> = pages.iter().map(|p| p.content.chars().count()).collect();
        let longest = lengths.iter().copied().max().unwrap_or(0).max(1) as f64;

        let start_hits: Vec<f64> = pages
            .iter()
            .map(|p| pattern_score(&self.start, &p.content))
            .collect();
        let start_scores: Vec<f64> = start_hits
            .iter()
            .zip(&lengths)
            .map(|(s, &len)| s + self.short_page_bonus * (1.0 - len as f64 / longest))
            .collect();
        let end_scores: Vec<f64> = pages
            .iter()
            .map(|p| pattern_score(&self.end, &p.content))
            .collect();

        let mut reasoning = Vec::new();

        // Only a page that matched a start pattern can anchor the start; the
        // length bonus alone is not evidence of a cover page.
        let start = argmax(&start_scores, (0..n).filter(|&p| start_hits[p] > 0.0));
        let end = argmax(&end_scores, (0..n).filter(|&p| Some(p) != start));

        let mut margins = Vec::new();
        if let Some(s) = start {
            let m = margin(&start_scores, s);
            margins.push(m);
            reasoning.push(format!(
                "Start anchor: original page {} (score {:.2}, margin {:.2})",
                pages[s].page_index, start_scores[s], m
            ));
        }
        if let Some(e) = end {
            let m = margin(&end_scores, e);
            margins.push(m);
            reasoning.push(format!(
                "End anchor: original page {} (score {:.2}, margin {:.2})",
                pages[e].page_index, end_scores[e], m
            ));
        }

        let middle: Vec<usize> = (0..n)
            .filter(|&p| Some(p) != start && Some(p) != end)
            .collect();

        let sim = match (self.embedder.as_deref(), middle.len() >= 2) {
            (Some(embedder), true) => match SimilarityMatrix::compute(embedder, pages).await {
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
            _ => None,
        };

        let middle_order: Vec<usize> = match (&sim, start) {
            (Some(m), Some(s)) => {
                let mut members = middle.clone();
                members.push(s);
                let (walk, _) = m.greedy_walk(s, &members);
                reasoning.push("Middle pages placed by similarity walk from the start anchor".into());
                walk.into_iter().skip(1).collect()
            }
            (Some(m), None) => match middle.first() {
                Some(&first) => {
                    reasoning.push("Middle pages placed by similarity walk".into());
                    m.greedy_walk(first, &middle).0
                }
                None => Vec::new(),
            },
            (None, _) => {
                if !middle.is_empty() {
                    reasoning.push("Middle pages kept in original index order".into());
                }
                middle
            }
        };

        let order: Vec<usize> = start
            .into_iter()
            .chain(middle_order)
            .chain(end)
            .map(|pos| pages[pos].page_index)
            .collect();

        let confidence = if margins.is_empty() {
            0.0
        } else {
            margins.iter().sum::<f64>() / margins.len() as f64 * self.confidence_ceiling
        };

        OrderingResult::new(self.name(), order, confidence, reasoning)
    }
}
