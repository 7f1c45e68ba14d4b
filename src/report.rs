//! Post-hoc diagnostics for a [`FinalOrdering`].
//!
//! Flags the things a reviewer would check by hand: does the first page look
//! like a cover, which positions are low-confidence, and where confidence
//! falls off a cliff between neighbouring pages.

use crate::page::FinalOrdering;
use crate::strategy::StrategyKind;
use serde::Serialize;
use std::fmt;

/// Confidence below this is reported as low.
pub const LOW_CONFIDENCE: f64 = 0.6;

/// Average confidence below this suggests pages that look alike.
pub const LOW_AVERAGE_CONFIDENCE: f64 = 0.65;

/// A step from above `DROP_FROM` to below `DROP_TO` is a sharp drop.
const DROP_FROM: f64 = 0.8;
const DROP_TO: f64 = 0.5;

/// Characters of the first page searched for cover keywords.
const COVER_WINDOW: usize = 200;

/// Leading positions of the final order shown in the preview.
const PREVIEW_PAGES: usize = 5;
const PREVIEW_CHARS: usize = 150;

const COVER_KEYWORDS: &[&str] = &["LOAN AGREEMENT", "TITLE", "COVER", "DATED", "BETWEEN"];

/// Confidence falling sharply between two adjacent positions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceDrop {
    /// Position in the final order of the lower-confidence page.
    pub position: usize,
    pub from: f64,
    pub to: f64,
}

/// Opening text of a page near the front of the final order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagePreview {
    pub position: usize,
    pub original_index: usize,
    pub confidence: f64,
    /// First characters of the page with line breaks flattened.
    pub excerpt: String,
}

/// One strategy's outcome, condensed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategySummary {
    pub method: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
    pub page_count: usize,
    pub method: Option<String>,
    pub average_confidence: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
    /// Original index of the page placed first.
    pub first_page: Option<usize>,
    /// Cover keywords found near the top of the first page.
    pub first_page_keywords: Vec<String>,
    /// Positions in the final order with confidence below [`LOW_CONFIDENCE`].
    pub low_confidence_positions: Vec<usize>,
    pub confidence_drops: Vec<ConfidenceDrop>,
    /// The LLM strategy ran and produced an accepted answer.
    pub llm_used: bool,
    pub preview: Vec<PagePreview>,
    pub strategies: Vec<StrategySummary>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl DiagnosticReport {
    /// Inspect `result` against the page texts it was computed from.
    pub fn analyze<S: AsRef<str>>(result: &FinalOrdering, texts: &[S]) -> Self {
        let page_count = result.final_order.len();
        let mut warnings = Vec::new();

        let first_page = result.final_order.first().copied();
        let first_page_keywords: Vec<String> = first_page
            .and_then(|i| texts.get(i))
            .map(|t| {
                let head: String = t.as_ref().chars().take(COVER_WINDOW).collect::<String>().to_uppercase();
                COVER_KEYWORDS
                    .iter()
                    .filter(|k| head.contains(*k))
                    .map(|k| k.to_string())
                    .collect()
            })
            .unwrap_or_default();
        if page_count > 1 && first_page_keywords.is_empty() {
            warnings.push(format!(
                "First page (original {}) does not look like a cover or title page",
                first_page.unwrap_or(0)
            ));
        }

        let low_confidence_positions: Vec<usize> = result
            .confidences
            .iter()
            .enumerate()
            .filter(|(_, c)| **c < LOW_CONFIDENCE)
            .map(|(i, _)| i)
            .collect();
        if page_count > 0 && low_confidence_positions.len() * 2 > page_count {
            warnings.push(format!(
                "{}/{} pages have confidence below {:.1}; review the order manually",
                low_confidence_positions.len(),
                page_count,
                LOW_CONFIDENCE
            ));
        }

        let confidence_drops: Vec<ConfidenceDrop> = result
            .confidences
            .windows(2)
            .enumerate()
            .filter(|(_, w)| w[0] > DROP_FROM && w[1] < DROP_TO)
            .map(|(i, w)| ConfidenceDrop {
                position: i + 1,
                from: w[0],
                to: w[1],
            })
            .collect();
        for d in &confidence_drops {
            warnings.push(format!(
                "Sharp confidence drop at position {} ({:.2} → {:.2})",
                d.position, d.from, d.to
            ));
        }

        let average_confidence = result.average_confidence();
        if page_count > 0 && average_confidence < LOW_AVERAGE_CONFIDENCE {
            warnings.push(format!(
                "Low average confidence ({:.2}) suggests the document has similar-looking pages",
                average_confidence
            ));
        }

        if result.method.is_none() && page_count > 1 {
            warnings.push("No strategy produced a usable order; original order kept".into());
        }

        let llm_used = result
            .outcomes
            .iter()
            .any(|o| o.method == StrategyKind::LlmReasoning.as_str() && o.failure.is_none());

        let preview = result
            .final_order
            .iter()
            .zip(&result.confidences)
            .take(PREVIEW_PAGES)
            .enumerate()
            .map(|(position, (&original_index, &confidence))| PagePreview {
                position,
                original_index,
                confidence,
                excerpt: texts
                    .get(original_index)
                    .map(|t| {
                        t.as_ref()
                            .chars()
                            .take(PREVIEW_CHARS)
                            .collect::<String>()
                            .replace('\n', " ")
                            .trim()
                            .to_string()
                    })
                    .unwrap_or_default(),
            })
            .collect();

        let strategies = result
            .outcomes
            .iter()
            .map(|o| StrategySummary {
                method: o.method.clone(),
                confidence: o.confidence,
                failure: o.failure.as_ref().map(|f| f.to_string()),
            })
            .collect();

        let mut recommendations = Vec::new();
        if !low_confidence_positions.is_empty() {
            recommendations.push(
                "Check the low-confidence positions against the source document".to_string(),
            );
        }
        if first_page_keywords.is_empty() && page_count > 1 {
            recommendations.push(
                "Page numbers or a recognisable title page would let the page-number and business-logic strategies anchor the order".to_string(),
            );
        }
        if page_count > 0 && average_confidence < LOW_AVERAGE_CONFIDENCE {
            recommendations.push(
                "Pages look alike; a domain-specific embedding model or LLM reasoning is recommended".to_string(),
            );
        }
        if !llm_used && page_count > 1 {
            recommendations.push(
                "LLM reasoning did not contribute; set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY to enable it".to_string(),
            );
        }
        if result.outcomes.iter().any(|o| o.failure.is_some()) {
            recommendations.push(
                "Some strategies failed; check provider credentials and timeouts".to_string(),
            );
        }

        let (min_confidence, max_confidence) = if result.confidences.is_empty() {
            (0.0, 0.0)
        } else {
            result
                .confidences
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &c| (lo.min(c), hi.max(c)))
        };

        Self {
            page_count,
            method: result.method.clone(),
            average_confidence,
            min_confidence,
            max_confidence,
            first_page,
            first_page_keywords,
            low_confidence_positions,
            confidence_drops,
            llm_used,
            preview,
            strategies,
            warnings,
            recommendations,
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pages:              {}", self.page_count)?;
        writeln!(
            f,
            "Winning strategy:   {}",
            self.method.as_deref().unwrap_or("none (original order)")
        )?;
        writeln!(
            f,
            "Confidence:         avg {:.2}, min {:.2}, max {:.2}",
            self.average_confidence, self.min_confidence, self.max_confidence
        )?;
        writeln!(
            f,
            "Low confidence:     {} page(s) below {:.1}",
            self.low_confidence_positions.len(),
            LOW_CONFIDENCE
        )?;
        if let Some(first) = self.first_page {
            writeln!(
                f,
                "First page:         original {} [{}]",
                first,
                self.first_page_keywords.join(", ")
            )?;
        }
        writeln!(
            f,
            "LLM reasoning:      {}",
            if self.llm_used { "used" } else { "not used" }
        )?;
        if !self.preview.is_empty() {
            writeln!(f, "Preview:")?;
            for p in &self.preview {
                writeln!(
                    f,
                    "  {:>3}  original {:>3}  {:.2}  {}",
                    p.position, p.original_index, p.confidence, p.excerpt
                )?;
            }
        }
        if !self.strategies.is_empty() {
            writeln!(f, "Strategies:")?;
            for s in &self.strategies {
                match &s.failure {
                    Some(why) => writeln!(f, "  {:<20} {:.2}  ({})", s.method, s.confidence, why)?,
                    None => writeln!(f, "  {:<20} {:.2}", s.method, s.confidence)?,
                }
            }
        }
        for w in &self.warnings {
            writeln!(f, "warning: {}", w)?;
        }
        for r in &self.recommendations {
            writeln!(f, "hint: {}", r)?;
        }
        Ok(())
    }
}
