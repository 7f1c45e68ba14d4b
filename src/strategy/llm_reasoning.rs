//! Ordering by asking a language model.
//!
//! One prompt per request, no retries. The answer must contain a bracketed
//! list of original indices; anything that is not a permutation of `0..n`
//! is rejected with the failed check named in the reasoning.

use super::{OrderingStrategy, StrategyKind};
use crate::error::{LlmRejection, StrategyFailure};
use crate::page::{OrderingResult, PageContent};
use crate::prompts::{excerpt, ordering_prompt};
use crate::provider::Completer;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Confidence for an accepted answer. The model is trusted, not scored.
pub const LLM_CONFIDENCE: f64 = 0.9;

/// Characters of the raw answer kept in the reasoning.
const RESPONSE_EXCERPT_CHARS: usize = 200;

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*```[A-Za-z0-9_-]*\s*$").unwrap());

static RE_INT_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\s*-?\d+(?:\s*,\s*-?\d+)*\s*\]").unwrap());

static RE_LIST: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\[\]]*\]").unwrap());

/// Extract and validate the index list in `response`.
///
/// Code fences are stripped, then the first bracketed integer list is read.
/// Bracketed prose is skipped; if no integer list exists the first `[...]`
/// group is read instead so the shape error names the offending element.
/// Checks run in order: shape (integers, correct length), range, uniqueness.
pub fn parse_order(response: &str, page_count: usize) -> Result<Vec<usize>, LlmRejection> {
    let unfenced = RE_FENCE.replace_all(response, "");
    let list = RE_INT_LIST
        .find(&unfenced)
        .or_else(|| RE_LIST.find(&unfenced))
        .ok_or(LlmRejection::NoList)?;
    let inner = list.as_str().trim_start_matches('[').trim_end_matches(']');

    let mut values: Vec<i64> = Vec::new();
    if !inner.trim().is_empty() {
        for (position, item) in inner.split(',').enumerate() {
            let item = item.trim();
            let v = item.parse::<i64>().map_err(|_| LlmRejection::NotInteger {
                position,
                value: item.to_string(),
            })?;
            values.push(v);
        }
    }

    if values.len() != page_count {
        return Err(LlmRejection::WrongLength {
            expected: page_count,
            actual: values.len(),
        });
    }

    if let Some(&index) = values.iter().find(|&&v| v < 0 || v as u64 >= page_count as u64) {
        return Err(LlmRejection::OutOfRange { index, page_count });
    }

    let mut seen = vec![false; page_count];
    let mut duplicates = Vec::new();
    for &v in &values {
        let i = v as usize;
        if seen[i] && !duplicates.contains(&i) {
            duplicates.push(i);
        }
        seen[i] = true;
    }
    if !duplicates.is_empty() {
        return Err(LlmRejection::Duplicate { duplicates });
    }

    Ok(values.into_iter().map(|v| v as usize).collect())
}

pub struct LlmReasoningStrategy {
    completer: Option<Arc<dyn Completer>>,
    excerpt_chars: usize,
    api_timeout: Duration,
}

impl LlmReasoningStrategy {
    pub fn new(completer: Option<Arc<dyn Completer>>, excerpt_chars: usize, api_timeout_secs: u64) -> Self {
        Self {
            completer,
            excerpt_chars,
            api_timeout: Duration::from_secs(api_timeout_secs),
        }
    }

    fn failure(&self, pages: &[PageContent], failure: StrategyFailure, reasoning: Vec<String>) -> OrderingResult {
        warn!("{}", failure);
        OrderingResult::degraded(self.name(), pages.len(), failure, reasoning)
    }
}

#[async_trait]
impl OrderingStrategy for LlmReasoningStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LlmReasoning
    }

    /// A completer is configured.
    fn can_handle(&self, pages: &[PageContent]) -> bool {
        self.completer.is_some() && !pages.is_empty()
    }

    async fn attempt_ordering(&self, pages: &[PageContent]) -> OrderingResult {
        let strategy = self.name().to_string();
        let Some(completer) = self.completer.as_deref() else {
            let failure = StrategyFailure::Llm {
                strategy,
                detail: "no LLM provider configured".into(),
            };
            return self.failure(pages, failure, Vec::new());
        };

        let prompt = ordering_prompt(pages, self.excerpt_chars);
        let mut reasoning = vec![format!("Model: {}", completer.name())];
        debug!("llm_reasoning: prompt {} chars", prompt.len());

        let started = Instant::now();
        let response = match tokio::time::timeout(self.api_timeout, completer.complete(&prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                let failure = StrategyFailure::Llm {
                    strategy,
                    detail: e.to_string(),
                };
                return self.failure(pages, failure, reasoning);
            }
            Err(_) => {
                let failure = StrategyFailure::Timeout {
                    strategy,
                    secs: self.api_timeout.as_secs(),
                };
                return self.failure(pages, failure, reasoning);
            }
        };
        debug!(
            "llm_reasoning: answered in {}ms",
            started.elapsed().as_millis()
        );
        reasoning.push(format!(
            "Response: {}",
            excerpt(&response, RESPONSE_EXCERPT_CHARS)
        ));

        // Validated indices are positions in `pages`.
        match parse_order(&response, pages.len()) {
            Ok(positions) => {
                let order = positions.into_iter().map(|p| pages[p].page_index).collect();
                OrderingResult::new(self.name(), order, LLM_CONFIDENCE, reasoning)
            }
            Err(reason) => self.failure(pages, StrategyFailure::Rejected { strategy, reason }, reasoning),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReorderError;
    use crate::page::is_permutation;

    struct CannedCompleter(String);

    #[async_trait]
    impl Completer for CannedCompleter {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, ReorderError> {
            Ok(self.0.clone())
        }
    }

    struct SlowCompleter;

    #[async_trait]
    impl Completer for SlowCompleter {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, ReorderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("[0]".into())
        }
    }

    struct BrokenCompleter;

    #[async_trait]
    impl Completer for BrokenCompleter {
        fn name(&self) -> &str {
            "broken"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, ReorderError> {
            Err(ReorderError::LlmApiError {
                message: "HTTP 503".into(),
            })
        }
    }

    fn strategy(answer: &str) -> LlmReasoningStrategy {
        LlmReasoningStrategy::new(Some(Arc::new(CannedCompleter(answer.into()))), 500, 60)
    }

    #[test]
    fn parses_list_embedded_in_prose() {
        assert_eq!(parse_order("Here you go: [2,0,1]", 3), Ok(vec![2, 0, 1]));
        assert_eq!(parse_order("```json\n[1, 0]\n```", 2), Ok(vec![1, 0]));
    }

    #[test]
    fn skips_bracketed_prose_before_the_list() {
        assert_eq!(
            parse_order("Ordering [by page number]: [2, 0, 1]", 3),
            Ok(vec![2, 0, 1])
        );
        assert_eq!(parse_order("Empty [] first, then [1, 0]", 2), Ok(vec![1, 0]));
    }

    #[test]
    fn each_check_reports_its_failure() {
        assert_eq!(parse_order("no list", 2), Err(LlmRejection::NoList));
        assert!(matches!(
            parse_order("[0, x]", 2),
            Err(LlmRejection::NotInteger { position: 1, .. })
        ));
        assert_eq!(
            parse_order("[0, 1]", 3),
            Err(LlmRejection::WrongLength { expected: 3, actual: 2 })
        );
        assert_eq!(
            parse_order("[0, 5, 1]", 3),
            Err(LlmRejection::OutOfRange { index: 5, page_count: 3 })
        );
        assert_eq!(
            parse_order("[0, -1, 1]", 3),
            Err(LlmRejection::OutOfRange { index: -1, page_count: 3 })
        );
        assert_eq!(
            parse_order("[0,0,1]", 3),
            Err(LlmRejection::Duplicate { duplicates: vec![0] })
        );
        assert_eq!(parse_order("[]", 0), Ok(vec![]));
    }

    #[tokio::test]
    async fn accepted_answer_gets_fixed_confidence() {
        let s = strategy("Here you go: [2,0,1]");
        let pages = PageContent::from_texts(&["a", "b", "c"]);
        assert!(s.can_handle(&pages));
        let r = s.attempt_ordering(&pages).await;
        assert_eq!(r.order, vec![2, 0, 1]);
        assert_eq!(r.confidence, LLM_CONFIDENCE);
        assert!(r.reasoning.iter().any(|l| l.contains("[2,0,1]")));
    }

    #[tokio::test]
    async fn duplicate_answer_is_rejected() {
        let s = strategy("[0,0,1]");
        let pages = PageContent::from_texts(&["a", "b", "c"]);
        let r = s.attempt_ordering(&pages).await;
        assert_eq!(r.confidence, 0.0);
        assert!(is_permutation(&r.order, 3));
        assert!(r.reasoning.iter().any(|l| l.contains("duplicate indices")));
    }

    #[tokio::test]
    async fn provider_error_degrades() {
        let s = LlmReasoningStrategy::new(Some(Arc::new(BrokenCompleter)), 500, 60);
        let r = s.attempt_ordering(&PageContent::from_texts(&["a", "b"])).await;
        assert_eq!(r.confidence, 0.0);
        assert!(matches!(r.failure, Some(StrategyFailure::Llm { .. })));
        assert!(r.reasoning.iter().any(|l| l.contains("HTTP 503")));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let s = LlmReasoningStrategy::new(Some(Arc::new(SlowCompleter)), 500, 5);
        let r = s.attempt_ordering(&PageContent::from_texts(&["a", "b"])).await;
        assert_eq!(r.confidence, 0.0);
        assert!(matches!(r.failure, Some(StrategyFailure::Timeout { secs: 5, .. })));
    }

    #[test]
    fn unconfigured_is_inapplicable() {
        let s = LlmReasoningStrategy::new(None, 500, 60);
        assert!(!s.can_handle(&PageContent::from_texts(&["a"])));
    }
}
