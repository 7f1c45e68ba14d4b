//! Strategy arbitration.
//!
//! The [`Orchestrator`] runs every applicable strategy against the page set,
//! keeps the most confident proposal and guarantees the caller a valid
//! permutation no matter what the strategies return.
//!
//! ```text
//! pages ─┬─ can_handle? ── attempt_ordering (under timeout) ─┐
//!        ├─ …                                                ├─ max confidence ─ validate ─ FinalOrdering
//!        └─ …                                                ┘   (ties → priority)   (else identity)
//! ```

use crate::config::{ConfidenceMode, ReorderConfig};
use crate::error::{ReorderError, StrategyFailure};
use crate::page::{FinalOrdering, OrderingResult, PageContent};
use crate::progress::ProgressCallback;
use crate::provider::{resolve_completer, resolve_embedder};
use crate::strategy::{
    BusinessLogicStrategy, DateSequenceStrategy, LlmReasoningStrategy, OrderingStrategy,
    PageNumberStrategy, SemanticSimilarityStrategy, StrategyKind, StructuralPatternStrategy,
};
use futures::future::join_all;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Runs the configured strategies and picks a winner.
///
/// Build once and share: the orchestrator holds no per-request state, so
/// concurrent `reorder` calls are independent.
pub struct Orchestrator {
    strategies: Vec<Box<dyn OrderingStrategy>>,
    strategy_timeout: Duration,
    confidence_mode: ConfidenceMode,
    parallel: bool,
    progress: Option<ProgressCallback>,
}

impl Orchestrator {
    /// Build every enabled strategy, resolving the embedder and LLM once.
    ///
    /// Fails only for explicit misconfiguration (a named provider that cannot
    /// be constructed, invalid business rules). Missing credentials simply
    /// leave the dependent strategies inapplicable.
    pub fn from_config(config: &ReorderConfig) -> Result<Self, ReorderError> {
        let needs_embedder = [
            StrategyKind::PageNumber,
            StrategyKind::BusinessLogic,
            StrategyKind::SemanticSimilarity,
        ]
        .into_iter()
        .any(|k| config.is_enabled(k));
        let embedder = if needs_embedder {
            resolve_embedder(config)
        } else {
            None
        };
        let completer = if config.is_enabled(StrategyKind::LlmReasoning) {
            resolve_completer(config)?
        } else {
            None
        };

        let mut strategies: Vec<Box<dyn OrderingStrategy>> = Vec::new();
        for kind in StrategyKind::ALL {
            if !config.is_enabled(kind) {
                debug!("Strategy {} disabled by configuration", kind);
                continue;
            }
            let strategy: Box<dyn OrderingStrategy> = match kind {
                StrategyKind::PageNumber => Box::new(PageNumberStrategy::new(embedder.clone())),
                StrategyKind::BusinessLogic => Box::new(BusinessLogicStrategy::new(
                    &config.business_rules,
                    embedder.clone(),
                )?),
                StrategyKind::Structural => Box::new(StructuralPatternStrategy::new()),
                StrategyKind::SemanticSimilarity => {
                    Box::new(SemanticSimilarityStrategy::new(embedder.clone()))
                }
                StrategyKind::DateSequence => Box::new(DateSequenceStrategy::new()),
                StrategyKind::LlmReasoning => Box::new(LlmReasoningStrategy::new(
                    completer.clone(),
                    config.excerpt_chars,
                    config.api_timeout_secs,
                )),
            };
            strategies.push(strategy);
        }

        info!(
            "Orchestrator ready: {} strategies (embedder: {}, llm: {})",
            strategies.len(),
            embedder.as_ref().map(|e| e.name()).unwrap_or("none"),
            completer.as_ref().map(|c| c.name()).unwrap_or("none")
        );
        Ok(Self::with_strategies(strategies, config))
    }

    /// Use caller-supplied strategies. They are ordered by
    /// [`StrategyKind`] priority; strategies of equal kind keep their order.
    pub fn with_strategies(
        mut strategies: Vec<Box<dyn OrderingStrategy>>,
        config: &ReorderConfig,
    ) -> Self {
        strategies.sort_by_key(|s| s.kind());
        Self {
            strategies,
            strategy_timeout: Duration::from_secs(config.strategy_timeout_secs),
            confidence_mode: config.confidence_mode,
            parallel: config.parallel,
            progress: config.progress_callback.clone(),
        }
    }

    /// Names of the strategies in priority order.
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Reorder extracted page texts, one per physical page in input order.
    pub async fn reorder<S: AsRef<str>>(&self, texts: &[S]) -> FinalOrdering {
        self.reorder_pages(&PageContent::from_texts(texts)).await
    }

    /// Reorder already-wrapped pages. `page_index` values must be `0..n`.
    pub async fn reorder_pages(&self, pages: &[PageContent]) -> FinalOrdering {
        let n = pages.len();
        match n {
            0 => return FinalOrdering::fallback(0, Vec::new()),
            1 => {
                return FinalOrdering {
                    final_order: vec![0],
                    confidences: vec![1.0],
                    method: None,
                    outcomes: Vec::new(),
                }
            }
            _ => {}
        }

        let started = Instant::now();
        info!(
            "Reordering {} pages with {} strategies ({})",
            n,
            self.strategies.len(),
            if self.parallel { "parallel" } else { "sequential" }
        );
        if let Some(ref cb) = self.progress {
            cb.on_reorder_start(n, self.strategies.len());
        }

        let outcomes: Vec<OrderingResult> = if self.parallel {
            join_all(self.strategies.iter().map(|s| self.run_one(s.as_ref(), pages)))
                .await
                .into_iter()
                .flatten()
                .collect()
        } else {
            let mut collected = Vec::new();
            for s in &self.strategies {
                if let Some(r) = self.run_one(s.as_ref(), pages).await {
                    collected.push(r);
                }
            }
            collected
        };

        let result = self.select(n, outcomes);
        info!(
            "Reorder complete in {}ms: {} (mean confidence {:.2})",
            started.elapsed().as_millis(),
            result.method.as_deref().unwrap_or("identity fallback"),
            result.average_confidence()
        );
        if let Some(ref cb) = self.progress {
            cb.on_reorder_complete(result.method.as_deref(), result.average_confidence());
        }
        result
    }

    /// Blocking wrapper around [`Orchestrator::reorder`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from inside
    /// an async context.
    pub fn reorder_sync<S: AsRef<str>>(&self, texts: &[S]) -> Result<FinalOrdering, ReorderError> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| ReorderError::Internal(format!("Failed to create tokio runtime: {}", e)))?;
        Ok(runtime.block_on(self.reorder(texts)))
    }

    /// `None` when the strategy declined the input.
    async fn run_one(
        &self,
        strategy: &dyn OrderingStrategy,
        pages: &[PageContent],
    ) -> Option<OrderingResult> {
        let name = strategy.name();
        if !strategy.can_handle(pages) {
            debug!("{}: not applicable", name);
            if let Some(ref cb) = self.progress {
                cb.on_strategy_skipped(name);
            }
            return None;
        }
        if let Some(ref cb) = self.progress {
            cb.on_strategy_start(name);
        }

        let started = Instant::now();
        let result = match tokio::time::timeout(
            self.strategy_timeout,
            strategy.attempt_ordering(pages),
        )
        .await
        {
            Ok(r) => r,
            Err(_) => {
                let failure = StrategyFailure::Timeout {
                    strategy: name.to_string(),
                    secs: self.strategy_timeout.as_secs(),
                };
                warn!("{}", failure);
                OrderingResult::degraded(name, pages.len(), failure, Vec::new())
            }
        };
        debug!(
            "{}: confidence {:.3} in {}ms",
            name,
            result.confidence,
            started.elapsed().as_millis()
        );
        if let Some(ref cb) = self.progress {
            cb.on_strategy_complete(name, result.confidence);
        }
        Some(result)
    }

    /// Highest confidence wins; earlier (higher-priority) results win ties.
    fn select(&self, n: usize, outcomes: Vec<OrderingResult>) -> FinalOrdering {
        let mut winner: Option<usize> = None;
        for (i, r) in outcomes.iter().enumerate() {
            match winner {
                Some(w) if r.confidence <= outcomes[w].confidence => {}
                _ => winner = Some(i),
            }
        }
        let Some(w) = winner else {
            info!("No strategy applicable; keeping original order");
            return FinalOrdering::fallback(n, outcomes);
        };

        let best = &outcomes[w];
        if !best.is_valid_for(n) {
            warn!(
                "{} proposed an invalid permutation {:?}; keeping original order",
                best.method, best.order
            );
            return FinalOrdering::fallback(n, outcomes);
        }

        let confidences = match (self.confidence_mode, &best.transition_confidences) {
            (ConfidenceMode::PerTransition, Some(t)) if t.len() == n => t.clone(),
            _ => vec![best.confidence; n],
        };
        FinalOrdering {
            final_order: best.order.clone(),
            confidences,
            method: Some(best.method.clone()),
            outcomes,
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("strategies", &self.strategy_names())
            .field("strategy_timeout", &self.strategy_timeout)
            .field("confidence_mode", &self.confidence_mode)
            .field("parallel", &self.parallel)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::is_permutation;
    use async_trait::async_trait;

    struct Stub {
        kind: StrategyKind,
        applicable: bool,
        order: Option<Vec<usize>>,
        confidence: f64,
        delay: Option<Duration>,
        transitions: Option<Vec<f64>>,
    }

    impl Stub {
        fn new(kind: StrategyKind, confidence: f64) -> Self {
            Self {
                kind,
                applicable: true,
                order: None,
                confidence,
                delay: None,
                transitions: None,
            }
        }

        fn order(mut self, order: Vec<usize>) -> Self {
            self.order = Some(order);
            self
        }
    }

    #[async_trait]
    impl OrderingStrategy for Stub {
        fn kind(&self) -> StrategyKind {
            self.kind
        }

        fn can_handle(&self, pages: &[PageContent]) -> bool {
            self.applicable && !pages.is_empty()
        }

        async fn attempt_ordering(&self, pages: &[PageContent]) -> OrderingResult {
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            let order = self
                .order
                .clone()
                .unwrap_or_else(|| pages.iter().rev().map(|p| p.page_index).collect());
            let r = OrderingResult::new(self.name(), order, self.confidence, Vec::new());
            match &self.transitions {
                Some(t) => r.with_transition_confidences(t.clone()),
                None => r,
            }
        }
    }

    fn orchestrator(stubs: Vec<Stub>, config: ReorderConfig) -> Orchestrator {
        let boxed = stubs
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn OrderingStrategy>)
            .collect();
        Orchestrator::with_strategies(boxed, &config)
    }

    #[tokio::test]
    async fn trivial_inputs() {
        let o = orchestrator(vec![Stub::new(StrategyKind::Structural, 0.9)], ReorderConfig::default());
        let empty = o.reorder::<&str>(&[]).await;
        assert!(empty.final_order.is_empty() && empty.confidences.is_empty());
        let one = o.reorder(&["only page"]).await;
        assert_eq!(one.into_parts(), (vec![0], vec![1.0]));
    }

    #[tokio::test]
    async fn highest_confidence_wins() {
        let o = orchestrator(
            vec![
                Stub::new(StrategyKind::PageNumber, 0.4).order(vec![0, 1, 2]),
                Stub::new(StrategyKind::DateSequence, 0.8).order(vec![2, 1, 0]),
            ],
            ReorderConfig::default(),
        );
        let r = o.reorder(&["a", "b", "c"]).await;
        assert_eq!(r.final_order, vec![2, 1, 0]);
        assert_eq!(r.confidences, vec![0.8; 3]);
        assert_eq!(r.method.as_deref(), Some("date_sequence"));
        assert_eq!(r.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn ties_go_to_priority_order() {
        for parallel in [false, true] {
            // Registered out of order; priority comes from the kind.
            let o = orchestrator(
                vec![
                    Stub::new(StrategyKind::SemanticSimilarity, 0.7).order(vec![1, 0, 2]),
                    Stub::new(StrategyKind::BusinessLogic, 0.7).order(vec![2, 0, 1]),
                ],
                ReorderConfig::builder().parallel(parallel).build().unwrap(),
            );
            let first = o.reorder(&["a", "b", "c"]).await;
            assert_eq!(first.method.as_deref(), Some("business_logic"));
            assert_eq!(first.final_order, vec![2, 0, 1]);
            for _ in 0..10 {
                assert_eq!(o.reorder(&["a", "b", "c"]).await, first, "parallel={parallel}");
            }
        }
    }

    #[tokio::test]
    async fn invalid_winner_falls_back_to_identity() {
        let o = orchestrator(
            vec![
                Stub::new(StrategyKind::PageNumber, 0.9).order(vec![0, 0, 1]),
                Stub::new(StrategyKind::Structural, 0.5).order(vec![2, 1, 0]),
            ],
            ReorderConfig::default(),
        );
        let r = o.reorder(&["a", "b", "c"]).await;
        assert_eq!(r.final_order, vec![0, 1, 2]);
        assert_eq!(r.confidences, vec![0.0; 3]);
        assert!(r.method.is_none());
    }

    #[tokio::test]
    async fn skipped_strategies_are_not_scored() {
        let mut declined = Stub::new(StrategyKind::PageNumber, 1.0);
        declined.applicable = false;
        let o = orchestrator(vec![declined], ReorderConfig::default());
        let r = o.reorder(&["a", "b"]).await;
        assert!(r.outcomes.is_empty());
        assert_eq!(r.final_order, vec![0, 1]);
        assert_eq!(r.confidences, vec![0.0, 0.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_strategy_times_out() {
        let mut slow = Stub::new(StrategyKind::PageNumber, 1.0);
        slow.delay = Some(Duration::from_secs(600));
        let config = ReorderConfig::builder().strategy_timeout_secs(5).build().unwrap();
        let o = orchestrator(
            vec![slow, Stub::new(StrategyKind::Structural, 0.3).order(vec![1, 0])],
            config,
        );
        let r = o.reorder(&["a", "b"]).await;
        assert_eq!(r.method.as_deref(), Some("structural"));
        assert_eq!(r.outcomes[0].confidence, 0.0);
        assert!(matches!(
            r.outcomes[0].failure,
            Some(StrategyFailure::Timeout { secs: 5, .. })
        ));
    }

    #[tokio::test]
    async fn per_transition_mode_uses_full_vectors_only() {
        let mut with_t = Stub::new(StrategyKind::SemanticSimilarity, 0.6);
        with_t.transitions = Some(vec![1.0, 0.5, 0.3]);
        let config = ReorderConfig::builder()
            .confidence_mode(ConfidenceMode::PerTransition)
            .build()
            .unwrap();
        let o = orchestrator(vec![with_t], config);
        let r = o.reorder(&["a", "b", "c"]).await;
        assert_eq!(r.confidences, vec![1.0, 0.5, 0.3]);

        let mut short = Stub::new(StrategyKind::SemanticSimilarity, 0.6);
        short.transitions = Some(vec![1.0]);
        let config = ReorderConfig::builder()
            .confidence_mode(ConfidenceMode::PerTransition)
            .build()
            .unwrap();
        let o = orchestrator(vec![short], config);
        let r = o.reorder(&["a", "b", "c"]).await;
        assert_eq!(r.confidences, vec![0.6; 3]);
    }

    #[tokio::test]
    async fn parallel_matches_sequential() {
        let build = |parallel| {
            let config = ReorderConfig::builder().parallel(parallel).build().unwrap();
            orchestrator(
                vec![
                    Stub::new(StrategyKind::Structural, 0.5).order(vec![1, 2, 0]),
                    Stub::new(StrategyKind::DateSequence, 0.5).order(vec![2, 0, 1]),
                ],
                config,
            )
        };
        let a = build(false).reorder(&["a", "b", "c"]).await;
        let b = build(true).reorder(&["a", "b", "c"]).await;
        assert_eq!(a, b);
        assert!(is_permutation(&a.final_order, 3));
        assert_eq!(a.method.as_deref(), Some("structural"));
    }

    #[test]
    fn sync_wrapper() {
        let o = orchestrator(vec![Stub::new(StrategyKind::Structural, 0.5)], ReorderConfig::default());
        let r = o.reorder_sync(&["a", "b"]).unwrap();
        assert_eq!(r.final_order, vec![1, 0]);
    }
}
