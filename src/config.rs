//! Configuration types for page reordering.
//!
//! All engine behaviour is controlled through [`ReorderConfig`], built via
//! its [`ReorderConfigBuilder`]. The config is read once when the
//! [`crate::orchestrator::Orchestrator`] is constructed; requests never
//! mutate it.

use crate::error::ReorderError;
use crate::progress::ProgressCallback;
use crate::provider::Completer;
use crate::similarity::Embedder;
use crate::strategy::business_logic::BusinessRules;
use crate::strategy::StrategyKind;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for the reordering engine.
///
/// # Example
/// ```rust
/// use pdf_reorder::{ReorderConfig, StrategyKind};
///
/// let config = ReorderConfig::builder()
///     .strategy_timeout_secs(30)
///     .disable(StrategyKind::LlmReasoning)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ReorderConfig {
    /// Wall-clock budget per strategy in seconds. Default: 120.
    ///
    /// A strategy still running at the deadline is abandoned and recorded as
    /// a zero-confidence result, so one slow collaborator cannot stall the
    /// request.
    pub strategy_timeout_secs: u64,

    /// Timeout for the single LLM call in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed completer. Takes precedence over every provider field.
    pub completer: Option<Arc<dyn Completer>>,

    /// Pre-constructed embedder. Takes precedence over model loading.
    pub embedder: Option<Arc<dyn Embedder>>,

    /// Sentence-embedding model for the `local-embeddings` feature.
    /// Default: "all-MiniLM-L6-v2".
    pub embedding_model: String,

    /// Fall back to the model-free lexical embedder when nothing else
    /// resolves. Default: false.
    pub lexical_fallback: bool,

    /// LLM sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate. Default: 1024.
    pub max_tokens: usize,

    /// Characters of each page included in the LLM prompt. Default: 500.
    pub excerpt_chars: usize,

    /// Scored start/end heuristics for the business-logic strategy.
    pub business_rules: BusinessRules,

    /// How per-page confidences are reported. Default: [`ConfidenceMode::Broadcast`].
    pub confidence_mode: ConfidenceMode,

    /// Run strategies concurrently. Default: false.
    ///
    /// Arbitration still walks results in priority order, so the output is
    /// the same as in sequential mode.
    pub parallel: bool,

    /// Strategies that never run.
    pub disabled_strategies: Vec<StrategyKind>,

    /// Strategy-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self {
            strategy_timeout_secs: 120,
            api_timeout_secs: 60,
            model: None,
            provider_name: None,
            provider: None,
            completer: None,
            embedder: None,
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            lexical_fallback: false,
            temperature: 0.0,
            max_tokens: 1024,
            excerpt_chars: 500,
            business_rules: BusinessRules::default(),
            confidence_mode: ConfidenceMode::default(),
            parallel: false,
            disabled_strategies: Vec::new(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReorderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReorderConfig")
            .field("strategy_timeout_secs", &self.strategy_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("completer", &self.completer.as_ref().map(|c| c.name().to_string()))
            .field("embedder", &self.embedder.as_ref().map(|e| e.name().to_string()))
            .field("embedding_model", &self.embedding_model)
            .field("lexical_fallback", &self.lexical_fallback)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("excerpt_chars", &self.excerpt_chars)
            .field("confidence_mode", &self.confidence_mode)
            .field("parallel", &self.parallel)
            .field("disabled_strategies", &self.disabled_strategies)
            .finish()
    }
}

impl ReorderConfig {
    /// Create a new builder for `ReorderConfig`.
    pub fn builder() -> ReorderConfigBuilder {
        ReorderConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn is_enabled(&self, kind: StrategyKind) -> bool {
        !self.disabled_strategies.contains(&kind)
    }
}

/// Builder for [`ReorderConfig`].
#[derive(Debug)]
pub struct ReorderConfigBuilder {
    config: ReorderConfig,
}

impl ReorderConfigBuilder {
    pub fn strategy_timeout_secs(mut self, secs: u64) -> Self {
        self.config.strategy_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn completer(mut self, completer: Arc<dyn Completer>) -> Self {
        self.config.completer = Some(completer);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.config.embedder = Some(embedder);
        self
    }

    pub fn embedding_model(mut self, name: impl Into<String>) -> Self {
        self.config.embedding_model = name.into();
        self
    }

    pub fn lexical_fallback(mut self, v: bool) -> Self {
        self.config.lexical_fallback = v;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn excerpt_chars(mut self, n: usize) -> Self {
        self.config.excerpt_chars = n.max(50);
        self
    }

    pub fn business_rules(mut self, rules: BusinessRules) -> Self {
        self.config.business_rules = rules;
        self
    }

    pub fn confidence_mode(mut self, mode: ConfidenceMode) -> Self {
        self.config.confidence_mode = mode;
        self
    }

    pub fn parallel(mut self, v: bool) -> Self {
        self.config.parallel = v;
        self
    }

    pub fn disable(mut self, kind: StrategyKind) -> Self {
        if !self.config.disabled_strategies.contains(&kind) {
            self.config.disabled_strategies.push(kind);
        }
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReorderConfig, ReorderError> {
        let c = &self.config;
        if c.strategy_timeout_secs == 0 {
            return Err(ReorderError::InvalidConfig(
                "Strategy timeout must be ≥ 1s".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(ReorderError::InvalidConfig("API timeout must be ≥ 1s".into()));
        }
        if c.max_tokens == 0 {
            return Err(ReorderError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        c.business_rules.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the winning strategy's confidence is spread over page positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfidenceMode {
    /// Every position gets the winner's scalar confidence. (default)
    #[default]
    Broadcast,
    /// Use the winner's per-transition confidences when it supplies a
    /// full-length vector; otherwise broadcast.
    PerTransition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ReorderConfig::default();
        assert_eq!(c.strategy_timeout_secs, 120);
        assert_eq!(c.excerpt_chars, 500);
        assert_eq!(c.confidence_mode, ConfidenceMode::Broadcast);
        assert!(!c.parallel);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = ReorderConfig::builder()
            .strategy_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn setters_clamp() {
        let c = ReorderConfig::builder()
            .temperature(9.0)
            .excerpt_chars(3)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.excerpt_chars, 50);
    }

    #[test]
    fn disable_is_idempotent() {
        let c = ReorderConfig::builder()
            .disable(StrategyKind::LlmReasoning)
            .disable(StrategyKind::LlmReasoning)
            .build()
            .unwrap();
        assert_eq!(c.disabled_strategies.len(), 1);
        assert!(!c.is_enabled(StrategyKind::LlmReasoning));
        assert!(c.is_enabled(StrategyKind::PageNumber));
    }
}
