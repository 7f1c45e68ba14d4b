//! LLM and embedding collaborators, and how they are resolved from config.
//!
//! Both collaborators are process-wide: resolved once when the
//! [`crate::orchestrator::Orchestrator`] is built, then shared read-only by
//! every request. A missing API key is a normal condition that disables the
//! dependent strategy; it is logged, never raised.

use crate::config::ReorderConfig;
use crate::error::ReorderError;
use crate::similarity::{Embedder, LexicalEmbedder, ProviderEmbedder};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default model when a provider is named without one.
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// API key variables that indicate a usable provider in the environment.
const PROVIDER_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "OPENAI_API_KEY", "ANTHROPIC_API_KEY"];

/// Single-shot text completion.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Short identifier for logs and reasoning.
    fn name(&self) -> &str;

    /// Send one prompt, return the raw text answer.
    async fn complete(&self, prompt: &str) -> Result<String, ReorderError>;
}

/// [`Completer`] backed by an edgequake-llm chat provider.
pub struct LlmCompleter {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmCompleter {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                temperature: Some(temperature),
                max_tokens: Some(max_tokens),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl Completer for LlmCompleter {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn complete(&self, prompt: &str) -> Result<String, ReorderError> {
        let messages = vec![ChatMessage::user(prompt)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| ReorderError::LlmApiError {
                message: format!("{e}"),
            })?;
        debug!(
            "{}: {} input tokens, {} output tokens",
            self.provider.name(),
            response.prompt_tokens,
            response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Resolve the LLM collaborator, from most-specific to least-specific.
///
/// 1. **Pre-built completer** (`config.completer`).
/// 2. **Pre-built provider** (`config.provider`).
/// 3. **Named provider** (`config.provider_name` + optional `config.model`):
///    construction failure here is an error, since the caller asked for it.
/// 4. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 5. **Auto-detection** via [`ProviderFactory::from_env`], attempted only
///    when one of the known API key variables is set.
///
/// Returns `Ok(None)` when nothing is configured.
pub fn resolve_completer(config: &ReorderConfig) -> Result<Option<Arc<dyn Completer>>, ReorderError> {
    if let Some(ref completer) = config.completer {
        return Ok(Some(Arc::clone(completer)));
    }

    let wrap = |p: Arc<dyn LLMProvider>| -> Arc<dyn Completer> {
        info!("LLM client initialized: {} ({})", p.name(), p.model());
        Arc::new(LlmCompleter::new(p, config.temperature, config.max_tokens))
    };

    if let Some(ref provider) = config.provider {
        return Ok(Some(wrap(Arc::clone(provider))));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            ReorderError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("{e}"),
            }
        })?;
        return Ok(Some(wrap(provider)));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            match ProviderFactory::create_llm_provider(&prov, &model) {
                Ok(p) => return Ok(Some(wrap(p))),
                Err(e) => warn!("EDGEQUAKE_LLM_PROVIDER '{}' unusable: {}", prov, e),
            }
        }
    }

    if !api_key_present() {
        warn!("No LLM API key set - LLM reasoning disabled");
        return Ok(None);
    }

    match ProviderFactory::from_env() {
        Ok((llm, _embedding)) => Ok(Some(wrap(llm))),
        Err(e) => {
            warn!("LLM initialization failed: {} - LLM reasoning disabled", e);
            Ok(None)
        }
    }
}

/// Resolve the embedding collaborator.
///
/// Order: `config.embedder`, the local fastembed model (feature
/// `local-embeddings`), a remote provider when an API key is present, and
/// finally the lexical embedder if `config.lexical_fallback` is set.
/// Every failure is logged and skipped; `None` disables similarity.
pub fn resolve_embedder(config: &ReorderConfig) -> Option<Arc<dyn Embedder>> {
    if let Some(ref embedder) = config.embedder {
        return Some(Arc::clone(embedder));
    }

    #[cfg(feature = "local-embeddings")]
    match crate::similarity::LocalEmbedder::try_new(&config.embedding_model) {
        Ok(local) => return Some(Arc::new(local)),
        Err(e) => warn!("Failed to load embedding model: {}", e),
    }

    if api_key_present() {
        match ProviderFactory::from_env() {
            Ok((_llm, embedding)) => {
                info!("Remote embeddings: {} ({})", embedding.name(), embedding.model());
                return Some(Arc::new(ProviderEmbedder::new(embedding)));
            }
            Err(e) => warn!("Embedding provider initialization failed: {}", e),
        }
    }

    if config.lexical_fallback {
        info!("Using lexical embeddings");
        return Some(Arc::new(LexicalEmbedder::default()));
    }

    warn!("No embedding model available - similarity signals disabled");
    None
}

fn api_key_present() -> bool {
    PROVIDER_KEY_VARS
        .iter()
        .any(|k| std::env::var(k).map(|v| !v.is_empty()).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Completer for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, prompt: &str) -> Result<String, ReorderError> {
            Ok(prompt.to_string())
        }
    }

    #[test]
    fn prebuilt_completer_wins() {
        let config = ReorderConfig::builder()
            .completer(Arc::new(Echo))
            .build()
            .unwrap();
        let c = resolve_completer(&config).unwrap().unwrap();
        assert_eq!(c.name(), "echo");
    }

    #[test]
    fn prebuilt_embedder_wins() {
        let config = ReorderConfig::builder()
            .embedder(Arc::new(LexicalEmbedder::new(32)))
            .build()
            .unwrap();
        let e = resolve_embedder(&config).unwrap();
        assert_eq!(e.name(), "lexical");
    }
}
