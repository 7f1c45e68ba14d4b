//! Error types for the pdf-reorder library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ReorderError`]: **Fatal** for the outer surfaces only: loading page
//!   texts, validating configuration, constructing an explicitly named
//!   provider, or a collaborator (extractor / reassembler) failing inside
//!   [`crate::collaborator::reconstruct`]. The ordering engine itself never
//!   returns it: [`crate::orchestrator::Orchestrator::reorder`] is infallible.
//!
//! * [`StrategyFailure`]: **Non-fatal**: one strategy degraded (timeout,
//!   embedding failure, rejected LLM answer) but every other strategy is
//!   unaffected. Stored inside [`crate::page::OrderingResult`] next to a
//!   zero-confidence order so the audit trail shows what went wrong.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-reorder library.
#[derive(Debug, Error)]
pub enum ReorderError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Page text file was not found at the given path.
    #[error("Page text file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file was read but its contents are not usable page texts.
    #[error("Invalid page texts in '{source_name}': {detail}")]
    InvalidPages { source_name: String, detail: String },

    // ── Provider errors ───────────────────────────────────────────────────
    /// An explicitly requested provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The embedding model could not be loaded or returned unusable output.
    #[error("Embedding failed: {detail}")]
    EmbeddingFailed { detail: String },

    /// The LLM API returned an error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    // ── Collaborator errors ───────────────────────────────────────────────
    /// Text extraction from PDF bytes failed.
    #[error("Text extraction failed: {detail}")]
    ExtractionFailed { detail: String },

    /// Rebuilding the PDF in the new order failed.
    #[error("PDF rebuild failed: {detail}")]
    RebuildFailed { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A business rule pattern did not compile or the rules file is malformed.
    #[error("Invalid business rules: {0}")]
    InvalidRules(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why an LLM answer was rejected.
///
/// Each variant maps onto one validation check: shape (a list of integers of
/// the right length), range (`0 <= i < n`) and uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum LlmRejection {
    /// No bracket-delimited list anywhere in the response.
    #[error("shape check failed: no bracketed index list found in response")]
    NoList,

    /// The list contains something that is not an integer.
    #[error("shape check failed: element {position} ({value}) is not an integer")]
    NotInteger { position: usize, value: String },

    /// The list has the wrong number of entries.
    #[error("shape check failed: expected {expected} indices, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    /// An index falls outside `[0, n)`.
    #[error("range check failed: index {index} is outside 0..{page_count}")]
    OutOfRange { index: i64, page_count: usize },

    /// The same index appears more than once.
    #[error("uniqueness check failed: duplicate indices {duplicates:?}")]
    Duplicate { duplicates: Vec<usize> },
}

/// A non-fatal failure inside one strategy.
///
/// Stored in [`crate::page::OrderingResult::failure`]; the owning result
/// always carries confidence `0.0` and a valid (identity) order.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum StrategyFailure {
    /// The strategy did not finish within its deadline.
    #[error("{strategy}: timed out after {secs}s")]
    Timeout { strategy: String, secs: u64 },

    /// The embedding provider failed or returned malformed vectors.
    #[error("{strategy}: embedding failed: {detail}")]
    Embedding { strategy: String, detail: String },

    /// The LLM call itself failed.
    #[error("{strategy}: LLM call failed: {detail}")]
    Llm { strategy: String, detail: String },

    /// The LLM answered but the answer is not a valid permutation.
    #[error("{strategy}: rejected LLM answer: {reason}")]
    Rejected {
        strategy: String,
        reason: LlmRejection,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_rejection_mentions_duplicate_indices() {
        let e = LlmRejection::Duplicate {
            duplicates: vec![0],
        };
        assert!(e.to_string().contains("duplicate indices"), "got: {e}");
    }

    #[test]
    fn wrong_length_display() {
        let e = LlmRejection::WrongLength {
            expected: 4,
            actual: 3,
        };
        let msg = e.to_string();
        assert!(msg.contains("expected 4"));
        assert!(msg.contains("got 3"));
    }

    #[test]
    fn timeout_failure_display() {
        let e = StrategyFailure::Timeout {
            strategy: "llm_reasoning".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
        assert!(e.to_string().contains("llm_reasoning"));
    }

    #[test]
    fn provider_not_configured_display() {
        let e = ReorderError::ProviderNotConfigured {
            provider: "gemini".into(),
            hint: "set GEMINI_API_KEY".into(),
        };
        assert!(e.to_string().contains("gemini"));
        assert!(e.to_string().contains("GEMINI_API_KEY"));
    }
}
