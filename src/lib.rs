//! # pdf-reorder
//!
//! Reconstruct the page order of a shuffled PDF from its extracted page texts.
//!
//! ## Why this crate?
//!
//! Scanned deal documents and faxed contracts routinely arrive with their
//! pages out of order. No single signal fixes every file: some pages carry
//! "Page 3 of 12" footers, some only a section heading, some nothing but
//! prose. This crate runs several independent ordering strategies over the
//! page texts and keeps the most confident proposal that is a valid
//! permutation. If nothing is usable, the original order comes back.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Extract   TextExtractor (caller-supplied, OCR included)
//!  ├─ 2. Strategies
//!  │     page_number · business_logic · structural
//!  │     semantic_similarity · date_sequence · llm_reasoning
//!  ├─ 3. Arbitrate  max confidence, ties → priority, validate permutation
//!  ├─ 4. Rebuild    PdfReassembler (caller-supplied)
//!  └─ 5. Output     FinalOrdering + metadata JSON + optional report
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_reorder::{Orchestrator, ReorderConfig, StrategyKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ReorderConfig::builder()
//!         .disable(StrategyKind::LlmReasoning)
//!         .build()?;
//!     let orchestrator = Orchestrator::from_config(&config)?;
//!     let pages = ["Page 2 of 3\n…", "Page 1 of 3\n…", "Page 3 of 3\n…"];
//!     let result = orchestrator.reorder(&pages).await;
//!     println!("{:?} via {:?}", result.final_order, result.method);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-reorder` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `local-embeddings` | off | Local all-MiniLM-L6-v2 sentence embeddings via fastembed |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf-reorder = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod collaborator;
pub mod config;
pub mod error;
pub mod input;
pub mod orchestrator;
pub mod page;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod report;
pub mod similarity;
pub mod strategy;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use collaborator::{
    reconstruct, write_metadata, PdfReassembler, Reconstruction, ReorderMetadata, TextExtractor,
};
pub use config::{ConfidenceMode, ReorderConfig, ReorderConfigBuilder};
pub use error::{LlmRejection, ReorderError, StrategyFailure};
pub use input::{load_pages, parse_pages};
pub use orchestrator::Orchestrator;
pub use page::{FinalOrdering, OrderingResult, PageContent};
pub use progress::{NoopProgressCallback, ProgressCallback, ReorderProgressCallback};
pub use provider::Completer;
pub use report::DiagnosticReport;
pub use similarity::{Embedder, LexicalEmbedder, SimilarityMatrix};
pub use strategy::{BusinessRules, OrderingStrategy, StrategyKind, WeightedPattern};
