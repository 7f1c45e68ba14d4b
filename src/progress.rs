//! Progress-callback trait for strategy-level reordering events.
//!
//! Inject an [`Arc<dyn ReorderProgressCallback>`] via
//! [`crate::config::ReorderConfigBuilder::progress_callback`] to receive
//! events as the orchestrator runs each strategy.
//!
//! # Example
//!
//! ```rust
//! use pdf_reorder::{ReorderConfig, ReorderProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     ran: AtomicUsize,
//! }
//!
//! impl ReorderProgressCallback for CountingCallback {
//!     fn on_strategy_complete(&self, strategy: &str, confidence: f64) {
//!         self.ran.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{strategy}: {confidence:.2}");
//!     }
//! }
//!
//! let config = ReorderConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { ran: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes one request.
///
/// Implementations must be `Send + Sync`: with `parallel = true` the
/// strategy events may arrive concurrently and out of priority order.
/// All methods default to no-ops.
pub trait ReorderProgressCallback: Send + Sync {
    /// Called once before any strategy runs.
    fn on_reorder_start(&self, page_count: usize, strategy_count: usize) {
        let _ = (page_count, strategy_count);
    }

    /// A strategy declined the input (`can_handle` returned false).
    fn on_strategy_skipped(&self, strategy: &str) {
        let _ = strategy;
    }

    /// A strategy is about to run `attempt_ordering`.
    fn on_strategy_start(&self, strategy: &str) {
        let _ = strategy;
    }

    /// A strategy produced a result (possibly zero-confidence).
    fn on_strategy_complete(&self, strategy: &str, confidence: f64) {
        let _ = (strategy, confidence);
    }

    /// Called once with the winning method (`None` ⇒ identity fallback).
    fn on_reorder_complete(&self, method: Option<&str>, confidence: f64) {
        let _ = (method, confidence);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReorderProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReorderConfig`].
pub type ProgressCallback = Arc<dyn ReorderProgressCallback>;
