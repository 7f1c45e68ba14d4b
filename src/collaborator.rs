//! Extraction and reassembly seams around the engine.
//!
//! The engine only sees page texts. Turning PDF bytes into text (with OCR
//! for scanned pages) and rebuilding the PDF in the new order are left to
//! implementations of [`TextExtractor`] and [`PdfReassembler`];
//! [`reconstruct`] wires them to an [`Orchestrator`].

use crate::error::ReorderError;
use crate::orchestrator::Orchestrator;
use crate::page::{is_permutation, FinalOrdering};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// PDF bytes → one text per physical page, in file order.
///
/// Pages that yield no text (even after OCR) must still produce an entry,
/// an empty string.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ReorderError>;
}

/// Rebuild a PDF with its pages in `order`, leaving page content untouched.
#[async_trait]
pub trait PdfReassembler: Send + Sync {
    async fn rebuild(&self, pdf_bytes: &[u8], order: &[usize]) -> Result<Vec<u8>, ReorderError>;
}

/// Summary written next to a reconstructed PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderMetadata {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub original_filename: Option<String>,
    pub page_count: usize,
    pub final_order: Vec<usize>,
    pub confidences: Vec<f64>,
    pub avg_confidence: f64,
    /// Winning strategy; `None` when the original order was kept.
    pub method: Option<String>,
}

impl ReorderMetadata {
    pub fn from_ordering(ordering: &FinalOrdering, original_filename: Option<String>) -> Self {
        Self {
            original_filename,
            page_count: ordering.final_order.len(),
            final_order: ordering.final_order.clone(),
            confidences: ordering.confidences.clone(),
            avg_confidence: ordering.average_confidence(),
            method: ordering.method.clone(),
        }
    }
}

/// A reordered PDF and the ordering behind it.
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub pdf_bytes: Vec<u8>,
    pub metadata: ReorderMetadata,
    pub ordering: FinalOrdering,
}

/// Extract, reorder and rebuild.
///
/// # Errors
/// Only collaborator failures from extraction or reassembly. Strategy
/// problems never surface here.
pub async fn reconstruct(
    pdf_bytes: &[u8],
    extractor: &dyn TextExtractor,
    reassembler: &dyn PdfReassembler,
    orchestrator: &Orchestrator,
) -> Result<Reconstruction, ReorderError> {
    let started = Instant::now();

    // ── Step 1: Extract page texts ───────────────────────────────────────
    let texts = extractor.extract(pdf_bytes).await?;
    info!("Extracted {} pages", texts.len());

    // ── Step 2: Decide the order ─────────────────────────────────────────
    let ordering = orchestrator.reorder(&texts).await;
    if !is_permutation(&ordering.final_order, texts.len()) {
        return Err(ReorderError::Internal(format!(
            "engine returned a non-permutation for {} pages",
            texts.len()
        )));
    }

    // ── Step 3: Rebuild ──────────────────────────────────────────────────
    let rebuilt = reassembler.rebuild(pdf_bytes, &ordering.final_order).await?;

    info!(
        "Reconstructed {} pages in {}ms ({})",
        texts.len(),
        started.elapsed().as_millis(),
        ordering.method.as_deref().unwrap_or("original order")
    );

    Ok(Reconstruction {
        pdf_bytes: rebuilt,
        metadata: ReorderMetadata::from_ordering(&ordering, None),
        ordering,
    })
}

/// Write `metadata` as pretty JSON to `path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_metadata(path: &Path, metadata: &ReorderMetadata) -> Result<(), ReorderError> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| ReorderError::Internal(format!("Failed to serialise metadata: {e}")))?;
    let write_err = |e: std::io::Error| ReorderError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote metadata to {}", path.display());
    Ok(())
}
