//! Integration tests for the ordering engine.
//!
//! Every collaborator is scripted in-process, so these run offline and
//! never read provider API keys from the environment.

use async_trait::async_trait;
use pdf_reorder::page::is_permutation;
use pdf_reorder::{
    load_pages, Completer, DiagnosticReport, Embedder, LexicalEmbedder, Orchestrator,
    ReorderConfig, ReorderError, StrategyKind,
};
use std::io::Write;
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Fixed vectors keyed by page text; unknown text embeds to the zero vector.
struct TableEmbedder(Vec<(&'static str, Vec<f32>)>);

#[async_trait]
impl Embedder for TableEmbedder {
    fn name(&self) -> &str {
        "table"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ReorderError> {
        Ok(texts
            .iter()
            .map(|t| {
                self.0
                    .iter()
                    .find(|(k, _)| *k == t.as_str())
                    .map(|(_, v)| v.clone())
                    .unwrap_or_else(|| vec![0.0, 0.0])
            })
            .collect())
    }
}

/// Always answers with the same text.
struct ScriptedCompleter(&'static str);

#[async_trait]
impl Completer for ScriptedCompleter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, ReorderError> {
        Ok(self.0.to_string())
    }
}

/// Enable a single strategy, with a lexical embedder so nothing is resolved
/// from the environment.
fn only(kind: StrategyKind) -> pdf_reorder::ReorderConfigBuilder {
    let mut builder = ReorderConfig::builder().embedder(Arc::new(LexicalEmbedder::new(64)));
    for k in StrategyKind::ALL {
        if k != kind {
            builder = builder.disable(k);
        }
    }
    builder
}

fn everything_offline(llm_answer: &'static str) -> ReorderConfig {
    ReorderConfig::builder()
        .embedder(Arc::new(LexicalEmbedder::new(64)))
        .completer(Arc::new(ScriptedCompleter(llm_answer)))
        .build()
        .unwrap()
}

/// Mixed-signal pages: some numbered, some dated, some only headings.
fn mixed_pages(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            let logical = (i * 5 + 3) % n.max(1);
            match i % 3 {
                0 => format!("Section {}\nTerms of the loan.\nPage {} of {}", logical + 1, logical + 1, n),
                1 => format!("Minutes of meeting held on 2023-0{}-1{}", (logical % 9) + 1, logical % 10),
                _ => format!("ARTICLE {}\nCovenants and undertakings.", logical + 1),
            }
        })
        .collect()
}

// ── Engine guarantees ────────────────────────────────────────────────────────

#[tokio::test]
async fn always_returns_a_permutation() {
    let orchestrator = Orchestrator::from_config(&everything_offline("[]")).unwrap();
    for n in 0..8 {
        let pages = mixed_pages(n);
        let r = orchestrator.reorder(&pages).await;
        assert!(is_permutation(&r.final_order, n), "n={n}: {:?}", r.final_order);
        assert_eq!(r.confidences.len(), n);
        assert!(r.confidences.iter().all(|c| (0.0..=1.0).contains(c)));
    }
}

#[tokio::test]
async fn trivial_page_counts() {
    let orchestrator = Orchestrator::from_config(&everything_offline("[0]")).unwrap();

    let empty = orchestrator.reorder::<&str>(&[]).await;
    assert!(empty.final_order.is_empty());
    assert!(empty.confidences.is_empty());

    let single = orchestrator.reorder(&["Just one page"]).await;
    assert_eq!(single.final_order, vec![0]);
    assert_eq!(single.confidences, vec![1.0]);
}

#[tokio::test]
async fn no_strategies_keeps_original_order() {
    let mut builder = ReorderConfig::builder();
    for k in StrategyKind::ALL {
        builder = builder.disable(k);
    }
    let orchestrator = Orchestrator::from_config(&builder.build().unwrap()).unwrap();
    assert!(orchestrator.strategy_names().is_empty());

    let r = orchestrator.reorder(&["c", "a", "b"]).await;
    assert_eq!(r.final_order, vec![0, 1, 2]);
    assert_eq!(r.confidences, vec![0.0; 3]);
    assert!(r.method.is_none());
}

#[tokio::test]
async fn same_input_same_answer() {
    let orchestrator = Orchestrator::from_config(&everything_offline("[]")).unwrap();
    let pages = mixed_pages(6);
    let first = orchestrator.reorder(&pages).await;
    let second = orchestrator.reorder(&pages).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn parallel_and_sequential_agree() {
    let pages = mixed_pages(7);
    let sequential = Orchestrator::from_config(&everything_offline("[]")).unwrap();
    let parallel = Orchestrator::from_config(
        &ReorderConfig::builder()
            .embedder(Arc::new(LexicalEmbedder::new(64)))
            .completer(Arc::new(ScriptedCompleter("[]")))
            .parallel(true)
            .build()
            .unwrap(),
    )
    .unwrap();
    let a = sequential.reorder(&pages).await;
    let b = parallel.reorder(&pages).await;
    assert_eq!(a.final_order, b.final_order);
    assert_eq!(a.method, b.method);
}

// ── Individual strategies through the orchestrator ───────────────────────────

#[tokio::test]
async fn page_x_of_y_footers() {
    let config = only(StrategyKind::PageNumber).build().unwrap();
    let orchestrator = Orchestrator::from_config(&config).unwrap();
    let r = orchestrator
        .reorder(&[
            "Terms continue...\nPage 2 of 3",
            "Cover\nPage 1 of 3",
            "Signatures\nPage 3 of 3",
        ])
        .await;
    assert_eq!(r.final_order, vec![1, 0, 2]);
    assert_eq!(r.confidences, vec![1.0; 3]);
    assert_eq!(r.method.as_deref(), Some("page_number"));
}

#[tokio::test]
async fn similar_pages_end_up_adjacent() {
    let embedder = TableEmbedder(vec![
        ("alpha", vec![1.0, 0.0]),
        ("alpha prime", vec![0.95, 0.312]),
        ("gamma", vec![0.1, -0.995]),
    ]);
    let config = only(StrategyKind::SemanticSimilarity)
        .embedder(Arc::new(embedder))
        .build()
        .unwrap();
    let orchestrator = Orchestrator::from_config(&config).unwrap();
    let r = orchestrator.reorder(&["alpha", "alpha prime", "gamma"]).await;
    assert_eq!(r.final_order, vec![2, 0, 1]);
    assert_eq!(r.method.as_deref(), Some("semantic_similarity"));
    assert!(r.confidences[0] > 0.0);
}

#[tokio::test]
async fn duplicate_llm_answer_is_rejected() {
    let config = only(StrategyKind::LlmReasoning)
        .completer(Arc::new(ScriptedCompleter("[0, 0, 1]")))
        .build()
        .unwrap();
    let orchestrator = Orchestrator::from_config(&config).unwrap();
    let r = orchestrator.reorder(&["x", "y", "z"]).await;
    assert_eq!(r.final_order, vec![0, 1, 2]);
    assert_eq!(r.confidences, vec![0.0; 3]);
    let llm = &r.outcomes[0];
    assert!(llm.failure.is_some());
    assert!(llm.reasoning.iter().any(|line| line.contains("duplicate indices")));
}

#[tokio::test]
async fn llm_answer_with_prose_is_accepted() {
    let config = only(StrategyKind::LlmReasoning)
        .completer(Arc::new(ScriptedCompleter("Here you go: [2,0,1]")))
        .build()
        .unwrap();
    let orchestrator = Orchestrator::from_config(&config).unwrap();
    let r = orchestrator.reorder(&["x", "y", "z"]).await;
    assert_eq!(r.final_order, vec![2, 0, 1]);
    assert_eq!(r.method.as_deref(), Some("llm_reasoning"));
    assert_eq!(r.confidences, vec![0.9; 3]);
}

#[tokio::test]
async fn page_numbers_beat_a_wrong_llm() {
    let config = ReorderConfig::builder()
        .embedder(Arc::new(LexicalEmbedder::new(64)))
        .completer(Arc::new(ScriptedCompleter("[0, 1, 2]")))
        .disable(StrategyKind::SemanticSimilarity)
        .build()
        .unwrap();
    let orchestrator = Orchestrator::from_config(&config).unwrap();
    let r = orchestrator
        .reorder(&["Page 3 of 3", "Page 1 of 3", "Page 2 of 3"])
        .await;
    assert_eq!(r.final_order, vec![1, 2, 0]);
    assert_eq!(r.method.as_deref(), Some("page_number"));
}

// ── File input and reporting ─────────────────────────────────────────────────

#[test]
fn form_feed_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "Section 2\nbody\u{c}Section 1\nintro\u{c}Section 3\nend\u{c}").unwrap();
    let pages = load_pages(file.path().to_str().unwrap()).unwrap();
    assert_eq!(pages.len(), 3);

    let config = only(StrategyKind::Structural).build().unwrap();
    let orchestrator = Orchestrator::from_config(&config).unwrap();
    let r = tokio_test::block_on(orchestrator.reorder(&pages));
    assert_eq!(r.final_order, vec![1, 0, 2]);

    let report = DiagnosticReport::analyze(&r, &pages);
    assert_eq!(report.page_count, 3);
    assert_eq!(report.method.as_deref(), Some("structural"));
    assert!(report.low_confidence_positions.is_empty());
}

#[test]
fn sync_wrapper_outside_a_runtime() {
    let config = only(StrategyKind::PageNumber).build().unwrap();
    let orchestrator = Orchestrator::from_config(&config).unwrap();
    let r = orchestrator
        .reorder_sync(&["Page 2 of 2", "Page 1 of 2"])
        .unwrap();
    assert_eq!(r.final_order, vec![1, 0]);
}
