//! Ordering strategies.
//!
//! Each strategy inspects the page set on its own and either declines
//! (`can_handle` → false) or proposes an [`OrderingResult`]. Strategies are
//! stateless apart from their injected collaborators, so one instance can
//! serve concurrent requests.
//!
//! ## Priority
//!
//! [`StrategyKind::ALL`] fixes the order in which strategies run and, on a
//! confidence tie, which result wins (earlier is preferred):
//!
//! ```text
//! page_number → business_logic → structural → semantic_similarity → date_sequence → llm_reasoning
//! ```

use crate::page::{OrderingResult, PageContent};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod business_logic;
pub mod date_sequence;
pub mod llm_reasoning;
pub mod page_number;
pub mod semantic;
pub mod structural;

pub use business_logic::{BusinessLogicStrategy, BusinessRules, WeightedPattern};
pub use date_sequence::DateSequenceStrategy;
pub use llm_reasoning::LlmReasoningStrategy;
pub use page_number::PageNumberStrategy;
pub use semantic::SemanticSimilarityStrategy;
pub use structural::StructuralPatternStrategy;

/// The two-method contract every strategy implements.
#[async_trait]
pub trait OrderingStrategy: Send + Sync {
    /// Which strategy this is; determines its priority.
    fn kind(&self) -> StrategyKind;

    /// Name recorded as `OrderingResult::method`.
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    /// Fast, side-effect-free applicability check. Must return false for an
    /// empty page list.
    fn can_handle(&self, pages: &[PageContent]) -> bool;

    /// Propose an order. Only called after `can_handle` returned true.
    ///
    /// Never fails: collaborator errors become a zero-confidence result with
    /// the failure recorded in `reasoning`.
    async fn attempt_ordering(&self, pages: &[PageContent]) -> OrderingResult;
}

/// Identifies a strategy; declaration order is priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    PageNumber,
    BusinessLogic,
    Structural,
    SemanticSimilarity,
    DateSequence,
    LlmReasoning,
}

impl StrategyKind {
    /// Every strategy, highest priority first.
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::PageNumber,
        StrategyKind::BusinessLogic,
        StrategyKind::Structural,
        StrategyKind::SemanticSimilarity,
        StrategyKind::DateSequence,
        StrategyKind::LlmReasoning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::PageNumber => "page_number",
            StrategyKind::BusinessLogic => "business_logic",
            StrategyKind::Structural => "structural",
            StrategyKind::SemanticSimilarity => "semantic_similarity",
            StrategyKind::DateSequence => "date_sequence",
            StrategyKind::LlmReasoning => "llm_reasoning",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalised.as_str() {
            "page_number" | "pages" => Ok(StrategyKind::PageNumber),
            "business_logic" | "business" => Ok(StrategyKind::BusinessLogic),
            "structural" | "structure" => Ok(StrategyKind::Structural),
            "semantic_similarity" | "semantic" => Ok(StrategyKind::SemanticSimilarity),
            "date_sequence" | "date" | "dates" => Ok(StrategyKind::DateSequence),
            "llm_reasoning" | "llm" => Ok(StrategyKind::LlmReasoning),
            other => Err(format!(
                "unknown strategy '{other}' (expected one of: {})",
                StrategyKind::ALL.map(|k| k.as_str()).join(", ")
            )),
        }
    }
}
