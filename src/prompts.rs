//! Prompt for LLM-based page ordering.
//!
//! Kept apart from [`crate::strategy::llm_reasoning`] so the wording can be
//! inspected and tested without a provider.

use crate::page::PageContent;

/// Instructions appended after the page listing.
pub const ORDERING_INSTRUCTIONS: &str = r#"The pages above come from a single document whose pages were shuffled.
Determine the original reading order.

Rules:
1. Use page numbers, headings, section numbering, dates, and the flow of sentences across page breaks.
2. A cover or title page comes first; signature and witness pages come last.
3. Respond with ONLY a JSON array of the original indices in the corrected order, e.g. [2, 0, 1].
4. Include every original index exactly once.
5. Do NOT add explanations, prose, or code fences."#;

/// Build the ordering prompt.
///
/// Each page appears with its position in the listing, its original index,
/// and at most `excerpt_chars` characters of its text with whitespace
/// collapsed and control characters removed.
pub fn ordering_prompt(pages: &[PageContent], excerpt_chars: usize) -> String {
    let mut prompt = format!(
        "You are ordering the {} pages of a shuffled document. Each page excerpt is listed below.\n\n",
        pages.len()
    );
    for (position, page) in pages.iter().enumerate() {
        prompt.push_str(&format!(
            "Position {} (original index {}): {}\n",
            position,
            page.page_index,
            excerpt(&page.content, excerpt_chars)
        ));
    }
    prompt.push('\n');
    prompt.push_str(ORDERING_INSTRUCTIONS);
    prompt
}

/// Collapse whitespace, drop control characters, cut at `max_chars`.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let cleaned: String = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect();
    if cleaned.is_empty() {
        return "[empty page]".to_string();
    }
    if cleaned.chars().count() > max_chars {
        let cut: String = cleaned.chars().take(max_chars).collect();
        format!("{}…", cut.trim_end())
    } else {
        cleaned
    }
}
