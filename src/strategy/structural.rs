//! Ordering by section headings: Article, Section, Schedule, Exhibit,
//! Appendix, Annex.
//!
//! Each page is keyed by the first heading at the start of one of its lines.
//! Body headings (Article/Section) come before attachments, which follow in
//! the conventional Schedule → Exhibit → Appendix → Annex sequence. Labels
//! compare numerically: `3.2 < 3.10`, `IV < IX`, `A < B`.

use super::{OrderingStrategy, StrategyKind};
use crate::page::{OrderingResult, PageContent};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;

static RE_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?mi)^[ \t]*(article|section|schedule|exhibit|appendix|annex)[ \t]+([0-9]+(?:\.[0-9]+)*|[a-z]+)\b",
    )
    .unwrap()
});

/// Heading families, in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MarkerKind {
    Article,
    Section,
    Schedule,
    Exhibit,
    Appendix,
    Annex,
}

impl MarkerKind {
    fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "article" => Some(MarkerKind::Article),
            "section" => Some(MarkerKind::Section),
            "schedule" => Some(MarkerKind::Schedule),
            "exhibit" => Some(MarkerKind::Exhibit),
            "appendix" => Some(MarkerKind::Appendix),
            "annex" => Some(MarkerKind::Annex),
            _ => None,
        }
    }

    /// Articles and sections share the body tier.
    fn tier(&self) -> u8 {
        match self {
            MarkerKind::Article | MarkerKind::Section => 0,
            MarkerKind::Schedule => 1,
            MarkerKind::Exhibit => 2,
            MarkerKind::Appendix => 3,
            MarkerKind::Annex => 4,
        }
    }

    fn is_attachment(&self) -> bool {
        self.tier() > 0
    }
}

/// A recognised heading such as `Section 3.2` or `Exhibit B`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub label: Vec<u32>,
    pub text: String,
}

impl Marker {
    fn sort_key(&self) -> (u8, &[u32]) {
        (self.kind.tier(), &self.label)
    }

    fn cmp_key(&self, other: &Marker) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Parse `token` as a heading label.
///
/// Dotted numbers are split; a single letter on an attachment is a letter
/// index (`Schedule C` is the third schedule, not 100); other alphabetic
/// tokens must be roman numerals.
fn parse_label(kind: MarkerKind, token: &str) -> Option<Vec<u32>> {
    if token.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return token.split('.').map(|p| p.parse().ok()).collect();
    }
    let upper = token.to_ascii_uppercase();
    if upper.len() == 1 && kind.is_attachment() {
        return letter_index(&upper).map(|v| vec![v]);
    }
    roman_value(&upper)
        .or_else(|| if upper.len() == 1 { letter_index(&upper) } else { None })
        .map(|v| vec![v])
}

fn letter_index(upper: &str) -> Option<u32> {
    let c = upper.chars().next()?;
    c.is_ascii_uppercase().then(|| c as u32 - 'A' as u32 + 1)
}

/// Value of a well-formed roman numeral (subtractive notation).
fn roman_value(upper: &str) -> Option<u32> {
    let digit = |c: char| match c {
        'I' => Some(1),
        'V' => Some(5),
        'X' => Some(10),
        'L' => Some(50),
        'C' => Some(100),
        'D' => Some(500),
        'M' => Some(1000),
        _ => None,
    };
    let values: Vec<i64> = upper.chars().map(digit).collect::<Option<_>>()?;
    let mut total = 0i64;
    for (i, v) in values.iter().enumerate() {
        match values.get(i + 1) {
            Some(next) if next > v => total -= v,
            _ => total += v,
        }
    }
    if total <= 0 {
        return None;
    }
    let total = total as u32;
    // Round-trip check rejects non-canonical forms such as "IIII" or "DID".
    (to_roman(total) == upper).then_some(total)
}

fn to_roman(mut n: u32) -> String {
    const TABLE: [(u32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, glyph) in TABLE {
        while n >= value {
            out.push_str(glyph);
            n -= value;
        }
    }
    out
}

/// Every heading on a page, in reading order.
pub fn find_markers(content: &str) -> Vec<Marker> {
    RE_HEADING
        .captures_iter(content)
        .filter_map(|caps| {
            let kind = MarkerKind::parse(&caps[1])?;
            let label = parse_label(kind, &caps[2])?;
            Some(Marker {
                kind,
                label,
                text: caps[0].trim().to_string(),
            })
        })
        .collect()
}

/// True when two same-family headings on one page run backwards.
fn has_inversion(markers: &[Marker]) -> bool {
    markers.windows(2).any(|w| {
        w[0].kind == w[1].kind && w[1].cmp_key(&w[0]) == Ordering::Less
    })
}

/// Orders pages by their section headings.
#[derive(Debug, Default)]
pub struct StructuralPatternStrategy;

impl StructuralPatternStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OrderingStrategy for StructuralPatternStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Structural
    }

    /// At least two pages must carry a heading.
    fn can_handle(&self, pages: &[PageContent]) -> bool {
        pages
            .iter()
            .filter(|p| !find_markers(&p.content).is_empty())
            .take(2)
            .count()
            == 2
    }

    async fn attempt_ordering(&self, pages: &[PageContent]) -> OrderingResult {
        let n = pages.len();
        let markers: Vec<Vec<Marker>> = pages.iter().map(|p| find_markers(&p.content)).collect();

        let mut reasoning = Vec::new();
        let mut marked: Vec<usize> = Vec::new();
        let mut inverted = 0usize;
        for (pos, found) in markers.iter().enumerate() {
            if let Some(primary) = found.first() {
                reasoning.push(format!(
                    "Original page {} opens with '{}'",
                    pages[pos].page_index, primary
                ));
                marked.push(pos);
                if has_inversion(found) {
                    inverted += 1;
                    reasoning.push(format!(
                        "Original page {} lists headings out of sequence",
                        pages[pos].page_index
                    ));
                }
            }
        }

        // Unmarked pages ride along behind the nearest preceding marked page.
        let mut leading: Vec<usize> = Vec::new();
        let mut followers: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut anchor: Option<usize> = None;
        for (pos, found) in markers.iter().enumerate() {
            if !found.is_empty() {
                anchor = Some(pos);
            } else {
                match anchor {
                    Some(a) => followers[a].push(pos),
                    None => leading.push(pos),
                }
            }
        }

        let mut sorted = marked.clone();
        sorted.sort_by(|&a, &b| markers[a][0].cmp_key(&markers[b][0]).then(a.cmp(&b)));

        let mut order: Vec<usize> = leading.iter().map(|&p| pages[p].page_index).collect();
        for &pos in &sorted {
            order.push(pages[pos].page_index);
            order.extend(followers[pos].iter().map(|&p| pages[p].page_index));
        }

        let coverage = marked.len() as f64 / n as f64;
        let inversion_ratio = if marked.is_empty() {
            0.0
        } else {
            inverted as f64 / marked.len() as f64
        };
        let confidence = coverage * (1.0 - 0.5 * inversion_ratio);
        reasoning.push(format!(
            "{}/{} pages carry a structural heading; {} with out-of-sequence headings",
            marked.len(),
            n,
            inverted
        ));

        OrderingResult::new(self.name(), order, confidence, reasoning)
    }
}
