//! Chronological ordering by the earliest calendar date on each page.
//!
//! Recognised forms:
//!
//! | Form | Example |
//! |------|---------|
//! | ISO | `2024-03-15` |
//! | numeric | `03/15/2024` (US), `15/03/2024` when the US reading is invalid |
//! | month first | `March 15, 2024`, `Mar 15 2024` |
//! | day first | `15 March 2024`, `15th Mar, 2024` |
//!
//! Undated pages attach to the dated page nearest to them by original index.

use super::{OrderingStrategy, StrategyKind};
use crate::page::{OrderingResult, PageContent};
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Date ordering is a heuristic; even perfect coverage stays below this.
const CONFIDENCE_CEILING: f64 = 0.8;

const MONTHS: &str = r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

static RE_ISO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());

static RE_NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[/.](\d{1,2})[/.](\d{4})\b").unwrap());

static RE_MONTH_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTHS})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b"
    ))
    .unwrap()
});

static RE_DAY_FIRST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:day\s+of\s+)?({MONTHS})\.?,?\s+(\d{{4}})\b"
    ))
    .unwrap()
});

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let m = match lower.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(m)
}

fn ymd(y: &str, m: u32, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m, d.parse().ok()?)
}

/// Every valid calendar date mentioned in `content`.
pub fn find_dates(content: &str) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    for c in RE_ISO.captures_iter(content) {
        if let Some(d) = c[2].parse().ok().and_then(|m| ymd(&c[1], m, &c[3])) {
            dates.push(d);
        }
    }
    for c in RE_NUMERIC.captures_iter(content) {
        let us = c[1].parse().ok().and_then(|m| ymd(&c[3], m, &c[2]));
        let intl = || c[2].parse().ok().and_then(|m| ymd(&c[3], m, &c[1]));
        if let Some(d) = us.or_else(intl) {
            dates.push(d);
        }
    }
    for c in RE_MONTH_FIRST.captures_iter(content) {
        if let Some(d) = month_number(&c[1]).and_then(|m| ymd(&c[3], m, &c[2])) {
            dates.push(d);
        }
    }
    for c in RE_DAY_FIRST.captures_iter(content) {
        if let Some(d) = month_number(&c[2]).and_then(|m| ymd(&c[3], m, &c[1])) {
            dates.push(d);
        }
    }
    dates
}

/// Orders pages chronologically.
#[derive(Debug, Default)]
pub struct DateSequenceStrategy;

impl DateSequenceStrategy {
    pub fn new() -> Self {
        Self
    }
}

/// `1 / (1 + σ/365)` over the day numbers of `dates`.
fn clustering(dates: &[NaiveDate]) -> f64 {
    if dates.len() < 2 {
        return 1.0;
    }
    let days: Vec<f64> = dates.iter().map(|d| d.num_days_from_ce() as f64).collect();
    let mean = days.iter().sum::<f64>() / days.len() as f64;
    let var = days.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / days.len() as f64;
    1.0 / (1.0 + var.sqrt() / 365.0)
}

#[async_trait]
impl OrderingStrategy for DateSequenceStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DateSequence
    }

    /// At least two distinct dates across the whole input.
    fn can_handle(&self, pages: &[PageContent]) -> bool {
        let mut distinct = BTreeSet::new();
        for p in pages {
            distinct.extend(find_dates(&p.content));
            if distinct.len() >= 2 {
                return true;
            }
        }
        false
    }

    async fn attempt_ordering(&self, pages: &[PageContent]) -> OrderingResult {
        let n = pages.len();
        let earliest: Vec<Option<NaiveDate>> = pages
            .iter()
            .map(|p| find_dates(&p.content).into_iter().min())
            .collect();

        let mut reasoning = Vec::new();
        let mut dated: Vec<usize> = Vec::new();
        for (pos, date) in earliest.iter().enumerate() {
            if let Some(d) = date {
                reasoning.push(format!(
                    "Original page {} earliest date {}",
                    pages[pos].page_index, d
                ));
                dated.push(pos);
            }
        }

        // Undated pages sit next to the dated page nearest by original index,
        // on the side they came from.
        let mut before: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut after: Vec<Vec<usize>> = vec![Vec::new(); n];
        for pos in (0..n).filter(|p| earliest[*p].is_none()) {
            let nearest = dated
                .iter()
                .copied()
                .min_by_key(|&d| (d.abs_diff(pos), d));
            match nearest {
                Some(anchor) if anchor > pos => before[anchor].push(pos),
                Some(anchor) => after[anchor].push(pos),
                None => {}
            }
        }

        let mut sorted = dated.clone();
        sorted.sort_by_key(|&pos| (earliest[pos], pos));

        let mut order = Vec::with_capacity(n);
        for &pos in &sorted {
            order.extend(before[pos].iter().map(|&p| pages[p].page_index));
            order.push(pages[pos].page_index);
            order.extend(after[pos].iter().map(|&p| pages[p].page_index));
        }
        if dated.is_empty() {
            order = pages.iter().map(|p| p.page_index).collect();
        }

        let dates: Vec<NaiveDate> = dated.iter().filter_map(|&p| earliest[p]).collect();
        let coverage = dated.len() as f64 / n.max(1) as f64;
        let cluster = clustering(&dates);
        let confidence = coverage * cluster * CONFIDENCE_CEILING;
        reasoning.push(format!(
            "{}/{} pages dated; clustering {:.2}",
            dated.len(),
            n,
            cluster
        ));

        OrderingResult::new(self.name(), order, confidence, reasoning)
    }
}
