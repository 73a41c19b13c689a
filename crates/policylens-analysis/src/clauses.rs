//! Sentence-level clause extraction with category and risk classification.

use policylens_core::{Category, ClauseRecord, RiskLevel};

use crate::lexicon::{RISK_KEYWORDS, category_keywords, first_match, risk_tiers};

/// Candidates shorter than this (in characters, after trimming) are ignored.
pub const MIN_CLAUSE_LEN: usize = 20;

/// Split text into sentences and keep those that mention a risk keyword.
///
/// `position` is the sentence's index in the split sequence, so positions are
/// increasing but not necessarily contiguous.
pub fn extract_clauses(text: &str) -> Vec<ClauseRecord> {
    let clauses: Vec<ClauseRecord> = text
        .split(['.', '!', '?'])
        .enumerate()
        .filter_map(|(position, raw)| {
            let sentence = raw.trim();
            if sentence.chars().count() < MIN_CLAUSE_LEN {
                return None;
            }
            let lower = sentence.to_lowercase();
            first_match(&lower, RISK_KEYWORDS)?;

            Some(ClauseRecord {
                id: format!("clause_{position}"),
                text: sentence.to_string(),
                category: categorize(&lower),
                risk_level: assess_risk(&lower),
                position,
            })
        })
        .collect();

    tracing::debug!(clauses = clauses.len(), "extracted clauses");
    clauses
}

/// First category (in priority order) whose keywords appear in `lower`.
pub fn categorize(lower: &str) -> Category {
    Category::PRIORITY
        .into_iter()
        .find(|c| first_match(lower, category_keywords(*c)).is_some())
        .unwrap_or(Category::General)
}

/// Risk level from the first matching tier (high, medium, low), else default.
pub fn assess_risk(lower: &str) -> RiskLevel {
    risk_tiers()
        .into_iter()
        .find(|(_, terms)| first_match(lower, terms).is_some())
        .map(|(level, _)| level)
        .unwrap_or(RiskLevel::Default)
}
