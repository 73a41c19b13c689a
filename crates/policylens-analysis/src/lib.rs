//! Analysis algorithms for privacy-policy text: readability, key terms,
//! clause extraction and weighted risk scoring.
//!
//! Everything here is synchronous and free of shared state; worker runtimes
//! call these functions directly.

mod clauses;
pub mod lexicon;
mod readability;
mod risk;
mod terms;

use chrono::{DateTime, SecondsFormat, Utc};
use policylens_core::{AnalyzeOptions, PolicyAnalysis};

pub use clauses::{MIN_CLAUSE_LEN, assess_risk, categorize, extract_clauses};
pub use readability::{readability_score, sentence_count, syllable_count, word_count};
pub use risk::{
    HIGH_RISK_THRESHOLD, MAX_SCORE, MODERATE_RISK_THRESHOLD, calculate_risk_score,
    clause_contribution,
};
pub use terms::{MAX_KEY_TERMS, data_collection_patterns, key_terms, risk_indicators};

/// Run the full local pre-analysis of a policy document.
pub fn analyze_policy(text: &str, options: AnalyzeOptions) -> PolicyAnalysis {
    analyze_policy_at(text, options, Utc::now())
}

/// [`analyze_policy`] with an explicit analysis time.
pub fn analyze_policy_at(
    text: &str,
    options: AnalyzeOptions,
    now: DateTime<Utc>,
) -> PolicyAnalysis {
    PolicyAnalysis {
        word_count: word_count(text),
        readability_score: options.include_readability.then(|| readability_score(text)),
        key_terms: options.extract_key_terms.then(|| key_terms(text)),
        data_collection_patterns: data_collection_patterns(text),
        risk_indicators: risk_indicators(text),
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}
