//! Whole-document term statistics: key terms, data-collection patterns and
//! risk indicators.

use std::collections::HashMap;
use std::sync::LazyLock;

use policylens_core::{KeyTerm, PatternMatch, RiskIndicator, RiskLevel};
use regex::Regex;

use crate::lexicon::{HIGH_RISK, MEDIUM_RISK, STOP_WORDS, contains_term};

/// Number of key terms reported.
pub const MAX_KEY_TERMS: usize = 10;

/// Shortest word considered a key term.
const MIN_TERM_LEN: usize = 4;

/// Named data-collection patterns, reported in this order.
static DATA_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("personal information", r"(?i)\bpersonal (?:information|data)\b"),
        ("email address", r"(?i)\be-?mail(?: address(?:es)?)?\b"),
        ("location data", r"(?i)\b(?:geo-?)?location\b|\bgps\b"),
        ("cookies", r"(?i)\bcookies?\b"),
        ("ip address", r"(?i)\bip address(?:es)?\b"),
        ("device information", r"(?i)\bdevice (?:information|identifiers?|data)\b"),
        ("browsing history", r"(?i)\b(?:browsing|search) history\b"),
        (
            "payment information",
            r"(?i)\b(?:payment|credit card|billing) (?:information|details|data)\b",
        ),
        ("contacts", r"(?i)\b(?:contacts|contact list|address book)\b"),
        ("biometric data", r"(?i)\bbiometric\w*\b"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("static pattern compiles")))
    .collect()
});

/// The most frequent content words, ranked by count then alphabetically.
pub fn key_terms(text: &str) -> Vec<KeyTerm> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in text.split(|c: char| !c.is_alphabetic()) {
        if word.chars().count() < MIN_TERM_LEN {
            continue;
        }
        let word = word.to_lowercase();
        if STOP_WORDS.contains(&word.as_str()) {
            continue;
        }
        *counts.entry(word).or_insert(0) += 1;
    }

    let mut terms: Vec<KeyTerm> = counts
        .into_iter()
        .map(|(term, count)| KeyTerm { term, count })
        .collect();
    terms.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
    terms.truncate(MAX_KEY_TERMS);
    terms
}

/// Every data-collection pattern with at least one match.
pub fn data_collection_patterns(text: &str) -> Vec<PatternMatch> {
    DATA_PATTERNS
        .iter()
        .filter_map(|(name, re)| {
            let occurrences = re.find_iter(text).count();
            (occurrences > 0).then(|| PatternMatch {
                pattern: (*name).to_string(),
                occurrences,
            })
        })
        .collect()
}

/// High- and medium-risk terms present anywhere in the text, in lexicon order.
pub fn risk_indicators(text: &str) -> Vec<RiskIndicator> {
    let lower = text.to_lowercase();
    [(RiskLevel::High, HIGH_RISK), (RiskLevel::Medium, MEDIUM_RISK)]
        .into_iter()
        .flat_map(|(level, terms)| {
            terms
                .iter()
                .filter(|t| contains_term(&lower, t))
                .map(move |t| RiskIndicator {
                    term: (*t).to_string(),
                    level,
                })
                .collect::<Vec<_>>()
        })
        .collect()
}
