//! Fixed term tables used by clause extraction, risk indicators and scoring.
//!
//! All terms are lowercase and matched at the start of a word in lowercased
//! text, so a stem like `advertis` covers "advertising" and "advertisers"
//! while `store` does not fire on "restore".

use std::collections::HashMap;
use std::sync::LazyLock;

use policylens_core::{Category, RiskLevel};
use regex::Regex;

/// A sentence must contain at least one of these to become a clause.
pub const RISK_KEYWORDS: &[&str] = &[
    "collect",
    "share",
    "sell",
    "third party",
    "third-party",
    "retain",
    "disclose",
    "transfer",
    "track",
    "monitor",
    "store",
    "process",
    "personal information",
    "personal data",
    "cookie",
    "advertis",
    "partner",
    "delete",
    "consent",
    "opt out",
    "opt-out",
    "encrypt",
    "security",
];

const DATA_COLLECTION: &[&str] = &[
    "collect", "gather", "obtain", "receive", "record", "track", "cookie", "monitor",
];

const DATA_SHARING: &[&str] = &[
    "share",
    "sell",
    "disclose",
    "transfer",
    "third party",
    "third-party",
    "partner",
    "advertis",
    "affiliate",
];

const DATA_RETENTION: &[&str] = &[
    "retain",
    "retention",
    "store",
    "keep",
    "archive",
    "indefinitely",
    "as long as",
];

const USER_RIGHTS: &[&str] = &[
    "right to",
    "opt out",
    "opt-out",
    "access your",
    "delete",
    "deletion",
    "correct",
    "rectif",
    "consent",
    "withdraw",
];

const SECURITY: &[&str] = &[
    "secur",
    "encrypt",
    "protect",
    "safeguard",
    "breach",
    "unauthorized",
];

/// Terms that mark a clause as high risk (level 3). Checked first.
pub const HIGH_RISK: &[&str] = &[
    "sell",
    "sold",
    "indefinitely",
    "without consent",
    "without your consent",
    "without notice",
    "any purpose",
    "perpetual",
    "irrevocable",
    "waive",
];

/// Terms that mark a clause as medium risk (level 2).
pub const MEDIUM_RISK: &[&str] = &[
    "share",
    "third party",
    "third-party",
    "disclose",
    "transfer",
    "track",
    "advertis",
    "affiliate",
    "partner",
    "monitor",
];

/// Protective terms that mark a clause as low risk (level 0.5).
pub const LOW_RISK: &[&str] = &[
    "encrypt",
    "anonymi",
    "opt out",
    "opt-out",
    "delete",
    "secure",
    "protect",
    "your consent",
    "aggregate",
];

/// Keyword set for a category; `General` has none.
pub fn category_keywords(category: Category) -> &'static [&'static str] {
    match category {
        Category::DataCollection => DATA_COLLECTION,
        Category::DataSharing => DATA_SHARING,
        Category::DataRetention => DATA_RETENTION,
        Category::UserRights => USER_RIGHTS,
        Category::Security => SECURITY,
        Category::General => &[],
    }
}

/// Weight applied to a clause's risk contribution.
pub fn category_weight(category: Category) -> f64 {
    match category {
        Category::DataCollection => 0.30,
        Category::DataSharing => 0.25,
        Category::DataRetention => 0.20,
        Category::UserRights => 0.15,
        Category::Security => 0.10,
        Category::General => 0.10,
    }
}

/// Risk term tables in priority order, paired with the level they assign.
pub fn risk_tiers() -> [(RiskLevel, &'static [&'static str]); 3] {
    [
        (RiskLevel::High, HIGH_RISK),
        (RiskLevel::Medium, MEDIUM_RISK),
        (RiskLevel::Low, LOW_RISK),
    ]
}

/// Words ignored by key-term extraction (only words of 4+ letters matter).
pub const STOP_WORDS: &[&str] = &[
    "about", "also", "been", "before", "being", "both", "could", "does", "each", "from", "have",
    "here", "into", "just", "like", "many", "more", "most", "much", "must", "only", "other",
    "ours", "over", "same", "should", "some", "such", "than", "that", "their", "them", "then",
    "there", "these", "they", "this", "those", "through", "under", "until", "upon", "very",
    "were", "what", "when", "where", "which", "while", "will", "with", "within", "would",
    "your", "yours",
];

/// Word-start pattern for every term in every table.
static TERM_PATTERNS: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    all_terms()
        .map(|term| {
            let pattern = format!(r"\b{}", regex::escape(term));
            (term, Regex::new(&pattern).expect("escaped term compiles"))
        })
        .collect()
});

fn all_terms() -> impl Iterator<Item = &'static str> {
    RISK_KEYWORDS
        .iter()
        .chain(HIGH_RISK)
        .chain(MEDIUM_RISK)
        .chain(LOW_RISK)
        .chain(Category::PRIORITY.into_iter().flat_map(category_keywords))
        .copied()
}

/// Whether `term` occurs at the start of a word in `haystack`.
pub(crate) fn contains_term(haystack: &str, term: &str) -> bool {
    match TERM_PATTERNS.get(term) {
        Some(re) => re.is_match(haystack),
        None => Regex::new(&format!(r"\b{}", regex::escape(term)))
            .is_ok_and(|re| re.is_match(haystack)),
    }
}

/// Returns the first term from `terms` found in `haystack`.
pub(crate) fn first_match<'a>(haystack: &str, terms: &[&'a str]) -> Option<&'a str> {
    terms.iter().copied().find(|t| contains_term(haystack, t))
}
