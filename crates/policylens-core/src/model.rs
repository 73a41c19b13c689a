//! Shared analysis types exchanged between callers and worker runtimes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Privacy risk category a clause is filed under.
///
/// Variant order is the classification priority: the first category whose
/// keywords appear in a sentence wins, `General` is the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    DataCollection,
    DataSharing,
    DataRetention,
    UserRights,
    Security,
    General,
}

impl Category {
    /// Categories with a keyword set, in classification priority order.
    pub const PRIORITY: [Category; 5] = [
        Self::DataCollection,
        Self::DataSharing,
        Self::DataRetention,
        Self::UserRights,
        Self::Security,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataCollection => "dataCollection",
            Self::DataSharing => "dataSharing",
            Self::DataRetention => "dataRetention",
            Self::UserRights => "userRights",
            Self::Security => "security",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clause risk level. Serialized as its numeric weight (0.5, 1, 2, 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub enum RiskLevel {
    /// Protective language (encryption, opt-out, deletion).
    Low,
    /// Risk-bearing clause with no qualifying terms.
    Default,
    Medium,
    High,
}

impl RiskLevel {
    pub fn value(&self) -> f64 {
        match self {
            Self::Low => 0.5,
            Self::Default => 1.0,
            Self::Medium => 2.0,
            Self::High => 3.0,
        }
    }
}

impl From<RiskLevel> for f64 {
    fn from(level: RiskLevel) -> f64 {
        level.value()
    }
}

impl TryFrom<f64> for RiskLevel {
    type Error = String;

    fn try_from(v: f64) -> Result<Self, Self::Error> {
        [Self::Low, Self::Default, Self::Medium, Self::High]
            .into_iter()
            .find(|level| level.value() == v)
            .ok_or_else(|| format!("invalid risk level {v}; expected 0.5, 1, 2 or 3"))
    }
}

/// A sentence-level fragment of policy text flagged as privacy-relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClauseRecord {
    pub id: String,
    pub text: String,
    pub category: Category,
    pub risk_level: RiskLevel,
    /// Index of the sentence within the source text.
    pub position: usize,
}

/// Aggregate privacy risk derived from a set of clauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScoreResult {
    /// Overall score in `[0, 100]`.
    pub score: f64,
    /// Per-category points, each capped at 100.
    pub breakdown: BTreeMap<Category, f64>,
    pub recommendations: Vec<String>,
}

/// Options for a full policy analysis. Both flags default to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeOptions {
    pub include_readability: bool,
    pub extract_key_terms: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            include_readability: true,
            extract_key_terms: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTerm {
    pub term: String,
    pub count: usize,
}

/// A named data-collection pattern and how often it matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub pattern: String,
    pub occurrences: usize,
}

/// A high- or medium-risk term found in the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskIndicator {
    pub term: String,
    pub level: RiskLevel,
}

/// Local pre-analysis of a policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyAnalysis {
    pub word_count: usize,
    /// `None` when readability was not requested.
    pub readability_score: Option<f64>,
    /// `None` when key-term extraction was not requested.
    pub key_terms: Option<Vec<KeyTerm>>,
    pub data_collection_patterns: Vec<PatternMatch>,
    pub risk_indicators: Vec<RiskIndicator>,
    /// RFC 3339 UTC timestamp.
    pub timestamp: String,
}

// ── Task payloads ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzePolicyPayload {
    pub text: String,
    #[serde(default)]
    pub options: AnalyzeOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractClausesPayload {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScorePayload {
    pub clauses: Vec<ClauseRecord>,
    /// Accepted for forward compatibility; not used in weighting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_profile: Option<Value>,
}
