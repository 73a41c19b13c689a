//! Weighted aggregation of clause risk into an overall privacy score.

use std::collections::BTreeMap;

use policylens_core::{Category, ClauseRecord, RiskLevel, RiskScoreResult};

use crate::lexicon::category_weight;

pub const MAX_SCORE: f64 = 100.0;

/// Scores above this get the high-risk recommendation.
pub const HIGH_RISK_THRESHOLD: f64 = 70.0;
/// Scores above this (and not above [`HIGH_RISK_THRESHOLD`]) are moderate.
pub const MODERATE_RISK_THRESHOLD: f64 = 40.0;

/// Points a single clause adds to the total: `weight * level * 100`.
pub fn clause_contribution(clause: &ClauseRecord) -> f64 {
    category_weight(clause.category) * (clause.risk_level.value() * 100.0)
}

/// Aggregate clause contributions into a [`RiskScoreResult`].
///
/// The total is clamped to `[0, 100]`, as is each category's share in the
/// breakdown. Identical input always yields an identical result.
pub fn calculate_risk_score(clauses: &[ClauseRecord]) -> RiskScoreResult {
    let mut breakdown: BTreeMap<Category, f64> = BTreeMap::new();
    let mut total = 0.0;

    for clause in clauses {
        let points = clause_contribution(clause);
        total += points;
        *breakdown.entry(clause.category).or_insert(0.0) += points;
    }

    for points in breakdown.values_mut() {
        *points = points.min(MAX_SCORE);
    }

    let score = total.clamp(0.0, MAX_SCORE);
    let high_risk = clauses
        .iter()
        .filter(|c| c.risk_level >= RiskLevel::High)
        .count();

    RiskScoreResult {
        score,
        breakdown,
        recommendations: recommendations(score, high_risk),
    }
}

fn recommendations(score: f64, high_risk_clauses: usize) -> Vec<String> {
    let mut out = Vec::new();
    if score > HIGH_RISK_THRESHOLD {
        out.push(
            "High privacy risk: review how this service collects and shares your data before accepting"
                .to_string(),
        );
    } else if score > MODERATE_RISK_THRESHOLD {
        out.push(
            "Moderate privacy risk: consider limiting the personal data you provide to this service"
                .to_string(),
        );
    } else {
        out.push("Low privacy risk: this policy follows common privacy practices".to_string());
    }

    if high_risk_clauses > 0 {
        out.push(format!(
            "Found {high_risk_clauses} high-risk clause(s) that warrant careful review"
        ));
    }
    out
}
