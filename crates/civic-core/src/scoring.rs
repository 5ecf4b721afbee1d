// Bill relevance scoring and feed ranking.
//
// The score is a sum of four independent, individually capped terms:
// policy-interest match, popularity, recency and geographic relevance.
// Policy and geography are fixed baselines until personalized profiles and
// location matching exist.

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::ScoringConfig;
use crate::model::{Bill, EngagementSnapshot};

/// Per-term contributions for one bill. `total` is their sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub policy_match: f64,
    pub popularity: f64,
    pub recency: f64,
    pub geography: f64,
    pub total: f64,
}

/// Whole days between `introduced` and `today`.
///
/// A future date counts as 0 days, and so does a missing one: the bill is
/// treated as introduced today.
pub fn days_since_introduced(introduced: Option<NaiveDate>, today: NaiveDate) -> i64 {
    match introduced {
        Some(date) => (today - date).num_days().max(0),
        None => 0,
    }
}

/// `min((votes + comment_weight * comments) * multiplier, cap)`.
pub fn popularity_term(engagement: &EngagementSnapshot, weights: &ScoringConfig) -> f64 {
    let raw = (engagement.vote_count() as f64 + weights.comment_weight * engagement.comments as f64)
        * weights.popularity_multiplier;
    raw.min(weights.popularity_cap).max(0.0)
}

/// `max(recency_max - decay * days, 0)`.
pub fn recency_term(days: i64, weights: &ScoringConfig) -> f64 {
    (weights.recency_max - weights.recency_decay_per_day * days as f64).max(0.0)
}

/// Score a single bill. Never fails: missing data degrades to neutral terms.
pub fn score_bill(
    bill: &Bill,
    engagement: &EngagementSnapshot,
    today: NaiveDate,
    weights: &ScoringConfig,
) -> ScoreBreakdown {
    let policy_match = weights.policy_baseline;
    let popularity = popularity_term(engagement, weights);
    let recency = recency_term(days_since_introduced(bill.introduced_date, today), weights);
    let geography = weights.geo_baseline;

    ScoreBreakdown {
        policy_match,
        popularity,
        recency,
        geography,
        total: policy_match + popularity + recency + geography,
    }
}

/// Sort items by descending score. Equal scores keep their input order
/// (`sort_by` is stable).
pub fn rank_by_score<T>(items: &mut [T], score: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Score every bill against its engagement and return them best-first.
pub fn rank_bills(
    bills: Vec<(Bill, EngagementSnapshot)>,
    today: NaiveDate,
    weights: &ScoringConfig,
) -> Vec<(Bill, EngagementSnapshot, ScoreBreakdown)> {
    let mut scored: Vec<_> = bills
        .into_iter()
        .map(|(bill, engagement)| {
            let breakdown = score_bill(&bill, &engagement, today, weights);
            (bill, engagement, breakdown)
        })
        .collect();
    rank_by_score(&mut scored, |(_, _, breakdown)| breakdown.total);
    scored
}
