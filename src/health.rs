//! Community health score, status banding and recommendations.

use crate::config::HealthBands;
use crate::models::{HealthSnapshot, HealthStatus};

/// Score reported when there are no posts to judge.
pub const BASELINE_SCORE: f64 = 50.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HealthInputs {
    pub total_posts: u64,
    pub positive: u64,
    pub negative: u64,
    pub active_misinformation_alerts: u64,
}

impl HealthInputs {
    fn ratio(&self, count: u64) -> f64 {
        if self.total_posts == 0 {
            0.0
        } else {
            count as f64 / self.total_posts as f64
        }
    }
}

/// Thresholds currently breached, in the order their advice is listed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Breaches {
    pub high_priority_alerts: u64,
    pub misinformation_alerts: u64,
    pub sentiment_spike: bool,
    pub low_engagement: bool,
}

/// `clamp(50 + 30p/t - 30n/t - 20m/t, 0, 100)`; 50 when there are no posts.
pub fn community_health_score(inputs: &HealthInputs) -> f64 {
    if inputs.total_posts == 0 {
        return BASELINE_SCORE;
    }
    let score = BASELINE_SCORE + 30.0 * inputs.ratio(inputs.positive)
        - 30.0 * inputs.ratio(inputs.negative)
        - 20.0 * inputs.ratio(inputs.active_misinformation_alerts);
    score.clamp(0.0, 100.0)
}

pub fn health_status(score: f64, total_posts: u64, bands: &HealthBands) -> HealthStatus {
    if total_posts == 0 {
        HealthStatus::NoData
    } else if score >= bands.excellent {
        HealthStatus::Excellent
    } else if score >= bands.good {
        HealthStatus::Good
    } else if score >= bands.fair {
        HealthStatus::Fair
    } else {
        HealthStatus::Poor
    }
}

pub fn recommendations(status: HealthStatus, breaches: &Breaches) -> Vec<String> {
    if status == HealthStatus::NoData {
        return vec!["Start collecting community posts to get health insights".to_string()];
    }

    let mut items: Vec<&str> = Vec::new();
    if breaches.high_priority_alerts > 0 {
        items.push("Address high-priority issues");
    }
    if breaches.misinformation_alerts > 0 {
        items.push("Review flagged misinformation posts");
    }
    if breaches.sentiment_spike {
        items.push("Monitor sentiment trends");
    }
    if breaches.low_engagement {
        items.push("Consider alternative promotion strategies");
    }

    let general: &[&str] = match status {
        HealthStatus::Excellent => &[
            "Maintain current community engagement strategies",
            "Continue monitoring for any emerging issues",
            "Consider expanding positive community initiatives",
        ],
        HealthStatus::Good => &[
            "Address negative sentiment issues proactively",
            "Increase positive community engagement activities",
            "Monitor misinformation trends closely",
        ],
        HealthStatus::Fair => &[
            "Implement immediate community improvement initiatives",
            "Address high-priority concerns promptly",
            "Consider community feedback sessions",
        ],
        HealthStatus::Poor | HealthStatus::NoData => &[
            "Urgent action required for community health",
            "Implement comprehensive community improvement plan",
            "Address all high-priority issues immediately",
            "Consider external community management support",
        ],
    };
    for item in general.iter().copied() {
        if !items.contains(&item) {
            items.push(item);
        }
    }

    items.into_iter().map(str::to_string).collect()
}

/// Derive a complete snapshot in one pass; nothing is updated piecemeal.
pub fn snapshot(inputs: &HealthInputs, breaches: &Breaches, bands: &HealthBands) -> HealthSnapshot {
    let score = community_health_score(inputs);
    let status = health_status(score, inputs.total_posts, bands);
    HealthSnapshot {
        community_health_score: round1(score),
        health_status: status,
        total_posts: inputs.total_posts,
        positive_ratio: round3(inputs.ratio(inputs.positive)),
        negative_ratio: round3(inputs.ratio(inputs.negative)),
        misinformation_ratio: round3(inputs.ratio(inputs.active_misinformation_alerts)),
        recommendations: recommendations(status, breaches),
    }
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
