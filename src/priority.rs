use serde::{Deserialize, Serialize};

use crate::config::PriorityWeights;
use crate::models::Category;

/// Upper edge of the `Low` display band.
pub const MEDIUM_BAND_FLOOR: f64 = 0.4;
/// Scores strictly above this render as `High`.
pub const HIGH_BAND_FLOOR: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityBand {
    Low,
    Medium,
    High,
}

impl PriorityBand {
    pub fn from_score(score: f64) -> Self {
        if score > HIGH_BAND_FLOOR {
            PriorityBand::High
        } else if score >= MEDIUM_BAND_FLOOR {
            PriorityBand::Medium
        } else {
            PriorityBand::Low
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PriorityInputs {
    pub sentiment_score: f64,
    pub misinformation_risk: f64,
    pub category: Category,
    pub engagement_count: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct PriorityScorer {
    weights: PriorityWeights,
}

impl PriorityScorer {
    pub fn new(weights: PriorityWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, inputs: &PriorityInputs) -> f64 {
        let w = &self.weights;
        let risk = inputs.misinformation_risk.clamp(0.0, 1.0);
        let negativity = (-inputs.sentiment_score).clamp(0.0, 1.0);
        let criticality = w.criticality.weight(inputs.category).clamp(0.0, 1.0);
        let engagement = self.normalized_engagement(inputs.engagement_count);

        let raw = w.misinformation * risk
            + w.negativity * negativity
            + w.category * criticality
            + w.engagement * engagement;
        if raw.is_finite() {
            raw.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Saturating map of a reply/mention count onto [0, 1).
    fn normalized_engagement(&self, count: Option<u32>) -> f64 {
        let count = count.unwrap_or(0) as f64;
        count / (count + self.weights.engagement_half_saturation)
    }
}
