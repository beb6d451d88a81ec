//! Service configuration and the single source of every scoring threshold.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::misinformation::RuleSet;
use crate::models::Category;

/// Label cutoffs and lexicon gains for the sentiment classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// Scores strictly above this are `positive`.
    pub positive_threshold: f64,
    /// Scores strictly below this are `negative`.
    pub negative_threshold: f64,
    /// How many preceding tokens a negator reaches.
    pub negation_window: usize,
    /// Extra weight for an ALL-CAPS polarity term (0.5 = x1.5).
    pub caps_boost: f64,
    /// Extra weight per unit of exclamation density.
    pub exclamation_gain: f64,
    /// Scale applied after dividing by token count.
    pub gain: f64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            positive_threshold: 0.1,
            negative_threshold: -0.1,
            negation_window: 3,
            caps_boost: 0.5,
            exclamation_gain: 0.5,
            gain: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryCriticality {
    pub general: f64,
    pub amenities: f64,
    pub maintenance: f64,
    pub events: f64,
    pub security: f64,
    pub noise: f64,
}

impl CategoryCriticality {
    pub fn weight(&self, category: Category) -> f64 {
        match category {
            Category::General => self.general,
            Category::Amenities => self.amenities,
            Category::Maintenance => self.maintenance,
            Category::Events => self.events,
            Category::Security => self.security,
            Category::Noise => self.noise,
        }
    }
}

impl Default for CategoryCriticality {
    fn default() -> Self {
        Self {
            general: 0.3,
            amenities: 0.4,
            maintenance: 0.8,
            events: 0.2,
            security: 1.0,
            noise: 0.6,
        }
    }
}

/// Weights of the priority formula:
/// `w1*risk + w2*max(0, -sentiment) + w3*criticality + w4*engagement`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    pub misinformation: f64,
    pub negativity: f64,
    pub category: f64,
    pub engagement: f64,
    /// Engagement count that normalizes to 0.5.
    pub engagement_half_saturation: f64,
    pub criticality: CategoryCriticality,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            misinformation: 0.45,
            negativity: 0.25,
            category: 0.2,
            engagement: 0.1,
            engagement_half_saturation: 10.0,
            criticality: CategoryCriticality::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub misinformation: f64,
    pub misinformation_high: f64,
    pub priority: f64,
    pub priority_high: f64,
    /// Day-over-day rise in the negative share that counts as a spike.
    pub spike_delta: f64,
    /// Posts needed today before a spike is considered.
    pub spike_min_posts: u64,
    /// Consecutive events posts inspected for low engagement.
    pub low_engagement_window: usize,
    /// Engagement below this on every post in the window is "low".
    pub low_engagement_max: u32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            misinformation: 0.5,
            misinformation_high: 0.8,
            priority: 0.7,
            priority_high: 0.8,
            spike_delta: 0.2,
            spike_min_posts: 5,
            low_engagement_window: 3,
            low_engagement_max: 2,
        }
    }
}

/// Lower bounds of each health status, in points out of 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthBands {
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
}

impl Default for HealthBands {
    fn default() -> Self {
        Self {
            excellent: 80.0,
            good: 60.0,
            fair: 40.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub sentiment: SentimentConfig,
    pub priority: PriorityWeights,
    pub alerts: AlertThresholds,
    pub health: HealthBands,
    pub misinformation_rules: RuleSet,
}

impl ScoringConfig {
    /// Load a JSON scoring config; omitted fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.sentiment;
        if s.negative_threshold > s.positive_threshold {
            return Err(Error::Config(format!(
                "negative_threshold {} exceeds positive_threshold {}",
                s.negative_threshold, s.positive_threshold
            )));
        }
        if !(-1.0..=1.0).contains(&s.negative_threshold) || !(-1.0..=1.0).contains(&s.positive_threshold) {
            return Err(Error::Config("sentiment thresholds must lie in [-1, 1]".to_string()));
        }

        let p = &self.priority;
        let weights = [p.misinformation, p.negativity, p.category, p.engagement];
        if weights.iter().any(|w| *w < 0.0) {
            return Err(Error::Config("priority weights must be non-negative".to_string()));
        }
        if p.engagement_half_saturation <= 0.0 {
            return Err(Error::Config("engagement_half_saturation must be positive".to_string()));
        }

        let h = &self.health;
        if !(h.excellent > h.good && h.good > h.fair) {
            return Err(Error::Config(
                "health bands must be strictly descending (excellent > good > fair)".to_string(),
            ));
        }

        if self.alerts.low_engagement_window == 0 {
            return Err(Error::Config("low_engagement_window must be at least 1".to_string()));
        }

        self.misinformation_rules.validate()
    }
}

/// Server-level configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub queue_capacity: usize,
    pub workers: usize,
    pub reconcile_interval_secs: u64,
    pub scoring_config_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `COMMUNITY_PULSE_BIND_ADDR`: Server bind address (default: "0.0.0.0:8000")
    /// - `DATABASE_URL`: Postgres connection string
    /// - `COMMUNITY_PULSE_QUEUE_CAPACITY`: Bounded ingest queue size (default: 1024)
    /// - `COMMUNITY_PULSE_WORKERS`: Scoring workers (default: available parallelism)
    /// - `COMMUNITY_PULSE_RECONCILE_SECS`: Reconcile pass interval (default: 300)
    /// - `COMMUNITY_PULSE_SCORING_CONFIG`: Path to a JSON `ScoringConfig`
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = std::env::var("COMMUNITY_PULSE_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let queue_capacity = parse_env("COMMUNITY_PULSE_QUEUE_CAPACITY", 1024)?;
        if queue_capacity == 0 {
            anyhow::bail!("COMMUNITY_PULSE_QUEUE_CAPACITY must be at least 1");
        }

        let default_workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let workers = parse_env("COMMUNITY_PULSE_WORKERS", default_workers)?.max(1);

        let reconcile_interval_secs = parse_env("COMMUNITY_PULSE_RECONCILE_SECS", 300)?;

        let scoring_config_path = std::env::var("COMMUNITY_PULSE_SCORING_CONFIG")
            .ok()
            .map(PathBuf::from);

        tracing::info!(
            bind_addr = %bind_addr,
            persistent = database_url.is_some(),
            queue_capacity,
            workers,
            reconcile_interval_secs,
            scoring_config = ?scoring_config_path,
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            database_url,
            queue_capacity,
            workers,
            reconcile_interval_secs,
            scoring_config_path,
        })
    }

    pub fn scoring(&self) -> Result<ScoringConfig> {
        match &self.scoring_config_path {
            Some(path) => ScoringConfig::from_file(path),
            None => Ok(ScoringConfig::default()),
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} is invalid: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        ScoringConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_inverted_sentiment_thresholds() {
        let mut config = ScoringConfig::default();
        config.sentiment.positive_threshold = -0.2;
        config.sentiment.negative_threshold = 0.2;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_unordered_health_bands() {
        let mut config = ScoringConfig::default();
        config.health.good = 85.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{"sentiment": {"positive_threshold": 0.3, "negative_threshold": -0.3}}"#;
        let config: ScoringConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.sentiment.positive_threshold, 0.3);
        assert_eq!(config.sentiment.negation_window, 3);
        assert_eq!(config.health, HealthBands::default());
        assert!(!config.misinformation_rules.is_empty());
    }

    #[test]
    fn criticality_ranks_security_over_events() {
        let table = CategoryCriticality::default();
        assert!(table.weight(Category::Security) > table.weight(Category::Events));
        assert!(table.weight(Category::Maintenance) > table.weight(Category::Events));
    }
}
