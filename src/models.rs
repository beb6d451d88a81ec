use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    General,
    Amenities,
    Maintenance,
    Events,
    Security,
    Noise,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::General,
        Category::Amenities,
        Category::Maintenance,
        Category::Events,
        Category::Security,
        Category::Noise,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Amenities => "amenities",
            Category::Maintenance => "maintenance",
            Category::Events => "events",
            Category::Security => "security",
            Category::Noise => "noise",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| Error::UnknownCategory(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

impl FromStr for SentimentLabel {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "positive" => Ok(SentimentLabel::Positive),
            "neutral" => Ok(SentimentLabel::Neutral),
            "negative" => Ok(SentimentLabel::Negative),
            other => Err(Error::Validation(format!("unknown sentiment label: {other}"))),
        }
    }
}

/// A submission that passed validation but has not been scored yet.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub content: String,
    pub author: String,
    pub category: Category,
    pub engagement_count: Option<u32>,
}

impl NewPost {
    /// Validate raw submission fields. A missing category defaults to `general`;
    /// a present but unknown one is rejected.
    pub fn validate(
        content: &str,
        author: &str,
        category: Option<&str>,
        engagement_count: Option<u32>,
    ) -> Result<Self, Error> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::Validation("content must not be empty".to_string()));
        }
        let author = author.trim();
        if author.is_empty() {
            return Err(Error::Validation("author must not be empty".to_string()));
        }
        let category = match category {
            Some(raw) => raw.parse()?,
            None => Category::General,
        };

        Ok(Self {
            content: content.to_string(),
            author: author.to_string(),
            category,
            engagement_count,
        })
    }
}

/// A scored, stored community post. Score fields are written once, before the
/// post becomes visible in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub content: String,
    pub author: String,
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
    pub misinformation_risk: f64,
    pub priority_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement_count: Option<u32>,
}

impl Post {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Misinformation,
    HighPriority,
    SentimentSpike,
    LowEngagement,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::Misinformation => "misinformation",
            AlertType::HighPriority => "high_priority",
            AlertType::SentimentSpike => "sentiment_spike",
            AlertType::LowEngagement => "low_engagement",
        }
    }
}

impl FromStr for AlertType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "misinformation" => Ok(AlertType::Misinformation),
            "high_priority" => Ok(AlertType::HighPriority),
            "sentiment_spike" => Ok(AlertType::SentimentSpike),
            "low_engagement" => Ok(AlertType::LowEngagement),
            other => Err(Error::Validation(format!("unknown alert type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(Error::Validation(format!("unknown severity: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Investigating,
    Reviewing,
    Monitoring,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Investigating => "investigating",
            AlertStatus::Reviewing => "reviewing",
            AlertStatus::Monitoring => "monitoring",
            AlertStatus::Resolved => "resolved",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AlertStatus::Resolved)
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(AlertStatus::Active),
            "investigating" => Ok(AlertStatus::Investigating),
            "reviewing" => Ok(AlertStatus::Reviewing),
            "monitoring" => Ok(AlertStatus::Monitoring),
            "resolved" => Ok(AlertStatus::Resolved),
            other => Err(Error::Validation(format!("unknown alert status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    /// `None` for community-scope alerts (sentiment spikes).
    pub post_id: Option<Uuid>,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub confidence: f64,
    pub description: String,
    pub suggested_action: String,
    pub status: AlertStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Day a sentiment spike was measured on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend_day: Option<NaiveDate>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    Poor,
    #[serde(rename = "No data available")]
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub community_health_score: f64,
    pub health_status: HealthStatus,
    pub total_posts: u64,
    pub positive_ratio: f64,
    pub negative_ratio: f64,
    pub misinformation_ratio: f64,
    pub recommendations: Vec<String>,
}

/// Rolling count and mean sentiment for one day or one category.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrendBucket {
    pub count: u64,
    pub avg_sentiment: f64,
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
}

impl TrendBucket {
    pub fn record(&mut self, sentiment_score: f64, label: SentimentLabel) {
        self.count += 1;
        // incremental mean, no re-summing
        self.avg_sentiment += (sentiment_score - self.avg_sentiment) / self.count as f64;
        match label {
            SentimentLabel::Positive => self.positive += 1,
            SentimentLabel::Neutral => self.neutral += 1,
            SentimentLabel::Negative => self.negative += 1,
        }
    }

    pub fn negative_ratio(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.negative as f64 / self.count as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub count: u64,
    pub avg_sentiment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySentiment {
    pub date: NaiveDate,
    pub avg_sentiment: f64,
    pub post_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub category: Category,
    pub count: u64,
    pub avg_sentiment: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentDistribution {
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopIssue {
    pub issue: String,
    pub category: Category,
    pub count: u64,
    pub avg_sentiment: f64,
    pub severity: f64,
    pub mentions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_case_insensitively() {
        assert_eq!("Security".parse::<Category>().unwrap(), Category::Security);
        assert_eq!(" noise ".parse::<Category>().unwrap(), Category::Noise);
        assert!("parking".parse::<Category>().is_err());
    }

    #[test]
    fn validation_rejects_blank_fields() {
        assert!(NewPost::validate("   ", "Sarah M.", None, None).is_err());
        assert!(NewPost::validate("Pool is open", "", None, None).is_err());
        assert!(NewPost::validate("Pool is open", "Sarah M.", Some("pets"), None).is_err());

        let post = NewPost::validate(" Pool is open ", "Sarah M.", None, Some(3)).unwrap();
        assert_eq!(post.content, "Pool is open");
        assert_eq!(post.category, Category::General);
        assert_eq!(post.engagement_count, Some(3));
    }

    #[test]
    fn bucket_mean_is_incremental() {
        let mut bucket = TrendBucket::default();
        bucket.record(0.5, SentimentLabel::Positive);
        bucket.record(-0.5, SentimentLabel::Negative);
        bucket.record(0.3, SentimentLabel::Positive);
        assert_eq!(bucket.count, 3);
        assert!((bucket.avg_sentiment - 0.1).abs() < 1e-12);
        assert_eq!(bucket.positive, 2);
        assert!((bucket.negative_ratio() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn health_status_serializes_display_names() {
        let json = serde_json::to_string(&HealthStatus::NoData).unwrap();
        assert_eq!(json, "\"No data available\"");
        let json = serde_json::to_string(&HealthStatus::Good).unwrap();
        assert_eq!(json, "\"Good\"");
    }
}
