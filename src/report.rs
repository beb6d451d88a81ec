use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::health::round3;
use crate::models::{
    Alert, AlertType, CategoryBreakdown, DailySentiment, DailyTrend, Post, SentimentDistribution,
    SentimentLabel, TopIssue,
};
use crate::pipeline::Insights;

#[derive(Debug, Clone, Serialize)]
pub struct RecentTrends {
    pub daily_posts: Vec<DailyTrend>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardAnalytics {
    pub total_posts: u64,
    pub avg_sentiment: f64,
    pub positive_posts: u64,
    pub negative_posts: u64,
    pub neutral_posts: u64,
    pub misinformation_alerts: u64,
    pub community_health_score: f64,
    pub recent_trends: RecentTrends,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub analytics: DashboardAnalytics,
    pub recent_posts: Vec<Post>,
    pub alerts: Vec<Alert>,
    pub top_issues: Vec<TopIssue>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentTrends {
    pub daily_sentiment: Vec<DailySentiment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyMetrics {
    pub total_posts: u64,
    pub avg_sentiment: f64,
    pub engagement_rate: f64,
    pub misinformation_rate: f64,
    pub active_alerts: u64,
    pub community_health_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub sentiment_trends: SentimentTrends,
    pub category_breakdown: Vec<CategoryBreakdown>,
    pub sentiment_distribution: SentimentDistribution,
    pub key_metrics: KeyMetrics,
    pub top_issues: Vec<TopIssue>,
}

pub fn build_dashboard(insights: &Insights, recent_posts: Vec<Post>) -> Dashboard {
    let misinformation_alerts = insights
        .open_alerts
        .iter()
        .filter(|alert| alert.alert_type == AlertType::Misinformation)
        .count() as u64;

    Dashboard {
        analytics: DashboardAnalytics {
            total_posts: insights.overall.count,
            avg_sentiment: round3(insights.overall.avg_sentiment),
            positive_posts: insights.overall.positive,
            negative_posts: insights.overall.negative,
            neutral_posts: insights.overall.neutral,
            misinformation_alerts,
            community_health_score: insights.health.community_health_score,
            recent_trends: RecentTrends {
                daily_posts: insights.daily_posts.clone(),
            },
        },
        recent_posts,
        alerts: insights.open_alerts.clone(),
        top_issues: insights.top_issues.clone(),
    }
}

pub fn build_analytics(insights: &Insights) -> Analytics {
    Analytics {
        sentiment_trends: SentimentTrends {
            daily_sentiment: insights.daily_sentiment.clone(),
        },
        category_breakdown: insights.categories.clone(),
        sentiment_distribution: insights.distribution,
        key_metrics: KeyMetrics {
            total_posts: insights.overall.count,
            avg_sentiment: round3(insights.overall.avg_sentiment),
            engagement_rate: round3(insights.engagement_rate),
            misinformation_rate: round3(insights.misinformation_rate),
            active_alerts: insights.open_alerts.len() as u64,
            community_health_score: insights.health.community_health_score,
        },
        top_issues: insights.top_issues.clone(),
    }
}

/// Markdown community report. `recent` is expected newest first.
pub fn build_report(generated_at: DateTime<Utc>, insights: &Insights, recent: &[Post]) -> String {
    let mut output = String::new();
    let health = &insights.health;

    let _ = writeln!(output, "# Community Pulse Report");
    let _ = writeln!(output, "Generated {}", generated_at.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Health");
    let _ = writeln!(
        output,
        "- Score {:.1} ({:?}) across {} posts",
        health.community_health_score, health.health_status, health.total_posts
    );
    let _ = writeln!(
        output,
        "- Positive {:.1}%, negative {:.1}%, flagged misinformation {:.1}%",
        health.positive_ratio * 100.0,
        health.negative_ratio * 100.0,
        health.misinformation_ratio * 100.0
    );
    for recommendation in &health.recommendations {
        let _ = writeln!(output, "- {recommendation}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Category Mix");
    if insights.categories.is_empty() {
        let _ = writeln!(output, "No posts recorded yet.");
    } else {
        for category in &insights.categories {
            let _ = writeln!(
                output,
                "- {}: {} posts (avg sentiment {:.2})",
                category.category, category.count, category.avg_sentiment
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Issues");
    if insights.top_issues.is_empty() {
        let _ = writeln!(output, "No open issues.");
    } else {
        for issue in &insights.top_issues {
            let _ = writeln!(
                output,
                "- {}: {} posts, severity {:.2}, {} mentions",
                issue.issue, issue.count, issue.severity, issue.mentions
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Open Alerts");
    if insights.open_alerts.is_empty() {
        let _ = writeln!(output, "No open alerts.");
    } else {
        for alert in &insights.open_alerts {
            let _ = writeln!(
                output,
                "- [{}] {} ({}, {}): {}",
                alert.severity.as_str(),
                alert.alert_type.as_str(),
                alert.status,
                alert.timestamp.format("%Y-%m-%d"),
                alert.description
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Negative Posts");
    let negative: Vec<&Post> = recent
        .iter()
        .filter(|post| post.sentiment_label == SentimentLabel::Negative)
        .take(5)
        .collect();
    if negative.is_empty() {
        let _ = writeln!(output, "No negative posts in the recent window.");
    } else {
        for post in negative {
            let _ = writeln!(
                output,
                "- {} ({}) on {}: {}",
                post.author,
                post.category,
                post.timestamp.format("%Y-%m-%d"),
                post.content
            );
        }
    }

    output
}
