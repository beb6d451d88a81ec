//! Rolling per-day and per-category statistics derived from stored posts.
//!
//! The aggregator is a cache: every field can be rebuilt with [`TrendAggregator::fold`]
//! over the post store.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::health::round3;
use crate::models::{
    Category, CategoryBreakdown, DailySentiment, DailyTrend, Post, SentimentDistribution, TopIssue,
    TrendBucket,
};
use crate::priority::MEDIUM_BAND_FLOOR;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct IssueTally {
    count: u64,
    priority_sum: f64,
    sentiment_sum: f64,
    engagement: u64,
}

#[derive(Debug, Clone, Default)]
pub struct TrendAggregator {
    daily: BTreeMap<NaiveDate, TrendBucket>,
    categories: BTreeMap<Category, TrendBucket>,
    overall: TrendBucket,
    engagement_reported: u64,
    engagement_nonzero: u64,
    flagged: u64,
    flag_threshold: f64,
    issues: BTreeMap<Category, IssueTally>,
    issue_posts: BTreeMap<Uuid, (Category, f64, f64, u64)>,
    retired: HashSet<Uuid>,
    seen: HashSet<Uuid>,
}

impl TrendAggregator {
    /// `flag_threshold` is the misinformation risk above which a post counts
    /// toward the misinformation rate.
    pub fn new(flag_threshold: f64) -> Self {
        Self {
            flag_threshold,
            ..Self::default()
        }
    }

    /// Full rebuild from stored posts. `retired` posts are excluded from issues.
    pub fn fold<'a>(
        posts: impl IntoIterator<Item = &'a Post>,
        retired: &HashSet<Uuid>,
        flag_threshold: f64,
    ) -> Self {
        let mut aggregator = Self::new(flag_threshold);
        aggregator.retired = retired.clone();
        for post in posts {
            aggregator.record(post);
        }
        aggregator
    }

    /// Returns `false` when the post was already counted.
    pub fn record(&mut self, post: &Post) -> bool {
        if !self.seen.insert(post.id) {
            return false;
        }
        self.overall.record(post.sentiment_score, post.sentiment_label);
        self.daily
            .entry(post.date())
            .or_default()
            .record(post.sentiment_score, post.sentiment_label);
        self.categories
            .entry(post.category)
            .or_default()
            .record(post.sentiment_score, post.sentiment_label);

        if let Some(engagement) = post.engagement_count {
            self.engagement_reported += 1;
            if engagement > 0 {
                self.engagement_nonzero += 1;
            }
        }
        if post.misinformation_risk > self.flag_threshold {
            self.flagged += 1;
        }

        if post.priority_score >= MEDIUM_BAND_FLOOR && !self.retired.contains(&post.id) {
            let engagement = u64::from(post.engagement_count.unwrap_or(0));
            let tally = self.issues.entry(post.category).or_default();
            tally.count += 1;
            tally.priority_sum += post.priority_score;
            tally.sentiment_sum += post.sentiment_score;
            tally.engagement += engagement;
            self.issue_posts.insert(
                post.id,
                (post.category, post.priority_score, post.sentiment_score, engagement),
            );
        }
        true
    }

    /// Drop a post from the open issues once all of its alerts are resolved.
    pub fn retire(&mut self, post_id: Uuid) {
        self.retired.insert(post_id);
        if let Some((category, priority, sentiment, engagement)) = self.issue_posts.remove(&post_id) {
            if let Some(tally) = self.issues.get_mut(&category) {
                tally.count = tally.count.saturating_sub(1);
                tally.priority_sum -= priority;
                tally.sentiment_sum -= sentiment;
                tally.engagement = tally.engagement.saturating_sub(engagement);
                if tally.count == 0 {
                    self.issues.remove(&category);
                }
            }
        }
    }

    pub fn contains(&self, post_id: Uuid) -> bool {
        self.seen.contains(&post_id)
    }

    pub fn overall(&self) -> &TrendBucket {
        &self.overall
    }

    pub fn total_posts(&self) -> u64 {
        self.overall.count
    }

    pub fn day(&self, date: NaiveDate) -> Option<&TrendBucket> {
        self.daily.get(&date)
    }

    /// The bucket for `date` and the one before it, for day-over-day rules.
    pub fn day_comparison(&self, date: NaiveDate) -> (TrendBucket, Option<TrendBucket>) {
        let today = self.daily.get(&date).copied().unwrap_or_default();
        let yesterday = date.pred_opt().and_then(|d| self.daily.get(&d).copied());
        (today, yesterday)
    }

    pub fn daily_trends(&self, since: NaiveDate) -> Vec<DailyTrend> {
        self.daily
            .range(since..)
            .map(|(date, bucket)| DailyTrend {
                date: *date,
                count: bucket.count,
                avg_sentiment: round3(bucket.avg_sentiment),
            })
            .collect()
    }

    pub fn daily_sentiment(&self, since: NaiveDate) -> Vec<DailySentiment> {
        self.daily
            .range(since..)
            .map(|(date, bucket)| DailySentiment {
                date: *date,
                avg_sentiment: round3(bucket.avg_sentiment),
                post_count: bucket.count,
            })
            .collect()
    }

    /// Busiest category first.
    pub fn category_breakdown(&self) -> Vec<CategoryBreakdown> {
        let mut breakdown: Vec<CategoryBreakdown> = self
            .categories
            .iter()
            .map(|(category, bucket)| CategoryBreakdown {
                category: *category,
                count: bucket.count,
                avg_sentiment: round3(bucket.avg_sentiment),
            })
            .collect();
        breakdown.sort_by(|a, b| b.count.cmp(&a.count));
        breakdown
    }

    pub fn distribution(&self) -> SentimentDistribution {
        SentimentDistribution {
            positive: self.overall.positive,
            neutral: self.overall.neutral,
            negative: self.overall.negative,
        }
    }

    /// Share of engagement-reporting posts that drew any response.
    pub fn engagement_rate(&self) -> f64 {
        if self.engagement_reported == 0 {
            0.0
        } else {
            self.engagement_nonzero as f64 / self.engagement_reported as f64
        }
    }

    pub fn misinformation_rate(&self) -> f64 {
        if self.overall.count == 0 {
            0.0
        } else {
            self.flagged as f64 / self.overall.count as f64
        }
    }

    /// Medium and high priority posts that are still open, grouped by category.
    pub fn top_issues(&self, n: usize) -> Vec<TopIssue> {
        let candidates = self
            .issues
            .iter()
            .filter(|(_, tally)| tally.count > 0)
            .map(|(category, tally)| {
                let count = tally.count as f64;
                TopIssue {
                    issue: issue_name(*category),
                    category: *category,
                    count: tally.count,
                    avg_sentiment: round3(tally.sentiment_sum / count),
                    severity: round3(tally.priority_sum / count),
                    mentions: tally.count + tally.engagement,
                }
            })
            .collect();
        rank_issues(candidates, n)
    }
}

/// Stable sort by `severity * mentions`, descending; keeps the first `n`.
pub fn rank_issues(mut issues: Vec<TopIssue>, n: usize) -> Vec<TopIssue> {
    issues.sort_by(|a, b| {
        let left = a.severity * a.mentions as f64;
        let right = b.severity * b.mentions as f64;
        right.partial_cmp(&left).unwrap_or(Ordering::Equal)
    });
    issues.truncate(n);
    issues
}

fn issue_name(category: Category) -> String {
    let label = match category {
        Category::General => "General community",
        Category::Amenities => "Amenities",
        Category::Maintenance => "Maintenance",
        Category::Events => "Events",
        Category::Security => "Security",
        Category::Noise => "Noise",
    };
    format!("{label} concerns")
}
