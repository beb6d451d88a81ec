//! Alert lifecycle and trigger rules.
//!
//! Every alert moves through an explicit transition table; `resolved` is
//! terminal. The generator keeps an index of non-resolved alerts keyed by
//! subject and type, so at most one open alert exists per key.
//!
//! Rule passes only *plan* changes. The caller persists a plan and then
//! applies it, so a failed write leaves the generator untouched and the
//! evaluation can simply be retried.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AlertThresholds;
use crate::error::{Error, Result};
use crate::models::{Alert, AlertStatus, AlertType, Post, Severity, TrendBucket};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertAction {
    Investigate,
    Review,
    Monitor,
    Resolve,
}

impl fmt::Display for AlertAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlertAction::Investigate => "investigate",
            AlertAction::Review => "review",
            AlertAction::Monitor => "monitor",
            AlertAction::Resolve => "resolve",
        };
        f.write_str(name)
    }
}

/// The transitions a moderator may request from outside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserAction {
    Investigate,
    Resolve,
}

impl From<UserAction> for AlertAction {
    fn from(action: UserAction) -> Self {
        match action {
            UserAction::Investigate => AlertAction::Investigate,
            UserAction::Resolve => AlertAction::Resolve,
        }
    }
}

static TRANSITIONS: &[(AlertStatus, AlertAction, AlertStatus)] = &[
    (AlertStatus::Active, AlertAction::Investigate, AlertStatus::Investigating),
    (AlertStatus::Active, AlertAction::Review, AlertStatus::Reviewing),
    (AlertStatus::Active, AlertAction::Monitor, AlertStatus::Monitoring),
    (AlertStatus::Active, AlertAction::Resolve, AlertStatus::Resolved),
    (AlertStatus::Investigating, AlertAction::Resolve, AlertStatus::Resolved),
    (AlertStatus::Reviewing, AlertAction::Resolve, AlertStatus::Resolved),
    (AlertStatus::Monitoring, AlertAction::Resolve, AlertStatus::Resolved),
];

pub fn next_status(from: AlertStatus, action: AlertAction) -> Result<AlertStatus> {
    TRANSITIONS
        .iter()
        .find(|(state, act, _)| *state == from && *act == action)
        .map(|(_, _, to)| *to)
        .ok_or(Error::IllegalTransition { from, action })
}

/// What an alert is about. Trend alerts belong to the whole community.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertSubject {
    Post(Uuid),
    Community,
}

impl AlertSubject {
    pub fn of(alert: &Alert) -> Self {
        match (alert.alert_type, alert.post_id) {
            (AlertType::SentimentSpike | AlertType::LowEngagement, _) => AlertSubject::Community,
            (_, Some(post_id)) => AlertSubject::Post(post_id),
            (_, None) => AlertSubject::Community,
        }
    }
}

type AlertKey = (AlertSubject, AlertType);

#[derive(Debug, Clone)]
pub struct AlertGenerator {
    thresholds: AlertThresholds,
    alerts: HashMap<Uuid, Alert>,
    open: HashMap<AlertKey, Uuid>,
    evaluated: HashSet<Uuid>,
    spike_days: HashSet<NaiveDate>,
}

impl AlertGenerator {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            thresholds,
            alerts: HashMap::new(),
            open: HashMap::new(),
            evaluated: HashSet::new(),
            spike_days: HashSet::new(),
        }
    }

    /// Rebuild generator state from persisted alerts and evaluation marks.
    pub fn restore(thresholds: AlertThresholds, alerts: Vec<Alert>, evaluated: HashSet<Uuid>) -> Self {
        let mut generator = Self::new(thresholds);
        let mut alerts = alerts;
        alerts.sort_by_key(|a| a.timestamp);
        generator.apply(&alerts);
        generator.evaluated = evaluated;
        generator
    }

    pub fn is_evaluated(&self, post_id: Uuid) -> bool {
        self.evaluated.contains(&post_id)
    }

    pub fn mark_evaluated(&mut self, post_id: Uuid) {
        self.evaluated.insert(post_id);
    }

    /// Post-scope rules: misinformation and high priority.
    pub fn plan_post(&self, post: &Post, now: DateTime<Utc>) -> Vec<Alert> {
        if self.is_evaluated(post.id) {
            return Vec::new();
        }
        let t = &self.thresholds;
        let mut planned = Vec::new();
        let subject = AlertSubject::Post(post.id);
        let excerpt = excerpt(&post.content);

        if post.misinformation_risk > t.misinformation
            && !self.open.contains_key(&(subject, AlertType::Misinformation))
        {
            let severity = if post.misinformation_risk > t.misinformation_high {
                Severity::High
            } else {
                Severity::Medium
            };
            let suggested_action = match severity {
                Severity::High => "Immediate review and fact-checking required",
                _ => "Verify the claims against official sources before they spread",
            };
            planned.push(Alert {
                id: Uuid::new_v4(),
                post_id: Some(post.id),
                alert_type: AlertType::Misinformation,
                severity,
                confidence: post.misinformation_risk,
                description: format!(
                    "Potential misinformation in a {} post by {}: \"{}\"",
                    post.category, post.author, excerpt
                ),
                suggested_action: suggested_action.to_string(),
                status: AlertStatus::Active,
                category: Some(post.category),
                trend_day: None,
                timestamp: now,
            });
        }

        if post.priority_score > t.priority && !self.open.contains_key(&(subject, AlertType::HighPriority)) {
            let severity = if post.priority_score > t.priority_high {
                Severity::High
            } else {
                Severity::Medium
            };
            planned.push(Alert {
                id: Uuid::new_v4(),
                post_id: Some(post.id),
                alert_type: AlertType::HighPriority,
                severity,
                confidence: post.priority_score,
                description: format!("High priority community concern: \"{excerpt}\""),
                suggested_action: format!("Respond to the reported {} concern", post.category),
                status: AlertStatus::Active,
                category: Some(post.category),
                trend_day: None,
                timestamp: now,
            });
        }

        planned
    }

    /// Community-scope rule comparing `day`'s negative share with the day before.
    ///
    /// At most one spike alert is raised per day, and none while another spike
    /// alert is still open. Status is left to moderators.
    pub fn plan_sentiment_spike(
        &self,
        day: NaiveDate,
        today: &TrendBucket,
        yesterday: Option<&TrendBucket>,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let t = &self.thresholds;
        if self.spike_days.contains(&day)
            || self.open_alert(AlertSubject::Community, AlertType::SentimentSpike).is_some()
        {
            return Vec::new();
        }

        let jump = match yesterday {
            Some(previous) if previous.count > 0 && today.count >= t.spike_min_posts => {
                Some((previous.negative_ratio(), today.negative_ratio()))
            }
            _ => None,
        }
        .filter(|(before, after)| after - before > t.spike_delta);
        let Some((before, after)) = jump else {
            return Vec::new();
        };

        let rise = after - before;
        let severity = if rise > 2.0 * t.spike_delta {
            Severity::High
        } else {
            Severity::Medium
        };
        vec![Alert {
            id: Uuid::new_v4(),
            post_id: None,
            alert_type: AlertType::SentimentSpike,
            severity,
            confidence: (rise / (2.0 * t.spike_delta)).clamp(0.0, 1.0),
            description: format!(
                "Negative sentiment share rose from {:.0}% to {:.0}% day over day",
                before * 100.0,
                after * 100.0
            ),
            suggested_action: "Provide a community update addressing recent concerns".to_string(),
            status: AlertStatus::Active,
            category: None,
            trend_day: Some(day),
            timestamp: now,
        }]
    }

    /// Community-scope rule over the newest events posts that report engagement.
    pub fn plan_engagement(&self, recent_events: &[Post], now: DateTime<Utc>) -> Vec<Alert> {
        let t = &self.thresholds;
        let window: Vec<&Post> = recent_events
            .iter()
            .filter(|p| p.engagement_count.is_some())
            .take(t.low_engagement_window)
            .collect();
        let low = window.len() == t.low_engagement_window
            && window
                .iter()
                .all(|p| p.engagement_count.unwrap_or(0) < t.low_engagement_max);
        if !low
            || self
                .open_alert(AlertSubject::Community, AlertType::LowEngagement)
                .is_some()
        {
            return Vec::new();
        }

        let total: u32 = window.iter().filter_map(|p| p.engagement_count).sum();
        let mean = total as f64 / window.len() as f64;
        let confidence = (1.0 - mean / f64::from(t.low_engagement_max.max(1))).clamp(0.0, 1.0);
        vec![Alert {
            id: Uuid::new_v4(),
            post_id: window.first().map(|p| p.id),
            alert_type: AlertType::LowEngagement,
            severity: Severity::Low,
            confidence,
            description: format!(
                "The last {} event announcements averaged {:.1} responses",
                window.len(),
                mean
            ),
            suggested_action: "Consider alternative promotion strategies".to_string(),
            status: AlertStatus::Active,
            category: window.first().map(|p| p.category),
            trend_day: None,
            timestamp: now,
        }]
    }

    /// Plan a transition without applying it.
    pub fn plan_transition(&self, id: Uuid, action: AlertAction) -> Result<Alert> {
        let alert = self.alerts.get(&id).ok_or(Error::AlertNotFound(id))?;
        let status = next_status(alert.status, action)?;
        Ok(Alert {
            status,
            ..alert.clone()
        })
    }

    /// Apply persisted changes and keep the open-alert index consistent.
    pub fn apply(&mut self, changes: &[Alert]) {
        for alert in changes {
            let key = (AlertSubject::of(alert), alert.alert_type);
            if alert.status.is_terminal() {
                if self.open.get(&key) == Some(&alert.id) {
                    self.open.remove(&key);
                }
            } else {
                self.open.insert(key, alert.id);
            }
            if let Some(day) = alert.trend_day {
                self.spike_days.insert(day);
            }
            self.alerts.insert(alert.id, alert.clone());
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&Alert> {
        self.alerts.get(&id)
    }

    /// All alerts, newest first.
    pub fn list(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.alerts.values().cloned().collect();
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        alerts
    }

    pub fn open_alerts(&self) -> impl Iterator<Item = &Alert> {
        self.open.values().filter_map(|id| self.alerts.get(id))
    }

    pub fn open_count(&self, alert_type: AlertType) -> u64 {
        self.open.keys().filter(|(_, t)| *t == alert_type).count() as u64
    }

    /// Posts with at least one post-scope alert, all of them resolved.
    pub fn retired_posts(&self) -> HashSet<Uuid> {
        let mut by_post: HashMap<Uuid, bool> = HashMap::new();
        for alert in self.alerts.values() {
            if let AlertSubject::Post(post_id) = AlertSubject::of(alert) {
                let all_resolved = by_post.entry(post_id).or_insert(true);
                *all_resolved &= alert.status.is_terminal();
            }
        }
        by_post
            .into_iter()
            .filter_map(|(post_id, retired)| retired.then_some(post_id))
            .collect()
    }

    pub fn is_retired(&self, post_id: Uuid) -> bool {
        let mut any = false;
        for alert in self.alerts.values() {
            if AlertSubject::of(alert) == AlertSubject::Post(post_id) {
                if !alert.status.is_terminal() {
                    return false;
                }
                any = true;
            }
        }
        any
    }

    fn open_alert(&self, subject: AlertSubject, alert_type: AlertType) -> Option<&Alert> {
        self.open
            .get(&(subject, alert_type))
            .and_then(|id| self.alerts.get(id))
    }
}

fn excerpt(content: &str) -> String {
    const LIMIT: usize = 50;
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(LIMIT).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, SentimentLabel};

    fn post(risk: f64, priority: f64) -> Post {
        Post {
            id: Uuid::new_v4(),
            content: "URGENT: There's a conspiracy about the water quality! They're hiding something from us!"
                .to_string(),
            author: "John D.".to_string(),
            category: Category::Maintenance,
            timestamp: Utc::now(),
            sentiment_score: -0.8,
            sentiment_label: SentimentLabel::Negative,
            misinformation_risk: risk,
            priority_score: priority,
            engagement_count: None,
        }
    }

    fn bucket(count: u64, negative: u64) -> TrendBucket {
        TrendBucket {
            count,
            avg_sentiment: 0.0,
            positive: 0,
            neutral: count - negative,
            negative,
        }
    }

    fn events_post(engagement: Option<u32>) -> Post {
        Post {
            category: Category::Events,
            content: "Community BBQ this weekend - please join us!".to_string(),
            engagement_count: engagement,
            misinformation_risk: 0.0,
            priority_score: 0.1,
            ..post(0.0, 0.0)
        }
    }

    #[test]
    fn transition_table_allows_only_documented_moves() {
        use AlertAction::*;
        use AlertStatus::*;

        assert_eq!(next_status(Active, Investigate).unwrap(), Investigating);
        assert_eq!(next_status(Active, Review).unwrap(), Reviewing);
        assert_eq!(next_status(Active, Monitor).unwrap(), Monitoring);
        for from in [Active, Investigating, Reviewing, Monitoring] {
            assert_eq!(next_status(from, Resolve).unwrap(), Resolved);
        }
        for action in [Investigate, Review, Monitor, Resolve] {
            assert!(matches!(
                next_status(Resolved, action),
                Err(Error::IllegalTransition { from: Resolved, .. })
            ));
        }
        assert!(next_status(Investigating, Review).is_err());
        assert!(next_status(Monitoring, Investigate).is_err());
    }

    #[test]
    fn high_risk_post_plans_high_severity_misinformation_alert() {
        let generator = AlertGenerator::new(AlertThresholds::default());
        let planned = generator.plan_post(&post(0.9, 0.6), Utc::now());
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].alert_type, AlertType::Misinformation);
        assert_eq!(planned[0].severity, Severity::High);
        assert_eq!(planned[0].status, AlertStatus::Active);
        assert!(planned[0].description.ends_with("...\""));
    }

    #[test]
    fn medium_risk_and_high_priority_plan_two_alerts() {
        let generator = AlertGenerator::new(AlertThresholds::default());
        let planned = generator.plan_post(&post(0.6, 0.75), Utc::now());
        let types: Vec<AlertType> = planned.iter().map(|a| a.alert_type).collect();
        assert_eq!(types, vec![AlertType::Misinformation, AlertType::HighPriority]);
        assert!(planned.iter().all(|a| a.severity == Severity::Medium));
    }

    #[test]
    fn quiet_post_plans_nothing() {
        let generator = AlertGenerator::new(AlertThresholds::default());
        assert!(generator.plan_post(&post(0.1, 0.3), Utc::now()).is_empty());
    }

    #[test]
    fn re_evaluating_an_open_condition_is_a_no_op() {
        let mut generator = AlertGenerator::new(AlertThresholds::default());
        let post = post(0.9, 0.9);
        let planned = generator.plan_post(&post, Utc::now());
        generator.apply(&planned);
        // still open, not yet marked evaluated
        assert!(generator.plan_post(&post, Utc::now()).is_empty());

        generator.mark_evaluated(post.id);
        assert!(generator.plan_post(&post, Utc::now()).is_empty());
        assert_eq!(generator.open_count(AlertType::Misinformation), 1);
        assert_eq!(generator.open_count(AlertType::HighPriority), 1);
    }

    #[test]
    fn resolving_releases_the_dedup_key_and_retires_the_post() {
        let mut generator = AlertGenerator::new(AlertThresholds::default());
        let post = post(0.9, 0.5);
        let planned = generator.plan_post(&post, Utc::now());
        generator.apply(&planned);
        let id = planned[0].id;
        assert!(!generator.is_retired(post.id));

        let investigating = generator.plan_transition(id, AlertAction::Investigate).unwrap();
        generator.apply(&[investigating]);
        let resolved = generator.plan_transition(id, AlertAction::Resolve).unwrap();
        generator.apply(&[resolved]);

        assert_eq!(generator.open_count(AlertType::Misinformation), 0);
        assert!(generator.is_retired(post.id));
        assert!(generator.retired_posts().contains(&post.id));
        assert!(matches!(
            generator.plan_transition(id, AlertAction::Investigate),
            Err(Error::IllegalTransition { .. })
        ));
    }

    #[test]
    fn unknown_alert_cannot_transition() {
        let generator = AlertGenerator::new(AlertThresholds::default());
        let id = Uuid::new_v4();
        assert!(matches!(
            generator.plan_transition(id, AlertAction::Resolve),
            Err(Error::AlertNotFound(missing)) if missing == id
        ));
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    #[test]
    fn sentiment_spike_stays_active_until_a_moderator_acts() {
        let mut generator = AlertGenerator::new(AlertThresholds::default());
        let yesterday = bucket(10, 1);
        let today = bucket(6, 3);

        let planned = generator.plan_sentiment_spike(day(5), &today, Some(&yesterday), Utc::now());
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].post_id, None);
        assert_eq!(planned[0].severity, Severity::Medium);
        assert_eq!(planned[0].trend_day, Some(day(5)));
        generator.apply(&planned);

        // condition still holds: nothing new
        assert!(generator
            .plan_sentiment_spike(day(5), &bucket(7, 4), Some(&yesterday), Utc::now())
            .is_empty());

        let calmer = bucket(12, 2);
        assert!(generator
            .plan_sentiment_spike(day(5), &calmer, Some(&yesterday), Utc::now())
            .is_empty());
        assert_eq!(generator.get(planned[0].id).map(|a| a.status), Some(AlertStatus::Active));
    }

    #[test]
    fn resolved_spike_is_not_raised_again_for_the_same_day() {
        let mut generator = AlertGenerator::new(AlertThresholds::default());
        let yesterday = bucket(10, 1);
        let planned = generator.plan_sentiment_spike(day(5), &bucket(6, 3), Some(&yesterday), Utc::now());
        generator.apply(&planned);
        let resolved = generator.plan_transition(planned[0].id, AlertAction::Resolve).unwrap();
        generator.apply(&[resolved]);

        assert!(generator
            .plan_sentiment_spike(day(5), &bucket(8, 5), Some(&yesterday), Utc::now())
            .is_empty());

        let restored = AlertGenerator::restore(AlertThresholds::default(), generator.list(), HashSet::new());
        assert!(restored
            .plan_sentiment_spike(day(5), &bucket(8, 5), Some(&yesterday), Utc::now())
            .is_empty());
        assert_eq!(
            restored
                .plan_sentiment_spike(day(6), &bucket(8, 5), Some(&bucket(8, 1)), Utc::now())
                .len(),
            1
        );
    }

    #[test]
    fn spike_needs_enough_posts_and_a_previous_day() {
        let generator = AlertGenerator::new(AlertThresholds::default());
        assert!(generator
            .plan_sentiment_spike(day(5), &bucket(3, 3), Some(&bucket(10, 0)), Utc::now())
            .is_empty());
        assert!(generator
            .plan_sentiment_spike(day(5), &bucket(10, 9), None, Utc::now())
            .is_empty());
    }

    #[test]
    fn sustained_low_engagement_on_events_posts() {
        let mut generator = AlertGenerator::new(AlertThresholds::default());
        let quiet = vec![events_post(Some(0)), events_post(None), events_post(Some(1)), events_post(Some(0))];
        let planned = generator.plan_engagement(&quiet, Utc::now());
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].alert_type, AlertType::LowEngagement);
        assert_eq!(planned[0].severity, Severity::Low);
        assert_eq!(planned[0].post_id, Some(quiet[0].id));
        generator.apply(&planned);
        assert!(generator.plan_engagement(&quiet, Utc::now()).is_empty());

        let lively = vec![events_post(Some(14)), events_post(Some(0)), events_post(Some(1))];
        assert!(generator.plan_engagement(&lively, Utc::now()).is_empty());
        assert_eq!(generator.get(planned[0].id).map(|a| a.status), Some(AlertStatus::Active));
    }

    #[test]
    fn too_few_reported_events_posts_is_not_sustained() {
        let generator = AlertGenerator::new(AlertThresholds::default());
        let sparse = vec![events_post(Some(0)), events_post(None), events_post(None)];
        assert!(generator.plan_engagement(&sparse, Utc::now()).is_empty());
    }

    #[test]
    fn restore_rebuilds_open_index() {
        let mut original = AlertGenerator::new(AlertThresholds::default());
        let post = post(0.9, 0.9);
        let planned = original.plan_post(&post, Utc::now());
        original.apply(&planned);
        original.mark_evaluated(post.id);

        let evaluated: HashSet<Uuid> = [post.id].into_iter().collect();
        let restored = AlertGenerator::restore(AlertThresholds::default(), original.list(), evaluated);
        assert_eq!(restored.open_count(AlertType::Misinformation), 1);
        assert!(restored.is_evaluated(post.id));
        assert!(restored.plan_post(&post, Utc::now()).is_empty());
    }

    #[test]
    fn excerpt_is_char_safe() {
        let text = "é".repeat(60);
        let short = excerpt(&text);
        assert_eq!(short.chars().count(), 53);
        assert_eq!(excerpt("short"), "short");
    }
}
