//! The signal engine: scoring, storage, alerting and aggregation wired
//! together, plus the bounded ingest queue in front of it.
//!
//! Shared state lives behind two async mutexes. When both are needed they
//! are always taken alerts first, then aggregates.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::aggregate::TrendAggregator;
use crate::alerts::{AlertAction, AlertGenerator};
use crate::analyzer::{Analysis, Analyzer};
use crate::config::ScoringConfig;
use crate::error::{Error, Result};
use crate::health::{self, Breaches, HealthInputs};
use crate::models::{
    Alert, AlertStatus, AlertType, Category, CategoryBreakdown, DailySentiment, DailyTrend,
    HealthSnapshot, NewPost, Post, SentimentDistribution, TopIssue, TrendBucket,
};
use crate::store::{PostQuery, SignalStore, MAX_PAGE_SIZE};

const REBUILD_CHUNK: usize = 500;
const TOP_ISSUES: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
    pub alert_type: Option<AlertType>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub evaluated: usize,
    pub failed: usize,
    pub posts: u64,
}

/// A consistent read of aggregates and open alerts, taken under both locks.
#[derive(Debug, Clone)]
pub struct Insights {
    pub health: HealthSnapshot,
    pub overall: TrendBucket,
    pub daily_posts: Vec<DailyTrend>,
    pub daily_sentiment: Vec<DailySentiment>,
    pub categories: Vec<CategoryBreakdown>,
    pub distribution: SentimentDistribution,
    pub engagement_rate: f64,
    pub misinformation_rate: f64,
    pub top_issues: Vec<TopIssue>,
    pub open_alerts: Vec<Alert>,
}

pub struct Engine {
    analyzer: Analyzer,
    config: ScoringConfig,
    store: Arc<dyn SignalStore>,
    alerts: Mutex<AlertGenerator>,
    aggregates: Mutex<TrendAggregator>,
}

impl Engine {
    /// Restore alert state from the store and fold every stored post.
    pub async fn open(store: Arc<dyn SignalStore>, config: ScoringConfig) -> Result<Self> {
        let alerts = store.alerts().await?;
        let evaluated = store.evaluated_posts().await?;
        let generator = AlertGenerator::restore(config.alerts.clone(), alerts, evaluated);

        let posts = store.all_posts().await?;
        let aggregates =
            TrendAggregator::fold(&posts, &generator.retired_posts(), config.alerts.misinformation);
        tracing::info!(posts = posts.len(), "engine state restored");

        Ok(Self {
            analyzer: Analyzer::new(&config),
            config,
            store,
            alerts: Mutex::new(generator),
            aggregates: Mutex::new(aggregates),
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a submission without storing it.
    pub fn analyze(&self, post: &NewPost) -> Analysis {
        self.analyzer.analyze(post)
    }

    pub async fn ingest(&self, post: NewPost) -> Result<Post> {
        self.ingest_at(post, Utc::now()).await
    }

    /// Score, store and publish one post, then evaluate alerts best-effort.
    ///
    /// The returned post is committed even when alert evaluation fails; the
    /// next reconcile pass picks it up again.
    pub async fn ingest_at(&self, submission: NewPost, timestamp: DateTime<Utc>) -> Result<Post> {
        let analysis = self.analyzer.analyze(&submission);
        let post = Post {
            id: Uuid::new_v4(),
            content: submission.content,
            author: submission.author,
            category: submission.category,
            timestamp,
            sentiment_score: analysis.sentiment.score,
            sentiment_label: analysis.sentiment.label,
            misinformation_risk: analysis.misinformation_risk,
            priority_score: analysis.priority_score,
            engagement_count: submission.engagement_count,
        };

        self.store.insert_post(&post).await?;
        // a rebuild swapping in between has already folded the stored post
        self.aggregates.lock().await.record(&post);

        if let Err(err) = self.evaluate(&post).await {
            tracing::warn!(post_id = %post.id, error = %err, "alert evaluation failed, will retry");
        }
        Ok(post)
    }

    async fn evaluate(&self, post: &Post) -> Result<()> {
        let (today, yesterday) = self.aggregates.lock().await.day_comparison(post.date());
        let recent_events = if post.category == Category::Events {
            let query = PostQuery {
                limit: MAX_PAGE_SIZE,
                offset: 0,
                category: Some(Category::Events),
            };
            Some(self.store.recent_posts(&query).await?)
        } else {
            None
        };

        let now = Utc::now();
        let mut generator = self.alerts.lock().await;
        if generator.is_evaluated(post.id) {
            return Ok(());
        }

        let mut planned = generator.plan_post(post, now);
        planned.extend(generator.plan_sentiment_spike(post.date(), &today, yesterday.as_ref(), now));
        if let Some(events) = recent_events {
            planned.extend(generator.plan_engagement(&events, now));
        }

        // applied one by one so a partial failure never re-plans a saved alert
        for alert in &planned {
            self.store.save_alert(alert).await?;
            generator.apply(std::slice::from_ref(alert));
            tracing::info!(
                alert_id = %alert.id,
                alert_type = alert.alert_type.as_str(),
                status = alert.status.as_str(),
                "alert saved"
            );
        }

        self.store.mark_evaluated(post.id).await?;
        generator.mark_evaluated(post.id);
        Ok(())
    }

    /// Apply a transition and persist it. Resolving a post's last open alert
    /// removes the post from the open issues.
    pub async fn transition_alert(&self, id: Uuid, action: AlertAction) -> Result<Alert> {
        let mut generator = self.alerts.lock().await;
        let updated = generator.plan_transition(id, action)?;
        self.store.save_alert(&updated).await?;
        generator.apply(std::slice::from_ref(&updated));

        if let Some(post_id) = updated.post_id {
            if updated.status.is_terminal() && generator.is_retired(post_id) {
                self.aggregates.lock().await.retire(post_id);
            }
        }
        tracing::info!(alert_id = %id, %action, status = updated.status.as_str(), "alert transitioned");
        Ok(updated)
    }

    /// Re-evaluate posts whose alert evaluation never completed, then rebuild
    /// aggregates from the store.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let posts = self.store.all_posts().await?;
        let pending: Vec<Post> = {
            let generator = self.alerts.lock().await;
            posts
                .into_iter()
                .filter(|post| !generator.is_evaluated(post.id))
                .collect()
        };

        let mut failed = 0;
        for post in &pending {
            if let Err(err) = self.evaluate(post).await {
                tracing::warn!(post_id = %post.id, error = %err, "alert evaluation failed, will retry");
                failed += 1;
            }
        }

        let posts = self.rebuild_aggregates().await?;
        let report = ReconcileReport {
            evaluated: pending.len() - failed,
            failed,
            posts,
        };
        tracing::info!(evaluated = report.evaluated, failed, posts, "reconcile pass finished");
        Ok(report)
    }

    /// Fold the store into fresh aggregates and swap them in.
    ///
    /// Readers keep the previous aggregates until the swap. Dropping the
    /// future before then leaves live state untouched.
    pub async fn rebuild_aggregates(&self) -> Result<u64> {
        let retired = self.alerts.lock().await.retired_posts();
        let snapshot = self.store.all_posts().await?;

        let mut rebuilt = TrendAggregator::fold(std::iter::empty(), &retired, self.config.alerts.misinformation);
        for chunk in snapshot.chunks(REBUILD_CHUNK) {
            for post in chunk {
                rebuilt.record(post);
            }
            tokio::task::yield_now().await;
        }

        let generator = self.alerts.lock().await;
        let mut live = self.aggregates.lock().await;
        // posts that landed while folding
        if self.store.post_count().await? != rebuilt.total_posts() {
            for post in self.store.all_posts().await? {
                rebuilt.record(&post);
            }
        }
        for post_id in generator.retired_posts() {
            rebuilt.retire(post_id);
        }
        *live = rebuilt;
        Ok(live.total_posts())
    }

    pub async fn post(&self, id: Uuid) -> Result<Option<Post>> {
        self.store.post(id).await
    }

    pub async fn posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        self.store.recent_posts(query).await
    }

    /// Newest first.
    pub async fn alerts(&self, filter: &AlertFilter) -> Vec<Alert> {
        self.alerts
            .lock()
            .await
            .list()
            .into_iter()
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .filter(|a| filter.alert_type.map_or(true, |t| a.alert_type == t))
            .collect()
    }

    pub async fn health(&self) -> HealthSnapshot {
        let generator = self.alerts.lock().await;
        let aggregates = self.aggregates.lock().await;
        self.health_of(&generator, &aggregates)
    }

    /// Everything the dashboard and analytics views read, as of `today`.
    pub async fn insights(&self, today: NaiveDate) -> Insights {
        let generator = self.alerts.lock().await;
        let aggregates = self.aggregates.lock().await;

        let mut open_alerts: Vec<Alert> = generator.open_alerts().cloned().collect();
        open_alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Insights {
            health: self.health_of(&generator, &aggregates),
            overall: *aggregates.overall(),
            daily_posts: aggregates.daily_trends(today - Duration::days(7)),
            daily_sentiment: aggregates.daily_sentiment(today - Duration::days(30)),
            categories: aggregates.category_breakdown(),
            distribution: aggregates.distribution(),
            engagement_rate: aggregates.engagement_rate(),
            misinformation_rate: aggregates.misinformation_rate(),
            top_issues: aggregates.top_issues(TOP_ISSUES),
            open_alerts,
        }
    }

    fn health_of(&self, generator: &AlertGenerator, aggregates: &TrendAggregator) -> HealthSnapshot {
        let overall = aggregates.overall();
        let inputs = HealthInputs {
            total_posts: overall.count,
            positive: overall.positive,
            negative: overall.negative,
            active_misinformation_alerts: generator.open_count(AlertType::Misinformation),
        };
        let breaches = Breaches {
            high_priority_alerts: generator.open_count(AlertType::HighPriority),
            misinformation_alerts: inputs.active_misinformation_alerts,
            sentiment_spike: generator.open_count(AlertType::SentimentSpike) > 0,
            low_engagement: generator.open_count(AlertType::LowEngagement) > 0,
        };
        health::snapshot(&inputs, &breaches, &self.config.health)
    }
}

struct Job {
    post: NewPost,
    accepted_at: DateTime<Utc>,
    reply: oneshot::Sender<Result<Post>>,
}

/// Bounded front door of the engine. Producers are rejected with
/// [`Error::QueueFull`] instead of buffering without limit.
#[derive(Clone)]
pub struct Ingestor {
    tx: mpsc::Sender<Job>,
}

/// Receiving end of the ingest queue, consumed by the scoring workers.
pub struct IngestQueue {
    rx: mpsc::Receiver<Job>,
}

impl IngestQueue {
    /// Workers share the receiver and run until every `Ingestor` is dropped.
    pub fn spawn_workers(self, engine: Arc<Engine>, workers: usize) -> Vec<JoinHandle<()>> {
        let rx = Arc::new(Mutex::new(self.rx));
        (0..workers)
            .map(|worker| {
                let engine = Arc::clone(&engine);
                let rx = Arc::clone(&rx);
                tokio::spawn(async move {
                    loop {
                        let job = rx.lock().await.recv().await;
                        let Some(job) = job else { break };
                        let result = engine.ingest_at(job.post, job.accepted_at).await;
                        // submitter may have gone away
                        let _ = job.reply.send(result);
                    }
                    tracing::debug!(worker, "ingest worker stopped");
                })
            })
            .collect()
    }
}

impl Ingestor {
    pub fn bounded(capacity: usize) -> (Self, IngestQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, IngestQueue { rx })
    }

    pub fn spawn(engine: Arc<Engine>, capacity: usize, workers: usize) -> (Self, Vec<JoinHandle<()>>) {
        let (ingestor, queue) = Self::bounded(capacity);
        (ingestor, queue.spawn_workers(engine, workers))
    }

    /// Queue a post; the timestamp is fixed at acceptance.
    pub fn enqueue(&self, post: NewPost) -> Result<oneshot::Receiver<Result<Post>>> {
        let (reply, rx) = oneshot::channel();
        let job = Job {
            post,
            accepted_at: Utc::now(),
            reply,
        };
        self.tx.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => Error::QueueFull,
            mpsc::error::TrySendError::Closed(_) => Error::PipelineClosed,
        })?;
        Ok(rx)
    }

    pub async fn submit(&self, post: NewPost) -> Result<Post> {
        let rx = self.enqueue(post)?;
        rx.await.map_err(|_| Error::PipelineClosed)?
    }
}
