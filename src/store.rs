//! Post Store: the source of truth every aggregate is derived from.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Alert, Category, Post};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 200;
/// Deepest offset every backend can page to.
pub const MAX_OFFSET: usize = i64::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostQuery {
    pub limit: usize,
    pub offset: usize,
    pub category: Option<Category>,
}

impl Default for PostQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
            category: None,
        }
    }
}

/// Durable storage for scored posts, alerts and alert-evaluation marks.
///
/// Posts are append-only: once inserted they are never updated.
#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn insert_post(&self, post: &Post) -> Result<()>;

    async fn post(&self, id: Uuid) -> Result<Option<Post>>;

    /// Newest first.
    async fn recent_posts(&self, query: &PostQuery) -> Result<Vec<Post>>;

    /// Oldest first; used for full rebuilds.
    async fn all_posts(&self) -> Result<Vec<Post>>;

    async fn post_count(&self) -> Result<u64>;

    /// Insert or update an alert by id.
    async fn save_alert(&self, alert: &Alert) -> Result<()>;

    async fn alerts(&self) -> Result<Vec<Alert>>;

    /// Record that alert rules ran to completion for a post.
    async fn mark_evaluated(&self, post_id: Uuid) -> Result<()>;

    async fn evaluated_posts(&self) -> Result<HashSet<Uuid>>;
}

#[derive(Default)]
struct MemoryIndex {
    by_time: BTreeMap<(DateTime<Utc>, Uuid), Post>,
    by_id: HashMap<Uuid, DateTime<Utc>>,
    by_category: HashMap<Category, BTreeSet<(DateTime<Utc>, Uuid)>>,
    alerts: HashMap<Uuid, Alert>,
    evaluated: HashSet<Uuid>,
}

/// In-process store used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryIndex>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn insert_post(&self, post: &Post) -> Result<()> {
        let mut index = self.inner.write().await;
        if index.by_id.contains_key(&post.id) {
            return Err(Error::DuplicatePost(post.id));
        }
        let key = (post.timestamp, post.id);
        index.by_id.insert(post.id, post.timestamp);
        index.by_category.entry(post.category).or_default().insert(key);
        index.by_time.insert(key, post.clone());
        Ok(())
    }

    async fn post(&self, id: Uuid) -> Result<Option<Post>> {
        let index = self.inner.read().await;
        Ok(index
            .by_id
            .get(&id)
            .and_then(|timestamp| index.by_time.get(&(*timestamp, id)))
            .cloned())
    }

    async fn recent_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let index = self.inner.read().await;
        let posts = match query.category {
            Some(category) => index
                .by_category
                .get(&category)
                .map(|keys| {
                    keys.iter()
                        .rev()
                        .skip(query.offset)
                        .take(query.limit)
                        .filter_map(|key| index.by_time.get(key).cloned())
                        .collect()
                })
                .unwrap_or_default(),
            None => index
                .by_time
                .values()
                .rev()
                .skip(query.offset)
                .take(query.limit)
                .cloned()
                .collect(),
        };
        Ok(posts)
    }

    async fn all_posts(&self) -> Result<Vec<Post>> {
        Ok(self.inner.read().await.by_time.values().cloned().collect())
    }

    async fn post_count(&self) -> Result<u64> {
        Ok(self.inner.read().await.by_id.len() as u64)
    }

    async fn save_alert(&self, alert: &Alert) -> Result<()> {
        self.inner.write().await.alerts.insert(alert.id, alert.clone());
        Ok(())
    }

    async fn alerts(&self) -> Result<Vec<Alert>> {
        let index = self.inner.read().await;
        let mut alerts: Vec<Alert> = index.alerts.values().cloned().collect();
        alerts.sort_by_key(|a| (a.timestamp, a.id));
        Ok(alerts)
    }

    async fn mark_evaluated(&self, post_id: Uuid) -> Result<()> {
        self.inner.write().await.evaluated.insert(post_id);
        Ok(())
    }

    async fn evaluated_posts(&self) -> Result<HashSet<Uuid>> {
        Ok(self.inner.read().await.evaluated.clone())
    }
}
