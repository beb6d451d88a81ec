use std::collections::HashSet;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Alert, NewPost, Post};
use crate::pipeline::Engine;
use crate::store::{PostQuery, SignalStore};

const POST_COLUMNS: &str = "id, content, author, category, posted_at, sentiment_score, \
     sentiment_label, misinformation_risk, priority_score, engagement_count";

/// Postgres-backed [`SignalStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn engagement_from_column(count: i64) -> Result<u32> {
    u32::try_from(count)
        .map_err(|_| Error::Validation(format!("stored engagement_count {count} is out of range")))
}

fn post_from_row(row: &PgRow) -> Result<Post> {
    let category: String = row.try_get("category")?;
    let label: String = row.try_get("sentiment_label")?;
    let engagement: Option<i64> = row.try_get("engagement_count")?;
    Ok(Post {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        author: row.try_get("author")?,
        category: category.parse()?,
        timestamp: row.try_get("posted_at")?,
        sentiment_score: row.try_get("sentiment_score")?,
        sentiment_label: label.parse()?,
        misinformation_risk: row.try_get("misinformation_risk")?,
        priority_score: row.try_get("priority_score")?,
        engagement_count: engagement.map(engagement_from_column).transpose()?,
    })
}

fn alert_from_row(row: &PgRow) -> Result<Alert> {
    let alert_type: String = row.try_get("alert_type")?;
    let severity: String = row.try_get("severity")?;
    let status: String = row.try_get("status")?;
    let category: Option<String> = row.try_get("category")?;
    Ok(Alert {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        alert_type: alert_type.parse()?,
        severity: severity.parse()?,
        confidence: row.try_get("confidence")?,
        description: row.try_get("description")?,
        suggested_action: row.try_get("suggested_action")?,
        status: status.parse()?,
        category: category.map(|c| c.parse()).transpose()?,
        trend_day: row.try_get("trend_day")?,
        timestamp: row.try_get("created_at")?,
    })
}

#[async_trait]
impl SignalStore for PgStore {
    async fn insert_post(&self, post: &Post) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO community_pulse.posts
            (id, content, author, category, posted_at, sentiment_score, sentiment_label,
             misinformation_risk, priority_score, engagement_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(post.id)
        .bind(&post.content)
        .bind(&post.author)
        .bind(post.category.as_str())
        .bind(post.timestamp)
        .bind(post.sentiment_score)
        .bind(post.sentiment_label.as_str())
        .bind(post.misinformation_risk)
        .bind(post.priority_score)
        .bind(post.engagement_count.map(i64::from))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(Error::DuplicatePost(post.id)),
            Err(err) => Err(err.into()),
        }
    }

    async fn post(&self, id: Uuid) -> Result<Option<Post>> {
        let query = format!("SELECT {POST_COLUMNS} FROM community_pulse.posts WHERE id = $1");
        let row = sqlx::query(&query).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(post_from_row).transpose()
    }

    async fn recent_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let mut sql = format!("SELECT {POST_COLUMNS} FROM community_pulse.posts");
        if query.category.is_some() {
            sql.push_str(" WHERE category = $3");
        }
        sql.push_str(" ORDER BY posted_at DESC, id DESC LIMIT $1 OFFSET $2");

        let mut rows = sqlx::query(&sql)
            .bind(query.limit as i64)
            .bind(i64::try_from(query.offset).unwrap_or(i64::MAX));
        if let Some(category) = query.category {
            rows = rows.bind(category.as_str());
        }

        rows.fetch_all(&self.pool)
            .await?
            .iter()
            .map(post_from_row)
            .collect()
    }

    async fn all_posts(&self) -> Result<Vec<Post>> {
        let query = format!("SELECT {POST_COLUMNS} FROM community_pulse.posts ORDER BY posted_at, id");
        sqlx::query(&query)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(post_from_row)
            .collect()
    }

    async fn post_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS total FROM community_pulse.posts")
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;
        Ok(count.max(0) as u64)
    }

    async fn save_alert(&self, alert: &Alert) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO community_pulse.alerts
            (id, post_id, alert_type, severity, confidence, description, suggested_action,
             status, category, trend_day, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE
            SET status = EXCLUDED.status, updated_at = now()
            "#,
        )
        .bind(alert.id)
        .bind(alert.post_id)
        .bind(alert.alert_type.as_str())
        .bind(alert.severity.as_str())
        .bind(alert.confidence)
        .bind(&alert.description)
        .bind(&alert.suggested_action)
        .bind(alert.status.as_str())
        .bind(alert.category.map(|c| c.as_str()))
        .bind(alert.trend_day)
        .bind(alert.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn alerts(&self) -> Result<Vec<Alert>> {
        sqlx::query(
            r#"
            SELECT id, post_id, alert_type, severity, confidence, description,
                   suggested_action, status, category, trend_day, created_at
            FROM community_pulse.alerts
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(alert_from_row)
        .collect()
    }

    async fn mark_evaluated(&self, post_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO community_pulse.alert_evaluations (post_id) VALUES ($1) ON CONFLICT (post_id) DO NOTHING",
        )
        .bind(post_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn evaluated_posts(&self) -> Result<HashSet<Uuid>> {
        let rows = sqlx::query("SELECT post_id FROM community_pulse.alert_evaluations")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("post_id").map_err(Error::from))
            .collect()
    }
}

/// Demo posts from a small residential community, with category and
/// engagement where the post is an announcement.
const SEED_POSTS: &[(&str, &str, &str, Option<u32>)] = &[
    ("The new pool hours are great! Everyone seems to be enjoying the extended time.", "Sarah M.", "amenities", None),
    ("URGENT: There's a conspiracy about the water quality! They're hiding something from us!", "John D.", "maintenance", None),
    ("The maintenance team did an excellent job fixing the elevator quickly.", "Maria L.", "maintenance", None),
    ("Can we please address the noise complaints? Some residents are being very loud late at night.", "David K.", "noise", None),
    ("The community garden is looking beautiful this spring. Great work everyone!", "Lisa R.", "general", None),
    ("FAKE NEWS: The management is lying about the rent increase! Don't believe their propaganda!", "Mike T.", "general", None),
    ("The new security system is working well. I feel much safer now.", "Emma W.", "security", None),
    ("There's a suspicious person hanging around the parking lot. Should we report this?", "Alex P.", "security", None),
    ("The holiday decorations look amazing! Thank you to everyone who helped.", "Rachel S.", "events", Some(12)),
    ("The garbage collection schedule changed without notice. This is very inconvenient.", "Tom B.", "maintenance", None),
    ("The fitness center equipment is in excellent condition. Great job maintaining it!", "Jennifer H.", "amenities", None),
    ("EMERGENCY: The fire alarm system is broken! This is a safety hazard!", "Robert C.", "security", None),
    ("The community events this month were fantastic. Really brought everyone together.", "Amanda F.", "events", Some(8)),
    ("The parking situation is getting worse. We need more spaces.", "Michael S.", "general", None),
    ("The landscaping team does such a beautiful job. The flowers are gorgeous!", "Jessica L.", "amenities", None),
    ("CONSPIRACY: They're putting chemicals in the air vents to control us!", "Christopher M.", "general", None),
    ("The package delivery system is working perfectly. Very convenient.", "Nicole R.", "amenities", None),
    ("There's a leak in the basement that needs immediate attention.", "Daniel P.", "maintenance", None),
    ("The community newsletter is very informative. Keep up the good work!", "Ashley T.", "events", Some(1)),
    ("The WiFi speed has improved significantly. Thank you for the upgrade!", "Kevin B.", "amenities", None),
];

/// Ingest the demo posts, spread over the past week, unless posts already exist.
pub async fn seed(engine: &Engine, now: DateTime<Utc>) -> anyhow::Result<usize> {
    if engine.health().await.total_posts > 0 {
        return Ok(0);
    }

    let mut dated = Vec::with_capacity(SEED_POSTS.len());
    for (i, (content, author, category, engagement)) in SEED_POSTS.iter().enumerate() {
        let post = NewPost::validate(content, author, Some(*category), *engagement)?;
        let offset = Duration::days((i % 7) as i64) + Duration::hours(((i * 5) % 24) as i64);
        dated.push((now - offset, post));
    }
    // oldest first so day-over-day rules see history in order
    dated.sort_by_key(|(timestamp, _)| *timestamp);

    let mut inserted = 0usize;
    for (timestamp, post) in dated {
        engine.ingest_at(post, timestamp).await?;
        inserted += 1;
    }

    Ok(inserted)
}

pub async fn import_csv(engine: &Engine, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        content: String,
        author: String,
        category: Option<String>,
        engagement_count: Option<u32>,
        posted_at: Option<DateTime<Utc>>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("malformed row {}", line + 1))?;
        let category = row.category.as_deref().filter(|c| !c.trim().is_empty());
        let post = NewPost::validate(&row.content, &row.author, category, row.engagement_count)
            .with_context(|| format!("invalid row {}", line + 1))?;
        engine
            .ingest_at(post, row.posted_at.unwrap_or_else(Utc::now))
            .await?;
        inserted += 1;
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::store::MemoryStore;
    use std::io::Write;
    use std::sync::Arc;

    async fn engine() -> Engine {
        Engine::open(Arc::new(MemoryStore::new()), ScoringConfig::default())
            .await
            .unwrap()
    }

    #[test]
    fn engagement_column_keeps_the_full_range() {
        assert_eq!(engagement_from_column(i64::from(u32::MAX)).unwrap(), u32::MAX);
        assert_eq!(engagement_from_column(0).unwrap(), 0);
        assert!(matches!(engagement_from_column(-1), Err(Error::Validation(_))));
        assert!(engagement_from_column(i64::from(u32::MAX) + 1).is_err());
    }

    #[tokio::test]
    async fn seed_spreads_demo_posts_over_a_week_once() {
        let engine = engine().await;
        let now = Utc::now();
        assert_eq!(seed(&engine, now).await.unwrap(), SEED_POSTS.len());
        assert_eq!(seed(&engine, now).await.unwrap(), 0);

        let posts = engine
            .posts(&PostQuery {
                limit: 50,
                ..PostQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(posts.len(), SEED_POSTS.len());
        let oldest = posts.iter().map(|p| p.timestamp).min().unwrap();
        assert!(now - oldest <= Duration::days(7));
        assert!(posts.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[tokio::test]
    async fn import_reads_optional_columns() {
        let mut path = std::env::temp_dir();
        path.push(format!("community-pulse-import-{}.csv", Uuid::new_v4()));
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "content,author,category,engagement_count,posted_at").unwrap();
            writeln!(file, "Pool closed for repairs,Lisa R.,amenities,4,2026-04-02T10:00:00Z").unwrap();
            writeln!(file, "Lost cat near building C,Tom B.,,,").unwrap();
        }

        let engine = engine().await;
        let inserted = import_csv(&engine, &path).await.unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(inserted, 2);

        let posts = engine.posts(&PostQuery::default()).await.unwrap();
        let pool = posts.iter().find(|p| p.author == "Lisa R.").unwrap();
        assert_eq!(pool.engagement_count, Some(4));
        assert_eq!(pool.timestamp.to_rfc3339(), "2026-04-02T10:00:00+00:00");
        let cat = posts.iter().find(|p| p.author == "Tom B.").unwrap();
        assert_eq!(cat.category, crate::models::Category::General);
    }

    #[tokio::test]
    async fn import_rejects_blank_content() {
        let mut path = std::env::temp_dir();
        path.push(format!("community-pulse-bad-{}.csv", Uuid::new_v4()));
        std::fs::write(&path, "content,author,category,engagement_count,posted_at\n ,Tom B.,general,,\n").unwrap();

        let engine = engine().await;
        let result = import_csv(&engine, &path).await;
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
        assert_eq!(engine.health().await.total_posts, 0);
    }
}
