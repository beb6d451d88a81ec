//! API route definitions.

mod alerts;
pub mod error;
mod health;
mod insights;
mod posts;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::pipeline::{Engine, Ingestor};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub ingestor: Ingestor,
}

/// Build the complete API router.
///
/// # Route Structure
///
/// - `GET /` - Service index
/// - `GET /api/health` - Community health score and recommendations
/// - `GET /api/dashboard` - Dashboard summary, recent posts, open alerts, top issues
/// - `GET /api/analytics` - Sentiment trends, category breakdown, key metrics
/// - `GET /api/posts` - Paged posts, newest first
/// - `POST /api/posts` - Submit a post for scoring
/// - `GET /api/posts/{id}` - One post
/// - `POST /api/analyze` - Score text without storing it
/// - `GET /api/alerts` - Alerts, filterable by status and type
/// - `POST /api/alerts/{id}/action` - Investigate or resolve an alert
/// - `GET /api/config/thresholds` - Configured cutoffs
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health::health))
        .route("/dashboard", get(insights::dashboard))
        .route("/analytics", get(insights::analytics))
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route("/posts/{id}", get(posts::get_post))
        .route("/analyze", post(posts::analyze))
        .route("/alerts", get(alerts::list_alerts))
        .route("/alerts/{id}/action", post(alerts::alert_action))
        .route("/config/thresholds", get(health::thresholds));

    Router::new()
        .route("/", get(health::index))
        .nest("/api", api)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::models::NewPost;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const WATER_RUMOR: &str =
        "URGENT: There's a conspiracy about the water quality! They're hiding something from us!";

    async fn app() -> (Router, Arc<Engine>) {
        let engine = Arc::new(
            Engine::open(Arc::new(MemoryStore::new()), ScoringConfig::default())
                .await
                .unwrap(),
        );
        let (ingestor, _workers) = Ingestor::spawn(engine.clone(), 16, 2);
        let state = AppState {
            engine: engine.clone(),
            ingestor,
        };
        (router(state), engine)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn seed_rumor(engine: &Engine) {
        let post = NewPost::validate(WATER_RUMOR, "John D.", Some("maintenance"), None).unwrap();
        engine.ingest(post).await.unwrap();
    }

    #[tokio::test]
    async fn create_post_returns_scored_post() {
        let (app, _) = app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/posts",
            Some(json!({
                "content": "The new pool hours are great! Everyone seems to be enjoying the extended time.",
                "author": "Sarah M.",
                "category": "amenities"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["sentiment_label"], "positive");
        assert_eq!(body["category"], "amenities");
        assert!(body["id"].is_string());
        assert!(body["timestamp"].is_string());
        assert!(body.get("engagement_count").is_none());

        let (_, posts) = send(&app, Method::GET, "/api/posts", None).await;
        assert_eq!(posts.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn invalid_submissions_are_rejected_and_not_stored() {
        let (app, engine) = app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/posts",
            Some(json!({"content": "   ", "author": "Sarah M."})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/posts",
            Some(json!({"content": "Hello", "author": "Sarah M.", "category": "parking"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::POST, "/api/posts", Some(json!({"content": 7}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert_eq!(engine.health().await.total_posts, 0);
    }

    #[tokio::test]
    async fn empty_community_health() {
        let (app, _) = app().await;
        let (status, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["health_status"], "No data available");
        assert_eq!(body["community_health_score"], 50.0);
        assert_eq!(body["total_posts"], 0);
        assert_eq!(body["recommendations"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn alert_lifecycle_over_http() {
        let (app, engine) = app().await;
        seed_rumor(&engine).await;

        let (status, alerts) = send(&app, Method::GET, "/api/alerts?alert_type=misinformation", None).await;
        assert_eq!(status, StatusCode::OK);
        let alerts = alerts.as_array().cloned().unwrap_or_default();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["severity"], "high");
        assert_eq!(alerts[0]["status"], "active");
        let id = alerts[0]["id"].as_str().unwrap().to_string();
        let action_uri = format!("/api/alerts/{id}/action");

        let (status, body) = send(&app, Method::POST, &action_uri, Some(json!({"action": "investigate"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "investigating");

        let (status, body) = send(&app, Method::POST, &action_uri, Some(json!({"action": "resolve"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "resolved");

        let (status, body) = send(&app, Method::POST, &action_uri, Some(json!({"action": "investigate"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");

        let (_, resolved) = send(&app, Method::GET, "/api/alerts?status=resolved", None).await;
        assert_eq!(resolved.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn internal_only_actions_and_unknown_alerts() {
        let (app, engine) = app().await;
        seed_rumor(&engine).await;
        let (_, alerts) = send(&app, Method::GET, "/api/alerts", None).await;
        let id = alerts[0]["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/alerts/{id}/action"),
            Some(json!({"action": "monitor"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = uuid::Uuid::new_v4();
        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/alerts/{missing}/action"),
            Some(json!({"action": "resolve"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");

        let (status, _) = send(&app, Method::GET, "/api/alerts?status=snoozed", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn dashboard_and_analytics_shapes() {
        let (app, engine) = app().await;
        seed_rumor(&engine).await;

        let (status, dashboard) = send(&app, Method::GET, "/api/dashboard", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dashboard["analytics"]["total_posts"], 1);
        assert_eq!(dashboard["analytics"]["misinformation_alerts"], 1);
        assert!(dashboard["analytics"]["recent_trends"]["daily_posts"].is_array());
        assert_eq!(dashboard["recent_posts"].as_array().map(Vec::len), Some(1));
        assert!(dashboard["alerts"].is_array());
        assert_eq!(dashboard["top_issues"][0]["category"], "maintenance");

        let (status, analytics) = send(&app, Method::GET, "/api/analytics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(analytics["sentiment_trends"]["daily_sentiment"].is_array());
        assert_eq!(analytics["sentiment_distribution"]["negative"], 1);
        assert_eq!(analytics["key_metrics"]["total_posts"], 1);
        assert!(analytics["category_breakdown"].is_array());
    }

    #[tokio::test]
    async fn analyze_scores_without_storing() {
        let (app, engine) = app().await;
        let (status, body) = send(&app, Method::POST, "/api/analyze", Some(json!({"content": WATER_RUMOR}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["author"], "Anonymous");
        assert_eq!(body["sentiment_label"], "negative");
        assert!(body["misinformation_risk"].as_f64().unwrap() > 0.5);
        assert!(!body["rule_hits"].as_array().unwrap().is_empty());
        assert!(body["priority_band"].is_string());
        assert_eq!(engine.health().await.total_posts, 0);
    }

    #[tokio::test]
    async fn posts_paging_and_lookup() {
        let (app, engine) = app().await;
        for _ in 0..3 {
            seed_rumor(&engine).await;
        }
        let (_, page) = send(&app, Method::GET, "/api/posts?limit=2&offset=0", None).await;
        let page = page.as_array().cloned().unwrap_or_default();
        assert_eq!(page.len(), 2);

        let id = page[0]["id"].as_str().unwrap();
        let (status, post) = send(&app, Method::GET, &format!("/api/posts/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(post["id"], page[0]["id"]);

        let (status, _) = send(&app, Method::GET, &format!("/api/posts/{}", uuid::Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, filtered) = send(&app, Method::GET, "/api/posts?category=security", None).await;
        assert_eq!(filtered.as_array().map(Vec::len), Some(0));

        let (status, past_end) = send(&app, Method::GET, "/api/posts?offset=9223372036854775807", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(past_end.as_array().map(Vec::len), Some(0));
        let (status, body) = send(&app, Method::GET, "/api/posts?offset=9223372036854775808", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn index_and_thresholds() {
        let (app, _) = app().await;
        let (status, index) = send(&app, Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(index["endpoints"]["health"], "/api/health");

        let (_, thresholds) = send(&app, Method::GET, "/api/config/thresholds", None).await;
        assert_eq!(thresholds["sentiment"]["positive"], 0.1);
        assert_eq!(thresholds["priority_bands"]["high"], 0.7);
        assert_eq!(thresholds["health_bands"]["excellent"], 80.0);
    }
}
