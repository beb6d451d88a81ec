//! Post submission, listing and real-time analysis endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::misinformation::RuleHit;
use crate::models::{Category, NewPost, Post, SentimentLabel};
use crate::priority::PriorityBand;
use crate::routes::error::ApiError;
use crate::routes::AppState;
use crate::store::{PostQuery, DEFAULT_PAGE_SIZE, MAX_OFFSET, MAX_PAGE_SIZE};

/// Query parameters for the post list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostsParams {
    /// Page size (default: 20, max: 200).
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePost {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub author: String,
    pub category: Option<String>,
    pub engagement_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub content: String,
    pub author: Option<String>,
    pub category: Option<String>,
    pub engagement_count: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub content: String,
    pub author: String,
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
    pub misinformation_risk: f64,
    pub priority_score: f64,
    pub priority_band: PriorityBand,
    pub rule_hits: Vec<RuleHit>,
    pub analysis_timestamp: DateTime<Utc>,
}

/// `GET /api/posts`
///
/// Newest first, optionally filtered by category.
pub async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<PostsParams>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let category = params
        .category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(str::parse::<Category>)
        .transpose()?;
    let offset = params.offset.unwrap_or(0);
    if offset > MAX_OFFSET {
        return Err(ApiError::BadRequest(format!("offset must be at most {MAX_OFFSET}")));
    }
    let query = PostQuery {
        limit: params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE),
        offset,
        category,
    };
    Ok(Json(state.engine.posts(&query).await?))
}

/// `GET /api/posts/{id}`
pub async fn get_post(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Post>, ApiError> {
    state
        .engine
        .post(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("post {id}")))
}

/// `POST /api/posts`
///
/// Validates, queues and waits for the scored post. Rejected with 503 when
/// the ingest queue is full.
pub async fn create_post(
    State(state): State<AppState>,
    payload: Result<Json<CreatePost>, JsonRejection>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let Json(body) = payload?;
    let submission = NewPost::validate(
        &body.content,
        &body.author,
        body.category.as_deref(),
        body.engagement_count,
    )?;
    let post = state.ingestor.submit(submission).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// `POST /api/analyze`
///
/// Scores text without storing it.
pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(body) = payload?;
    let author = body
        .author
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| "Anonymous".to_string());
    let submission = NewPost::validate(&body.content, &author, body.category.as_deref(), body.engagement_count)?;
    let analysis = state.engine.analyze(&submission);

    Ok(Json(AnalyzeResponse {
        priority_band: analysis.priority_band(),
        content: submission.content,
        author: submission.author,
        sentiment_score: analysis.sentiment.score,
        sentiment_label: analysis.sentiment.label,
        misinformation_risk: analysis.misinformation_risk,
        priority_score: analysis.priority_score,
        rule_hits: analysis.rule_hits,
        analysis_timestamp: Utc::now(),
    }))
}
