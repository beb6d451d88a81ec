//! Dashboard and analytics views.

use axum::extract::State;
use axum::Json;
use chrono::Utc;

use crate::report::{self, Analytics, Dashboard};
use crate::routes::error::ApiError;
use crate::routes::AppState;
use crate::store::PostQuery;

const DASHBOARD_RECENT_POSTS: usize = 10;

/// `GET /api/dashboard`
pub async fn dashboard(State(state): State<AppState>) -> Result<Json<Dashboard>, ApiError> {
    let insights = state.engine.insights(Utc::now().date_naive()).await;
    let recent = state
        .engine
        .posts(&PostQuery {
            limit: DASHBOARD_RECENT_POSTS,
            ..PostQuery::default()
        })
        .await?;
    Ok(Json(report::build_dashboard(&insights, recent)))
}

/// `GET /api/analytics`
pub async fn analytics(State(state): State<AppState>) -> Json<Analytics> {
    let insights = state.engine.insights(Utc::now().date_naive()).await;
    Json(report::build_analytics(&insights))
}
