//! Service index, community health and threshold endpoints.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::{AlertThresholds, HealthBands};
use crate::models::HealthSnapshot;
use crate::priority::{HIGH_BAND_FLOOR, MEDIUM_BAND_FLOOR};
use crate::routes::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct SentimentThresholds {
    pub positive: f64,
    pub negative: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriorityBands {
    pub medium: f64,
    pub high: f64,
}

/// Every cutoff a dashboard renders, from the one place the engine reads them.
#[derive(Debug, Clone, Serialize)]
pub struct Thresholds {
    pub sentiment: SentimentThresholds,
    pub priority_bands: PriorityBands,
    pub health_bands: HealthBands,
    pub alerts: AlertThresholds,
}

/// `GET /`
pub async fn index() -> Json<Value> {
    Json(json!({
        "message": "Community Pulse signal engine",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/api/health",
            "dashboard": "/api/dashboard",
            "posts": "/api/posts",
            "analyze": "/api/analyze",
            "analytics": "/api/analytics",
            "alerts": "/api/alerts",
            "thresholds": "/api/config/thresholds"
        }
    }))
}

/// `GET /api/health`
pub async fn health(State(state): State<AppState>) -> Json<HealthSnapshot> {
    Json(state.engine.health().await)
}

/// `GET /api/config/thresholds`
pub async fn thresholds(State(state): State<AppState>) -> Json<Thresholds> {
    let config = state.engine.config();
    Json(Thresholds {
        sentiment: SentimentThresholds {
            positive: config.sentiment.positive_threshold,
            negative: config.sentiment.negative_threshold,
        },
        priority_bands: PriorityBands {
            medium: MEDIUM_BAND_FLOOR,
            high: HIGH_BAND_FLOOR,
        },
        health_bands: config.health.clone(),
        alerts: config.alerts.clone(),
    })
}
