//! Alert listing and moderator actions.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::alerts::UserAction;
use crate::models::{Alert, AlertStatus, AlertType};
use crate::pipeline::AlertFilter;
use crate::routes::error::ApiError;
use crate::routes::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertsParams {
    pub status: Option<String>,
    pub alert_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionRequest {
    pub action: UserAction,
}

/// `GET /api/alerts`
///
/// Newest first; `status` and `alert_type` narrow the list.
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertsParams>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let filter = AlertFilter {
        status: params.status.as_deref().map(str::parse::<AlertStatus>).transpose()?,
        alert_type: params.alert_type.as_deref().map(str::parse::<AlertType>).transpose()?,
    };
    Ok(Json(state.engine.alerts(&filter).await))
}

/// `POST /api/alerts/{id}/action`
///
/// Body `{"action": "investigate" | "resolve"}`. Illegal moves answer 409.
pub async fn alert_action(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<Alert>, ApiError> {
    let Json(body) = payload?;
    let alert = state.engine.transition_alert(id, body.action.into()).await?;
    Ok(Json(alert))
}
