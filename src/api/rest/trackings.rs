use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::error::AppError;
use crate::models::tracking::TrackingEntry;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/trackings/:tracking_id", get(get_history))
}

/// Public: the tracking code itself is what customers share.
async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(tracking_id): Path<String>,
) -> Result<Json<Vec<TrackingEntry>>, AppError> {
    let history = state
        .trackings
        .get(tracking_id.trim())
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("no tracking history for {}", tracking_id)))?;

    Ok(Json(history))
}
