use axum::{Json, extract::State};
use serde_json::{Value, json};

use super::{ApiError, error_response};
use crate::infrastructure::AppState;

pub async fn reconcile(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let report = state
        .inventory
        .reconcile()
        .await
        .map_err(error_response)?;

    Ok(Json(json!({ "report": report })))
}

pub async fn prune_borrowers(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let pruned = state
        .inventory
        .prune_orphan_borrowers()
        .await
        .map_err(error_response)?;

    Ok(Json(json!({ "pruned_borrowers": pruned })))
}
