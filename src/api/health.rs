use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::infrastructure::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "toolshed",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Loading indicator plus the latest report of each operation kind
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let activity = state.inventory.activity();
    Json(json!({
        "loading": activity.is_loading(),
        "in_flight": activity.in_flight(),
        "operations": activity.reports(),
    }))
}
