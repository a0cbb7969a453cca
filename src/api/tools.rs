use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ApiError, error_response, json_error};
use crate::infrastructure::AppState;
use crate::models::tool::ToolDto;

#[derive(Deserialize)]
pub struct LookupQuery {
    pub name: String,
    pub exclude_id: Option<i32>,
}

#[derive(Deserialize)]
pub struct BorrowPayload {
    pub borrower: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct ReturnPayload {
    pub borrower_id: i32,
    pub quantity: u32,
}

/// Fresh read model; also becomes the shared snapshot
pub async fn list_tools(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let snapshot = state.inventory.refresh().await.map_err(error_response)?;

    Ok(Json(json!({
        "tools": snapshot.tools,
        "borrowed_tools": snapshot.borrowed_tools,
    })))
}

pub async fn list_borrowed_tools(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let borrowed = state
        .inventory
        .list_borrowed_tools()
        .await
        .map_err(error_response)?;

    Ok(Json(json!({ "borrowed_tools": borrowed })))
}

pub async fn get_tool(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let tool = state
        .inventory
        .find_tool(id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "not_found", "Tool not found"))?;

    Ok(Json(json!({ "tool": tool })))
}

/// Name-collision check for create/edit forms; `tool` is null when the name is free
pub async fn lookup_tool(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<Value>, ApiError> {
    let tool = state
        .inventory
        .find_tool_by_name(&query.name, query.exclude_id)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({ "tool": tool })))
}

pub async fn create_tool(
    State(state): State<AppState>,
    Json(payload): Json<ToolDto>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let change = state
        .inventory
        .create_tool(payload)
        .await
        .map_err(error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "tool": change.tool, "message": "Tool created successfully" })),
    ))
}

pub async fn update_tool(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<ToolDto>,
) -> Result<Json<Value>, ApiError> {
    let change = state
        .inventory
        .update_tool(id, payload)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "tool": change.tool,
        "released_borrows": change.released_borrows,
        "pruned_borrowers": change.pruned_borrowers,
    })))
}

pub async fn delete_tool(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let removal = state
        .inventory
        .delete_tool(id)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({
        "tool_id": removal.tool_id,
        "released_borrows": removal.released_borrows,
        "pruned_borrowers": removal.pruned_borrowers,
        "message": "Tool deleted successfully",
    })))
}

pub async fn list_tool_borrowers(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let borrowers = state
        .inventory
        .list_borrowers_for_tool(id)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({ "borrowers": borrowers })))
}

pub async fn active_borrows(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, ApiError> {
    let active = state
        .inventory
        .has_active_borrows(id)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({ "has_active_borrows": active })))
}

pub async fn borrow_tool(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<BorrowPayload>,
) -> Result<Json<Value>, ApiError> {
    let receipt = state
        .inventory
        .borrow_tool(id, &payload.borrower, payload.quantity)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({ "borrow": receipt })))
}

pub async fn return_tool(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<ReturnPayload>,
) -> Result<Json<Value>, ApiError> {
    let receipt = state
        .inventory
        .return_tool(id, payload.borrower_id, payload.quantity)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({ "return": receipt })))
}
