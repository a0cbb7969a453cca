pub mod health;
pub mod maintenance;
pub mod tools;

use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::domain::{DomainError, Rejection};
use crate::infrastructure::AppState;

/// Error half of every handler result: status plus `{"error", "message"}` body
pub type ApiError = (StatusCode, Json<Value>);

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
}

pub fn error_response(err: DomainError) -> ApiError {
    let message = err.to_string();
    match err {
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::Rejected(Rejection::DuplicateName(_)) => {
            json_error(StatusCode::CONFLICT, "duplicate_name", message)
        }
        DomainError::Rejected(
            Rejection::ExceedsAvailable { .. } | Rejection::ExceedsBorrowed { .. },
        ) => json_error(StatusCode::UNPROCESSABLE_ENTITY, "quantity_out_of_range", message),
        DomainError::Rejected(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DomainError::Database(_) => {
            tracing::error!("{}", message);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", message)
        }
    }
}

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/status", get(health::status))
        // Tools
        .route("/tools", get(tools::list_tools).post(tools::create_tool))
        .route("/tools/borrowed", get(tools::list_borrowed_tools))
        .route("/tools/lookup", get(tools::lookup_tool))
        .route(
            "/tools/:id",
            get(tools::get_tool)
                .put(tools::update_tool)
                .delete(tools::delete_tool),
        )
        .route("/tools/:id/borrowers", get(tools::list_tool_borrowers))
        .route("/tools/:id/active-borrows", get(tools::active_borrows))
        // Borrowing
        .route("/tools/:id/borrow", post(tools::borrow_tool))
        .route("/tools/:id/return", post(tools::return_tool))
        // Maintenance
        .route("/maintenance/reconcile", post(maintenance::reconcile))
        .route("/maintenance/prune-borrowers", post(maintenance::prune_borrowers))
        .with_state(state)
}
