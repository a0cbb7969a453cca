//! Application state shared by the HTTP handlers

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::services::InventoryService;

#[derive(Clone)]
pub struct AppState {
    /// Inventory service (owns the connection used by every handler)
    pub inventory: Arc<InventoryService>,
}

impl AppState {
    pub fn new(db: DatabaseConnection) -> Self {
        Self::from_service(InventoryService::new(db))
    }

    pub fn from_service(service: InventoryService) -> Self {
        Self {
            inventory: Arc::new(service),
        }
    }
}

// Lets handlers extract the service directly
impl axum::extract::FromRef<AppState> for Arc<InventoryService> {
    fn from_ref(state: &AppState) -> Self {
        state.inventory.clone()
    }
}
