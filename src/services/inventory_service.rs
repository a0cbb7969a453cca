//! Inventory Service - Pure business logic without HTTP layer
//!
//! Owns every read and write to `tools`, `borrowers` and `borrower_tool` and
//! keeps them consistent:
//! - a tool's borrowed count is the number of its `borrower_tool` rows,
//! - dropping stock below that count releases every unit of the tool,
//! - a borrower disappears with their last returned unit,
//! - deleting a tool removes its rows first.
//!
//! Multi-step mutations run in one transaction. After each mutation, whether it
//! succeeded or not, the read model is recomputed from the store.

use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::Serialize;
use std::collections::HashSet;
use tokio::sync::RwLock;

use crate::domain::validation::{
    check_borrow_quantity, check_return_quantity, normalize_name, require_name, require_stock,
};
use crate::domain::{
    BorrowedTool, BorrowerWithCount, DomainError, InventorySnapshot, Rejection, ToolInfo,
    borrowed_tools, count_by_borrower, display_name, sort_tools,
};
use crate::infrastructure::repositories::{
    borrow_record_repository, borrower_repository, tool_repository,
};
use crate::models::tool::{self, ToolDto};
use crate::services::activity::{ActivityTracker, InFlight, OperationKind};

#[derive(Debug, Clone, Serialize)]
pub struct BorrowReceipt {
    pub tool_id: i32,
    pub borrower_id: i32,
    pub borrower_name: String,
    pub quantity: u32,
    /// The borrower did not exist before this call
    pub borrower_created: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReturnReceipt {
    pub tool_id: i32,
    pub borrower_id: i32,
    pub returned: u64,
    /// The borrower held nothing else and was removed
    pub borrower_pruned: bool,
}

/// Result of creating or editing a tool
#[derive(Debug, Clone, Serialize)]
pub struct ToolChange {
    pub tool: ToolInfo,
    /// Borrow records dropped because stock fell below the borrowed count
    pub released_borrows: u64,
    pub pruned_borrowers: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolRemoval {
    pub tool_id: i32,
    pub released_borrows: u64,
    pub pruned_borrowers: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub dangling_records_removed: u64,
    pub borrowers_pruned: u64,
}

pub struct InventoryService {
    db: DatabaseConnection,
    activity: ActivityTracker,
    snapshot: RwLock<InventorySnapshot>,
    prune_orphans_on_cascade: bool,
}

impl InventoryService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            activity: ActivityTracker::new(),
            snapshot: RwLock::new(InventorySnapshot::default()),
            prune_orphans_on_cascade: false,
        }
    }

    /// When enabled, `update_tool` and `delete_tool` also remove borrowers
    /// left without any record by their cascade. Off by default.
    pub fn with_orphan_pruning_on_cascade(mut self, enabled: bool) -> Self {
        self.prune_orphans_on_cascade = enabled;
        self
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    pub fn is_loading(&self) -> bool {
        self.activity.is_loading()
    }

    /// Read model as of the last refresh
    pub async fn snapshot(&self) -> InventorySnapshot {
        self.snapshot.read().await.clone()
    }

    /// All tools with their borrowed count; available ones first, then by name
    pub async fn list_tools(&self) -> Result<Vec<ToolInfo>, DomainError> {
        load_tools(&self.db).await
    }

    pub async fn list_borrowed_tools(&self) -> Result<Vec<BorrowedTool>, DomainError> {
        let tools = self.list_tools().await?;
        Ok(borrowed_tools(&tools))
    }

    /// Who holds units of a tool and how many, ordered by borrower id.
    ///
    /// The first entry is what a return form preselects.
    pub async fn list_borrowers_for_tool(
        &self,
        tool_id: i32,
    ) -> Result<Vec<BorrowerWithCount>, DomainError> {
        let borrower_ids = borrow_record_repository::borrower_ids_for_tool(&self.db, tool_id).await?;
        if borrower_ids.is_empty() {
            return Ok(Vec::new());
        }

        let counts = count_by_borrower(borrower_ids);
        let borrowers =
            borrower_repository::find_by_ids(&self.db, counts.keys().copied().collect()).await?;

        Ok(borrowers
            .into_iter()
            .map(|borrower| BorrowerWithCount {
                borrow_count: counts.get(&borrower.id).copied().unwrap_or(0),
                id: borrower.id,
                name: borrower.name,
            })
            .collect())
    }

    pub async fn find_tool(&self, tool_id: i32) -> Result<Option<ToolInfo>, DomainError> {
        let Some(tool) = tool_repository::find_by_id(&self.db, tool_id).await? else {
            return Ok(None);
        };
        let borrowed = borrow_record_repository::count_by_tool(&self.db, tool_id).await?;
        Ok(Some(tool_info(tool, borrowed)))
    }

    /// Tool whose name matches case-insensitively, ignoring `exclude_id`.
    ///
    /// Used by edit forms to detect a rename onto another tool's name.
    pub async fn find_tool_by_name(
        &self,
        name: &str,
        exclude_id: Option<i32>,
    ) -> Result<Option<ToolInfo>, DomainError> {
        let name = normalize_name(name);
        if name.is_empty() {
            return Ok(None);
        }

        let Some(tool) = tool_repository::find_by_name(&self.db, &name, exclude_id).await? else {
            return Ok(None);
        };
        let borrowed = borrow_record_repository::count_by_tool(&self.db, tool.id).await?;
        Ok(Some(tool_info(tool, borrowed)))
    }

    pub async fn has_active_borrows(&self, tool_id: i32) -> Result<bool, DomainError> {
        Ok(borrow_record_repository::count_by_tool(&self.db, tool_id).await? > 0)
    }

    /// Recompute the read model from the store and keep it as the current snapshot
    pub async fn refresh(&self) -> Result<InventorySnapshot, DomainError> {
        let op = self.activity.begin(OperationKind::Refresh);
        // Held across the read so overlapping refreshes store in read order
        let mut current = self.snapshot.write().await;
        let result = self.list_tools().await.map(InventorySnapshot::from_tools);
        op.finish(&result);

        let snapshot = result?;
        *current = snapshot.clone();
        Ok(snapshot)
    }

    /// Lend `quantity` units of a tool to the borrower named `borrower_name`,
    /// creating the borrower on first use.
    pub async fn borrow_tool(
        &self,
        tool_id: i32,
        borrower_name: &str,
        quantity: u32,
    ) -> Result<BorrowReceipt, DomainError> {
        let op = self.activity.begin(OperationKind::Borrow);
        let result = self.apply_borrow(tool_id, borrower_name, quantity).await;
        self.settle(op, result).await
    }

    async fn apply_borrow(
        &self,
        tool_id: i32,
        borrower_name: &str,
        quantity: u32,
    ) -> Result<BorrowReceipt, DomainError> {
        let name = require_name(borrower_name)?;

        let txn = self.db.begin().await?;

        let tool = tool_repository::find_by_id(&txn, tool_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        let borrowed = borrow_record_repository::count_by_tool(&txn, tool_id).await?;
        let available = tool_info(tool, borrowed).available();
        check_borrow_quantity(quantity, available)?;

        let (borrower, borrower_created) =
            match borrower_repository::find_by_name(&txn, &name).await? {
                Some(existing) => (existing, false),
                None => (borrower_repository::create(&txn, name).await?, true),
            };

        borrow_record_repository::insert_units(&txn, tool_id, borrower.id, quantity).await?;
        txn.commit().await?;

        tracing::info!(
            tool_id,
            borrower_id = borrower.id,
            quantity,
            borrower_created,
            "Tool borrowed"
        );

        Ok(BorrowReceipt {
            tool_id,
            borrower_id: borrower.id,
            borrower_name: borrower.name,
            quantity,
            borrower_created,
        })
    }

    /// Give back `quantity` units; the borrower is removed once they hold nothing.
    pub async fn return_tool(
        &self,
        tool_id: i32,
        borrower_id: i32,
        quantity: u32,
    ) -> Result<ReturnReceipt, DomainError> {
        let op = self.activity.begin(OperationKind::Return);
        let result = self.apply_return(tool_id, borrower_id, quantity).await;
        self.settle(op, result).await
    }

    async fn apply_return(
        &self,
        tool_id: i32,
        borrower_id: i32,
        quantity: u32,
    ) -> Result<ReturnReceipt, DomainError> {
        let txn = self.db.begin().await?;

        let held = borrow_record_repository::count_for(&txn, tool_id, borrower_id).await?;
        check_return_quantity(quantity, held)?;

        let returned =
            borrow_record_repository::delete_units(&txn, tool_id, borrower_id, quantity).await?;

        let remaining = borrow_record_repository::count_by_borrower(&txn, borrower_id).await?;
        let borrower_pruned = if remaining == 0 {
            borrower_repository::delete(&txn, borrower_id).await? > 0
        } else {
            false
        };

        txn.commit().await?;

        tracing::info!(tool_id, borrower_id, returned, borrower_pruned, "Tool returned");

        Ok(ReturnReceipt {
            tool_id,
            borrower_id,
            returned,
            borrower_pruned,
        })
    }

    pub async fn create_tool(&self, dto: ToolDto) -> Result<ToolChange, DomainError> {
        let op = self.activity.begin(OperationKind::CreateTool);
        let result = self.apply_create(dto).await;
        self.settle(op, result).await
    }

    async fn apply_create(&self, dto: ToolDto) -> Result<ToolChange, DomainError> {
        let name = require_name(&dto.name)?;
        let stock = require_stock(dto.stock)?;

        let txn = self.db.begin().await?;

        if tool_repository::find_by_name(&txn, &name, None)
            .await?
            .is_some()
        {
            return Err(Rejection::DuplicateName(display_name(&name)).into());
        }

        let created = tool_repository::create(&txn, name, stock).await?;
        txn.commit().await?;

        tracing::info!(tool_id = created.id, stock, "Tool created");

        Ok(ToolChange {
            tool: tool_info(created, 0),
            released_borrows: 0,
            pruned_borrowers: 0,
        })
    }

    /// Rename and/or restock a tool.
    ///
    /// If the new stock is below the number of units out, every borrow record of
    /// the tool is deleted before the update. No confirmation is asked here.
    pub async fn update_tool(&self, tool_id: i32, dto: ToolDto) -> Result<ToolChange, DomainError> {
        let op = self.activity.begin(OperationKind::UpdateTool);
        let result = self.apply_update(tool_id, dto).await;
        self.settle(op, result).await
    }

    async fn apply_update(&self, tool_id: i32, dto: ToolDto) -> Result<ToolChange, DomainError> {
        let name = require_name(&dto.name)?;
        let stock = require_stock(dto.stock)?;

        let txn = self.db.begin().await?;

        if tool_repository::find_by_id(&txn, tool_id).await?.is_none() {
            return Err(DomainError::NotFound);
        }

        if tool_repository::find_by_name(&txn, &name, Some(tool_id))
            .await?
            .is_some()
        {
            return Err(Rejection::DuplicateName(display_name(&name)).into());
        }

        let borrowed = borrow_record_repository::count_by_tool(&txn, tool_id).await?;
        let released_borrows = if i64::from(stock) < borrowed as i64 {
            borrow_record_repository::delete_by_tool(&txn, tool_id).await?
        } else {
            0
        };

        let pruned_borrowers = if released_borrows > 0 && self.prune_orphans_on_cascade {
            prune_orphans(&txn).await?
        } else {
            0
        };

        let updated = tool_repository::update(&txn, tool_id, name, stock).await?;
        txn.commit().await?;

        if released_borrows > 0 {
            tracing::warn!(
                tool_id,
                stock,
                released_borrows,
                "Stock dropped below borrowed count, released all borrows"
            );
        } else {
            tracing::info!(tool_id, stock, "Tool updated");
        }

        Ok(ToolChange {
            tool: tool_info(updated, borrowed.saturating_sub(released_borrows)),
            released_borrows,
            pruned_borrowers,
        })
    }

    /// Delete a tool and all of its borrow records.
    ///
    /// Borrowers left without records stay in place unless cascade pruning is on.
    pub async fn delete_tool(&self, tool_id: i32) -> Result<ToolRemoval, DomainError> {
        let op = self.activity.begin(OperationKind::DeleteTool);
        let result = self.apply_delete(tool_id).await;
        self.settle(op, result).await
    }

    async fn apply_delete(&self, tool_id: i32) -> Result<ToolRemoval, DomainError> {
        let txn = self.db.begin().await?;

        if tool_repository::find_by_id(&txn, tool_id).await?.is_none() {
            return Err(DomainError::NotFound);
        }

        let released_borrows = borrow_record_repository::delete_by_tool(&txn, tool_id).await?;
        let pruned_borrowers = if self.prune_orphans_on_cascade {
            prune_orphans(&txn).await?
        } else {
            0
        };
        tool_repository::delete(&txn, tool_id).await?;

        txn.commit().await?;

        tracing::info!(tool_id, released_borrows, pruned_borrowers, "Tool deleted");

        Ok(ToolRemoval {
            tool_id,
            released_borrows,
            pruned_borrowers,
        })
    }

    /// Delete every borrower that holds no borrow record
    pub async fn prune_orphan_borrowers(&self) -> Result<u64, DomainError> {
        let op = self.activity.begin(OperationKind::PruneBorrowers);
        let result: Result<u64, DomainError> = async {
            let txn = self.db.begin().await?;
            let pruned = prune_orphans(&txn).await?;
            txn.commit().await?;
            Ok(pruned)
        }
        .await;
        self.settle(op, result).await
    }

    /// Remove records pointing at missing tools or borrowers, then prune
    /// borrowers left without records.
    pub async fn reconcile(&self) -> Result<ReconcileReport, DomainError> {
        let op = self.activity.begin(OperationKind::Reconcile);
        let result = self.apply_reconcile().await;
        self.settle(op, result).await
    }

    async fn apply_reconcile(&self) -> Result<ReconcileReport, DomainError> {
        let txn = self.db.begin().await?;

        let tool_ids: HashSet<i32> = tool_repository::find_all(&txn)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();
        let borrower_ids: HashSet<i32> = borrower_repository::find_all(&txn)
            .await?
            .into_iter()
            .map(|b| b.id)
            .collect();

        let dangling: Vec<i32> = borrow_record_repository::find_all(&txn)
            .await?
            .into_iter()
            .filter(|r| !tool_ids.contains(&r.tool_id) || !borrower_ids.contains(&r.borrower_id))
            .map(|r| r.id)
            .collect();

        let dangling_records_removed = borrow_record_repository::delete_by_ids(&txn, dangling).await?;
        let borrowers_pruned = prune_orphans(&txn).await?;

        txn.commit().await?;

        if dangling_records_removed > 0 || borrowers_pruned > 0 {
            tracing::warn!(
                dangling_records_removed,
                borrowers_pruned,
                "Reconcile repaired inventory"
            );
        }

        Ok(ReconcileReport {
            dangling_records_removed,
            borrowers_pruned,
        })
    }

    /// Refresh the read model and close the operation, keeping the first error.
    async fn settle<T>(
        &self,
        op: InFlight<'_>,
        result: Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let result = match (result, self.refresh().await) {
            (result, Ok(_)) => result,
            (Ok(_), Err(refresh_err)) => Err(refresh_err),
            (Err(e), Err(refresh_err)) => {
                tracing::warn!("Refresh after failed operation also failed: {}", refresh_err);
                Err(e)
            }
        };

        if let Err(e) = &result {
            tracing::warn!(operation = op.id(), "Inventory operation failed: {}", e);
        }

        op.finish(&result);
        result
    }
}

async fn load_tools<C: ConnectionTrait>(conn: &C) -> Result<Vec<ToolInfo>, DomainError> {
    let tools = tool_repository::find_all(conn).await?;
    let counts = borrow_record_repository::counts_by_tool(conn).await?;

    let mut infos: Vec<ToolInfo> = tools
        .into_iter()
        .map(|tool| {
            let borrowed = counts.get(&tool.id).copied().unwrap_or(0);
            tool_info(tool, borrowed)
        })
        .collect();

    sort_tools(&mut infos);
    Ok(infos)
}

async fn prune_orphans<C: ConnectionTrait>(conn: &C) -> Result<u64, DomainError> {
    borrower_repository::delete_orphans(conn).await
}

fn tool_info(tool: tool::Model, borrowed: u64) -> ToolInfo {
    ToolInfo {
        id: tool.id,
        name: display_name(&tool.name),
        stock: tool.stock,
        borrowed,
    }
}
