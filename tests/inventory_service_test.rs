use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use toolshed::db;
use toolshed::domain::{BorrowedTool, DomainError, Rejection};
use toolshed::models::{borrow_record, borrower, tool::ToolDto};
use toolshed::services::{InventoryService, OperationKind, OperationStatus};

// Helper to create a service over a fresh in-memory database
async fn setup_service() -> InventoryService {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    InventoryService::new(db)
}

// Helper to create a tool and return its id
async fn create_tool(service: &InventoryService, name: &str, stock: i32) -> i32 {
    service
        .create_tool(ToolDto {
            name: name.to_string(),
            stock,
        })
        .await
        .expect("Failed to create tool")
        .tool
        .id
}

async fn records_for_tool(db: &DatabaseConnection, tool_id: i32) -> u64 {
    borrow_record::Entity::find()
        .filter(borrow_record::Column::ToolId.eq(tool_id))
        .count(db)
        .await
        .unwrap()
}

async fn borrower_count(db: &DatabaseConnection) -> u64 {
    borrower::Entity::find().count(db).await.unwrap()
}

async fn borrowed_of(service: &InventoryService, tool_id: i32) -> u64 {
    service
        .find_tool(tool_id)
        .await
        .unwrap()
        .expect("tool exists")
        .borrowed
}

#[tokio::test]
async fn test_list_tools_puts_available_first_then_sorts_by_name() {
    let service = setup_service().await;
    let wrench = create_tool(&service, "wrench", 2).await;
    let anvil = create_tool(&service, "Anvil", 1).await;
    create_tool(&service, "drill", 3).await;
    create_tool(&service, "brush", 0).await;

    service.borrow_tool(anvil, "ana", 1).await.unwrap();
    service.borrow_tool(wrench, "ben", 1).await.unwrap();

    let tools = service.list_tools().await.unwrap();
    let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();

    // Brush has no stock and Anvil is fully lent, so both trail
    assert_eq!(names, vec!["Drill", "Wrench", "Anvil", "Brush"]);

    let split = tools.iter().position(|t| !t.has_available()).unwrap();
    assert!(tools[..split].iter().all(|t| t.stock as u64 > t.borrowed));
    assert!(tools[split..].iter().all(|t| t.stock as u64 <= t.borrowed));
}

#[tokio::test]
async fn test_names_are_stored_lowercase_and_displayed_capitalized() {
    let service = setup_service().await;
    let id = create_tool(&service, "  CORDLESS Drill ", 2).await;

    let stored = toolshed::models::Tool::find_by_id(id)
        .one(service.db())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.name, "cordless drill");

    let listed = service.list_tools().await.unwrap();
    assert_eq!(listed[0].name, "Cordless drill");
}

#[tokio::test]
async fn test_borrow_creates_one_borrower_and_one_row_per_unit() {
    let service = setup_service().await;
    let tool_id = create_tool(&service, "ladder", 5).await;

    let receipt = service.borrow_tool(tool_id, "Ana", 2).await.unwrap();
    assert!(receipt.borrower_created);
    assert_eq!(receipt.borrower_name, "ana");

    assert_eq!(borrowed_of(&service, tool_id).await, 2);
    assert_eq!(records_for_tool(service.db(), tool_id).await, 2);

    let borrowers = borrower::Entity::find().all(service.db()).await.unwrap();
    assert_eq!(borrowers.len(), 1);
    assert_eq!(borrowers[0].name, "ana");
    assert_eq!(borrowers[0].id, receipt.borrower_id);
}

#[tokio::test]
async fn test_borrowing_twice_reuses_the_borrower() {
    let service = setup_service().await;
    let saw = create_tool(&service, "saw", 3).await;
    let drill = create_tool(&service, "drill", 3).await;

    let first = service.borrow_tool(saw, "Ana", 1).await.unwrap();
    let second = service.borrow_tool(drill, "  ANA ", 2).await.unwrap();

    assert_eq!(first.borrower_id, second.borrower_id);
    assert!(!second.borrower_created);
    assert_eq!(borrower_count(service.db()).await, 1);
}

#[tokio::test]
async fn test_returning_every_unit_removes_the_borrower() {
    let service = setup_service().await;
    let tool_id = create_tool(&service, "clamp", 4).await;
    let borrow = service.borrow_tool(tool_id, "carla", 2).await.unwrap();

    let receipt = service
        .return_tool(tool_id, borrow.borrower_id, 2)
        .await
        .unwrap();

    assert_eq!(receipt.returned, 2);
    assert!(receipt.borrower_pruned);
    assert_eq!(records_for_tool(service.db(), tool_id).await, 0);
    assert_eq!(borrower_count(service.db()).await, 0);
}

#[tokio::test]
async fn test_partial_return_keeps_the_borrower() {
    let service = setup_service().await;
    let tool_id = create_tool(&service, "clamp", 4).await;
    let borrow = service.borrow_tool(tool_id, "carla", 2).await.unwrap();

    let receipt = service
        .return_tool(tool_id, borrow.borrower_id, 1)
        .await
        .unwrap();

    assert_eq!(receipt.returned, 1);
    assert!(!receipt.borrower_pruned);
    assert_eq!(records_for_tool(service.db(), tool_id).await, 1);
    assert_eq!(borrower_count(service.db()).await, 1);
}

#[tokio::test]
async fn test_return_keeps_borrower_who_still_holds_another_tool() {
    let service = setup_service().await;
    let saw = create_tool(&service, "saw", 2).await;
    let drill = create_tool(&service, "drill", 2).await;
    let borrow = service.borrow_tool(saw, "dan", 1).await.unwrap();
    service.borrow_tool(drill, "dan", 1).await.unwrap();

    let receipt = service.return_tool(saw, borrow.borrower_id, 1).await.unwrap();

    assert!(!receipt.borrower_pruned);
    assert_eq!(borrower_count(service.db()).await, 1);
    assert_eq!(borrowed_of(&service, drill).await, 1);
}

#[tokio::test]
async fn test_update_below_borrowed_releases_every_borrow() {
    let service = setup_service().await;
    let tool_id = create_tool(&service, "drill", 5).await;
    service.borrow_tool(tool_id, "ana", 2).await.unwrap();
    service.borrow_tool(tool_id, "ben", 1).await.unwrap();
    assert_eq!(borrowed_of(&service, tool_id).await, 3);

    let change = service
        .update_tool(
            tool_id,
            ToolDto {
                name: "drill".to_string(),
                stock: 1,
            },
        )
        .await
        .unwrap();

    assert_eq!(change.released_borrows, 3);
    assert_eq!(change.tool.stock, 1);
    assert_eq!(change.tool.borrowed, 0);
    assert_eq!(records_for_tool(service.db(), tool_id).await, 0);
    assert_eq!(borrowed_of(&service, tool_id).await, 0);
    // Cascade pruning is off by default
    assert_eq!(borrower_count(service.db()).await, 2);
}

#[tokio::test]
async fn test_update_at_borrowed_count_keeps_borrows() {
    let service = setup_service().await;
    let tool_id = create_tool(&service, "drill", 5).await;
    service.borrow_tool(tool_id, "ana", 3).await.unwrap();

    let change = service
        .update_tool(
            tool_id,
            ToolDto {
                name: "Power Drill".to_string(),
                stock: 3,
            },
        )
        .await
        .unwrap();

    assert_eq!(change.released_borrows, 0);
    assert_eq!(change.tool.name, "Power drill");
    assert_eq!(change.tool.borrowed, 3);
    assert_eq!(records_for_tool(service.db(), tool_id).await, 3);
}

#[tokio::test]
async fn test_delete_tool_removes_records_but_leaves_borrower() {
    let service = setup_service().await;
    let tool_id = create_tool(&service, "wheelbarrow", 2).await;
    let borrow = service.borrow_tool(tool_id, "eva", 2).await.unwrap();

    let removal = service.delete_tool(tool_id).await.unwrap();

    assert_eq!(removal.released_borrows, 2);
    assert_eq!(removal.pruned_borrowers, 0);
    assert_eq!(records_for_tool(service.db(), tool_id).await, 0);
    assert!(service.find_tool(tool_id).await.unwrap().is_none());

    let leftover = borrower::Entity::find_by_id(borrow.borrower_id)
        .one(service.db())
        .await
        .unwrap();
    assert!(leftover.is_some(), "delete_tool must not prune borrowers");
}

#[tokio::test]
async fn test_delete_tool_prunes_borrowers_when_enabled() {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    let service = InventoryService::new(db).with_orphan_pruning_on_cascade(true);
    let saw = create_tool(&service, "saw", 2).await;
    let drill = create_tool(&service, "drill", 2).await;
    service.borrow_tool(saw, "eva", 1).await.unwrap();
    service.borrow_tool(saw, "fay", 1).await.unwrap();
    service.borrow_tool(drill, "fay", 1).await.unwrap();

    let removal = service.delete_tool(saw).await.unwrap();

    assert_eq!(removal.released_borrows, 2);
    assert_eq!(removal.pruned_borrowers, 1);
    let remaining = borrower::Entity::find().all(service.db()).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "fay");
}

#[tokio::test]
async fn test_delete_missing_tool_is_not_found() {
    let service = setup_service().await;
    let err = service.delete_tool(404).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound));
}

#[tokio::test]
async fn test_list_tools_is_idempotent() {
    let service = setup_service().await;
    let hammer = create_tool(&service, "hammer", 3).await;
    create_tool(&service, "level", 1).await;
    service.borrow_tool(hammer, "gus", 1).await.unwrap();

    let first = service.list_tools().await.unwrap();
    let second = service.list_tools().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_borrowed_tools_are_projected_from_the_list() {
    let service = setup_service().await;
    let hammer = create_tool(&service, "hammer", 3).await;
    create_tool(&service, "level", 1).await;
    service.borrow_tool(hammer, "gus", 2).await.unwrap();

    let borrowed = service.list_borrowed_tools().await.unwrap();
    assert_eq!(
        borrowed,
        vec![BorrowedTool {
            id: hammer,
            name: "Hammer".to_string(),
            borrowed: 2,
        }]
    );
}

#[tokio::test]
async fn test_borrowers_for_tool_are_counted_and_ordered_by_id() {
    let service = setup_service().await;
    let tool_id = create_tool(&service, "ladder", 6).await;
    let other = create_tool(&service, "rake", 2).await;

    let zoe = service.borrow_tool(tool_id, "zoe", 1).await.unwrap();
    let adam = service.borrow_tool(tool_id, "adam", 2).await.unwrap();
    service.borrow_tool(tool_id, "zoe", 2).await.unwrap();
    service.borrow_tool(other, "adam", 1).await.unwrap();

    let borrowers = service.list_borrowers_for_tool(tool_id).await.unwrap();

    assert_eq!(borrowers.len(), 2);
    assert_eq!(borrowers[0].id, zoe.borrower_id);
    assert_eq!(borrowers[0].name, "zoe");
    assert_eq!(borrowers[0].borrow_count, 3);
    assert_eq!(borrowers[1].id, adam.borrower_id);
    assert_eq!(borrowers[1].borrow_count, 2);
}

#[tokio::test]
async fn test_borrowers_for_unborrowed_tool_is_empty() {
    let service = setup_service().await;
    let tool_id = create_tool(&service, "ladder", 1).await;
    assert!(
        service
            .list_borrowers_for_tool(tool_id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_borrow_rejections_write_nothing() {
    let service = setup_service().await;
    let tool_id = create_tool(&service, "saw", 2).await;
    service.borrow_tool(tool_id, "ana", 1).await.unwrap();

    let err = service.borrow_tool(tool_id, "ben", 2).await.unwrap_err();
    assert!(matches!(
        err,
        DomainError::Rejected(Rejection::ExceedsAvailable {
            requested: 2,
            available: 1
        })
    ));

    let err = service.borrow_tool(tool_id, "ben", 0).await.unwrap_err();
    assert!(matches!(err, DomainError::Rejected(Rejection::ZeroQuantity)));

    let err = service.borrow_tool(tool_id, "   ", 1).await.unwrap_err();
    assert!(matches!(err, DomainError::Rejected(Rejection::EmptyName)));

    let err = service.borrow_tool(999, "ben", 1).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound));

    // Only ana's unit, and no borrower created for ben
    assert_eq!(records_for_tool(service.db(), tool_id).await, 1);
    assert_eq!(borrower_count(service.db()).await, 1);
}

#[tokio::test]
async fn test_return_more_than_held_is_rejected() {
    let service = setup_service().await;
    let tool_id = create_tool(&service, "saw", 3).await;
    let borrow = service.borrow_tool(tool_id, "ana", 2).await.unwrap();

    let err = service
        .return_tool(tool_id, borrow.borrower_id, 3)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DomainError::Rejected(Rejection::ExceedsBorrowed {
            requested: 3,
            borrowed: 2
        })
    ));
    assert_eq!(records_for_tool(service.db(), tool_id).await, 2);
}

#[tokio::test]
async fn test_duplicate_names_are_rejected_case_insensitively() {
    let service = setup_service().await;
    create_tool(&service, "Hammer", 1).await;
    let saw = create_tool(&service, "saw", 1).await;

    let err = service
        .create_tool(ToolDto {
            name: " HAMMER".to_string(),
            stock: 3,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DomainError::Rejected(Rejection::DuplicateName(ref name)) if name == "Hammer"
    ));

    let err = service
        .update_tool(
            saw,
            ToolDto {
                name: "hammer".to_string(),
                stock: 1,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DomainError::Rejected(Rejection::DuplicateName(_))
    ));

    // Re-saving a tool under its own name is fine
    service
        .update_tool(
            saw,
            ToolDto {
                name: "SAW".to_string(),
                stock: 4,
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_negative_stock_is_rejected() {
    let service = setup_service().await;
    let err = service
        .create_tool(ToolDto {
            name: "rake".to_string(),
            stock: -1,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DomainError::Rejected(Rejection::NegativeStock(-1))
    ));
    assert!(service.list_tools().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_find_tool_by_name_skips_excluded_id() {
    let service = setup_service().await;
    let id = create_tool(&service, "spirit level", 2).await;

    let found = service
        .find_tool_by_name("Spirit Level", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, id);

    assert!(
        service
            .find_tool_by_name("spirit level", Some(id))
            .await
            .unwrap()
            .is_none()
    );
    assert!(service.find_tool_by_name("  ", None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_has_active_borrows() {
    let service = setup_service().await;
    let id = create_tool(&service, "ladder", 1).await;
    assert!(!service.has_active_borrows(id).await.unwrap());

    service.borrow_tool(id, "hal", 1).await.unwrap();
    assert!(service.has_active_borrows(id).await.unwrap());
}

#[tokio::test]
async fn test_reconcile_removes_dangling_records_and_orphans() {
    let service = setup_service().await;
    let tool_id = create_tool(&service, "saw", 2).await;
    let kept = service.borrow_tool(tool_id, "ivy", 1).await.unwrap();

    // Simulate state left behind by an older, non-transactional client
    borrower::ActiveModel {
        name: Set("ghost".to_string()),
        ..Default::default()
    }
    .insert(service.db())
    .await
    .unwrap();
    borrow_record::ActiveModel {
        tool_id: Set(999),
        borrower_id: Set(kept.borrower_id),
        ..Default::default()
    }
    .insert(service.db())
    .await
    .unwrap();

    let report = service.reconcile().await.unwrap();

    assert_eq!(report.dangling_records_removed, 1);
    assert_eq!(report.borrowers_pruned, 1);
    assert_eq!(borrower_count(service.db()).await, 1);
    assert_eq!(records_for_tool(service.db(), tool_id).await, 1);

    // Nothing left to repair
    let again = service.reconcile().await.unwrap();
    assert_eq!(again.dangling_records_removed, 0);
    assert_eq!(again.borrowers_pruned, 0);
}

#[tokio::test]
async fn test_prune_orphan_borrowers() {
    let service = setup_service().await;
    let tool_id = create_tool(&service, "saw", 2).await;
    service.borrow_tool(tool_id, "jo", 1).await.unwrap();
    service.delete_tool(tool_id).await.unwrap();
    assert_eq!(borrower_count(service.db()).await, 1);

    assert_eq!(service.prune_orphan_borrowers().await.unwrap(), 1);
    assert_eq!(borrower_count(service.db()).await, 0);

    // Reported under its own kind, not as a reconcile
    let report = service
        .activity()
        .latest(OperationKind::PruneBorrowers)
        .expect("prune was recorded");
    assert_eq!(report.status, OperationStatus::Succeeded);
    assert!(service.activity().latest(OperationKind::Reconcile).is_none());
}

#[tokio::test]
async fn test_loading_clears_and_snapshot_follows_mutations() {
    let service = setup_service().await;
    let tool_id = create_tool(&service, "hammer", 2).await;
    assert!(!service.is_loading());

    service.borrow_tool(tool_id, "kim", 1).await.unwrap();
    assert!(!service.is_loading());
    let snapshot = service.snapshot().await;
    assert_eq!(snapshot.tools[0].borrowed, 1);
    assert_eq!(snapshot.borrowed_tools.len(), 1);

    let _ = service.borrow_tool(tool_id, "kim", 5).await.unwrap_err();
    assert!(!service.is_loading());

    let report = service
        .activity()
        .latest(OperationKind::Borrow)
        .expect("borrow was recorded");
    assert!(matches!(report.status, OperationStatus::Failed { .. }));
    assert!(report.finished_at.is_some());

    // The failed borrow still refreshed the shared read model
    let refresh = service.activity().latest(OperationKind::Refresh).unwrap();
    assert_eq!(refresh.status, OperationStatus::Succeeded);
}

#[tokio::test]
async fn test_update_below_borrowed_prunes_borrowers_when_enabled() {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    let service = InventoryService::new(db).with_orphan_pruning_on_cascade(true);
    let tool_id = create_tool(&service, "clamp", 3).await;
    let borrow = service.borrow_tool(tool_id, "lea", 2).await.unwrap();

    let change = service
        .update_tool(
            tool_id,
            ToolDto {
                name: "clamp".to_string(),
                stock: 1,
            },
        )
        .await
        .unwrap();

    assert_eq!(change.released_borrows, 2);
    assert_eq!(change.pruned_borrowers, 1);
    assert_eq!(change.tool.borrowed, 0);

    let gone = borrower::Entity::find_by_id(borrow.borrower_id)
        .one(service.db())
        .await
        .unwrap();
    assert!(gone.is_none());
}

#[tokio::test]
async fn test_failed_borrow_leaves_no_new_borrower() {
    let service = setup_service().await;
    let tool_id = create_tool(&service, "sander", 2).await;

    // Make the record insert fail after the borrower row was written
    service
        .db()
        .execute_unprepared(
            "CREATE TRIGGER fail_borrow BEFORE INSERT ON borrower_tool \
             BEGIN SELECT RAISE(ABORT, 'insert refused'); END;",
        )
        .await
        .unwrap();

    let err = service.borrow_tool(tool_id, "newbie", 1).await.unwrap_err();

    assert!(matches!(err, DomainError::Database(_)));
    assert_eq!(borrower_count(service.db()).await, 0);
    assert_eq!(records_for_tool(service.db(), tool_id).await, 0);
    assert!(!service.is_loading());
}

#[tokio::test]
async fn test_large_quantities_borrow_and_return() {
    let service = setup_service().await;
    let tool_id = create_tool(&service, "screw", 40_000).await;

    let borrow = service.borrow_tool(tool_id, "ana", 40_000).await.unwrap();
    assert_eq!(borrow.quantity, 40_000);
    assert_eq!(records_for_tool(service.db(), tool_id).await, 40_000);

    let receipt = service
        .return_tool(tool_id, borrow.borrower_id, 40_000)
        .await
        .unwrap();
    assert_eq!(receipt.returned, 40_000);
    assert!(receipt.borrower_pruned);
    assert_eq!(records_for_tool(service.db(), tool_id).await, 0);
    assert_eq!(borrower_count(service.db()).await, 0);
}

#[tokio::test]
async fn test_overlapping_refreshes_leave_latest_snapshot() {
    let service = setup_service().await;
    let saw = create_tool(&service, "saw", 3).await;
    let drill = create_tool(&service, "drill", 3).await;

    let (a, b, c) = tokio::join!(
        service.borrow_tool(saw, "mo", 1),
        service.borrow_tool(drill, "ned", 2),
        service.refresh(),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    let fresh = service.list_tools().await.unwrap();
    assert_eq!(service.snapshot().await.tools, fresh);
    assert!(!service.is_loading());
}
