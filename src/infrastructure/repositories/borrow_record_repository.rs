//! SeaORM queries over `borrower_tool`, one row per borrowed unit

use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, QueryTrait, Set,
};
use std::collections::HashMap;

use crate::domain::DomainError;
use crate::models::borrow_record::{self, ActiveModel, Column, Entity as BorrowRecordEntity};

/// Rows per statement; keeps bind parameters well under SQLite's limit
pub const BATCH_SIZE: usize = 5000;

pub async fn find_all<C: ConnectionTrait>(
    conn: &C,
) -> Result<Vec<borrow_record::Model>, DomainError> {
    Ok(BorrowRecordEntity::find()
        .order_by_asc(Column::Id)
        .all(conn)
        .await?)
}

pub async fn count_by_tool<C: ConnectionTrait>(conn: &C, tool_id: i32) -> Result<u64, DomainError> {
    Ok(BorrowRecordEntity::find()
        .filter(Column::ToolId.eq(tool_id))
        .count(conn)
        .await?)
}

/// Records held by a borrower across every tool
pub async fn count_by_borrower<C: ConnectionTrait>(
    conn: &C,
    borrower_id: i32,
) -> Result<u64, DomainError> {
    Ok(BorrowRecordEntity::find()
        .filter(Column::BorrowerId.eq(borrower_id))
        .count(conn)
        .await?)
}

pub async fn count_for<C: ConnectionTrait>(
    conn: &C,
    tool_id: i32,
    borrower_id: i32,
) -> Result<u64, DomainError> {
    Ok(BorrowRecordEntity::find()
        .filter(Column::ToolId.eq(tool_id))
        .filter(Column::BorrowerId.eq(borrower_id))
        .count(conn)
        .await?)
}

/// Borrowed units per tool id, in one grouped query. Tools without records are absent.
pub async fn counts_by_tool<C: ConnectionTrait>(
    conn: &C,
) -> Result<HashMap<i32, u64>, DomainError> {
    let rows: Vec<(i32, i64)> = BorrowRecordEntity::find()
        .select_only()
        .column(Column::ToolId)
        .column_as(Column::Id.count(), "borrowed")
        .group_by(Column::ToolId)
        .into_tuple()
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(tool_id, borrowed)| (tool_id, borrowed.max(0) as u64))
        .collect())
}

/// Borrower id of every record for a tool, one entry per unit
pub async fn borrower_ids_for_tool<C: ConnectionTrait>(
    conn: &C,
    tool_id: i32,
) -> Result<Vec<i32>, DomainError> {
    Ok(BorrowRecordEntity::find()
        .select_only()
        .column(Column::BorrowerId)
        .filter(Column::ToolId.eq(tool_id))
        .order_by_asc(Column::Id)
        .into_tuple::<i32>()
        .all(conn)
        .await?)
}

/// Insert `quantity` unit rows for the pair, `BATCH_SIZE` rows per statement
pub async fn insert_units<C: ConnectionTrait>(
    conn: &C,
    tool_id: i32,
    borrower_id: i32,
    quantity: u32,
) -> Result<(), DomainError> {
    let mut remaining = quantity as usize;

    while remaining > 0 {
        let batch = remaining.min(BATCH_SIZE);
        let rows = (0..batch).map(|_| ActiveModel {
            tool_id: Set(tool_id),
            borrower_id: Set(borrower_id),
            ..Default::default()
        });

        BorrowRecordEntity::insert_many(rows).exec(conn).await?;
        remaining -= batch;
    }

    Ok(())
}

/// Delete at most `limit` records for the pair, oldest first.
///
/// Deleting fewer rows than asked for is not an error.
pub async fn delete_units<C: ConnectionTrait>(
    conn: &C,
    tool_id: i32,
    borrower_id: i32,
    limit: u32,
) -> Result<u64, DomainError> {
    if limit == 0 {
        return Ok(0);
    }

    let oldest = BorrowRecordEntity::find()
        .select_only()
        .column(Column::Id)
        .filter(Column::ToolId.eq(tool_id))
        .filter(Column::BorrowerId.eq(borrower_id))
        .order_by_asc(Column::Id)
        .limit(u64::from(limit))
        .into_query();

    let result = BorrowRecordEntity::delete_many()
        .filter(Column::Id.in_subquery(oldest))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

pub async fn delete_by_tool<C: ConnectionTrait>(conn: &C, tool_id: i32) -> Result<u64, DomainError> {
    let result = BorrowRecordEntity::delete_many()
        .filter(Column::ToolId.eq(tool_id))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

pub async fn delete_by_ids<C: ConnectionTrait>(
    conn: &C,
    ids: Vec<i32>,
) -> Result<u64, DomainError> {
    let mut deleted = 0;

    for chunk in ids.chunks(BATCH_SIZE) {
        let result = BorrowRecordEntity::delete_many()
            .filter(Column::Id.is_in(chunk.iter().copied()))
            .exec(conn)
            .await?;
        deleted += result.rows_affected;
    }

    Ok(deleted)
}
