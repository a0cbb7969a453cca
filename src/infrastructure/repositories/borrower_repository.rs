//! SeaORM queries over the `borrowers` table

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, QueryTrait, Set,
};

use super::borrow_record_repository::BATCH_SIZE;
use crate::domain::DomainError;
use crate::models::borrow_record;
use crate::models::borrower::{self, ActiveModel, Column, Entity as BorrowerEntity};

pub async fn find_all<C: ConnectionTrait>(
    conn: &C,
) -> Result<Vec<borrower::Model>, DomainError> {
    Ok(BorrowerEntity::find()
        .order_by_asc(Column::Id)
        .all(conn)
        .await?)
}

/// Oldest borrower whose stored name matches exactly
pub async fn find_by_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<Option<borrower::Model>, DomainError> {
    Ok(BorrowerEntity::find()
        .filter(Column::Name.eq(name))
        .order_by_asc(Column::Id)
        .one(conn)
        .await?)
}

pub async fn find_by_ids<C: ConnectionTrait>(
    conn: &C,
    ids: Vec<i32>,
) -> Result<Vec<borrower::Model>, DomainError> {
    let mut borrowers = Vec::with_capacity(ids.len());

    for chunk in ids.chunks(BATCH_SIZE) {
        let found = BorrowerEntity::find()
            .filter(Column::Id.is_in(chunk.iter().copied()))
            .all(conn)
            .await?;
        borrowers.extend(found);
    }

    borrowers.sort_by_key(|b| b.id);
    Ok(borrowers)
}

pub async fn create<C: ConnectionTrait>(
    conn: &C,
    name: String,
) -> Result<borrower::Model, DomainError> {
    let new_borrower = ActiveModel {
        name: Set(name),
        ..Default::default()
    };

    Ok(new_borrower.insert(conn).await?)
}

pub async fn delete<C: ConnectionTrait>(conn: &C, id: i32) -> Result<u64, DomainError> {
    let result = BorrowerEntity::delete_by_id(id).exec(conn).await?;
    Ok(result.rows_affected)
}

/// Delete every borrower that holds no `borrower_tool` row
pub async fn delete_orphans<C: ConnectionTrait>(conn: &C) -> Result<u64, DomainError> {
    let holders = borrow_record::Entity::find()
        .select_only()
        .column(borrow_record::Column::BorrowerId)
        .into_query();

    let result = BorrowerEntity::delete_many()
        .filter(Column::Id.not_in_subquery(holders))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}
