//! SeaORM queries over the `tools` table

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::DomainError;
use crate::models::tool::{self, ActiveModel, Column, Entity as ToolEntity};

pub async fn find_all<C: ConnectionTrait>(conn: &C) -> Result<Vec<tool::Model>, DomainError> {
    Ok(ToolEntity::find()
        .order_by_asc(Column::Id)
        .all(conn)
        .await?)
}

pub async fn find_by_id<C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> Result<Option<tool::Model>, DomainError> {
    Ok(ToolEntity::find_by_id(id).one(conn).await?)
}

/// Exact match on the stored (already normalized) name, optionally skipping one id
pub async fn find_by_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    exclude_id: Option<i32>,
) -> Result<Option<tool::Model>, DomainError> {
    let mut query = ToolEntity::find().filter(Column::Name.eq(name));

    if let Some(id) = exclude_id {
        query = query.filter(Column::Id.ne(id));
    }

    Ok(query.order_by_asc(Column::Id).one(conn).await?)
}

pub async fn create<C: ConnectionTrait>(
    conn: &C,
    name: String,
    stock: i32,
) -> Result<tool::Model, DomainError> {
    let new_tool = ActiveModel {
        name: Set(name),
        stock: Set(stock),
        ..Default::default()
    };

    Ok(new_tool.insert(conn).await?)
}

pub async fn update<C: ConnectionTrait>(
    conn: &C,
    id: i32,
    name: String,
    stock: i32,
) -> Result<tool::Model, DomainError> {
    let existing = ToolEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(DomainError::NotFound)?;

    let mut active: ActiveModel = existing.into();
    active.name = Set(name);
    active.stock = Set(stock);

    Ok(active.update(conn).await?)
}

pub async fn delete<C: ConnectionTrait>(conn: &C, id: i32) -> Result<u64, DomainError> {
    let result = ToolEntity::delete_by_id(id).exec(conn).await?;
    Ok(result.rows_affected)
}
