use sea_orm::*;

use crate::models::tool;

const DEMO_TOOLS: &[(&str, i32)] = &[
    ("hammer", 4),
    ("cordless drill", 2),
    ("hand saw", 3),
    ("ladder", 1),
    ("spirit level", 2),
    ("wheelbarrow", 1),
];

/// Insert a handful of tools. Names already present are left alone.
pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    for (name, stock) in DEMO_TOOLS {
        let exists = tool::Entity::find()
            .filter(tool::Column::Name.eq(*name))
            .one(db)
            .await?
            .is_some();

        if exists {
            continue;
        }

        let demo = tool::ActiveModel {
            name: Set((*name).to_owned()),
            stock: Set(*stock),
            ..Default::default()
        };
        demo.insert(db).await?;
    }

    tracing::debug!("Seeded {} demo tools", DEMO_TOOLS.len());
    Ok(())
}
