use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::slots::{SlotStore, SqliteSlots};

/// Create the database file and schema. Safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let slots = SqliteSlots::open(config).await?;
    slots.close().await;
    Ok(())
}

pub(crate) async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS slots (
            name TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
