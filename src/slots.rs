//! Durable named storage slots.
//!
//! The attendee collection lives in a single slot as one JSON document and
//! the selected ranking model in a second slot. [`SlotStore`] abstracts the
//! backend so the profile store can run against SQLite in the binary and
//! against memory in tests.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::config::Config;
use crate::migrate;

/// Slot holding the JSON-serialized attendee collection.
pub const ATTENDEES_SLOT: &str = "attendeesDatabase";
/// Slot holding the selected ranking model identifier.
pub const MODEL_SLOT: &str = "selectedModel";

/// Key/value storage with whole-value reads and writes.
///
/// Writes replace the previous value; there is no versioning, so concurrent
/// writers are last-writer-wins.
#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<String>>;
    async fn put(&self, name: &str, value: &str) -> Result<()>;
    async fn delete(&self, name: &str) -> Result<()>;

    /// Release the backend. Further calls may fail.
    async fn close(&self) {}
}

/// SQLite-backed slots in the `slots` table.
pub struct SqliteSlots {
    pool: SqlitePool,
}

impl SqliteSlots {
    /// Open (creating if missing) the database named in config and make sure
    /// the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let db_path = &config.db.path;
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

        migrate::ensure_schema(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl SlotStore for SqliteSlots {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM slots WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    async fn put(&self, name: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO slots (name, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(value)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM slots WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// In-memory slots for tests.
#[derive(Default)]
pub struct MemorySlots {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(name: &str, value: &str) -> Self {
        let slots = Self::new();
        slots
            .values
            .write()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        slots
    }
}

#[async_trait]
impl SlotStore for MemorySlots {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.values.read().unwrap().get(name).cloned())
    }

    async fn put(&self, name: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.values.write().unwrap().remove(name);
        Ok(())
    }
}
