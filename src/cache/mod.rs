//! The local durable cache: a small SQLite key-value table that holds the last dataset this device
//! saved or loaded.
//!
//! It is written through on every save no matter what happens remotely, and it is read only when
//! the remote store cannot be reached.

mod migrations;

use crate::error::Res;
use crate::model::Dataset;
use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use tracing::debug;

/// Key under which the full dataset JSON is stored.
pub const DATASET_KEY: &str = "budget_data";

/// Key under which the RFC 3339 time of the last dataset write is stored.
pub const UPDATED_KEY: &str = "budget_data_updated";

const UPSERT: &str = "INSERT INTO entries (key, value, updated_at) VALUES (?, ?, ?) \
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

#[derive(Debug, Clone)]
pub struct LocalCache {
    pool: SqlitePool,
}

impl LocalCache {
    /// Opens the cache file at `path`, creating it if it does not exist, and brings its schema up
    /// to date.
    pub async fn open(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Unable to open the local cache at {}", path.display()))?;

        let version = migrations::bootstrap(&pool).await?;
        migrations::run(&pool, version, migrations::CURRENT_VERSION).await?;
        debug!("Opened the local cache at {}", path.display());
        Ok(Self { pool })
    }

    pub async fn put(&self, key: &str, value: &str) -> Res<()> {
        sqlx::query(UPSERT)
            .bind(key)
            .bind(value)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Unable to write '{key}' to the local cache"))?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Res<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Unable to read '{key}' from the local cache"))?;
        Ok(row.map(|(value,)| value))
    }

    /// Writes the dataset and its timestamp together, so a reader never sees one without the
    /// other.
    pub async fn store_dataset(&self, dataset: &Dataset) -> Res<()> {
        let json = dataset.to_json()?;
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to begin a local cache transaction")?;
        for (key, value) in [(DATASET_KEY, json.as_str()), (UPDATED_KEY, now.as_str())] {
            sqlx::query(UPSERT)
                .bind(key)
                .bind(value)
                .bind(now.as_str())
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Unable to write '{key}' to the local cache"))?;
        }
        tx.commit()
            .await
            .context("Unable to commit the local cache transaction")?;
        debug!("Wrote {} month(s) to the local cache", dataset.len());
        Ok(())
    }

    /// Returns the cached dataset, or `None` if nothing has ever been cached. A cached document
    /// that cannot be parsed reads as the empty dataset.
    pub async fn load_dataset(&self) -> Res<Option<Dataset>> {
        Ok(self
            .get(DATASET_KEY)
            .await?
            .map(|json| Dataset::from_json_lenient(json.as_bytes(), "the local cache")))
    }

    /// When the cached dataset was last written.
    pub async fn updated_at(&self) -> Res<Option<DateTime<Utc>>> {
        let Some(value) = self.get(UPDATED_KEY).await? else {
            return Ok(None);
        };
        let parsed = DateTime::parse_from_rfc3339(&value)
            .with_context(|| format!("Invalid timestamp '{value}' in the local cache"))?;
        Ok(Some(parsed.with_timezone(&Utc)))
    }
}
