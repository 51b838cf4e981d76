//! Metadata store seam and its SQLite implementation.
//!
//! The store behaves like a key-value table keyed by record id: single-record
//! put / get / delete plus a paginated full scan. Scans return at most one page
//! of items and, when more remain, the id to resume after.

use super::{StoreError, StoreResult};
use crate::models::thumbnail::ThumbnailRecord;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

/// One page of a full-table scan.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanPage {
    pub items: Vec<ThumbnailRecord>,
    /// Resume token for the next page. `None` once the table is exhausted.
    pub last_evaluated_key: Option<String>,
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn put_record(&self, record: &ThumbnailRecord) -> StoreResult<()>;

    async fn get_record(&self, id: &str) -> StoreResult<Option<ThumbnailRecord>>;

    /// Delete by id. `Ok` is the store's confirmation; the count says how many
    /// records were actually removed (zero for an unknown id).
    async fn delete_record(&self, id: &str) -> StoreResult<u64>;

    /// Read one page, starting strictly after `exclusive_start_key` if given.
    async fn scan(&self, exclusive_start_key: Option<&str>) -> StoreResult<ScanPage>;
}

/// Thumbnail records in a SQLite table whose name comes from configuration.
#[derive(Clone)]
pub struct SqliteMetadataStore {
    db: Arc<SqlitePool>,
    table: String,
    page_size: usize,
}

impl SqliteMetadataStore {
    /// Table names cannot be bound as parameters, so only plain identifiers
    /// are accepted.
    pub fn new(db: Arc<SqlitePool>, table: impl Into<String>, page_size: usize) -> StoreResult<Self> {
        let table = table.into();
        if !is_plain_identifier(&table) {
            return Err(StoreError::InvalidTableName(table));
        }
        Ok(Self {
            db,
            table,
            page_size: page_size.max(1),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the records table if it is missing.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        let sql = format!(
            r#"CREATE TABLE IF NOT EXISTS "{}" (
                id                  TEXT PRIMARY KEY,
                url                 TEXT NOT NULL,
                approx_reduced_size TEXT NOT NULL,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL
            )"#,
            self.table
        );
        sqlx::query(&sql).execute(&*self.db).await?;
        Ok(())
    }

    /// Number of stored records. Fails when the configured table is missing.
    pub async fn count_records(&self) -> StoreResult<i64> {
        let sql = format!(r#"SELECT COUNT(*) FROM "{}""#, self.table);
        let count = sqlx::query_scalar::<_, i64>(&sql).fetch_one(&*self.db).await?;
        Ok(count)
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn put_record(&self, record: &ThumbnailRecord) -> StoreResult<()> {
        let sql = format!(
            r#"INSERT OR REPLACE INTO "{}" (id, url, approx_reduced_size, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)"#,
            self.table
        );
        sqlx::query(&sql)
            .bind(&record.id)
            .bind(&record.url)
            .bind(&record.approx_reduced_size)
            .bind(&record.created_at)
            .bind(&record.updated_at)
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    async fn get_record(&self, id: &str) -> StoreResult<Option<ThumbnailRecord>> {
        let sql = format!(
            r#"SELECT id, url, approx_reduced_size, created_at, updated_at
               FROM "{}" WHERE id = ?"#,
            self.table
        );
        let record = sqlx::query_as::<_, ThumbnailRecord>(&sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await?;
        Ok(record)
    }

    async fn delete_record(&self, id: &str) -> StoreResult<u64> {
        let sql = format!(r#"DELETE FROM "{}" WHERE id = ?"#, self.table);
        let result = sqlx::query(&sql).bind(id).execute(&*self.db).await?;
        Ok(result.rows_affected())
    }

    async fn scan(&self, exclusive_start_key: Option<&str>) -> StoreResult<ScanPage> {
        let fetch_limit = self.page_size + 1;
        let sql = format!(
            r#"SELECT id, url, approx_reduced_size, created_at, updated_at
               FROM "{}" WHERE (? IS NULL OR id > ?)
               ORDER BY id ASC LIMIT ?"#,
            self.table
        );
        let mut items = sqlx::query_as::<_, ThumbnailRecord>(&sql)
            .bind(exclusive_start_key)
            .bind(exclusive_start_key)
            .bind(fetch_limit as i64)
            .fetch_all(&*self.db)
            .await?;

        let mut last_evaluated_key = None;
        if items.len() == fetch_limit {
            items.pop();
            last_evaluated_key = items.last().map(|record| record.id.clone());
        }

        debug!(
            table = %self.table,
            items = items.len(),
            truncated = last_evaluated_key.is_some(),
            "scanned metadata page"
        );

        Ok(ScanPage {
            items,
            last_evaluated_key,
        })
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
