//! Represents an object (file) held by the local object store.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata for one stored object. The payload bytes live on disk.
#[derive(Clone, FromRow, Debug)]
pub struct StoredObject {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Bucket the object lives in. Buckets are implicit and appear on first write.
    pub bucket: String,

    /// Object key (path-like identifier within the bucket).
    pub key: String,

    pub content_type: String,

    /// Size in bytes.
    pub size_bytes: i64,

    /// Hex MD5 of the payload.
    pub etag: String,

    /// Timestamp of the last write.
    pub last_modified: DateTime<Utc>,
}
