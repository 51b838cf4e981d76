//! src/services/object_store.rs
//!
//! Object store seam used by the pipeline, plus `DiskObjectStore`: object
//! payloads on local disk sharded beneath `base_path/{bucket}/{shard}/{shard}/{key}`
//! and per-object metadata in SQLite. Every successful write is announced on an
//! optional notification channel, which is what drives the upload path.

use super::{StoreError, StoreResult};
use crate::models::{event::ObjectCreated, object::StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut, stream};
use md5::Context;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    sync::mpsc::{Sender, error::TrySendError},
};
use tracing::{debug, warn};
use uuid::Uuid;

/// Fetch and write whole objects by bucket + key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read the full body of an object.
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes>;

    /// Write (or overwrite) an object with the given content type.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> StoreResult<()>;
}

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

const OBJECTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS objects (
    id            BLOB PRIMARY KEY,
    bucket        TEXT NOT NULL,
    key           TEXT NOT NULL,
    content_type  TEXT NOT NULL,
    size_bytes    INTEGER NOT NULL,
    etag          TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    UNIQUE (bucket, key)
)
"#;

/// Local object store. Buckets are implicit: the first write creates one.
#[derive(Clone)]
pub struct DiskObjectStore {
    /// Shared SQLite connection pool used for object metadata.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    notifier: Option<Sender<ObjectCreated>>,
}

impl DiskObjectStore {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
            notifier: None,
        }
    }

    /// Announce every successful write on `tx`.
    pub fn with_notifier(mut self, tx: Sender<ObjectCreated>) -> Self {
        self.notifier = Some(tx);
        self
    }

    /// Create the `objects` table if it is missing.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(OBJECTS_SCHEMA).execute(&*self.db).await?;
        Ok(())
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    fn ensure_key_safe(&self, key: &str) -> StoreResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(StoreError::InvalidObjectKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(StoreError::InvalidObjectKey);
        }
        if key.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
            return Err(StoreError::InvalidObjectKey);
        }
        Ok(())
    }

    /// Validate bucket name format.
    ///
    /// S3-like naming rules:
    /// - 3–63 characters
    /// - lowercase letters, digits, dots, hyphens only
    /// - cannot start/end with dot or hyphen
    /// - cannot contain consecutive dots or dot-hyphen patterns
    /// - cannot look like an IPv4 address
    fn ensure_bucket_name_safe(&self, name: &str) -> StoreResult<()> {
        let invalid = |reason: &str| StoreError::InvalidBucketName {
            name: name.to_string(),
            reason: reason.into(),
        };

        let len = name.len();
        if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
            return Err(invalid("must be between 3 and 63 characters"));
        }

        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return Err(invalid(
                "allowed characters are lowercase letters, digits, dots, and hyphens",
            ));
        }

        if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
            return Err(invalid("must start and end with a lowercase letter or digit"));
        }

        if name.contains("..") || name.contains("-.") || name.contains(".-") {
            return Err(invalid(
                "cannot contain consecutive dots or dot-hyphen combinations",
            ));
        }

        if is_ipv4_like(name) {
            return Err(invalid("must not be formatted like an IP address"));
        }

        Ok(())
    }

    /// Two-level shard identifiers: first two bytes of MD5(bucket/key) as hex.
    fn object_shards(bucket: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// `base_path/bucket/{shard}/{shard}/{key}`. Parent directories may not exist yet.
    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket, key);
        let mut path = self.base_path.clone();
        path.push(bucket);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn fetch_object(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
        sqlx::query_as::<_, StoredObject>(
            "SELECT id, bucket, key, content_type, size_bytes, etag, last_modified
             FROM objects WHERE bucket = ? AND key = ?",
        )
        .bind(bucket)
        .bind(key)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            other => StoreError::Sqlx(other),
        })
    }

    /// Stream-upload an object to disk and record its metadata.
    ///
    /// Bytes go to a temporary file while size and MD5 are computed, then the
    /// file is fsynced and renamed into place. The metadata row is upserted, so
    /// writing an existing key overwrites it.
    pub async fn upload_object_stream<S>(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        stream: S,
    ) -> StoreResult<StoredObject>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        self.ensure_bucket_name_safe(bucket)?;
        self.ensure_key_safe(key)?;

        let file_path = self.object_path(bucket, key);
        let parent = file_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| io::Error::other("object path missing parent directory"))?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StoreError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }

        let etag = format!("{:x}", digest.compute());

        let object = sqlx::query_as::<_, StoredObject>(
            r#"
            INSERT INTO objects (id, bucket, key, content_type, size_bytes, etag, last_modified)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(bucket, key) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                last_modified = excluded.last_modified
            RETURNING id, bucket, key, content_type, size_bytes, etag, last_modified
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(bucket)
        .bind(key)
        .bind(content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await
        .map_err(StoreError::Sqlx)?;

        debug!(bucket, key, size_bytes, "stored object {}", file_path.display());
        self.notify(&object);

        Ok(object)
    }

    /// Metadata plus an open file handle ready for streaming out.
    pub async fn get_object_reader(
        &self,
        bucket: &str,
        key: &str,
    ) -> StoreResult<(StoredObject, File)> {
        self.ensure_bucket_name_safe(bucket)?;
        self.ensure_key_safe(key)?;
        let object = self.fetch_object(bucket, key).await?;

        let file = File::open(self.object_path(bucket, key))
            .await
            .map_err(|err| self.not_found_or_io(err, bucket, key))?;

        Ok((object, file))
    }

    fn notify(&self, object: &StoredObject) {
        let Some(tx) = &self.notifier else {
            return;
        };
        let created = ObjectCreated {
            bucket: object.bucket.clone(),
            key: object.key.clone(),
            size: object.size_bytes.max(0) as u64,
        };
        // Never block a write on the listener.
        match tx.try_send(created) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(
                bucket = %object.bucket,
                key = %object.key,
                "object-created notification dropped: channel full"
            ),
            Err(TrySendError::Closed(_)) => warn!(
                bucket = %object.bucket,
                key = %object.key,
                "object-created notification dropped: no listener"
            ),
        }
    }

    /// Number of indexed objects.
    pub async fn count_objects(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM objects")
            .fetch_one(&*self.db)
            .await?;
        Ok(count)
    }

    /// Write, read back and remove a scratch file under `base_path`.
    pub async fn check_writable(&self) -> StoreResult<()> {
        let scratch = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&scratch, b"readyz").await?;
        let read = fs::read(&scratch).await;
        if let Err(err) = fs::remove_file(&scratch).await {
            warn!("could not remove {}: {}", scratch.display(), err);
        }
        if read? != b"readyz" {
            return Err(StoreError::Io(io::Error::other("scratch file content mismatch")));
        }
        Ok(())
    }

    fn not_found_or_io(&self, err: io::Error, bucket: &str, key: &str) -> StoreError {
        if err.kind() == ErrorKind::NotFound {
            StoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }
        } else {
            StoreError::Io(err)
        }
    }
}

#[async_trait]
impl ObjectStore for DiskObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        self.ensure_bucket_name_safe(bucket)?;
        self.ensure_key_safe(key)?;
        self.fetch_object(bucket, key).await?;

        let data = fs::read(self.object_path(bucket, key))
            .await
            .map_err(|err| self.not_found_or_io(err, bucket, key))?;
        Ok(Bytes::from(data))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> StoreResult<()> {
        let body = stream::iter([Ok::<_, io::Error>(body)]);
        self.upload_object_stream(bucket, key, content_type, body)
            .await
            .map(|_| ())
    }
}

/// Check if a string matches IPv4-like dotted decimal form, e.g. `1.2.3.4`.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
