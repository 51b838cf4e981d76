//! Collaborators (object store, metadata store, image codec), the thumbnail
//! pipeline that orchestrates them, and the notification dispatcher.

use std::io;
use thiserror::Error;

pub mod image_codec;
pub mod metadata_store;
pub mod notifications;
pub mod object_store;
pub mod pipeline;

/// Failures raised by the object and metadata stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error("table name `{0}` is not a plain identifier")]
    InvalidTableName(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
