//! The thumbnail pipeline: create-on-upload plus get / delete / list over the
//! metadata records.
//!
//! Every operation returns `AppError` on failure and nothing else. Collaborator
//! errors are logged here and replaced by the generic message.

use super::{
    StoreError,
    image_codec::{CodecError, ImageCodec, OUTPUT_CONTENT_TYPE},
    metadata_store::MetadataStore,
    object_store::ObjectStore,
};
use crate::{
    errors::AppError,
    models::{
        event::{ObjectCreated, S3Event},
        thumbnail::ThumbnailRecord,
    },
};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

/// Suffix of every generated thumbnail key. Keys that already end with it are
/// never processed again.
pub const THUMBNAIL_SUFFIX: &str = "_thumbnail.png";

pub const NO_THUMBNAIL_CREATED: &str = "No thumbnail created";

/// What the upload path did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created { url: String },
    Skipped,
}

#[derive(Debug, Error)]
enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Tunables that come from configuration.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub thumbnail_size: u32,
    /// When set, thumbnail URLs are `{base}/{bucket}/{key}` instead of the
    /// virtual-hosted bucket form.
    pub public_base_url: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            thumbnail_size: 128,
            public_base_url: None,
        }
    }
}

#[derive(Clone)]
pub struct ThumbnailPipeline {
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn MetadataStore>,
    codec: ImageCodec,
    public_base_url: Option<String>,
}

impl ThumbnailPipeline {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn MetadataStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            objects,
            records,
            codec: ImageCodec::new(settings.thumbnail_size),
            public_base_url: settings
                .public_base_url
                .map(|base| base.trim_end_matches('/').to_string()),
        }
    }

    /// Handle a raw object-created notification payload.
    pub async fn create_thumbnail(&self, payload: &[u8]) -> Result<CreateOutcome, AppError> {
        debug!("EVENT: {}", String::from_utf8_lossy(payload));

        let upload = S3Event::parse(payload)
            .map_err(|err| {
                error!("Error parsing event: {}", err);
                AppError::bad_request()
            })?
            .first_object()
            .ok_or_else(|| {
                error!("Error parsing event: no records");
                AppError::bad_request()
            })?;

        self.process_upload(upload).await
    }

    /// Generate, store and record a thumbnail for one uploaded object, unless
    /// the object is itself a thumbnail.
    #[instrument(skip(self), fields(bucket = %upload.bucket, key = %upload.key))]
    pub async fn process_upload(&self, upload: ObjectCreated) -> Result<CreateOutcome, AppError> {
        if upload.key.ends_with(THUMBNAIL_SUFFIX) {
            info!("object is already a thumbnail, skipping");
            return Ok(CreateOutcome::Skipped);
        }

        match self.generate(&upload).await {
            Ok(url) => {
                info!(%url, "thumbnail created");
                Ok(CreateOutcome::Created { url })
            }
            Err(err) => {
                error!("Error processing image: {}", err);
                Err(AppError::internal())
            }
        }
    }

    async fn generate(&self, upload: &ObjectCreated) -> Result<String, PipelineError> {
        let original = self.objects.get_object(&upload.bucket, &upload.key).await?;
        let thumbnail = self.codec.thumbnail_async(original).await?;

        let thumbnail_key = derive_thumbnail_key(&upload.key);
        self.objects
            .put_object(
                &upload.bucket,
                &thumbnail_key,
                Bytes::from(thumbnail),
                OUTPUT_CONTENT_TYPE,
            )
            .await?;

        let url = self.public_url(&upload.bucket, &thumbnail_key);
        let record = ThumbnailRecord::new(url.clone(), upload.size, Utc::now());
        self.records.put_record(&record).await?;
        debug!(id = %record.id, size = %record.approx_reduced_size, "recorded thumbnail");

        Ok(url)
    }

    /// Look a record up by id. A missing record is `Ok(None)`, not an error.
    pub async fn get_thumbnail(&self, id: &str) -> Result<Option<ThumbnailRecord>, AppError> {
        self.records.get_record(id).await.map_err(|err| {
            error!(id, "Error reading thumbnail record: {}", err);
            AppError::internal()
        })
    }

    /// Delete a record by id. Any confirmation from the store counts as
    /// success, including for ids that were never there.
    pub async fn delete_thumbnail(&self, id: &str) -> Result<(), AppError> {
        if id.trim().is_empty() {
            error!("Error parsing event: missing id");
            return Err(AppError::bad_request());
        }

        match self.records.delete_record(id).await {
            Ok(removed) => {
                info!(id, removed, "thumbnail record deleted");
                Ok(())
            }
            Err(err) => {
                error!(id, "Error deleting thumbnail record: {}", err);
                Err(AppError::internal())
            }
        }
    }

    /// Every record, following scan pages until the store reports no more.
    pub async fn list_thumbnails(&self) -> Result<Vec<ThumbnailRecord>, AppError> {
        let mut data = Vec::new();
        let mut start_key: Option<String> = None;

        loop {
            let page = self
                .records
                .scan(start_key.as_deref())
                .await
                .map_err(|err| {
                    error!("Error scanning thumbnail records: {}", err);
                    AppError::internal()
                })?;
            data.extend(page.items);

            match page.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }

        Ok(data)
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}/{}", base, bucket, key),
            None => format!("https://{}.s3.amazonaws.com/{}", bucket, key),
        }
    }
}

/// Replace everything from the last `.` with the thumbnail suffix, or append
/// the suffix when the key has no `.`.
pub fn derive_thumbnail_key(key: &str) -> String {
    let stem = key.rsplit_once('.').map_or(key, |(stem, _)| stem);
    format!("{}{}", stem, THUMBNAIL_SUFFIX)
}
