use crate::services::{
    metadata_store::SqliteMetadataStore, object_store::DiskObjectStore, pipeline::ThumbnailPipeline,
};
use std::sync::Arc;

/// Shared handles carried by the router into every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ThumbnailPipeline>,
    pub objects: DiskObjectStore,
    /// Same store the pipeline writes to, kept concrete for readiness checks.
    pub records: Arc<SqliteMetadataStore>,
}
