//! Defines routes for the thumbnail operations and the local object store.
//!
//! ## Structure
//! - **Thumbnail operations**
//!   - `POST   /events/object-created` — create a thumbnail from a storage event
//!   - `GET    /thumbnails`            — list every metadata record
//!   - `GET    /thumbnails/{id}`       — fetch one record (`{}` when missing)
//!   - `DELETE /thumbnails/{id}`       — delete one record
//!
//! - **Object store**
//!   - `PUT    /objects/{bucket}/{*key}` — upload object (emits a notification)
//!   - `GET    /objects/{bucket}/{*key}` — download object
//!
//! The wildcard `*key` allows nested keys like `photos/2025/img.jpg`.

use crate::{
    app_state::AppState,
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{get_object, upload_object},
        thumbnail_handlers::{
            create_thumbnail, delete_thumbnail, get_thumbnail, list_thumbnails,
        },
    },
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Build the router. Handlers share `AppState`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/events/object-created", post(create_thumbnail))
        .route("/thumbnails", get(list_thumbnails))
        .route(
            "/thumbnails/{id}",
            get(get_thumbnail).delete(delete_thumbnail),
        )
        .route("/objects/{bucket}/{*key}", put(upload_object).get(get_object))
}
