//! HTTP handlers for the four thumbnail operations. Each one delegates to
//! `ThumbnailPipeline` and only shapes the response.

use crate::{
    app_state::AppState,
    errors::AppError,
    services::pipeline::{CreateOutcome, NO_THUMBNAIL_CREATED},
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

pub const DELETED: &str = "Thumbnail deleted successfully";

/// `POST /events/object-created` — body is a storage notification event.
pub async fn create_thumbnail(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, AppError> {
    let response = match state.pipeline.create_thumbnail(&body).await? {
        CreateOutcome::Created { url } => Json(json!({ "url": url })).into_response(),
        CreateOutcome::Skipped => Json(NO_THUMBNAIL_CREATED).into_response(),
    };
    Ok(response)
}

/// `GET /thumbnails/{id}` — the record, or `{}` when there is none.
pub async fn get_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let mut response = match state.pipeline.get_thumbnail(&id).await? {
        Some(record) => Json(record).into_response(),
        None => Json(json!({})).into_response(),
    };
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    Ok(response)
}

/// `DELETE /thumbnails/{id}`
pub async fn delete_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.pipeline.delete_thumbnail(&id).await?;
    Ok(Json(DELETED))
}

/// `GET /thumbnails` — every record, in scan order.
pub async fn list_thumbnails(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let records = state.pipeline.list_thumbnails().await?;
    Ok(Json(records))
}
