//! Health & readiness handlers.
//!
//! - GET /healthz  -> liveness ("ok")
//! - GET /readyz   -> readiness of the object index, the metadata table and
//!   the storage directory

use crate::{app_state::AppState, services::StoreResult};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// `GET /healthz`
///
/// Always 200 and never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// The service can only make thumbnails when it can read the object index,
/// reach the configured metadata table and write to the storage directory.
/// Table checks report their row counts. 200 when all pass, 503 otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let (objects, metadata, storage) = tokio::join!(
        state.objects.count_objects(),
        state.records.count_records(),
        state.objects.check_writable(),
    );

    let checks = BTreeMap::from([
        ("objects", CheckStatus::counted("objects", objects)),
        ("metadata", CheckStatus::counted("metadata", metadata)),
        ("storage", CheckStatus::from_result("storage", storage.map(|()| None))),
    ]);
    let ready = checks.values().all(|check| check.ok);

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = ReadyResponse {
        status: if ready { "ok" } else { "error" }.into(),
        checks,
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: BTreeMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl CheckStatus {
    fn counted(name: &str, result: StoreResult<i64>) -> Self {
        Self::from_result(name, result.map(Some))
    }

    fn from_result(name: &str, result: StoreResult<Option<i64>>) -> Self {
        match result {
            Ok(count) => Self {
                ok: true,
                count,
                error: None,
            },
            Err(err) => {
                warn!(check = name, "readiness check failed: {}", err);
                Self {
                    ok: false,
                    count: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}
