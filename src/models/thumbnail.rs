//! The persisted description of one generated thumbnail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Format used for `createdAt` / `updatedAt` (seconds precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Ratio applied to the original object's size to estimate the thumbnail size.
const REDUCED_SIZE_RATIO: f64 = 0.53;

/// A metadata record for a generated thumbnail.
///
/// Every field is a string on the wire and in the table. Records are written
/// once and never updated, so `created_at` and `updated_at` are always equal.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailRecord {
    /// Random UUID assigned at creation.
    pub id: String,

    /// Public location of the thumbnail object.
    pub url: String,

    /// Estimate derived from the original upload's size, e.g. `"0.53 KB"`.
    pub approx_reduced_size: String,

    pub created_at: String,

    pub updated_at: String,
}

impl ThumbnailRecord {
    /// Build a fresh record for a thumbnail generated from an object of
    /// `original_size` bytes.
    pub fn new(url: impl Into<String>, original_size: u64, now: DateTime<Utc>) -> Self {
        let stamp = now.format(TIMESTAMP_FORMAT).to_string();
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.into(),
            approx_reduced_size: approx_reduced_size(original_size),
            created_at: stamp.clone(),
            updated_at: stamp,
        }
    }
}

/// `S * 0.53 / 1000` kilobytes, rendered like a shortest round-trip float repr
/// (always with a fractional part), followed by `" KB"`.
pub fn approx_reduced_size(original_size: u64) -> String {
    let kb = (original_size as f64 * REDUCED_SIZE_RATIO) / 1000.0;
    format!("{} KB", format_float(kb))
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}
