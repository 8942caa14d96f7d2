pub mod goal;
pub mod invite;
pub mod notification;
pub mod portfolio;
pub mod project;
pub mod task;
pub mod user;
pub mod workspace;

use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Uuid columns are stored as canonical hyphenated TEXT; parse explicitly so
/// a malformed row surfaces as an internal error instead of a silent skip.
pub(crate) fn parse_uuid(value: &str, field: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|err| AppError::internal(format!("malformed uuid in column {field}: {err}")))
}

/// Enum-valued TEXT columns round-trip through their serde string form.
pub(crate) fn parse_enum<T: serde::de::DeserializeOwned>(value: &str, field: &str) -> AppResult<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|err| AppError::internal(format!("malformed value in column {field}: {err}")))
}
