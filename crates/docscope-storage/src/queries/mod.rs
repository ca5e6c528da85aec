//! Query modules: free functions over a borrowed connection.

pub mod entries;
pub mod facts;
pub mod maintenance;
pub mod review;
pub mod scan_state;

use chrono::{DateTime, SecondsFormat, Utc};
use docscope_core::errors::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Fixed-width RFC 3339 so that text comparison in SQL is time order.
pub(crate) fn to_sql_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn from_sql_time(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization {
            entity: "timestamp".to_string(),
            message: format!("{raw}: {e}"),
        })
}

pub(crate) fn to_json<T: Serialize>(entity: &str, value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization {
        entity: entity.to_string(),
        message: e.to_string(),
    })
}

pub(crate) fn from_json<T: DeserializeOwned>(entity: &str, raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(|e| StorageError::Serialization {
        entity: entity.to_string(),
        message: e.to_string(),
    })
}
