//! Record types for the memory database and timestamp encoding
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};

/// One persisted chat turn. `embedding` is always derived from `text`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub text: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub timestamp: DateTime<Utc>,
}

/// Row shape of `recent_messages`: text and timestamp only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentMessage {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A persisted summary of a window of messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub id: i64,
    pub summary_text: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// `(id, text, embedding)` triple fed to similarity search.
#[derive(Debug, Clone)]
pub struct EmbeddedText {
    pub id: i64,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub total_messages: i64,
    pub total_summaries: i64,
    pub embedding_dimension: Option<usize>,
    pub embedding_model: Option<String>,
    pub oldest_message: Option<DateTime<Utc>>,
    pub newest_message: Option<DateTime<Utc>>,
    pub latest_summary_end: Option<DateTime<Utc>>,
    pub database_size_bytes: i64,
}

/// Fixed-width UTC text so that string order matches time order in SQL.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Accepts our own format plus the `CURRENT_TIMESTAMP` style older rows use.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }
    Err(MemoryError::Timestamp {
        value: value.to_string(),
        reason: "unrecognised timestamp format".to_string(),
    })
}
