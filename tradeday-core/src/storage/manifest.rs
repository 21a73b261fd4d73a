//! JSON sidecar describing one stored day.
//!
//! The inventory only looks at whether the completed manifest exists. Row
//! count, size and hash are recorded for people and tools reading the store;
//! nothing here re-reads or checks them.

use super::{file_name_for, StoreError};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayManifest {
    pub date: NaiveDate,
    pub status: RecordStatus,
    pub file_name: String,
    pub rows: usize,
    pub bytes: usize,
    /// BLAKE3 hex digest of the CSV; empty while pending.
    pub content_hash: String,
    pub written_at: NaiveDateTime,
}

impl DayManifest {
    pub fn pending(prefix: &str, date: NaiveDate) -> Self {
        Self {
            date,
            status: RecordStatus::Pending,
            file_name: file_name_for(prefix, date),
            rows: 0,
            bytes: 0,
            content_hash: String::new(),
            written_at: chrono::Local::now().naive_local(),
        }
    }

    pub fn complete(prefix: &str, date: NaiveDate, csv: &[u8], rows: usize) -> Self {
        Self {
            date,
            status: RecordStatus::Complete,
            file_name: file_name_for(prefix, date),
            rows,
            bytes: csv.len(),
            content_hash: blake3::hash(csv).to_hex().to_string(),
            written_at: chrono::Local::now().naive_local(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| StoreError::Manifest(format!("serialization: {e}")))
    }

}
