use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entry::Entry;

pub const ENTRY_VERSION_KEY: &str = "_entry_version";
pub const LAST_MODIFIED_KEY: &str = "_last_modified";
pub const LAST_MODIFIED_BY_KEY: &str = "_last_modified_by";

/// Index document under construction for one entry
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub version: Option<u32>,
    pub last_modified: Option<DateTime<Utc>>,
    pub last_modified_by: Option<String>,
    pub entry: Map<String, Value>,
}

impl IndexEntry {
    /// Create an empty index entry
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Create an empty index entry carrying the metadata of `entry`
    pub fn for_entry(entry: &Entry) -> Self {
        Self {
            id: entry.entry_id.clone(),
            version: Some(entry.version),
            last_modified: Some(entry.last_modified),
            last_modified_by: Some(entry.last_modified_by.clone()),
            entry: Map::new(),
        }
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.entry.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entry.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.entry.contains_key(field)
    }

    /// Document sent to the index: the fields plus metadata keys
    pub fn to_document(&self) -> Map<String, Value> {
        let mut document = self.entry.clone();
        if let Some(version) = self.version {
            document.insert(ENTRY_VERSION_KEY.into(), Value::from(version));
        }
        if let Some(last_modified) = self.last_modified {
            document.insert(
                LAST_MODIFIED_KEY.into(),
                Value::from(timestamp_seconds(&last_modified)),
            );
        }
        if let Some(user) = &self.last_modified_by {
            document.insert(LAST_MODIFIED_BY_KEY.into(), Value::from(user.clone()));
        }
        document
    }

    /// Split a stored document back into fields and metadata
    pub fn from_document(id: impl Into<String>, mut document: Map<String, Value>) -> Self {
        let version = document
            .remove(ENTRY_VERSION_KEY)
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok());
        let last_modified = document
            .remove(LAST_MODIFIED_KEY)
            .and_then(|v| v.as_f64())
            .and_then(from_timestamp_seconds);
        let last_modified_by = document
            .remove(LAST_MODIFIED_BY_KEY)
            .and_then(|v| v.as_str().map(str::to_string));
        Self {
            id: id.into(),
            version,
            last_modified,
            last_modified_by,
            entry: document,
        }
    }
}

/// Unix time in fractional seconds
pub fn timestamp_seconds(time: &DateTime<Utc>) -> f64 {
    time.timestamp() as f64 + f64::from(time.timestamp_subsec_micros()) / 1_000_000.0
}

fn from_timestamp_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    let whole = seconds.floor();
    let micros = ((seconds - whole) * 1_000_000.0).round() as u32;
    Utc.timestamp_opt(whole as i64, micros * 1_000).single()
}
