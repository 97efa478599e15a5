use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::events::DomainEvent;

/// Entry body: the JSON object stored for an entry
pub type EntryBody = Map<String, Value>;

/// One versioned record of a resource
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub entry_id: String,
    pub resource_id: String,
    pub body: EntryBody,
    pub version: u32,
    pub discarded: bool,
    pub last_modified: DateTime<Utc>,
    pub last_modified_by: String,
    pub message: String,
}

impl Entry {
    /// Values of a top-level body field, arrays flattened one level
    pub fn field_values(&self, field: &str) -> Vec<&Value> {
        match self.body.get(field) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => values.iter().filter(|v| !v.is_null()).collect(),
            Some(value) => vec![value],
        }
    }
}

/// Create version 1 of an entry
pub fn create(
    resource_id: impl Into<String>,
    entry_id: impl Into<String>,
    body: EntryBody,
    user: impl Into<String>,
    message: impl Into<String>,
) -> (Entry, DomainEvent) {
    let entry = Entry {
        entry_id: entry_id.into(),
        resource_id: resource_id.into(),
        body,
        version: 1,
        discarded: false,
        last_modified: Utc::now(),
        last_modified_by: user.into(),
        message: message.into(),
    };
    let event = DomainEvent::EntryAdded {
        entry: entry.clone(),
    };
    (entry, event)
}

/// Replace the body, bumping the version
pub fn update(
    entry: &Entry,
    body: EntryBody,
    user: impl Into<String>,
    message: impl Into<String>,
) -> (Entry, DomainEvent) {
    let updated = Entry {
        body,
        version: entry.version + 1,
        last_modified: Utc::now(),
        last_modified_by: user.into(),
        message: message.into(),
        ..entry.clone()
    };
    let event = DomainEvent::EntryUpdated {
        entry: updated.clone(),
    };
    (updated, event)
}

/// Mark an entry as discarded, bumping the version
pub fn discard(
    entry: &Entry,
    user: impl Into<String>,
    message: impl Into<String>,
) -> (Entry, DomainEvent) {
    let discarded = Entry {
        discarded: true,
        version: entry.version + 1,
        last_modified: Utc::now(),
        last_modified_by: user.into(),
        message: message.into(),
        ..entry.clone()
    };
    let event = DomainEvent::EntryDiscarded {
        entry: discarded.clone(),
    };
    (discarded, event)
}

/// Render a JSON scalar as an entry id
///
/// Ids are compared as strings, so the number `3` and the string `"3"` name the same
/// entry.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
