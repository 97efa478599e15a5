use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use super::{EntryRepository, ResourceRepository};
use crate::error::KarpError;
use crate::models::entry::id_string;
use crate::models::{Entry, Resource};
use crate::Result;

/// Entry repository kept in memory, in insertion order
pub struct InMemoryEntryRepository {
    resource_id: String,
    referenceable: Vec<String>,
    entries: RwLock<IndexMap<String, Entry>>,
}

impl InMemoryEntryRepository {
    pub fn new(resource_id: impl Into<String>, referenceable: Vec<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            referenceable,
            entries: RwLock::new(IndexMap::new()),
        }
    }

    /// Insert or replace an entry, discarded ones included
    pub fn save(&self, entry: Entry) {
        debug!(
            resource_id = %self.resource_id,
            entry_id = %entry.entry_id,
            version = entry.version,
            "Saving entry"
        );
        self.entries.write().insert(entry.entry_id.clone(), entry);
    }

    pub fn save_all(&self, entries: impl IntoIterator<Item = Entry>) {
        let mut map = self.entries.write();
        for entry in entries {
            map.insert(entry.entry_id.clone(), entry);
        }
    }

    /// Number of stored entries, discarded ones included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl EntryRepository for InMemoryEntryRepository {
    fn get_by_entry_id(&self, entry_id: &str) -> Result<Option<Entry>> {
        Ok(self
            .entries
            .read()
            .get(entry_id)
            .filter(|entry| !entry.discarded)
            .cloned())
    }

    fn find_by_referenceable_fields(&self, filters: &Map<String, Value>) -> Result<Vec<Entry>> {
        if let Some(field) = filters
            .keys()
            .find(|field| !self.referenceable.contains(field))
        {
            return Err(KarpError::NotReferenceable {
                resource_id: self.resource_id.clone(),
                field: field.clone(),
            });
        }

        Ok(self
            .entries
            .read()
            .values()
            .filter(|entry| !entry.discarded)
            .filter(|entry| {
                filters
                    .iter()
                    .all(|(field, wanted)| field_matches(entry, field, wanted))
            })
            .cloned()
            .collect())
    }

    fn all_entries(&self) -> Result<Vec<Entry>> {
        Ok(self
            .entries
            .read()
            .values()
            .filter(|entry| !entry.discarded)
            .cloned()
            .collect())
    }
}

/// Whether any value of the entry's field equals any wanted value
pub(crate) fn field_matches(entry: &Entry, field: &str, wanted: &Value) -> bool {
    let wanted: Vec<&Value> = match wanted {
        Value::Array(values) => values.iter().collect(),
        value => vec![value],
    };
    entry
        .field_values(field)
        .into_iter()
        .any(|value| wanted.iter().any(|w| same_value(value, w)))
}

/// Numbers compare numerically, also against numeric strings, so `1` matches
/// `1.0`, `"1"` and `"1.0"`. Anything else compares by its entry id form.
fn same_value(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) if a.is_number() || b.is_number() => x == y,
        _ => matches!((id_string(a), id_string(b)), (Some(x), Some(y)) if x == y),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Resource versions kept in memory
#[derive(Default)]
pub struct InMemoryResourceRepository {
    resources: RwLock<IndexMap<String, Vec<Arc<Resource>>>>,
}

impl InMemoryResourceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a resource version, replacing one with the same version
    pub fn save(&self, resource: Resource) -> Arc<Resource> {
        let resource = Arc::new(resource);
        let mut resources = self.resources.write();
        let versions = resources.entry(resource.resource_id.clone()).or_default();
        versions.retain(|r| r.version != resource.version);
        versions.push(Arc::clone(&resource));
        versions.sort_by_key(|r| r.version);
        resource
    }
}

impl ResourceRepository for InMemoryResourceRepository {
    fn get_by_resource_id(
        &self,
        resource_id: &str,
        version: Option<u32>,
    ) -> Result<Option<Arc<Resource>>> {
        let resources = self.resources.read();
        let versions = match resources.get(resource_id) {
            Some(versions) => versions,
            None => return Ok(None),
        };
        Ok(match version {
            Some(version) => versions.iter().find(|r| r.version == version).cloned(),
            None => versions.last().cloned(),
        })
    }

    fn resources(&self) -> Result<Vec<Arc<Resource>>> {
        Ok(self
            .resources
            .read()
            .values()
            .filter_map(|versions| versions.last().cloned())
            .collect())
    }
}
