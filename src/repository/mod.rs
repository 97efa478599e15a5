//! Entry and resource storage interfaces
//!
//! The index transform only reads through these traits. The in-memory
//! implementations back tests and embedded use.

mod memory;

pub(crate) use memory::field_matches;
pub use memory::{InMemoryEntryRepository, InMemoryResourceRepository};

use crate::models::{Entry, Resource};
use crate::Result;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Entries of one resource
pub trait EntryRepository: Send + Sync {
    /// Live entry with this id, `None` if missing or discarded
    fn get_by_entry_id(&self, entry_id: &str) -> Result<Option<Entry>>;

    /// Live entries whose fields match every filter
    ///
    /// A filter matches when the entry's field equals the filter value or, for
    /// collection fields, contains it. Filtering on a field that is not referenceable
    /// is an error.
    fn find_by_referenceable_fields(&self, filters: &Map<String, Value>) -> Result<Vec<Entry>>;

    /// Every live entry
    fn all_entries(&self) -> Result<Vec<Entry>>;
}

/// Resource lookup by id and version
pub trait ResourceRepository: Send + Sync {
    /// Resource at `version`, or its latest version when `version` is `None`
    fn get_by_resource_id(
        &self,
        resource_id: &str,
        version: Option<u32>,
    ) -> Result<Option<Arc<Resource>>>;

    /// Latest version of every resource
    fn resources(&self) -> Result<Vec<Arc<Resource>>>;
}
