//! Test fixtures and invariant checks
//!
//! [`TestEnv`] wires in-memory repositories, an in-memory search index and the
//! index and query services together. [`TestEnv::places`] loads two small
//! resources that exercise every kind of field: `municipalities`, and `places`
//! with a `ref` into `municipalities`, a `ref` into itself and a `multi_ref`
//! virtual field.
//!
//! # Quick Start
//!
//! ```
//! use karp::testing::prelude::*;
//!
//! let env = TestEnv::places().unwrap();
//! let ids = env
//!     .search_ids("places", "and||regexp|name|.*bo.*||equals|area|50000||missing|density")
//!     .unwrap();
//! assert_eq!(ids, vec!["4"]);
//!
//! let violations = check_all_invariants(&env, &default_invariants());
//! assert!(violations.is_empty());
//! ```

pub mod invariants;

pub use invariants::{
    check_all_invariants, default_invariants, DocumentsMatchTransform, Invariant,
    LiveEntriesIndexed, SearchCountsDocuments, Violation,
};

use crate::config::KarpConfig;
use crate::error::KarpError;
use crate::index::{IndexService, InMemorySearchIndex};
use crate::models::{entry, resource, Entry, QueryRequest, Resource, SearchResponse};
use crate::plugins::PluginRegistry;
use crate::query::QueryService;
use crate::repository::{InMemoryEntryRepository, InMemoryResourceRepository, ResourceRepository};
use crate::schema::ResourceConfig;
use crate::Result;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// User recorded on every fixture change
pub const TEST_USER: &str = "karp";

/// Config of the `municipalities` fixture resource
pub fn municipalities_config() -> Value {
    json!({
        "resource_id": "municipalities",
        "resource_name": "Kommuner",
        "fields": {
            "code": {"type": "number"},
            "name": {"type": "string"},
            "state": {"type": "string"}
        },
        "referenceable": ["code"],
        "id": "code"
    })
}

pub fn municipalities_entries() -> Vec<Value> {
    vec![
        json!({"code": 1, "name": "Lulea", "state": "Norrbottens lan"}),
        json!({"code": 2, "name": "Pitea", "state": "Norrbottens lan"}),
        json!({"code": 3, "name": "Boden", "state": "Norrbottens lan"}),
    ]
}

/// Config of the `places` fixture resource
pub fn places_config() -> Value {
    json!({
        "resource_id": "places",
        "resource_name": "Platser i Sverige",
        "fields": {
            "name": {"type": "string"},
            "municipality": {
                "type": "number",
                "collection": true,
                "ref": {
                    "resource_id": "municipalities",
                    "resource_version": 1,
                    "field": {
                        "type": "object",
                        "collection": true,
                        "fields": {
                            "code": {"type": "number"},
                            "name": {"type": "string"},
                            "state": {"type": "string"}
                        }
                    }
                }
            },
            "population": {"type": "number"},
            "area": {"type": "number"},
            "density": {"type": "number"},
            "code": {"type": "number"},
            "larger_place": {
                "type": "number",
                "ref": {"field": {"type": "number"}}
            },
            "smaller_places": {
                "type": "number",
                "virtual": true,
                "collection": true,
                "function": {
                    "multi_ref": {
                        "field": "larger_place",
                        "test": {"equals": [{"self": "code"}]},
                        "result": {
                            "type": "object",
                            "fields": {
                                "code": {"type": "number"},
                                "name": {"type": "string"}
                            }
                        }
                    }
                }
            }
        },
        "referenceable": ["larger_place", "municipality", "code"],
        "id": "code"
    })
}

pub fn places_entries() -> Vec<Value> {
    vec![
        json!({"code": 1, "name": "Grund test", "population": 3122, "area": 30000, "density": 5, "municipality": [1], "larger_place": 7}),
        json!({"code": 2, "name": "Grunds", "population": 3122, "area": 30000, "density": 5, "municipality": [1]}),
        json!({"code": 3, "name": "Botten test", "population": 4132, "area": 40000, "density": 3, "municipality": [2, 3], "larger_place": 1}),
        json!({"code": 4, "name": "Hambo", "population": 4132, "area": 50000, "municipality": [2, 3], "larger_place": 3}),
        json!({"code": 5, "name": "Rutvik", "population": 6312, "area": 20000, "density": 6, "municipality": [2, 3]}),
        json!({"code": 6, "name": "Alvik", "population": 6312, "area": 20000, "density": 6, "municipality": [2, 3]}),
        json!({"code": 7, "name": "Bjurvik", "population": 6212, "area": 50000, "municipality": [2, 3], "larger_place": 6}),
        json!({"code": 8, "name": "Bjurvik2", "population": 6212, "area": 50000, "density": 10, "municipality": [2, 3], "larger_place": 6}),
        json!({"code": 9, "name": "Alhamn", "population": 3812, "area": 50000, "density": 9, "municipality": [2, 3], "larger_place": 1}),
    ]
}

/// In-memory Karp setup for tests and benchmarks
pub struct TestEnv {
    pub resources: Arc<InMemoryResourceRepository>,
    pub index: Arc<InMemorySearchIndex>,
    pub service: IndexService,
    pub query: QueryService,
    repositories: IndexMap<String, Arc<InMemoryEntryRepository>>,
}

impl TestEnv {
    /// An empty environment
    pub fn new(config: KarpConfig, plugins: PluginRegistry) -> Self {
        let resources = Arc::new(InMemoryResourceRepository::new());
        let index = Arc::new(InMemorySearchIndex::new(
            &config.search,
            config.index.virtual_prefix.clone(),
        ));
        let service = IndexService::new(
            resources.clone(),
            index.clone(),
            plugins,
            config.index.clone(),
        );
        let query = QueryService::new(index.clone(), config.search);
        Self {
            resources,
            index,
            service,
            query,
            repositories: IndexMap::new(),
        }
    }

    /// `municipalities` and `places`, published and indexed
    pub fn places() -> Result<Self> {
        Self::places_with(KarpConfig::default(), PluginRegistry::new())
    }

    pub fn places_with(config: KarpConfig, plugins: PluginRegistry) -> Result<Self> {
        let mut env = Self::new(config, plugins);
        env.add_resource(
            ResourceConfig::from_json(municipalities_config())?,
            municipalities_entries(),
        )?;
        env.add_resource(ResourceConfig::from_json(places_config())?, places_entries())?;
        env.reindex_all()?;
        Ok(env)
    }

    /// Register version 1 of a resource with its entries, without indexing them
    pub fn add_resource(
        &mut self,
        config: ResourceConfig,
        bodies: impl IntoIterator<Item = Value>,
    ) -> Result<Arc<Resource>> {
        let resource_id = config
            .resource_id
            .clone()
            .ok_or_else(|| KarpError::InvalidConfig("resource config has no resource_id".into()))?;
        let repository = Arc::new(InMemoryEntryRepository::new(
            resource_id.as_str(),
            config.referenceable.clone(),
        ));
        let (published, _) = resource::publish(
            &Resource::new(resource_id.as_str(), 1, config, repository.clone()),
            TEST_USER,
            "publish",
        );

        for body in bodies {
            let body = body_of(body)?;
            let entry_id = entry_id_of(&published, &body)?;
            let (entry, _) = entry::create(resource_id.as_str(), entry_id, body, TEST_USER, "add");
            repository.save(entry);
        }

        self.repositories.insert(resource_id, repository);
        Ok(self.resources.save(published))
    }

    /// Rebuild the index of every resource
    pub fn reindex_all(&self) -> Result<()> {
        for resource in self.resources.resources()? {
            self.service.reindex(&resource)?;
        }
        Ok(())
    }

    /// Latest version of a resource
    pub fn resource(&self, resource_id: &str) -> Result<Arc<Resource>> {
        self.resources
            .get_by_resource_id(resource_id, None)?
            .ok_or_else(|| KarpError::ResourceNotFound {
                resource_id: resource_id.to_string(),
                version: None,
            })
    }

    pub fn repository(&self, resource_id: &str) -> Option<&Arc<InMemoryEntryRepository>> {
        self.repositories.get(resource_id)
    }

    /// Index document of an entry as stored behind the resource's alias
    pub fn document(&self, resource_id: &str, entry_id: &str) -> Option<Map<String, Value>> {
        self.index.document(resource_id, entry_id)
    }

    pub fn search(&self, resources: &[&str], q: &str) -> Result<SearchResponse> {
        let request = QueryRequest::new(resources.iter().copied())
            .with_query(q)
            .with_size(self.query.settings().max_size);
        self.query.search(&request)
    }

    /// Ids of every entry of one resource matching `q`
    pub fn search_ids(&self, resource_id: &str, q: &str) -> Result<Vec<String>> {
        let response = self.search(&[resource_id], q)?;
        Ok(response.ids().into_iter().map(str::to_string).collect())
    }

    /// Create an entry and index it through its domain event
    pub fn add_entry(&self, resource_id: &str, body: Value) -> Result<Entry> {
        let resource = self.resource(resource_id)?;
        let body = body_of(body)?;
        let entry_id = entry_id_of(&resource, &body)?;
        let (entry, event) = entry::create(resource_id, entry_id, body, TEST_USER, "add");
        self.save(&entry)?;
        self.service.handle_event(&event)?;
        Ok(entry)
    }

    /// Replace an entry's body and index it through its domain event
    pub fn update_entry(&self, resource_id: &str, entry_id: &str, body: Value) -> Result<Entry> {
        let current = self.live_entry(resource_id, entry_id)?;
        let (entry, event) = entry::update(&current, body_of(body)?, TEST_USER, "update");
        self.save(&entry)?;
        self.service.handle_event(&event)?;
        Ok(entry)
    }

    /// Discard an entry and remove it from the index through its domain event
    pub fn discard_entry(&self, resource_id: &str, entry_id: &str) -> Result<Entry> {
        let current = self.live_entry(resource_id, entry_id)?;
        let (entry, event) = entry::discard(&current, TEST_USER, "discard");
        self.save(&entry)?;
        self.service.handle_event(&event)?;
        Ok(entry)
    }

    fn live_entry(&self, resource_id: &str, entry_id: &str) -> Result<Entry> {
        self.resource(resource_id)?
            .entry_repository
            .get_by_entry_id(entry_id)?
            .ok_or_else(|| {
                KarpError::Repository(format!("no entry '{}' in '{}'", entry_id, resource_id))
            })
    }

    fn save(&self, entry: &Entry) -> Result<()> {
        let repository = self.repository(&entry.resource_id).ok_or_else(|| {
            KarpError::ResourceNotFound {
                resource_id: entry.resource_id.clone(),
                version: None,
            }
        })?;
        repository.save(entry.clone());
        Ok(())
    }
}

fn body_of(value: Value) -> Result<entry::EntryBody> {
    resource::body_from_value(value)
        .ok_or_else(|| KarpError::Repository("entry body must be a JSON object".into()))
}

fn entry_id_of(resource: &Resource, body: &entry::EntryBody) -> Result<String> {
    resource.entry_id_from_body(body).ok_or_else(|| {
        KarpError::InvalidConfig(format!(
            "entry of '{}' has no value for its id field",
            resource.resource_id
        ))
    })
}

/// Prelude for easy imports
pub mod prelude {
    pub use super::invariants::{check_all_invariants, default_invariants, Invariant, Violation};
    pub use super::{
        municipalities_config, municipalities_entries, places_config, places_entries, TestEnv,
        TEST_USER,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_places_fixture_is_indexed() {
        let env = TestEnv::places().unwrap();
        assert_eq!(env.index.document_count("places"), 9);
        assert_eq!(env.index.document_count("municipalities"), 3);
        assert_eq!(env.index.resolve_alias("places").as_deref(), Some("places_2"));
        assert_eq!(env.resource("places").unwrap().name(), "Platser i Sverige");
    }

    #[test]
    fn test_update_and_discard_through_events() {
        let env = TestEnv::places().unwrap();
        let updated = env
            .update_entry("places", "2", json!({"code": 2, "name": "Grundsund", "area": 1}))
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(env.document("places", "2").unwrap()["name"], json!("Grundsund"));

        env.discard_entry("places", "2").unwrap();
        assert!(env.document("places", "2").is_none());
        assert!(env.discard_entry("places", "2").is_err());
    }

    #[test]
    fn test_entry_without_id_is_rejected() {
        let env = TestEnv::places().unwrap();
        let err = env.add_entry("places", json!({"name": "Nowhere"})).unwrap_err();
        assert!(err.is_config_error());
        assert!(env.add_entry("unknown", json!({"code": 1})).is_err());
    }
}
