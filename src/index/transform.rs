//! Entry to index document transform
//!
//! Fields are handled in configuration order:
//! - a `virtual` field evaluates its function into `v_<name>`
//! - a `ref` field resolves the referenced entries into `v_<name>`
//! - the field's own value is then copied, with `object` fields transformed
//!   recursively against their nested config
//!
//! Empty results are left out of the document according to the configured
//! [`EmptyValuePolicy`](crate::config::EmptyValuePolicy). Missing referenced entries
//! and resources are skipped; malformed function descriptors are errors.

use crate::config::IndexSettings;
use crate::error::KarpError;
use crate::models::entry::id_string;
use crate::models::{Entry, EntryBody, IndexEntry, Resource};
use crate::plugins::PluginRegistry;
use crate::repository::ResourceRepository;
use crate::schema::{FieldConfig, Fields, FunctionSpec, MultiRef, RefConfig};
use crate::Result;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, trace};

/// Builds index documents from entries
#[derive(Clone)]
pub struct IndexTransformer {
    resources: Arc<dyn ResourceRepository>,
    plugins: PluginRegistry,
    settings: IndexSettings,
}

impl IndexTransformer {
    pub fn new(
        resources: Arc<dyn ResourceRepository>,
        plugins: PluginRegistry,
        settings: IndexSettings,
    ) -> Self {
        Self {
            resources,
            plugins,
            settings,
        }
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn resources(&self) -> &Arc<dyn ResourceRepository> {
        &self.resources
    }

    /// Transform an entry of `resource` into its index document
    pub fn transform_to_index_entry(&self, resource: &Resource, entry: &Entry) -> Result<IndexEntry> {
        trace!(
            resource_id = %resource.resource_id,
            entry_id = %entry.entry_id,
            "Transforming entry"
        );
        let mut index_entry = IndexEntry::for_entry(entry);
        index_entry.entry = self.transform_fields(resource, &entry.body, &resource.config.fields)?;
        Ok(index_entry)
    }

    fn transform_fields(
        &self,
        resource: &Resource,
        source: &EntryBody,
        fields: &Fields,
    ) -> Result<Map<String, Value>> {
        let mut output = Map::new();
        for (name, field) in fields {
            if field.is_virtual {
                let value = self.evaluate_function(resource, source, name, field)?;
                self.assign(&mut output, self.virtual_key(name), value);
            } else if let Some(reference) = &field.reference {
                let value = self.resolve_reference(resource, source, name, reference)?;
                self.assign(&mut output, self.virtual_key(name), value);
            }

            if let Some(value) = source.get(name) {
                let content = self.transform_value(resource, name, field, value)?;
                self.assign(&mut output, name.clone(), content);
            }
        }
        Ok(output)
    }

    /// Transform a single value against its field config
    fn transform_value(
        &self,
        resource: &Resource,
        name: &str,
        field: &FieldConfig,
        value: &Value,
    ) -> Result<Option<Value>> {
        let fields = match (&field.fields, field.field_type.is_object()) {
            (Some(fields), true) => fields,
            _ => return Ok(Some(value.clone())),
        };

        match value {
            Value::Object(object) => Ok(Some(Value::Object(
                self.transform_fields(resource, object, fields)?,
            ))),
            Value::Array(items) => {
                let mut transformed = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Object(object) => transformed.push(Value::Object(
                            self.transform_fields(resource, object, fields)?,
                        )),
                        other => debug!(field = name, value = %other, "Skipping non-object element"),
                    }
                }
                Ok(Some(Value::Array(transformed)))
            }
            other => {
                debug!(field = name, value = %other, "Skipping non-object value of object field");
                Ok(None)
            }
        }
    }

    fn resolve_reference(
        &self,
        resource: &Resource,
        source: &EntryBody,
        name: &str,
        reference: &RefConfig,
    ) -> Result<Option<Value>> {
        let value = match source.get(name) {
            Some(value) if self.settings.empty_values.keeps(value) => value,
            _ => return Ok(None),
        };

        let fetched;
        let target = match &reference.resource_id {
            Some(resource_id) => {
                fetched = match self
                    .resources
                    .get_by_resource_id(resource_id, reference.resource_version)?
                {
                    Some(target) => target,
                    None => {
                        debug!(
                            field = name,
                            resource_id = %resource_id,
                            version = ?reference.resource_version,
                            "Referenced resource not found"
                        );
                        return Ok(None);
                    }
                };
                &*fetched
            }
            None => resource,
        };

        let ids: Vec<&Value> = match value {
            Value::Array(ids) => ids.iter().collect(),
            id => vec![id],
        };

        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids.into_iter().filter_map(id_string) {
            match target.entry_repository.get_by_entry_id(&id)? {
                Some(entry) => {
                    let body = Value::Object(entry.body);
                    let nested = self.transform_value(target, name, &reference.field, &body)?;
                    if let Some(nested) = nested {
                        resolved.push(nested);
                    }
                }
                None => debug!(
                    field = name,
                    resource_id = %target.resource_id,
                    entry_id = %id,
                    "Referenced entry not found"
                ),
            }
        }

        if reference.is_collection() {
            Ok(Some(Value::Array(resolved)))
        } else {
            Ok(resolved.into_iter().next())
        }
    }

    fn evaluate_function(
        &self,
        resource: &Resource,
        source: &EntryBody,
        name: &str,
        field: &FieldConfig,
    ) -> Result<Option<Value>> {
        let function = field.function.as_ref().ok_or_else(|| {
            KarpError::NotImplemented(format!("virtual field '{}' has no function", name))
        })?;

        match FunctionSpec::try_from(function)? {
            FunctionSpec::Plugin(plugin_id) => self
                .plugins
                .apply(&plugin_id, &resource.resource_id, resource.version, source)
                .map(Some),
            FunctionSpec::MultiRef(multi_ref) => {
                self.evaluate_multi_ref(resource, source, name, &multi_ref)
            }
        }
    }

    fn evaluate_multi_ref(
        &self,
        resource: &Resource,
        source: &EntryBody,
        name: &str,
        multi_ref: &MultiRef,
    ) -> Result<Option<Value>> {
        let mut filters = Map::new();
        for self_field in &multi_ref.self_fields {
            match source.get(self_field) {
                Some(value) if !value.is_null() => {
                    filters.insert(multi_ref.field.clone(), value.clone());
                }
                _ => {
                    trace!(field = name, self_field = %self_field, "No value to look up");
                    return Ok(None);
                }
            }
        }

        let fetched;
        let target = match &multi_ref.resource_id {
            Some(resource_id) => {
                fetched = match self
                    .resources
                    .get_by_resource_id(resource_id, multi_ref.resource_version)?
                {
                    Some(target) => target,
                    None => {
                        debug!(
                            field = name,
                            resource_id = %resource_id,
                            "multi_ref target resource not found"
                        );
                        return Ok(None);
                    }
                };
                &*fetched
            }
            None => resource,
        };

        let entries = target.entry_repository.find_by_referenceable_fields(&filters)?;
        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            let body = Value::Object(entry.body);
            if let Some(result) = self.transform_value(target, name, &multi_ref.result, &body)? {
                results.push(result);
            }
        }
        Ok(Some(Value::Array(results)))
    }

    fn assign(&self, output: &mut Map<String, Value>, key: String, value: Option<Value>) {
        match value {
            Some(value) if self.settings.empty_values.keeps(&value) => {
                output.insert(key, value);
            }
            _ => {}
        }
    }

    fn virtual_key(&self, name: &str) -> String {
        format!("{}{}", self.settings.virtual_prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmptyValuePolicy;
    use crate::models::entry;
    use crate::repository::{EntryRepository, InMemoryEntryRepository, InMemoryResourceRepository};
    use crate::schema::ResourceConfig;
    use serde_json::json;

    fn body(value: Value) -> EntryBody {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    struct Setup {
        resources: Arc<InMemoryResourceRepository>,
        repo: Arc<InMemoryEntryRepository>,
        resource: Arc<Resource>,
    }

    fn fixture(config: Value, referenceable: &[&str], entries: Vec<Value>) -> Setup {
        let config = ResourceConfig::from_json(config).unwrap();
        let repo = Arc::new(InMemoryEntryRepository::new(
            "things",
            referenceable.iter().map(|s| s.to_string()).collect(),
        ));
        for value in entries {
            let id = value["id"].to_string();
            repo.save(entry::create("things", id, body(value), "u", "").0);
        }
        let resources = Arc::new(InMemoryResourceRepository::new());
        let resource = resources.save(Resource::new("things", 1, config, repo.clone()));
        Setup {
            resources,
            repo,
            resource,
        }
    }

    fn transform_with(setup: &Setup, policy: EmptyValuePolicy, id: &str) -> Result<Map<String, Value>> {
        let transformer = IndexTransformer::new(
            setup.resources.clone(),
            PluginRegistry::new(),
            IndexSettings {
                empty_values: policy,
                ..IndexSettings::default()
            },
        );
        let source = setup.repo.get_by_entry_id(id)?.unwrap();
        Ok(transformer.transform_to_index_entry(&setup.resource, &source)?.entry)
    }

    fn transform(setup: &Setup, id: &str) -> Map<String, Value> {
        transform_with(setup, EmptyValuePolicy::Falsy, id).unwrap()
    }

    #[test]
    fn test_plain_fields_and_falsy_values() {
        let setup = fixture(
            json!({"fields": {"id": {"type": "integer"}, "name": {}, "count": {"type": "integer"}, "tags": {"collection": true}}}),
            &[],
            vec![json!({"id": 1, "name": "", "count": 0, "tags": [], "extra": "x"})],
        );
        assert_eq!(Value::Object(transform(&setup, "1")), json!({"id": 1}));

        let kept = transform_with(&setup, EmptyValuePolicy::Absent, "1").unwrap();
        assert_eq!(
            Value::Object(kept),
            json!({"id": 1, "name": "", "count": 0, "tags": []})
        );
    }

    #[test]
    fn test_object_fields() {
        let setup = fixture(
            json!({"fields": {
                "id": {"type": "integer"},
                "info": {"type": "object", "fields": {"a": {}, "b": {}}},
                "parts": {"type": "object", "collection": true, "fields": {"p": {}}}
            }}),
            &[],
            vec![json!({
                "id": 1,
                "info": {"a": "x", "c": "dropped"},
                "parts": [{"p": 1, "q": 2}, "junk", {"p": 3}]
            })],
        );
        assert_eq!(
            Value::Object(transform(&setup, "1")),
            json!({"id": 1, "info": {"a": "x"}, "parts": [{"p": 1}, {"p": 3}]})
        );
    }

    #[test]
    fn test_singular_self_reference() {
        let setup = fixture(
            json!({"fields": {
                "id": {"type": "number"},
                "larger_place": {"type": "number", "ref": {"field": {"type": "number"}}}
            }}),
            &[],
            vec![
                json!({"id": 1, "larger_place": null}),
                json!({"id": 2, "larger_place": 1}),
                json!({"id": 3, "larger_place": 99}),
            ],
        );
        assert_eq!(Value::Object(transform(&setup, "1")), json!({"id": 1}));
        assert_eq!(
            Value::Object(transform(&setup, "2")),
            json!({"id": 2, "v_larger_place": {"id": 1, "larger_place": null}, "larger_place": 1})
        );
        assert_eq!(
            Value::Object(transform(&setup, "3")),
            json!({"id": 3, "larger_place": 99})
        );
    }

    #[test]
    fn test_collection_reference_drops_misses() {
        let setup = fixture(
            json!({"fields": {
                "id": {"type": "number"},
                "name": {},
                "related": {
                    "type": "number",
                    "collection": true,
                    "ref": {"field": {"type": "object", "collection": true, "fields": {"name": {}}}}
                }
            }}),
            &[],
            vec![
                json!({"id": 1, "name": "one"}),
                json!({"id": 2, "name": "two"}),
                json!({"id": 3, "name": "three", "related": [2, 42, 1]}),
            ],
        );
        let document = transform(&setup, "3");
        assert_eq!(
            document["v_related"],
            json!([{"name": "two"}, {"name": "one"}])
        );
        assert_eq!(document["related"], json!([2, 42, 1]));
    }

    #[test]
    fn test_multi_ref() {
        let setup = fixture(
            json!({"fields": {
                "id": {"type": "number"},
                "name": {},
                "parent": {"type": "number"},
                "children": {
                    "virtual": true,
                    "function": {"multi_ref": {
                        "field": "parent",
                        "test": {"equals": [{"self": "id"}]},
                        "result": {"type": "object", "fields": {"name": {}}}
                    }}
                }
            }, "referenceable": ["parent"]}),
            &["parent"],
            vec![
                json!({"id": 1, "name": "root"}),
                json!({"id": 2, "name": "a", "parent": 1}),
                json!({"id": 3, "name": "b", "parent": 1}),
            ],
        );
        assert_eq!(
            transform(&setup, "1")["v_children"],
            json!([{"name": "a"}, {"name": "b"}])
        );
        assert!(!transform(&setup, "2").contains_key("v_children"));
    }

    #[test]
    fn test_hard_failures() {
        let setup = fixture(
            json!({"fields": {
                "id": {"type": "number"},
                "bad": {"virtual": true, "function": {"multi_ref": {
                    "field": "id",
                    "test": {"equals": [{"value": 1}]},
                    "result": {}
                }}}
            }}),
            &[],
            vec![json!({"id": 1})],
        );
        let err = transform_with(&setup, EmptyValuePolicy::Falsy, "1").unwrap_err();
        assert!(matches!(err, KarpError::NotImplemented(_)));

        let setup = fixture(
            json!({"fields": {"stats": {"virtual": true, "function": {"plugin": "missing"}}}}),
            &[],
            vec![json!({"id": 1})],
        );
        let err = transform_with(&setup, EmptyValuePolicy::Falsy, "1").unwrap_err();
        assert!(matches!(err, KarpError::PluginNotFound(_)));

        let setup = fixture(
            json!({"fields": {"v": {"virtual": true}}}),
            &[],
            vec![json!({"id": 1})],
        );
        assert!(transform_with(&setup, EmptyValuePolicy::Falsy, "1")
            .unwrap_err()
            .is_config_error());
    }

    #[test]
    fn test_plugin_value() {
        let setup = fixture(
            json!({"fields": {"size": {"virtual": true, "function": {"plugin": "size"}}}}),
            &[],
            vec![json!({"id": 1, "a": 1})],
        );
        let size = |id: &str, version: u32, body: &EntryBody| -> Result<Value> {
            Ok(json!(format!("{}:{}:{}", id, version, body.len())))
        };
        let transformer = IndexTransformer::new(
            setup.resources.clone(),
            PluginRegistry::new().with("size", size),
            IndexSettings::default(),
        );
        let source = setup.repo.get_by_entry_id("1").unwrap().unwrap();
        let document = transformer
            .transform_to_index_entry(&setup.resource, &source)
            .unwrap();
        assert_eq!(document.entry["v_size"], json!("things:1:2"));
        assert_eq!(document.version, Some(1));
    }
}
