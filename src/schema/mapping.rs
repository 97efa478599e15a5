//! Index mapping definitions
//!
//! Mappings define how the fields of a resource's index documents are indexed.
//! They are derived from the resource config, including the `v_` fields produced
//! by the index transform.

use super::field_type::FieldType;
use super::function::FunctionSpec;
use super::resource_config::{FieldConfig, Fields, ResourceConfig};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Name of the exact-match sub-field of string fields
pub const RAW_SUBFIELD: &str = "raw";

/// Field mapping configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Engine field type, absent for objects
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,

    /// Multi-fields indexing the same value differently
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<String, FieldMapping>,

    /// Nested field mappings (for object types)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, FieldMapping>>,
}

impl FieldMapping {
    /// Create a mapping with a specific engine type
    pub fn typed(field_type: impl Into<String>) -> Self {
        Self {
            field_type: Some(field_type.into()),
            ..Self::default()
        }
    }

    /// Create an object mapping
    pub fn object(properties: IndexMap<String, FieldMapping>) -> Self {
        Self {
            properties: Some(properties),
            ..Self::default()
        }
    }

    /// Add a multi-field
    pub fn with_subfield(mut self, name: impl Into<String>, mapping: FieldMapping) -> Self {
        self.fields.insert(name.into(), mapping);
        self
    }

    /// Whether values are analyzed into terms
    pub fn is_analyzed(&self) -> bool {
        self.field_type.as_deref() == Some("text")
    }

    pub fn has_raw_subfield(&self) -> bool {
        self.fields.contains_key(RAW_SUBFIELD)
    }
}

/// Mapping of a whole index
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexMapping {
    /// Whether unmapped fields are added on the fly
    pub dynamic: bool,
    pub properties: IndexMap<String, FieldMapping>,
}

impl Default for IndexMapping {
    fn default() -> Self {
        Self {
            dynamic: false,
            properties: IndexMap::new(),
        }
    }
}

impl IndexMapping {
    pub fn get(&self, field: &str) -> Option<&FieldMapping> {
        self.properties.get(field)
    }

    /// Mapping of a dotted path through object properties
    pub fn field(&self, path: &str) -> Option<&FieldMapping> {
        let mut parts = path.split('.');
        let mut mapping = self.properties.get(parts.next()?)?;
        for part in parts {
            mapping = mapping.properties.as_ref()?.get(part)?;
        }
        Some(mapping)
    }

    /// Field holding whole values of `path`, usable for sorting
    ///
    /// Analyzed fields resolve to their `raw` sub-field. Objects, analyzed fields
    /// without one and unmapped paths have none.
    pub fn keyword_field(&self, path: &str) -> Option<String> {
        let mapping = self.field(path)?;
        match mapping.field_type.as_deref() {
            None => None,
            Some(_) if mapping.is_analyzed() => mapping
                .has_raw_subfield()
                .then(|| format!("{}.{}", path, RAW_SUBFIELD)),
            Some(_) => Some(path.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Derive the index mapping for a resource
///
/// `ref` fields get their target's mapping under `<prefix><name>` next to the plain
/// field. `multi_ref` virtual fields are mapped from their `result` config. Plugin
/// results are left unmapped.
pub fn create_index_mapping(config: &ResourceConfig, virtual_prefix: &str) -> IndexMapping {
    IndexMapping {
        dynamic: false,
        properties: map_fields(&config.fields, virtual_prefix),
    }
}

fn map_fields(fields: &Fields, virtual_prefix: &str) -> IndexMap<String, FieldMapping> {
    let mut properties = IndexMap::new();
    for (name, field) in fields {
        if field.is_virtual {
            let spec = field.function.as_ref().map(FunctionSpec::try_from);
            if let Some(Ok(FunctionSpec::MultiRef(multi_ref))) = spec {
                properties.insert(
                    format!("{}{}", virtual_prefix, name),
                    map_field(&multi_ref.result, virtual_prefix),
                );
            }
            continue;
        }
        if let Some(reference) = &field.reference {
            properties.insert(
                format!("{}{}", virtual_prefix, name),
                map_field(&reference.field, virtual_prefix),
            );
        }
        properties.insert(name.clone(), map_field(field, virtual_prefix));
    }
    properties
}

fn map_field(field: &FieldConfig, virtual_prefix: &str) -> FieldMapping {
    match field.field_type {
        FieldType::Object => FieldMapping::object(
            field
                .fields
                .as_ref()
                .map(|fields| map_fields(fields, virtual_prefix))
                .unwrap_or_default(),
        ),
        FieldType::String if !field.skip_raw => FieldMapping::typed(field.field_type.es_type())
            .with_subfield(RAW_SUBFIELD, FieldMapping::typed("keyword")),
        other => FieldMapping::typed(other.es_type()),
    }
}
