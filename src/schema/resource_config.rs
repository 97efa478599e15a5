//! Resource field configuration
//!
//! A resource config lists its fields in order. Each field is a plain value, a
//! nested object, a `ref` to entries of some resource, or a `virtual` field computed
//! by a function.

use super::field_type::FieldType;
use crate::error::KarpError;
use crate::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered field configuration map
pub type Fields = IndexMap<String, FieldConfig>;

/// Configuration of one resource
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub fields: Fields,
    /// Fields the entry repository can look entries up by
    #[serde(default)]
    pub referenceable: Vec<String>,
    /// Field whose value is used as entry id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ResourceConfig {
    /// Parse and validate a config from JSON
    pub fn from_json(value: Value) -> Result<Self> {
        let config: ResourceConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn is_referenceable(&self, field: &str) -> bool {
        self.referenceable.iter().any(|f| f == field)
    }

    /// Check structural invariants of every field, nested ones included
    pub fn validate(&self) -> Result<()> {
        for (name, field) in &self.fields {
            field.validate(name)?;
        }
        for name in &self.referenceable {
            if !self.fields.contains_key(name) {
                return Err(KarpError::InvalidConfig(format!(
                    "referenceable field '{}' is not configured",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Configuration of one field
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub collection: bool,
    /// Nested fields of an `object`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Fields>,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<RefConfig>,
    #[serde(rename = "virtual", default)]
    pub is_virtual: bool,
    /// Raw function descriptor of a virtual field, parsed when evaluated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<Value>,
    /// Leave out the exact-match `raw` sub-field of a string
    #[serde(default)]
    pub skip_raw: bool,
}

impl FieldConfig {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            ..Self::default()
        }
    }

    pub fn collection(mut self) -> Self {
        self.collection = true;
        self
    }

    pub fn object(fields: Fields) -> Self {
        Self {
            field_type: FieldType::Object,
            fields: Some(fields),
            ..Self::default()
        }
    }

    pub fn with_ref(mut self, reference: RefConfig) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_function(mut self, function: Value) -> Self {
        self.is_virtual = true;
        self.function = Some(function);
        self
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.is_virtual && self.reference.is_some() {
            return Err(KarpError::InvalidConfig(format!(
                "field '{}' can't be both virtual and a ref",
                name
            )));
        }
        if self.field_type.is_object() {
            match &self.fields {
                Some(fields) => {
                    for (child, field) in fields {
                        field.validate(&format!("{}.{}", name, child))?;
                    }
                }
                None => {
                    return Err(KarpError::InvalidConfig(format!(
                        "object field '{}' has no fields",
                        name
                    )))
                }
            }
        }
        if let Some(reference) = &self.reference {
            reference.field.validate(name)?;
        }
        Ok(())
    }
}

/// Target of a `ref` field
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RefConfig {
    /// Referenced resource, the current one when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<u32>,
    /// How a referenced entry is transformed; `collection` marks a list of ids
    pub field: Box<FieldConfig>,
}

impl RefConfig {
    /// Reference into the current resource
    pub fn local(field: FieldConfig) -> Self {
        Self {
            resource_id: None,
            resource_version: None,
            field: Box::new(field),
        }
    }

    pub fn to_resource(resource_id: impl Into<String>, version: u32, field: FieldConfig) -> Self {
        Self {
            resource_id: Some(resource_id.into()),
            resource_version: Some(version),
            field: Box::new(field),
        }
    }

    pub fn is_collection(&self) -> bool {
        self.field.collection
    }
}
