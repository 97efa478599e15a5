//! Field type definitions
//!
//! Defines the value types a resource field can hold and how they map onto
//! search-engine field types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Field data type
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Short text, indexed analyzed with an exact-match `raw` sub-field
    #[default]
    String,
    /// Longer analyzed text
    LongString,
    /// Any numeric value
    Number,
    /// Whole numbers
    Integer,
    /// Floating point numbers
    Float,
    Boolean,
    /// Nested object with its own field configuration
    Object,
}

impl FieldType {
    /// Check if this is an object type
    pub fn is_object(&self) -> bool {
        matches!(self, FieldType::Object)
    }

    /// Check if values are analyzed text
    pub fn is_text(&self) -> bool {
        matches!(self, FieldType::String | FieldType::LongString)
    }

    /// Check if this is a numeric type
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Number | FieldType::Integer | FieldType::Float
        )
    }

    /// Search-engine type this field is indexed as
    pub fn es_type(&self) -> &'static str {
        match self {
            FieldType::String | FieldType::LongString => "text",
            FieldType::Number | FieldType::Float => "double",
            FieldType::Integer => "long",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
        }
    }

    /// Get the type name as used in resource configs
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::LongString => "long_string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_names() {
        let t: FieldType = serde_json::from_str("\"long_string\"").unwrap();
        assert_eq!(t, FieldType::LongString);
        assert_eq!(serde_json::to_string(&FieldType::Integer).unwrap(), "\"integer\"");
        assert!(serde_json::from_str::<FieldType>("\"date\"").is_err());
    }

    #[test]
    fn test_type_checks() {
        assert!(FieldType::String.is_text());
        assert!(FieldType::Float.is_numeric());
        assert!(FieldType::Object.is_object());
        assert!(!FieldType::Boolean.is_numeric());
        assert_eq!(FieldType::default(), FieldType::String);
    }

    #[test]
    fn test_es_types() {
        assert_eq!(FieldType::String.es_type(), "text");
        assert_eq!(FieldType::Integer.es_type(), "long");
        assert_eq!(FieldType::Number.es_type(), "double");
        assert_eq!(FieldType::Boolean.to_string(), "boolean");
    }
}
