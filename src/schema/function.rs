//! Virtual field function descriptors
//!
//! A virtual field stores its function as raw JSON in the config. It is parsed here
//! when the field is evaluated, so an unsupported shape only fails for resources
//! that actually use it.

use super::resource_config::FieldConfig;
use crate::error::KarpError;
use crate::Result;
use serde_json::Value;

/// A parsed virtual field function
#[derive(Clone, Debug, PartialEq)]
pub enum FunctionSpec {
    MultiRef(MultiRef),
    /// Computed by the registered plugin with this id
    Plugin(String),
}

/// Reverse lookup: entries of the target resource whose `field` matches values of
/// the current entry
#[derive(Clone, Debug, PartialEq)]
pub struct MultiRef {
    pub resource_id: Option<String>,
    pub resource_version: Option<u32>,
    /// Field of the target entries the test is applied to
    pub field: String,
    pub test: TestOperator,
    /// Fields of the current entry whose values are looked up
    pub self_fields: Vec<String>,
    /// How each matching entry is transformed
    pub result: FieldConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestOperator {
    Equals,
    Contains,
}

impl TryFrom<&Value> for FunctionSpec {
    type Error = KarpError;

    fn try_from(value: &Value) -> Result<Self> {
        if let Some(plugin) = value.get("plugin") {
            return match plugin.as_str() {
                Some(id) => Ok(FunctionSpec::Plugin(id.to_string())),
                None => Err(KarpError::NotImplemented(format!(
                    "plugin id must be a string, got {}",
                    plugin
                ))),
            };
        }
        match value.get("multi_ref") {
            Some(multi_ref) => Ok(FunctionSpec::MultiRef(MultiRef::parse(multi_ref)?)),
            None => Err(KarpError::NotImplemented(format!(
                "unsupported virtual field function {}",
                value
            ))),
        }
    }
}

impl MultiRef {
    fn parse(value: &Value) -> Result<Self> {
        let field = value
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| KarpError::NotImplemented("multi_ref without 'field'".into()))?
            .to_string();

        let test = value
            .get("test")
            .and_then(Value::as_object)
            .ok_or_else(|| KarpError::NotImplemented("multi_ref without 'test'".into()))?;
        let (operator, args) = test
            .iter()
            .next()
            .ok_or_else(|| KarpError::NotImplemented("multi_ref with empty 'test'".into()))?;
        let test = match operator.as_str() {
            "equals" => TestOperator::Equals,
            "contains" => TestOperator::Contains,
            other => {
                return Err(KarpError::NotImplemented(format!(
                    "multi_ref test operator '{}'",
                    other
                )))
            }
        };

        let args = args.as_array().ok_or_else(|| {
            KarpError::NotImplemented(format!("multi_ref '{}' arguments must be a list", operator))
        })?;
        let self_fields = args
            .iter()
            .map(|arg| match arg.get("self").and_then(Value::as_str) {
                Some(field) => Ok(field.to_string()),
                None => Err(KarpError::NotImplemented(format!(
                    "multi_ref argument {} is not a 'self' reference",
                    arg
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let result = match value.get("result") {
            Some(result) => serde_json::from_value(result.clone())?,
            None => return Err(KarpError::NotImplemented("multi_ref without 'result'".into())),
        };

        Ok(Self {
            resource_id: value
                .get("resource_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            resource_version: value
                .get("resource_version")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok()),
            field,
            test,
            self_fields,
            result,
        })
    }
}
