//! Range query - matches documents with field values beyond a bound

use crate::query::context::QueryContext;
use crate::query::types::{RangeOp, RangeValue};
use serde_json::{json, Value};

/// Query that matches documents with a field value on one side of a bound
///
/// Works with numeric fields and with strings, which compare lowercased.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeQuery {
    /// Field to search in
    pub field: String,
    pub op: RangeOp,
    pub value: RangeValue,
}

impl RangeQuery {
    /// Create a new range query
    pub fn new(field: impl Into<String>, op: RangeOp, value: RangeValue) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    /// Set the greater-than bound
    pub fn gt(field: impl Into<String>, value: RangeValue) -> Self {
        Self::new(field, RangeOp::Gt, value)
    }

    /// Set the greater-than-or-equal bound
    pub fn gte(field: impl Into<String>, value: RangeValue) -> Self {
        Self::new(field, RangeOp::Gte, value)
    }

    /// Set the less-than bound
    pub fn lt(field: impl Into<String>, value: RangeValue) -> Self {
        Self::new(field, RangeOp::Lt, value)
    }

    /// Set the less-than-or-equal bound
    pub fn lte(field: impl Into<String>, value: RangeValue) -> Self {
        Self::new(field, RangeOp::Lte, value)
    }

    pub fn to_dsl(&self) -> Value {
        let mut bound = serde_json::Map::new();
        bound.insert(self.op.as_str().to_string(), json!(self.value));
        let mut field = serde_json::Map::new();
        field.insert(self.field.clone(), Value::Object(bound));
        json!({ "range": field })
    }

    pub fn matches(&self, ctx: &QueryContext) -> bool {
        ctx.values(&self.field).iter().any(|value| {
            self.value
                .compare_document_value(value)
                .map(|ordering| self.op.accepts(ordering))
                .unwrap_or(false)
        })
    }
}
