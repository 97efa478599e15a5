//! Exists query - matches documents that have a value for a field

use crate::query::context::QueryContext;
use serde_json::{json, Value};

#[derive(Clone, Debug, PartialEq)]
pub struct ExistsQuery {
    pub field: String,
}

impl ExistsQuery {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    pub fn to_dsl(&self) -> Value {
        json!({"exists": {"field": self.field}})
    }

    /// Null and empty arrays count as absent
    pub fn matches(&self, ctx: &QueryContext) -> bool {
        ctx.has_field(&self.field)
    }
}
