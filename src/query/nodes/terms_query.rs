//! Terms query - matches documents holding any of the given exact values
//!
//! The `_id` pseudo-field matches the document id itself.

use crate::models::entry::id_string;
use crate::query::context::QueryContext;
use serde_json::{json, Map, Value};

/// Field name addressing the document id
pub const ID_FIELD: &str = "_id";

#[derive(Clone, Debug, PartialEq)]
pub struct TermsQuery {
    pub field: String,
    /// Exact values, a document must hold at least one
    pub terms: Vec<Value>,
}

impl TermsQuery {
    pub fn new(field: impl Into<String>, terms: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            terms,
        }
    }

    /// Match documents by id
    pub fn ids<S: AsRef<str>>(ids: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            ID_FIELD,
            ids.into_iter().map(|id| Value::from(id.as_ref())).collect(),
        )
    }

    pub fn to_dsl(&self) -> Value {
        let mut terms = Map::new();
        terms.insert(self.field.clone(), Value::Array(self.terms.clone()));
        json!({ "terms": terms })
    }

    pub fn matches(&self, ctx: &QueryContext) -> bool {
        let wanted: Vec<String> = self.terms.iter().filter_map(id_string).collect();
        if self.field == ID_FIELD {
            return ctx.id().is_some_and(|id| wanted.iter().any(|w| w == id));
        }
        ctx.values(&self.field)
            .iter()
            .filter_map(id_string)
            .any(|value| wanted.contains(&value))
    }
}
