//! Boolean query - combines multiple clauses with AND, OR, NOT semantics

use super::CompiledQuery;
use crate::query::context::QueryContext;
use serde_json::{Map, Value};

/// Boolean query combining multiple clauses
///
/// The boolean query supports three types of clauses:
/// - `must`: All clauses must match (AND).
/// - `should`: At least one clause should match (OR). When `must` is non-empty the
///   should clauses are optional.
/// - `must_not`: No clause must match (NOT).
///
/// # Example
///
/// ```json
/// {
///   "bool": {
///     "must": [
///       { "regexp": { "name": ".*bo.*" } },
///       { "match": { "area": { "query": 50000, "operator": "and" } } }
///     ],
///     "must_not": [
///       { "exists": { "field": "density" } }
///     ]
///   }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoolQuery {
    /// Clauses that must match (AND)
    pub must: Vec<CompiledQuery>,
    /// Clauses where at least one should match (OR)
    pub should: Vec<CompiledQuery>,
    /// Clauses that must not match (NOT)
    pub must_not: Vec<CompiledQuery>,
}

impl BoolQuery {
    /// Create a new empty boolean query
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a must clause
    pub fn must(mut self, query: impl Into<CompiledQuery>) -> Self {
        self.must.push(query.into());
        self
    }

    /// Add a should clause
    pub fn should(mut self, query: impl Into<CompiledQuery>) -> Self {
        self.should.push(query.into());
        self
    }

    /// Add a must_not clause
    pub fn must_not(mut self, query: impl Into<CompiledQuery>) -> Self {
        self.must_not.push(query.into());
        self
    }

    /// Check if this is an empty query
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.should.is_empty() && self.must_not.is_empty()
    }

    /// Get total number of clauses
    pub fn clause_count(&self) -> usize {
        self.must.len() + self.should.len() + self.must_not.len()
    }

    /// Only `should` clauses, i.e. a plain disjunction
    pub fn is_disjunction(&self) -> bool {
        !self.should.is_empty() && self.must.is_empty() && self.must_not.is_empty()
    }

    /// No `should` clauses, i.e. a plain conjunction of must and must_not
    pub fn is_conjunction(&self) -> bool {
        self.should.is_empty() && !self.is_empty()
    }

    pub fn to_dsl(&self) -> Value {
        let mut body = Map::new();
        for (name, clauses) in [
            ("must", &self.must),
            ("should", &self.should),
            ("must_not", &self.must_not),
        ] {
            if !clauses.is_empty() {
                body.insert(
                    name.to_string(),
                    Value::Array(clauses.iter().map(CompiledQuery::to_dsl).collect()),
                );
            }
        }
        let mut dsl = Map::new();
        dsl.insert("bool".to_string(), Value::Object(body));
        Value::Object(dsl)
    }

    pub fn matches(&self, ctx: &QueryContext) -> bool {
        // Empty bool query matches all documents
        if self.is_empty() {
            return true;
        }

        if !self.must.iter().all(|q| q.matches(ctx)) {
            return false;
        }

        if self.must_not.iter().any(|q| q.matches(ctx)) {
            return false;
        }

        if self.must.is_empty() && !self.should.is_empty() {
            return self.should.iter().any(|q| q.matches(ctx));
        }

        true
    }
}
