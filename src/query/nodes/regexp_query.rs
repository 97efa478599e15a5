//! Regexp queries - anchored regular expressions over field terms
//!
//! A `regexp` clause targets one field. Field patterns such as `v_*` cannot be
//! expressed that way, so they are compiled to a lenient `query_string` clause
//! carrying the expression between slashes.
//!
//! # Example
//!
//! ```rust
//! use karp::query::nodes::QueryStringQuery;
//!
//! let query = QueryStringQuery::regexp("v_*", "a/b.*");
//! assert_eq!(query.query, "/a\\/b.*/");
//! assert_eq!(query.regex_pattern(), "a/b.*");
//! ```

use crate::query::context::QueryContext;
use crate::tokenizer::scalar_text;
use regex::Regex;
use serde_json::{json, Value};

/// Query that matches a field's terms against a regular expression
///
/// The expression must match a whole term (or the whole value).
#[derive(Clone, Debug, PartialEq)]
pub struct RegexpQuery {
    /// Field to search in
    pub field: String,
    /// Regular expression
    pub value: String,
}

impl RegexpQuery {
    /// Create a new regexp query
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn to_dsl(&self) -> Value {
        let mut field = serde_json::Map::new();
        field.insert(self.field.clone(), Value::String(self.value.clone()));
        json!({ "regexp": field })
    }

    pub fn matches(&self, ctx: &QueryContext) -> bool {
        match ctx.regex(&self.value) {
            Some(re) => any_value_matches(ctx, &re, &ctx.values(&self.field)),
            None => false,
        }
    }
}

/// Lenient query_string clause holding a `/regexp/` over a field pattern
#[derive(Clone, Debug, PartialEq)]
pub struct QueryStringQuery {
    /// Query text, `/.../` with inner slashes escaped
    pub query: String,
    /// Field name or pattern searched by default
    pub default_field: String,
    pub lenient: bool,
}

impl QueryStringQuery {
    /// Wrap a regular expression for a field pattern
    pub fn regexp(default_field: impl Into<String>, pattern: &str) -> Self {
        Self {
            query: format!("/{}/", pattern.replace('/', "\\/")),
            default_field: default_field.into(),
            lenient: true,
        }
    }

    /// The regular expression between the slashes, unescaped
    pub fn regex_pattern(&self) -> String {
        let inner = self
            .query
            .strip_prefix('/')
            .and_then(|q| q.strip_suffix('/'))
            .unwrap_or(&self.query);
        inner.replace("\\/", "/")
    }

    pub fn to_dsl(&self) -> Value {
        json!({
            "query_string": {
                "query": self.query,
                "default_field": self.default_field,
                "lenient": self.lenient,
            }
        })
    }

    pub fn matches(&self, ctx: &QueryContext) -> bool {
        let re = match ctx.regex(&self.regex_pattern()) {
            Some(re) => re,
            None => return false,
        };
        ctx.matching_fields(&self.default_field)
            .iter()
            .any(|field| any_value_matches(ctx, &re, &ctx.values(field)))
    }
}

/// A value matches if the expression matches it whole, lowercased, or any of its terms
fn any_value_matches(ctx: &QueryContext, re: &Regex, values: &[Value]) -> bool {
    values.iter().any(|value| {
        let text = match scalar_text(value) {
            Some(text) => text,
            None => return false,
        };
        re.is_match(&text)
            || re.is_match(&text.to_lowercase())
            || ctx
                .tokenizer()
                .tokenize(&text)
                .iter()
                .any(|term| re.is_match(term))
    })
}
