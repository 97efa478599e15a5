//! Match queries - analyzed full-text matching on one field or a field pattern

use crate::query::context::QueryContext;
use crate::query::types::MatchOperator;
use serde_json::{json, Value};
use std::collections::HashSet;

/// Query that performs full-text matching on a field
///
/// Both the query and the field values are analyzed; with the `and` operator every
/// query term has to occur among the field's terms.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchQuery {
    /// Field to search in
    pub field: String,
    /// Value to search for (strings are analyzed, numbers also compare numerically)
    pub query: Value,
    /// How to combine terms (AND/OR)
    pub operator: MatchOperator,
}

impl MatchQuery {
    /// Create a new match query
    pub fn new(field: impl Into<String>, query: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            query: query.into(),
            operator: MatchOperator::default(),
        }
    }

    /// Set the operator to AND (all terms must match)
    pub fn with_and_operator(mut self) -> Self {
        self.operator = MatchOperator::And;
        self
    }

    /// Set the operator to OR (at least one term must match)
    pub fn with_or_operator(mut self) -> Self {
        self.operator = MatchOperator::Or;
        self
    }

    pub fn to_dsl(&self) -> Value {
        let mut field = serde_json::Map::new();
        field.insert(
            self.field.clone(),
            json!({"query": self.query, "operator": self.operator}),
        );
        json!({ "match": field })
    }

    pub fn matches(&self, ctx: &QueryContext) -> bool {
        let values = ctx.values(&self.field);
        values_match(ctx, &self.query, &values, self.operator)
    }
}

/// Query that matches analyzed text against every field matching a pattern
#[derive(Clone, Debug, PartialEq)]
pub struct MultiMatchQuery {
    pub query: Value,
    /// Field names or patterns (`*` matches any run of characters)
    pub fields: Vec<String>,
    /// Ignore type mismatches between the query and a field
    pub lenient: bool,
}

impl MultiMatchQuery {
    /// Create a new multi_match query
    pub fn new(query: impl Into<Value>, fields: Vec<String>) -> Self {
        Self {
            query: query.into(),
            fields,
            lenient: false,
        }
    }

    pub fn with_lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    pub fn to_dsl(&self) -> Value {
        json!({
            "multi_match": {
                "query": self.query,
                "fields": self.fields,
                "lenient": self.lenient,
            }
        })
    }

    pub fn matches(&self, ctx: &QueryContext) -> bool {
        self.fields.iter().any(|pattern| {
            ctx.matching_fields(pattern).iter().any(|field| {
                let values = ctx.values(field);
                values_match(ctx, &self.query, &values, MatchOperator::Or)
            })
        })
    }
}

fn values_match(
    ctx: &QueryContext,
    query: &Value,
    values: &[Value],
    operator: MatchOperator,
) -> bool {
    if values.is_empty() {
        return false;
    }

    if let Some(number) = query.as_f64() {
        let numeric_hit = values
            .iter()
            .filter_map(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .any(|v| v == number);
        if numeric_hit {
            return true;
        }
    }

    let terms = ctx.tokenizer().tokenize_value(query);
    if terms.is_empty() {
        return false;
    }

    let doc_terms: HashSet<String> = values
        .iter()
        .flat_map(|v| ctx.tokenizer().tokenize_value(v))
        .collect();

    match operator {
        MatchOperator::And => terms.iter().all(|t| doc_terms.contains(t)),
        MatchOperator::Or => terms.iter().any(|t| doc_terms.contains(t)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;
    use serde_json::Map;

    fn doc(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_match_dsl() {
        let query = MatchQuery::new("name", "hambo").with_and_operator();
        assert_eq!(
            query.to_dsl(),
            json!({"match": {"name": {"query": "hambo", "operator": "and"}}})
        );
    }

    #[test]
    fn test_match_and_operator() {
        let d = doc(json!({"name": "Botten test"}));
        let tokenizer = Tokenizer::default();
        let ctx = QueryContext::new(&d, &tokenizer);

        assert!(MatchQuery::new("name", "botten test").with_and_operator().matches(&ctx));
        assert!(!MatchQuery::new("name", "botten grund").with_and_operator().matches(&ctx));
        assert!(MatchQuery::new("name", "botten grund").with_or_operator().matches(&ctx));
        assert!(!MatchQuery::new("other", "botten").matches(&ctx));
    }

    #[test]
    fn test_match_numbers() {
        let d = doc(json!({"area": 50000, "density": 7.5, "code": "3"}));
        let tokenizer = Tokenizer::default();
        let ctx = QueryContext::new(&d, &tokenizer);

        assert!(MatchQuery::new("area", 50000).matches(&ctx));
        assert!(MatchQuery::new("density", 7.5).matches(&ctx));
        assert!(MatchQuery::new("code", 3).matches(&ctx));
        assert!(!MatchQuery::new("area", 5000).matches(&ctx));
    }

    #[test]
    fn test_multi_match() {
        let d = doc(json!({"name": "Grund test", "v_larger_place": {"name": "Hambo"}}));
        let tokenizer = Tokenizer::default();
        let ctx = QueryContext::new(&d, &tokenizer);

        let query = MultiMatchQuery::new("hambo", vec!["v_*".to_string()]).with_lenient(true);
        assert!(query.matches(&ctx));
        assert_eq!(
            query.to_dsl(),
            json!({"multi_match": {"query": "hambo", "fields": ["v_*"], "lenient": true}})
        );

        let query = MultiMatchQuery::new("grund", vec!["v_*".to_string()]);
        assert!(!query.matches(&ctx));
        let query = MultiMatchQuery::new("grund", vec!["*".to_string()]);
        assert!(query.matches(&ctx));
    }
}
