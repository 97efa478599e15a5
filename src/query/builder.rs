//! Lowers a parsed query into compiled search clauses
//!
//! - `equals` becomes a `match` with the `and` operator, or a lenient `multi_match`
//!   when the field name is a pattern such as `v_*`.
//! - `contains`, `startswith` and `endswith` become `regexp` clauses with the
//!   argument escaped; `regexp` passes its argument through.
//! - Regexps over a field pattern become a lenient `query_string` holding `/re/`.
//! - `freetext` and `freergxp` target every field (`*`).
//! - `exists`, `missing` and the range operators reject field patterns.
//! - `not`, `and` and `or` become `bool` clauses, combined pairwise left to right.
//!
//! Unquoted string arguments are lowercased; quoted ones are kept as written.

use super::ast::{QueryNode, QueryValue};
use super::collector::FieldNameCollector;
use super::nodes::{
    CompiledQuery, ExistsQuery, MatchQuery, MultiMatchQuery, QueryStringQuery, RangeQuery,
    RegexpQuery,
};
use super::query_string::parse;
use super::types::{RangeOp, RangeValue};
use crate::error::KarpError;
use crate::Result;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Field target meaning "every field"
const ALL_FIELDS: &str = "*";

/// Tree walker compiling a query AST
///
/// Holds the query text only to report it in errors; building is otherwise a pure
/// function of the AST.
pub struct QueryBuilder {
    query: String,
}

impl QueryBuilder {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    /// Compile the AST into a clause tree
    pub fn build(&self, node: &QueryNode) -> Result<CompiledQuery> {
        let compiled = self.walk(node)?;
        debug!(query = %self.query, clause = compiled.query_type(), "Built query");
        Ok(compiled)
    }

    fn walk(&self, node: &QueryNode) -> Result<CompiledQuery> {
        trace!(kind = %node.kind(), "Walking query node");
        match node {
            QueryNode::And { exps } => self.combine(node, exps, CompiledQuery::and),
            QueryNode::Or { exps } => self.combine(node, exps, CompiledQuery::or),
            QueryNode::Not { exp } => {
                let negated = match exp.as_ref() {
                    QueryNode::Or { exps } => exps
                        .iter()
                        .map(|e| self.walk(e))
                        .collect::<Result<Vec<_>>>()?,
                    other => vec![self.walk(other)?],
                };
                Ok(CompiledQuery::none_of(negated))
            }
            QueryNode::Equals { field, arg } => Ok(self.match_query(field, arg)),
            QueryNode::Freetext { arg } => Ok(self.match_query(ALL_FIELDS, arg)),
            QueryNode::Contains { field, arg } => {
                Ok(self.regexp(field, format!(".*{}.*", escape_regexp(&arg.normalized()))))
            }
            QueryNode::Startswith { field, arg } => {
                Ok(self.regexp(field, format!("{}.*", escape_regexp(&arg.normalized()))))
            }
            QueryNode::Endswith { field, arg } => {
                Ok(self.regexp(field, format!(".*{}", escape_regexp(&arg.normalized()))))
            }
            QueryNode::Regexp { field, arg } => Ok(self.regexp(field, arg.normalized())),
            QueryNode::Freergxp { arg } => Ok(self.regexp(ALL_FIELDS, arg.normalized())),
            QueryNode::Exists { field } => {
                self.no_wildcards("exists", field)?;
                Ok(ExistsQuery::new(field.as_str()).into())
            }
            QueryNode::Missing { field } => {
                self.no_wildcards("missing", field)?;
                Ok(CompiledQuery::none_of(vec![ExistsQuery::new(field.as_str()).into()]))
            }
            QueryNode::Range { field, op, arg } => {
                self.no_wildcards(op.as_str(), field)?;
                Ok(self.range(field, *op, arg))
            }
        }
    }

    fn combine(
        &self,
        node: &QueryNode,
        exps: &[QueryNode],
        join: fn(CompiledQuery, CompiledQuery) -> CompiledQuery,
    ) -> Result<CompiledQuery> {
        let mut exps = exps.iter();
        let mut result = match exps.next() {
            Some(first) => self.walk(first)?,
            None => {
                return Err(self.incomplete(format!(
                    "{} needs at least one expression",
                    node.kind()
                )))
            }
        };
        for exp in exps {
            result = join(result, self.walk(exp)?);
        }
        Ok(result)
    }

    fn match_query(&self, field: &str, arg: &QueryValue) -> CompiledQuery {
        if field.contains('*') {
            MultiMatchQuery::new(arg.to_json(), vec![field.to_string()])
                .with_lenient(true)
                .into()
        } else {
            MatchQuery::new(field, arg.to_json()).with_and_operator().into()
        }
    }

    fn regexp(&self, field: &str, pattern: String) -> CompiledQuery {
        if field.contains('*') {
            QueryStringQuery::regexp(field, &pattern).into()
        } else {
            RegexpQuery::new(field, pattern).into()
        }
    }

    fn range(&self, field: &str, op: RangeOp, arg: &QueryValue) -> CompiledQuery {
        let value = match arg {
            QueryValue::Integer(v) => RangeValue::Long(*v),
            QueryValue::Float(v) => RangeValue::Double(*v),
            QueryValue::String(s) => RangeValue::String(s.normalized()),
        };
        RangeQuery::new(field, op, value).into()
    }

    fn no_wildcards(&self, op: &str, field: &str) -> Result<()> {
        if field.contains('*') {
            return Err(self.incomplete(format!(
                "{} queries don't support wildcards in field names",
                op
            )));
        }
        Ok(())
    }

    fn incomplete(&self, message: String) -> KarpError {
        KarpError::IncompleteQuery {
            query: self.query.clone(),
            message,
        }
    }
}

/// Escape characters with a meaning in the search engine's regexp syntax
pub fn escape_regexp(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(
            ch,
            '.' | '?' | '+' | '*' | '|' | '{' | '}' | '[' | ']' | '(' | ')' | '"' | '\\' | '#'
                | '@' | '&' | '<' | '>' | '~' | '^' | '$'
        ) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Parse, build and collect field names in one step
///
/// Either a complete compiled query is returned or an error; nothing partial.
pub fn compile(query: &str) -> Result<(CompiledQuery, BTreeSet<String>)> {
    let ast = parse(query)?;
    let compiled = QueryBuilder::new(query).build(&ast)?;
    let fields = FieldNameCollector::collect(&ast);
    Ok((compiled, fields))
}
