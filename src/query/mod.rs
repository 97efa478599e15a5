//! Query DSL and execution
//!
//! Queries are written in a pipe-delimited prefix syntax:
//!
//! ```text
//! equals|name|Hambo
//! and||regexp|name|.*bo.*||equals|area|50000||missing|density
//! or(startswith|name|grund||not||exists|density)
//! ```
//!
//! A query string is parsed into a [`QueryNode`] tree, compiled by the
//! [`QueryBuilder`] into a [`CompiledQuery`] (Elasticsearch query DSL), and its field
//! names are gathered by the [`FieldNameCollector`]. The [`QueryService`] runs the
//! whole pipeline against a search index.
//!
//! # Example
//!
//! ```
//! use karp::query::compile;
//!
//! let (query, fields) = compile("and||equals|name|Hambo||gt|area|100").unwrap();
//! assert_eq!(query.query_type(), "bool");
//! assert!(fields.contains("area"));
//! ```

pub mod accessor;
pub mod ast;
pub mod builder;
pub mod collector;
pub mod context;
pub mod executor;
pub mod nodes;
pub mod query_string;
pub mod runtime;
pub mod types;

pub use ast::{NodeKind, QueryNode, QueryValue, StringValue};
pub use builder::{compile, escape_regexp, QueryBuilder};
pub use collector::FieldNameCollector;
pub use context::QueryContext;
pub use executor::QueryService;
pub use nodes::{
    BoolQuery, CompiledQuery, ExistsQuery, MatchQuery, MultiMatchQuery, QueryStringQuery,
    RangeQuery, RegexpQuery, TermsQuery,
};
pub use query_string::parse;
pub use runtime::runtime_mappings;
pub use types::*;
