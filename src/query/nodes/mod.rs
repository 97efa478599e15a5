//! Compiled query clauses
//!
//! A `CompiledQuery` is the search-engine-native form of a parsed query. It renders
//! to the Elasticsearch query DSL with [`CompiledQuery::to_dsl`] and can also be
//! evaluated directly against an index document with [`CompiledQuery::matches`].

mod bool_query;
mod exists_query;
mod match_query;
mod range_query;
mod regexp_query;
mod terms_query;

pub use bool_query::BoolQuery;
pub use exists_query::ExistsQuery;
pub use match_query::{MatchQuery, MultiMatchQuery};
pub use range_query::RangeQuery;
pub use regexp_query::{QueryStringQuery, RegexpQuery};
pub use terms_query::{TermsQuery, ID_FIELD};

use crate::query::context::QueryContext;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// A compiled query clause tree
#[derive(Clone, Debug, PartialEq)]
pub enum CompiledQuery {
    Match(MatchQuery),
    MultiMatch(MultiMatchQuery),
    Regexp(RegexpQuery),
    QueryString(QueryStringQuery),
    Range(RangeQuery),
    Exists(ExistsQuery),
    Terms(TermsQuery),
    Bool(BoolQuery),
}

impl CompiledQuery {
    /// Get the query type name for debugging and logging
    pub fn query_type(&self) -> &'static str {
        match self {
            CompiledQuery::Match(_) => "match",
            CompiledQuery::MultiMatch(_) => "multi_match",
            CompiledQuery::Regexp(_) => "regexp",
            CompiledQuery::QueryString(_) => "query_string",
            CompiledQuery::Range(_) => "range",
            CompiledQuery::Exists(_) => "exists",
            CompiledQuery::Terms(_) => "terms",
            CompiledQuery::Bool(_) => "bool",
        }
    }

    /// Render as Elasticsearch query DSL
    pub fn to_dsl(&self) -> Value {
        match self {
            CompiledQuery::Match(q) => q.to_dsl(),
            CompiledQuery::MultiMatch(q) => q.to_dsl(),
            CompiledQuery::Regexp(q) => q.to_dsl(),
            CompiledQuery::QueryString(q) => q.to_dsl(),
            CompiledQuery::Range(q) => q.to_dsl(),
            CompiledQuery::Exists(q) => q.to_dsl(),
            CompiledQuery::Terms(q) => q.to_dsl(),
            CompiledQuery::Bool(q) => q.to_dsl(),
        }
    }

    /// Evaluate against the document in `ctx`
    pub fn matches(&self, ctx: &QueryContext) -> bool {
        match self {
            CompiledQuery::Match(q) => q.matches(ctx),
            CompiledQuery::MultiMatch(q) => q.matches(ctx),
            CompiledQuery::Regexp(q) => q.matches(ctx),
            CompiledQuery::QueryString(q) => q.matches(ctx),
            CompiledQuery::Range(q) => q.matches(ctx),
            CompiledQuery::Exists(q) => q.matches(ctx),
            CompiledQuery::Terms(q) => q.matches(ctx),
            CompiledQuery::Bool(q) => q.matches(ctx),
        }
    }

    /// Conjunction of two clauses
    ///
    /// Bool clauses without `should` are merged rather than nested.
    pub fn and(self, other: CompiledQuery) -> CompiledQuery {
        match (self, other) {
            (CompiledQuery::Bool(mut left), CompiledQuery::Bool(right))
                if left.is_conjunction() && right.is_conjunction() =>
            {
                left.must.extend(right.must);
                left.must_not.extend(right.must_not);
                CompiledQuery::Bool(left)
            }
            (CompiledQuery::Bool(mut left), right) if left.is_conjunction() => {
                left.must.push(right);
                CompiledQuery::Bool(left)
            }
            (left, CompiledQuery::Bool(mut right)) if right.is_conjunction() => {
                right.must.insert(0, left);
                CompiledQuery::Bool(right)
            }
            (left, right) => BoolQuery::new().must(left).must(right).into(),
        }
    }

    /// Disjunction of two clauses
    ///
    /// Bool clauses holding only `should` are merged rather than nested.
    pub fn or(self, other: CompiledQuery) -> CompiledQuery {
        match (self, other) {
            (CompiledQuery::Bool(mut left), CompiledQuery::Bool(right))
                if left.is_disjunction() && right.is_disjunction() =>
            {
                left.should.extend(right.should);
                CompiledQuery::Bool(left)
            }
            (CompiledQuery::Bool(mut left), right) if left.is_disjunction() => {
                left.should.push(right);
                CompiledQuery::Bool(left)
            }
            (left, CompiledQuery::Bool(mut right)) if right.is_disjunction() => {
                right.should.insert(0, left);
                CompiledQuery::Bool(right)
            }
            (left, right) => BoolQuery::new().should(left).should(right).into(),
        }
    }

    /// Negation of all given clauses
    pub fn none_of(clauses: Vec<CompiledQuery>) -> CompiledQuery {
        CompiledQuery::Bool(BoolQuery {
            must_not: clauses,
            ..BoolQuery::default()
        })
    }
}

impl Serialize for CompiledQuery {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_dsl().serialize(serializer)
    }
}

macro_rules! impl_from_clause {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for CompiledQuery {
                fn from(query: $ty) -> Self {
                    CompiledQuery::$variant(query)
                }
            }
        )*
    };
}

impl_from_clause!(
    Match(MatchQuery),
    MultiMatch(MultiMatchQuery),
    Regexp(RegexpQuery),
    QueryString(QueryStringQuery),
    Range(RangeQuery),
    Exists(ExistsQuery),
    Terms(TermsQuery),
    Bool(BoolQuery),
);
