use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use std::str::FromStr;

use crate::error::KarpError;
use crate::query::CompiledQuery;

/// Sort direction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = KarpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(KarpError::InvalidSortOrder(other.to_string())),
        }
    }
}

/// Sort key on an index field
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

impl SortField {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    pub fn to_dsl(&self) -> Value {
        let mut sort = Map::new();
        sort.insert(self.field.clone(), json!({"order": self.order.as_str()}));
        Value::Object(sort)
    }
}

/// Request handed to a search index client
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchRequest {
    /// Aliases or index names to search
    pub indices: Vec<String>,
    /// Compiled query, every document matches when absent
    pub query: Option<CompiledQuery>,
    pub runtime_mappings: Map<String, Value>,
    pub from: usize,
    pub size: usize,
    /// Sort keys, index order when empty
    pub sort: Vec<SortField>,
    /// Field whose values are counted over every matching document
    pub terms_aggregation: Option<String>,
}

impl SearchRequest {
    /// Request body in the engine's search API format
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert(
            "query".into(),
            match &self.query {
                Some(query) => query.to_dsl(),
                None => json!({"match_all": {}}),
            },
        );
        if !self.runtime_mappings.is_empty() {
            body.insert(
                "runtime_mappings".into(),
                Value::Object(self.runtime_mappings.clone()),
            );
        }
        body.insert("from".into(), Value::from(self.from));
        body.insert("size".into(), Value::from(self.size));
        if !self.sort.is_empty() {
            body.insert(
                "sort".into(),
                Value::Array(self.sort.iter().map(SortField::to_dsl).collect()),
            );
        }
        if let Some(field) = &self.terms_aggregation {
            body.insert(
                "aggs".into(),
                json!({"field_values": {"terms": {"field": field, "size": i32::MAX}}}),
            );
        }
        Value::Object(body)
    }
}

/// One raw hit returned by a search index client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Alias or index name the hit was found through
    pub index: String,
    pub id: String,
    pub document: Map<String, Value>,
}

/// Number of documents holding one value of an aggregated field
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldValueCount {
    pub value: Value,
    pub count: usize,
}

/// Raw result of a search index client
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub total: usize,
    pub hits: Vec<SearchHit>,
    /// Number of matching documents per searched alias
    pub counts: IndexMap<String, usize>,
    /// Buckets of the terms aggregation, most frequent first
    #[serde(default)]
    pub field_values: Vec<FieldValueCount>,
}

/// Query against one or more resources
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub resources: Vec<String>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub from: usize,
    #[serde(default)]
    pub size: Option<usize>,
    /// Include the number of hits per resource
    #[serde(default = "default_true")]
    pub lexicon_stats: bool,
    /// Sort values (`field` or `field|desc`) applied to every resource
    #[serde(default)]
    pub sort: Vec<String>,
    /// Sort values per resource, used when `sort` is empty
    #[serde(default)]
    pub sort_dict: IndexMap<String, Vec<String>>,
}

fn default_true() -> bool {
    true
}

impl QueryRequest {
    pub fn new<S: Into<String>>(resources: impl IntoIterator<Item = S>) -> Self {
        Self {
            resources: resources.into_iter().map(Into::into).collect(),
            q: None,
            from: 0,
            size: None,
            lexicon_stats: true,
            sort: Vec::new(),
            sort_dict: IndexMap::new(),
        }
    }

    pub fn with_query(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    pub fn with_from(mut self, from: usize) -> Self {
        self.from = from;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn without_stats(mut self) -> Self {
        self.lexicon_stats = false;
        self
    }

    pub fn with_sort<S: Into<String>>(mut self, sort: impl IntoIterator<Item = S>) -> Self {
        self.sort = sort.into_iter().map(Into::into).collect();
        self
    }

    /// Sort values for one resource
    pub fn with_resource_sort<S: Into<String>>(
        mut self,
        resource_id: impl Into<String>,
        sort: impl IntoIterator<Item = S>,
    ) -> Self {
        self.sort_dict
            .insert(resource_id.into(), sort.into_iter().map(Into::into).collect());
        self
    }
}

/// An entry as returned to query callers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntryHit {
    pub id: String,
    pub version: Option<u32>,
    /// Unix time in seconds
    pub last_modified: Option<f64>,
    pub last_modified_by: Option<String>,
    pub resource: String,
    pub entry: Map<String, Value>,
}

/// Result of a resource query
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub total: usize,
    pub hits: Vec<EntryHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<IndexMap<String, usize>>,
}

impl SearchResponse {
    /// Ids of the returned hits in order
    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|hit| hit.id.as_str()).collect()
    }
}

/// Result of a resource query with the hits listed per resource
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitResponse {
    pub total: usize,
    pub hits: IndexMap<String, Vec<EntryHit>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<IndexMap<String, usize>>,
}
