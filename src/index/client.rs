//! Search index client interface and an in-memory implementation
//!
//! Resources are searched through an alias named after the resource. Reindexing
//! builds a fresh index and then points the alias at it.

use crate::config::SearchSettings;
use crate::error::KarpError;
use crate::models::{
    FieldValueCount, IndexEntry, SearchHit, SearchRequest, SearchResult, SortField, SortOrder,
};
use crate::query::accessor::FieldAccessor;
use crate::query::context::{QueryContext, RegexCache};
use crate::schema::{create_index_mapping, IndexMapping, ResourceConfig, RAW_SUBFIELD};
use crate::tokenizer::Tokenizer;
use crate::Result;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Operations the indexing and query services need from a search backend
pub trait SearchIndexClient: Send + Sync {
    /// Create an empty index for a resource and return its name
    fn create_index(&self, resource_id: &str, config: &ResourceConfig) -> Result<String>;

    /// Point `alias` at `index_name`
    fn publish_index(&self, alias: &str, index_name: &str) -> Result<()>;

    /// Upsert documents into an index or alias
    fn add_entries(&self, index: &str, entries: &[IndexEntry]) -> Result<()>;

    fn delete_entry(&self, index: &str, entry_id: &str) -> Result<()>;

    fn search(&self, request: &SearchRequest) -> Result<SearchResult>;

    /// Mapping of the index behind an alias or index name
    fn mapping(&self, index: &str) -> Option<IndexMapping>;
}

struct StoredIndex {
    mapping: IndexMapping,
    documents: IndexMap<String, Map<String, Value>>,
}

#[derive(Default)]
struct IndexState {
    indices: HashMap<String, StoredIndex>,
    aliases: HashMap<String, String>,
    created: u64,
}

impl IndexState {
    fn resolve<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        match self.aliases.get(name) {
            Some(index) => Some(index.as_str()),
            None if self.indices.contains_key(name) => Some(name),
            None => None,
        }
    }

    fn index_mut(&mut self, name: &str) -> Result<&mut StoredIndex> {
        let resolved = self
            .resolve(name)
            .map(str::to_string)
            .ok_or_else(|| KarpError::IndexError(format!("no index or alias '{}'", name)))?;
        self.indices
            .get_mut(&resolved)
            .ok_or_else(|| KarpError::IndexError(format!("no index '{}'", resolved)))
    }
}

/// Search index kept in memory
///
/// Documents are evaluated with [`CompiledQuery::matches`](crate::query::CompiledQuery::matches)
/// and returned in insertion order.
pub struct InMemorySearchIndex {
    tokenizer: Tokenizer,
    length_suffix: String,
    virtual_prefix: String,
    state: RwLock<IndexState>,
}

impl Default for InMemorySearchIndex {
    fn default() -> Self {
        Self::new(&SearchSettings::default(), "v_")
    }
}

impl InMemorySearchIndex {
    pub fn new(settings: &SearchSettings, virtual_prefix: impl Into<String>) -> Self {
        Self {
            tokenizer: Tokenizer::new(&settings.tokenizer),
            length_suffix: settings.length_suffix.clone(),
            virtual_prefix: virtual_prefix.into(),
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Index an alias currently points at
    pub fn resolve_alias(&self, alias: &str) -> Option<String> {
        self.state.read().aliases.get(alias).cloned()
    }

    /// Stored document by id, through an alias or index name
    pub fn document(&self, index: &str, id: &str) -> Option<Map<String, Value>> {
        let state = self.state.read();
        let resolved = state.resolve(index)?;
        state.indices.get(resolved)?.documents.get(id).cloned()
    }

    /// Number of documents behind an alias or index name
    pub fn document_count(&self, index: &str) -> usize {
        let state = self.state.read();
        state
            .resolve(index)
            .and_then(|resolved| state.indices.get(resolved))
            .map_or(0, |stored| stored.documents.len())
    }

    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().indices.keys().cloned().collect();
        names.sort();
        names
    }
}

impl SearchIndexClient for InMemorySearchIndex {
    fn create_index(&self, resource_id: &str, config: &ResourceConfig) -> Result<String> {
        let mut state = self.state.write();
        state.created += 1;
        let name = format!("{}_{}", resource_id, state.created);
        let mapping = create_index_mapping(config, &self.virtual_prefix);
        debug!(index = %name, fields = mapping.len(), "Creating index");
        state.indices.insert(
            name.clone(),
            StoredIndex {
                mapping,
                documents: IndexMap::new(),
            },
        );
        Ok(name)
    }

    fn publish_index(&self, alias: &str, index_name: &str) -> Result<()> {
        let mut state = self.state.write();
        if !state.indices.contains_key(index_name) {
            return Err(KarpError::IndexError(format!(
                "can't publish missing index '{}'",
                index_name
            )));
        }
        let previous = state.aliases.insert(alias.to_string(), index_name.to_string());
        if let Some(previous) = previous.filter(|previous| previous != index_name) {
            state.indices.remove(&previous);
            debug!(alias, index = %previous, "Dropped unpublished index");
        }
        info!(alias, index = index_name, "Published index");
        Ok(())
    }

    fn add_entries(&self, index: &str, entries: &[IndexEntry]) -> Result<()> {
        let mut state = self.state.write();
        let stored = state.index_mut(index)?;
        for entry in entries {
            stored.documents.insert(entry.id.clone(), entry.to_document());
        }
        debug!(index, count = entries.len(), "Added entries");
        Ok(())
    }

    fn delete_entry(&self, index: &str, entry_id: &str) -> Result<()> {
        let mut state = self.state.write();
        let removed = state.index_mut(index)?.documents.shift_remove(entry_id);
        debug!(index, entry_id, found = removed.is_some(), "Deleted entry");
        Ok(())
    }

    fn search(&self, request: &SearchRequest) -> Result<SearchResult> {
        let state = self.state.read();
        let regex_cache: RegexCache = Arc::new(RwLock::new(HashMap::new()));
        let mut result = SearchResult::default();
        let mut matched = Vec::new();

        for name in &request.indices {
            let stored = state
                .resolve(name)
                .and_then(|resolved| state.indices.get(resolved))
                .ok_or_else(|| KarpError::IndexError(format!("no index or alias '{}'", name)))?;

            let mut count = 0;
            for (id, document) in &stored.documents {
                let is_match = match &request.query {
                    Some(query) => {
                        let ctx = QueryContext::new(document, &self.tokenizer)
                            .with_id(id)
                            .with_regex_cache(Arc::clone(&regex_cache))
                            .with_length_suffix(self.length_suffix.as_str());
                        query.matches(&ctx)
                    }
                    None => true,
                };
                if is_match {
                    count += 1;
                    matched.push(Matched {
                        index: name,
                        mapping: &stored.mapping,
                        id,
                        document,
                    });
                }
            }
            result.counts.insert(name.clone(), count);
        }

        if let Some(field) = &request.terms_aggregation {
            result.field_values = count_field_values(&matched, field);
        }
        if !request.sort.is_empty() {
            matched.sort_by(|a, b| compare_hits(a, b, &request.sort));
        }

        result.total = matched.len();
        result.hits = matched
            .into_iter()
            .skip(request.from)
            .take(request.size)
            .map(|hit| SearchHit {
                index: hit.index.clone(),
                id: hit.id.clone(),
                document: hit.document.clone(),
            })
            .collect();
        Ok(result)
    }

    fn mapping(&self, index: &str) -> Option<IndexMapping> {
        let state = self.state.read();
        let resolved = state.resolve(index)?;
        state.indices.get(resolved).map(|stored| stored.mapping.clone())
    }
}

struct Matched<'a> {
    index: &'a String,
    mapping: &'a IndexMapping,
    id: &'a String,
    document: &'a Map<String, Value>,
}

/// Whole values of a field, reading `<field>.raw` from the analyzed field itself
fn keyword_values<'a>(hit: &Matched<'a>, field: &str) -> Vec<&'a Value> {
    let raw_suffix = format!(".{}", RAW_SUBFIELD);
    let path = match field.strip_suffix(raw_suffix.as_str()) {
        Some(base) if hit.mapping.field(base).is_some_and(|m| m.has_raw_subfield()) => base,
        _ => field,
    };
    hit.document.field_values(path)
}

/// Numbers before strings before booleans, each in natural order
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Number(_) => 0,
            Value::String(_) => 1,
            Value::Bool(_) => 2,
            _ => 3,
        }
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Documents without a value sort last in either order. Multi-valued fields sort
/// by their smallest value ascending and their largest descending.
fn compare_hits(a: &Matched, b: &Matched, sort: &[SortField]) -> Ordering {
    for key in sort {
        let ordering = match (sort_value(a, key), sort_value(b, key)) {
            (Some(x), Some(y)) => match key.order {
                SortOrder::Asc => compare_values(x, y),
                SortOrder::Desc => compare_values(y, x),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn sort_value<'a>(hit: &Matched<'a>, key: &SortField) -> Option<&'a Value> {
    let values = keyword_values(hit, &key.field).into_iter();
    match key.order {
        SortOrder::Asc => values.min_by(|x, y| compare_values(x, y)),
        SortOrder::Desc => values.max_by(|x, y| compare_values(x, y)),
    }
}

/// Document count per distinct value, most frequent first and ties by value
fn count_field_values(matched: &[Matched], field: &str) -> Vec<FieldValueCount> {
    let mut counts: Vec<FieldValueCount> = Vec::new();
    for hit in matched {
        let mut seen: Vec<&Value> = Vec::new();
        for value in keyword_values(hit, field) {
            if seen.contains(&value) {
                continue;
            }
            seen.push(value);
            match counts.iter_mut().find(|bucket| bucket.value == *value) {
                Some(bucket) => bucket.count += 1,
                None => counts.push(FieldValueCount {
                    value: value.clone(),
                    count: 1,
                }),
            }
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| compare_values(&a.value, &b.value)));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{compile, TermsQuery};
    use serde_json::json;

    fn entry(id: &str, value: Value) -> IndexEntry {
        let mut entry = IndexEntry::new(id);
        if let Value::Object(map) = value {
            entry.entry = map;
        }
        entry
    }

    fn index_with(entries: &[IndexEntry]) -> InMemorySearchIndex {
        let index = InMemorySearchIndex::default();
        let name = index.create_index("places", &ResourceConfig::default()).unwrap();
        index.add_entries(&name, entries).unwrap();
        index.publish_index("places", &name).unwrap();
        index
    }

    fn search(index: &InMemorySearchIndex, q: &str) -> Vec<String> {
        let (query, _) = compile(q).unwrap();
        let request = SearchRequest {
            indices: vec!["places".into()],
            query: Some(query),
            size: 100,
            ..SearchRequest::default()
        };
        index
            .search(&request)
            .unwrap()
            .hits
            .into_iter()
            .map(|hit| hit.id)
            .collect()
    }

    #[test]
    fn test_search_through_alias() {
        let index = index_with(&[
            entry("1", json!({"name": "Grund test", "area": 30000})),
            entry("2", json!({"name": "Hambo", "area": 50000})),
        ]);
        assert_eq!(search(&index, "equals|name|grund"), vec!["1"]);
        assert_eq!(search(&index, "gt|area|40000"), vec!["2"]);
        assert_eq!(search(&index, "freetext|hambo"), vec!["2"]);
    }

    #[test]
    fn test_paging_and_counts() {
        let index = index_with(&[
            entry("1", json!({"n": 1})),
            entry("2", json!({"n": 2})),
            entry("3", json!({"n": 3})),
        ]);
        let request = SearchRequest {
            indices: vec!["places".into()],
            from: 1,
            size: 1,
            ..SearchRequest::default()
        };
        let result = index.search(&request).unwrap();
        assert_eq!(result.total, 3);
        assert_eq!(result.counts["places"], 3);
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].id, "2");
        assert_eq!(result.hits[0].index, "places");
    }

    #[test]
    fn test_publish_swaps_alias() {
        let index = index_with(&[entry("1", json!({"n": 1}))]);
        let first = index.resolve_alias("places").unwrap();

        let second = index.create_index("places", &ResourceConfig::default()).unwrap();
        assert_ne!(first, second);
        index.publish_index("places", &second).unwrap();

        assert_eq!(index.resolve_alias("places"), Some(second.clone()));
        assert_eq!(index.document_count("places"), 0);
        assert_eq!(index.index_names(), vec![second]);
        assert!(index.publish_index("places", "missing").is_err());
    }

    #[test]
    fn test_upsert_and_delete() {
        let index = index_with(&[entry("1", json!({"n": 1}))]);
        index
            .add_entries("places", &[entry("1", json!({"n": 5}))])
            .unwrap();
        assert_eq!(index.document("places", "1").unwrap()["n"], json!(5));

        index.delete_entry("places", "1").unwrap();
        assert!(index.document("places", "1").is_none());
        assert!(index.delete_entry("places", "1").is_ok());
        assert!(index.add_entries("nowhere", &[]).is_err());
    }

    fn named_index(entries: &[IndexEntry]) -> InMemorySearchIndex {
        let config = ResourceConfig::from_json(json!({
            "resource_id": "places",
            "fields": {
                "code": {"type": "number"},
                "name": {"type": "string"},
                "municipality": {"type": "number", "collection": true}
            },
            "id": "code"
        }))
        .unwrap();
        let index = InMemorySearchIndex::default();
        let name = index.create_index("places", &config).unwrap();
        index.add_entries(&name, entries).unwrap();
        index.publish_index("places", &name).unwrap();
        index
    }

    fn places() -> Vec<IndexEntry> {
        vec![
            entry("1", json!({"code": 1, "name": "Hambo", "municipality": [2, 3]})),
            entry("2", json!({"code": 2, "name": "Alvik", "municipality": [3]})),
            entry("3", json!({"code": 3, "municipality": [1]})),
            entry("4", json!({"code": 4, "name": "Bjurvik", "municipality": [3, 3]})),
        ]
    }

    fn sorted(index: &InMemorySearchIndex, sort: Vec<SortField>) -> Vec<String> {
        let request = SearchRequest {
            indices: vec!["places".into()],
            size: 10,
            sort,
            ..SearchRequest::default()
        };
        index
            .search(&request)
            .unwrap()
            .hits
            .into_iter()
            .map(|hit| hit.id)
            .collect()
    }

    #[test]
    fn test_sort() {
        let index = named_index(&places());
        assert_eq!(
            sorted(&index, vec![SortField::new("name.raw", SortOrder::Asc)]),
            vec!["2", "4", "1", "3"]
        );
        assert_eq!(
            sorted(&index, vec![SortField::new("name.raw", SortOrder::Desc)]),
            vec!["1", "4", "2", "3"]
        );
        assert_eq!(
            sorted(
                &index,
                vec![
                    SortField::new("municipality", SortOrder::Desc),
                    SortField::new("code", SortOrder::Desc),
                ]
            ),
            vec!["4", "2", "1", "3"]
        );
        assert_eq!(
            sorted(&index, vec![SortField::new("municipality", SortOrder::Asc)]),
            vec!["3", "1", "2", "4"]
        );
    }

    #[test]
    fn test_terms_aggregation() {
        let index = named_index(&places());
        let request = SearchRequest {
            indices: vec!["places".into()],
            terms_aggregation: Some("municipality".into()),
            ..SearchRequest::default()
        };
        let result = index.search(&request).unwrap();
        assert!(result.hits.is_empty());
        assert_eq!(result.total, 4);
        assert_eq!(
            result.field_values,
            vec![
                FieldValueCount { value: json!(3), count: 3 },
                FieldValueCount { value: json!(1), count: 1 },
                FieldValueCount { value: json!(2), count: 1 },
            ]
        );

        let request = SearchRequest {
            terms_aggregation: Some("name.raw".into()),
            ..request
        };
        let buckets = index.search(&request).unwrap().field_values;
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0], FieldValueCount { value: json!("Alvik"), count: 1 });
    }

    #[test]
    fn test_terms_on_id() {
        let index = named_index(&places());
        let request = SearchRequest {
            indices: vec!["places".into()],
            query: Some(TermsQuery::ids(["4", "2", "9"]).into()),
            size: 10,
            ..SearchRequest::default()
        };
        let result = index.search(&request).unwrap();
        assert_eq!(result.total, 2);
        let ids: Vec<&str> = result.hits.iter().map(|hit| hit.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "4"]);
    }

    #[test]
    fn test_regexps_compile_per_search() {
        let index = named_index(&places());
        assert_eq!(search(&index, "regexp|name|.*vik"), vec!["2", "4"]);
        assert_eq!(search(&index, "regexp|name|ham.*"), vec!["1"]);
        assert_eq!(search(&index, "regexp|name|.*vik"), vec!["2", "4"]);
        assert_eq!(search(&index, "contains|name|>"), Vec::<String>::new());
    }

    #[test]
    fn test_mapping_through_alias() {
        let index = named_index(&places());
        let mapping = index.mapping("places").unwrap();
        assert_eq!(mapping.keyword_field("name").as_deref(), Some("name.raw"));
        assert!(index.mapping("nowhere").is_none());
    }

    #[test]
    fn test_unknown_index_in_search() {
        let index = InMemorySearchIndex::default();
        let request = SearchRequest {
            indices: vec!["nowhere".into()],
            ..SearchRequest::default()
        };
        assert!(matches!(
            index.search(&request),
            Err(KarpError::IndexError(_))
        ));
    }
}
