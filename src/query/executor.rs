//! Query service for running resource queries against the index
//!
//! A query string is parsed, compiled and checked completely before the index is
//! called. A query that fails to compile never reaches the index.

use crate::config::SearchSettings;
use crate::error::KarpError;
use crate::index::SearchIndexClient;
use crate::models::index_entry::timestamp_seconds;
use crate::models::{
    EntryHit, FieldValueCount, IndexEntry, QueryRequest, SearchHit, SearchRequest,
    SearchResponse, SortField, SortOrder, SplitResponse,
};
use crate::query::builder::compile;
use crate::query::nodes::{CompiledQuery, TermsQuery};
use crate::query::runtime::runtime_mappings;
use crate::schema::{IndexMapping, RAW_SUBFIELD};
use crate::Result;
use indexmap::IndexMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Runs [`QueryRequest`]s through a search index client
pub struct QueryService {
    index: Arc<dyn SearchIndexClient>,
    settings: SearchSettings,
}

impl QueryService {
    pub fn new(index: Arc<dyn SearchIndexClient>, settings: SearchSettings) -> Self {
        Self { index, settings }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Search the requested resources
    ///
    /// `size` defaults to the configured default and is capped at the configured
    /// maximum, which also bounds `from + size`.
    pub fn search(&self, request: &QueryRequest) -> Result<SearchResponse> {
        let (query, fields) = self.compile_query(request)?;
        let (from, size) = self.page(request);
        info!(
            resources = ?request.resources,
            q = request.q.as_deref().unwrap_or(""),
            from,
            size,
            "Searching"
        );

        let search = self.build_search(request, &request.resources, query, &fields)?;
        let result = self.index.search(&search)?;
        Ok(SearchResponse {
            total: result.total,
            hits: result.hits.into_iter().map(entry_hit).collect(),
            distribution: request.lexicon_stats.then_some(result.counts),
        })
    }

    /// Search each requested resource on its own, paging every resource separately
    pub fn query_split(&self, request: &QueryRequest) -> Result<SplitResponse> {
        let (query, fields) = self.compile_query(request)?;
        info!(
            resources = ?request.resources,
            q = request.q.as_deref().unwrap_or(""),
            "Searching per resource"
        );

        let mut response = SplitResponse::default();
        for resource_id in &request.resources {
            let search = self.build_search(
                request,
                std::slice::from_ref(resource_id),
                query.clone(),
                &fields,
            )?;
            let result = self.index.search(&search)?;
            response.total += result.total;
            if request.lexicon_stats {
                response
                    .distribution
                    .get_or_insert_with(IndexMap::new)
                    .insert(resource_id.clone(), result.total);
            }
            response.hits.insert(
                resource_id.clone(),
                result.hits.into_iter().map(entry_hit).collect(),
            );
        }
        Ok(response)
    }

    /// Fetch entries of one resource by id, in index order
    pub fn search_ids(&self, resource_id: &str, entry_ids: &[&str]) -> Result<SearchResponse> {
        info!(resource_id, ?entry_ids, "Searching by id");
        let search = SearchRequest {
            indices: vec![resource_id.to_string()],
            query: Some(TermsQuery::ids(entry_ids).into()),
            size: entry_ids.len(),
            ..SearchRequest::default()
        };
        let result = self.index.search(&search)?;
        Ok(SearchResponse {
            total: result.total,
            hits: result.hits.into_iter().map(entry_hit).collect(),
            distribution: None,
        })
    }

    /// Number of entries per value of `field`, most frequent first
    ///
    /// Analyzed fields are counted through their `raw` sub-field.
    pub fn statistics(&self, resource_id: &str, field: &str) -> Result<Vec<FieldValueCount>> {
        let mapping = self.mapping(resource_id)?;
        let field = match mapping.field(field) {
            Some(mapped) if mapped.is_analyzed() => format!("{}.{}", field, RAW_SUBFIELD),
            _ => field.to_string(),
        };
        debug!(resource_id, field = %field, "Counting field values");
        let search = SearchRequest {
            indices: vec![resource_id.to_string()],
            size: 0,
            terms_aggregation: Some(field),
            ..SearchRequest::default()
        };
        Ok(self.index.search(&search)?.field_values)
    }

    fn compile_query(
        &self,
        request: &QueryRequest,
    ) -> Result<(Option<CompiledQuery>, BTreeSet<String>)> {
        match request.q.as_deref().filter(|q| !q.is_empty()) {
            Some(q) => match compile(q) {
                Ok((query, fields)) => Ok((Some(query), fields)),
                Err(err) => {
                    info!(query = q, error = %err, "Rejected query");
                    Err(err)
                }
            },
            None => Ok((None, BTreeSet::new())),
        }
    }

    fn build_search(
        &self,
        request: &QueryRequest,
        resources: &[String],
        query: Option<CompiledQuery>,
        fields: &BTreeSet<String>,
    ) -> Result<SearchRequest> {
        let (from, size) = self.page(request);
        Ok(SearchRequest {
            indices: resources.to_vec(),
            query,
            runtime_mappings: runtime_mappings(fields, &self.settings.length_suffix),
            from,
            size,
            sort: self.sort_fields(request, resources)?,
            terms_aggregation: None,
        })
    }

    /// Index sort keys for `sort`, or for the `sort_dict` entries of `resources`
    fn sort_fields(&self, request: &QueryRequest, resources: &[String]) -> Result<Vec<SortField>> {
        let mut wanted: Vec<(&str, &str)> = Vec::new();
        if !request.sort.is_empty() {
            for value in &request.sort {
                wanted.extend(resources.iter().map(|r| (r.as_str(), value.as_str())));
            }
        } else {
            for (resource_id, values) in &request.sort_dict {
                if resources.contains(resource_id) {
                    wanted.extend(values.iter().map(|v| (resource_id.as_str(), v.as_str())));
                }
            }
        }

        let mut sort: Vec<SortField> = Vec::new();
        for (resource_id, value) in wanted {
            let field = self.translate_sort(resource_id, value)?;
            if !sort.contains(&field) {
                sort.push(field);
            }
        }
        Ok(sort)
    }

    /// `field` or `field|order` as a sort key on a field with whole values
    fn translate_sort(&self, resource_id: &str, value: &str) -> Result<SortField> {
        let (field, order) = match value.split_once('|') {
            Some((field, order)) => (field, order.parse::<SortOrder>()?),
            None => (value, SortOrder::Asc),
        };
        let keyword = self
            .mapping(resource_id)?
            .keyword_field(field)
            .ok_or_else(|| KarpError::UnsupportedField {
                resource_id: resource_id.to_string(),
                field: field.to_string(),
            })?;
        Ok(SortField::new(keyword, order))
    }

    fn mapping(&self, resource_id: &str) -> Result<IndexMapping> {
        self.index
            .mapping(resource_id)
            .ok_or_else(|| KarpError::IndexError(format!("no index or alias '{}'", resource_id)))
    }

    fn page(&self, request: &QueryRequest) -> (usize, usize) {
        let max = self.settings.max_size;
        let size = request.size.unwrap_or(self.settings.default_size).min(max);
        let from = request.from.min(max - size);
        (from, size)
    }
}

fn entry_hit(hit: SearchHit) -> EntryHit {
    let document = IndexEntry::from_document(hit.id, hit.document);
    EntryHit {
        id: document.id,
        version: document.version,
        last_modified: document.last_modified.as_ref().map(timestamp_seconds),
        last_modified_by: document.last_modified_by,
        resource: hit.index,
        entry: document.entry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::InMemorySearchIndex;
    use crate::models::SearchResult;
    use crate::schema::ResourceConfig;
    use parking_lot::Mutex;

    /// Client recording the requests it receives
    #[derive(Default)]
    struct RecordingClient {
        requests: Mutex<Vec<SearchRequest>>,
    }

    impl SearchIndexClient for RecordingClient {
        fn create_index(&self, resource_id: &str, _: &ResourceConfig) -> Result<String> {
            Ok(resource_id.to_string())
        }
        fn publish_index(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
        fn add_entries(&self, _: &str, _: &[IndexEntry]) -> Result<()> {
            Ok(())
        }
        fn delete_entry(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
        fn search(&self, request: &SearchRequest) -> Result<SearchResult> {
            self.requests.lock().push(request.clone());
            Ok(SearchResult::default())
        }
        fn mapping(&self, _: &str) -> Option<IndexMapping> {
            let config = ResourceConfig::from_json(serde_json::json!({
                "fields": {"name": {"type": "string"}, "area": {"type": "number"}}
            }))
            .ok()?;
            Some(crate::schema::create_index_mapping(&config, "v_"))
        }
    }

    fn service(client: Arc<RecordingClient>) -> QueryService {
        QueryService::new(client, SearchSettings::default())
    }

    #[test]
    fn test_parse_error_never_reaches_index() {
        let client = Arc::new(RecordingClient::default());
        let err = service(client.clone())
            .search(&QueryRequest::new(["places"]).with_query("exists|a|b"))
            .unwrap_err();
        assert!(matches!(err, KarpError::Parse { .. }));

        let err = service(client.clone())
            .search(&QueryRequest::new(["places"]).with_query("exists|v_*"))
            .unwrap_err();
        assert!(matches!(err, KarpError::IncompleteQuery { .. }));
        assert!(client.requests.lock().is_empty());
    }

    #[test]
    fn test_request_shape() {
        let client = Arc::new(RecordingClient::default());
        service(client.clone())
            .search(
                &QueryRequest::new(["places", "municipalities"])
                    .with_query("gt|v_smaller_places.length|1")
                    .with_from(20_000)
                    .with_size(100),
            )
            .unwrap();

        let requests = client.requests.lock();
        let request = &requests[0];
        assert_eq!(request.indices, vec!["places", "municipalities"]);
        assert_eq!(request.size, 100);
        assert_eq!(request.from, 9_900);
        assert!(request.runtime_mappings.contains_key("v_smaller_places.length"));
        assert!(request.query.is_some());
    }

    #[test]
    fn test_sort_translation() {
        let client = Arc::new(RecordingClient::default());
        let service = service(client.clone());
        service
            .search(
                &QueryRequest::new(["places", "municipalities"]).with_sort(["name", "area|desc"]),
            )
            .unwrap();
        service
            .search(
                &QueryRequest::new(["places"])
                    .with_resource_sort("places", ["area"])
                    .with_resource_sort("municipalities", ["name"]),
            )
            .unwrap();

        let requests = client.requests.lock();
        assert_eq!(
            requests[0].sort,
            vec![
                SortField::new("name.raw", SortOrder::Asc),
                SortField::new("area", SortOrder::Desc),
            ]
        );
        assert_eq!(requests[1].sort, vec![SortField::new("area", SortOrder::Asc)]);
    }

    #[test]
    fn test_bad_sort_never_reaches_index() {
        let client = Arc::new(RecordingClient::default());
        let service = service(client.clone());
        let err = service
            .search(&QueryRequest::new(["places"]).with_sort(["density"]))
            .unwrap_err();
        assert!(matches!(err, KarpError::UnsupportedField { ref field, .. } if field == "density"));
        let err = service
            .search(&QueryRequest::new(["places"]).with_sort(["name|up"]))
            .unwrap_err();
        assert!(matches!(err, KarpError::InvalidSortOrder(_)));
        assert!(client.requests.lock().is_empty());
    }

    #[test]
    fn test_split_and_id_requests() {
        let client = Arc::new(RecordingClient::default());
        let service = service(client.clone());
        let response = service
            .query_split(&QueryRequest::new(["places", "municipalities"]).with_query("exists|name"))
            .unwrap();
        assert_eq!(response.hits.len(), 2);
        assert_eq!(response.distribution.unwrap()["municipalities"], 0);

        service.search_ids("places", &["3", "4"]).unwrap();
        service.statistics("places", "name").unwrap();
        service.statistics("places", "area").unwrap();

        let requests = client.requests.lock();
        assert_eq!(requests[0].indices, vec!["places"]);
        assert_eq!(requests[1].indices, vec!["municipalities"]);
        assert_eq!(
            requests[2].query.as_ref().unwrap().to_dsl(),
            serde_json::json!({"terms": {"_id": ["3", "4"]}})
        );
        assert_eq!(requests[2].size, 2);
        assert_eq!(requests[3].terms_aggregation.as_deref(), Some("name.raw"));
        assert_eq!(requests[3].size, 0);
        assert_eq!(requests[4].terms_aggregation.as_deref(), Some("area"));
    }

    #[test]
    fn test_default_and_max_size() {
        let client = Arc::new(RecordingClient::default());
        let service = service(client.clone());
        service.search(&QueryRequest::new(["places"])).unwrap();
        service
            .search(&QueryRequest::new(["places"]).with_query("").with_size(50_000))
            .unwrap();

        let requests = client.requests.lock();
        assert_eq!(requests[0].size, 25);
        assert!(requests[0].query.is_none());
        assert_eq!(requests[1].size, 10_000);
        assert_eq!(requests[1].from, 0);
    }

    #[test]
    fn test_hits_from_in_memory_index() {
        let index = Arc::new(InMemorySearchIndex::default());
        let name = index
            .create_index("places", &ResourceConfig::default())
            .unwrap();
        let mut entry = IndexEntry::new("1");
        entry.version = Some(3);
        entry.last_modified_by = Some("karp".into());
        entry.insert("name", serde_json::json!("Hambo"));
        index.add_entries(&name, &[entry]).unwrap();
        index.publish_index("places", &name).unwrap();

        let response = QueryService::new(index, SearchSettings::default())
            .search(&QueryRequest::new(["places"]).with_query("equals|name|hambo"))
            .unwrap();
        assert_eq!(response.total, 1);
        assert_eq!(response.ids(), vec!["1"]);
        let hit = &response.hits[0];
        assert_eq!(hit.resource, "places");
        assert_eq!(hit.version, Some(3));
        assert_eq!(hit.last_modified_by.as_deref(), Some("karp"));
        assert_eq!(hit.entry.len(), 1);
        assert_eq!(response.distribution.as_ref().unwrap()["places"], 1);
    }
}
