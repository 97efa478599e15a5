//! Invariant checking for indexed resources
//!
//! Each invariant compares what the entry repositories hold with what the
//! search index holds after a sequence of changes.

use super::TestEnv;
use crate::models::QueryRequest;
use crate::repository::ResourceRepository;
use std::collections::HashMap;
use std::fmt;

/// A violation of an invariant
#[derive(Debug, Clone)]
pub struct Violation {
    pub invariant: String,
    pub description: String,
    pub context: HashMap<String, String>,
}

impl Violation {
    fn new(invariant: &str, description: impl Into<String>) -> Self {
        Self {
            invariant: invariant.to_string(),
            description: description.into(),
            context: HashMap::new(),
        }
    }

    fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.context.insert(key.to_string(), value.to_string());
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "INVARIANT VIOLATION: {}", self.invariant)?;
        writeln!(f, "  Description: {}", self.description)?;
        if !self.context.is_empty() {
            writeln!(f, "  Context:")?;
            let mut keys: Vec<_> = self.context.keys().collect();
            keys.sort();
            for key in keys {
                writeln!(f, "    {}: {}", key, self.context[key])?;
            }
        }
        Ok(())
    }
}

/// Trait for invariant checkers
pub trait Invariant: Send + Sync {
    /// Name of the invariant
    fn name(&self) -> &str;

    /// Check the invariant against an environment
    fn check(&self, env: &TestEnv) -> Result<(), Violation>;

    /// Human-readable description
    fn description(&self) -> &str {
        "No description provided"
    }
}

/// Check all invariants and return violations
pub fn check_all_invariants(env: &TestEnv, invariants: &[Box<dyn Invariant>]) -> Vec<Violation> {
    invariants
        .iter()
        .filter_map(|invariant| invariant.check(env).err())
        .collect()
}

/// Default set of invariants
pub fn default_invariants() -> Vec<Box<dyn Invariant>> {
    vec![
        Box::new(LiveEntriesIndexed),
        Box::new(DocumentsMatchTransform),
        Box::new(SearchCountsDocuments),
    ]
}

/// Invariant: the index holds exactly the live entries of each resource
pub struct LiveEntriesIndexed;

impl Invariant for LiveEntriesIndexed {
    fn name(&self) -> &str {
        "LiveEntriesIndexed"
    }

    fn description(&self) -> &str {
        "Every live entry has a document and no other documents exist"
    }

    fn check(&self, env: &TestEnv) -> Result<(), Violation> {
        let resources = env
            .resources
            .resources()
            .map_err(|e| Violation::new(self.name(), e.to_string()))?;

        for resource in resources {
            let entries = resource
                .entry_repository
                .all_entries()
                .map_err(|e| Violation::new(self.name(), e.to_string()))?;

            let missing: Vec<_> = entries
                .iter()
                .filter(|entry| env.document(&resource.resource_id, &entry.entry_id).is_none())
                .map(|entry| entry.entry_id.clone())
                .collect();
            if !missing.is_empty() {
                return Err(Violation::new(
                    self.name(),
                    format!("{} live entries have no document", missing.len()),
                )
                .with("resource_id", &resource.resource_id)
                .with("missing", format!("{:?}", missing)));
            }

            let indexed = env.index.document_count(&resource.resource_id);
            if indexed != entries.len() {
                return Err(Violation::new(
                    self.name(),
                    "index holds documents of discarded or unknown entries",
                )
                .with("resource_id", &resource.resource_id)
                .with("live", entries.len())
                .with("indexed", indexed));
            }
        }
        Ok(())
    }
}

/// Invariant: stored documents equal a fresh transform of their entries
///
/// Fails when a referenced entry changed and the referring documents were not
/// updated.
pub struct DocumentsMatchTransform;

impl Invariant for DocumentsMatchTransform {
    fn name(&self) -> &str {
        "DocumentsMatchTransform"
    }

    fn description(&self) -> &str {
        "Every document equals the transform of its entry against current data"
    }

    fn check(&self, env: &TestEnv) -> Result<(), Violation> {
        let transformer = env.service.transformer();
        let resources = env
            .resources
            .resources()
            .map_err(|e| Violation::new(self.name(), e.to_string()))?;

        for resource in resources {
            let entries = resource
                .entry_repository
                .all_entries()
                .map_err(|e| Violation::new(self.name(), e.to_string()))?;
            for entry in entries {
                let expected = transformer
                    .transform_to_index_entry(&resource, &entry)
                    .map_err(|e| {
                        Violation::new(self.name(), e.to_string())
                            .with("entry_id", &entry.entry_id)
                    })?
                    .to_document();
                let stored = env.document(&resource.resource_id, &entry.entry_id);
                if stored.as_ref() != Some(&expected) {
                    return Err(Violation::new(self.name(), "stale index document")
                        .with("resource_id", &resource.resource_id)
                        .with("entry_id", &entry.entry_id)
                        .with("expected", serde_json::Value::Object(expected))
                        .with("stored", format!("{:?}", stored)));
                }
            }
        }
        Ok(())
    }
}

/// Invariant: an unfiltered search reports every document of a resource
pub struct SearchCountsDocuments;

impl Invariant for SearchCountsDocuments {
    fn name(&self) -> &str {
        "SearchCountsDocuments"
    }

    fn description(&self) -> &str {
        "A search without a query counts every indexed document"
    }

    fn check(&self, env: &TestEnv) -> Result<(), Violation> {
        let resources = env
            .resources
            .resources()
            .map_err(|e| Violation::new(self.name(), e.to_string()))?;

        for resource in resources {
            let response = env
                .query
                .search(&QueryRequest::new([resource.resource_id.as_str()]))
                .map_err(|e| Violation::new(self.name(), e.to_string()))?;
            let indexed = env.index.document_count(&resource.resource_id);
            let counted = response
                .distribution
                .as_ref()
                .and_then(|d| d.get(&resource.resource_id).copied());
            if response.total != indexed || counted != Some(indexed) {
                return Err(Violation::new(self.name(), "search total differs from index")
                    .with("resource_id", &resource.resource_id)
                    .with("total", response.total)
                    .with("indexed", indexed));
            }
        }
        Ok(())
    }
}
