//! Back-reference updates
//!
//! Index documents embed data from the entries they reference. When an entry
//! changes, every document that refers to it through a `ref` field or a
//! `multi_ref` virtual field is transformed again and re-indexed.
//!
//! References are found by scanning every resource config per update batch.

use super::client::SearchIndexClient;
use super::transform::IndexTransformer;
use crate::models::{Entry, Resource};
use crate::repository::field_matches;
use crate::schema::FunctionSpec;
use crate::Result;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// How a referencing field points at the changed resource
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    /// The field holds entry ids
    Ref,
    /// A virtual field collecting entries whose `target_field` matches the
    /// referrer's `self_fields`
    MultiRef {
        target_field: String,
        self_fields: Vec<String>,
    },
}

/// A field of `resource` that refers to another resource
#[derive(Clone, Debug)]
pub struct BackReference {
    pub resource: Arc<Resource>,
    pub field_name: String,
    pub kind: ReferenceKind,
}

/// Re-indexes documents that embed changed entries
pub struct ReferenceUpdater {
    transformer: IndexTransformer,
    index: Arc<dyn SearchIndexClient>,
}

impl ReferenceUpdater {
    pub fn new(transformer: IndexTransformer, index: Arc<dyn SearchIndexClient>) -> Self {
        Self { transformer, index }
    }

    /// Every field of every resource that refers to `changed`
    pub fn find_back_references(&self, changed: &Resource) -> Result<Vec<BackReference>> {
        let mut back_references = Vec::new();
        for referrer in self.transformer.resources().resources()? {
            for (name, field) in &referrer.config.fields {
                let kind = if let Some(reference) = &field.reference {
                    changed
                        .is_target_of(
                            reference.resource_id.as_deref(),
                            reference.resource_version,
                            &referrer,
                        )
                        .then_some(ReferenceKind::Ref)
                } else if field.is_virtual {
                    match field.function.as_ref().map(FunctionSpec::try_from) {
                        Some(Ok(FunctionSpec::MultiRef(multi_ref)))
                            if changed.is_target_of(
                                multi_ref.resource_id.as_deref(),
                                multi_ref.resource_version,
                                &referrer,
                            ) =>
                        {
                            Some(ReferenceKind::MultiRef {
                                target_field: multi_ref.field,
                                self_fields: multi_ref.self_fields,
                            })
                        }
                        _ => None,
                    }
                } else {
                    None
                };

                if let Some(kind) = kind {
                    debug!(
                        changed = %changed.resource_id,
                        referrer = %referrer.resource_id,
                        field = %name,
                        ?kind,
                        "Found back reference"
                    );
                    back_references.push(BackReference {
                        resource: Arc::clone(&referrer),
                        field_name: name.clone(),
                        kind,
                    });
                }
            }
        }
        Ok(back_references)
    }

    /// Re-index the documents that refer to any of `entries` of `changed`
    ///
    /// Documents are pushed to each referring resource's alias in one batch per
    /// resource. Nothing is rolled back if a later batch fails.
    pub fn update_references(&self, changed: &Resource, entries: &[Entry]) -> Result<()> {
        let back_references = self.find_back_references(changed)?;
        if back_references.is_empty() || entries.is_empty() {
            return Ok(());
        }

        let mut affected: IndexMap<String, (Arc<Resource>, IndexMap<String, Entry>)> =
            IndexMap::new();
        for entry in entries {
            for back_reference in &back_references {
                let found = self.affected_entries(back_reference, entry)?;
                let (_, batch) = affected
                    .entry(back_reference.resource.resource_id.clone())
                    .or_insert_with(|| (Arc::clone(&back_reference.resource), IndexMap::new()));
                for referrer_entry in found {
                    batch.insert(referrer_entry.entry_id.clone(), referrer_entry);
                }
            }
        }

        for (resource_id, (resource, batch)) in affected {
            if batch.is_empty() {
                continue;
            }
            let documents = batch
                .values()
                .map(|entry| self.transformer.transform_to_index_entry(&resource, entry))
                .collect::<Result<Vec<_>>>()?;
            info!(
                changed = %changed.resource_id,
                resource_id = %resource_id,
                count = documents.len(),
                "Updating referring entries"
            );
            self.index.add_entries(&resource_id, &documents)?;
        }
        Ok(())
    }

    /// Entries of the referring resource that embed `changed_entry`
    fn affected_entries(
        &self,
        back_reference: &BackReference,
        changed_entry: &Entry,
    ) -> Result<Vec<Entry>> {
        let referrer = &back_reference.resource;
        match &back_reference.kind {
            ReferenceKind::Ref => lookup(
                referrer,
                &back_reference.field_name,
                Value::String(changed_entry.entry_id.clone()),
            ),
            ReferenceKind::MultiRef {
                target_field,
                self_fields,
            } => {
                let wanted = match changed_entry.body.get(target_field) {
                    Some(value) if !value.is_null() => value.clone(),
                    _ => return Ok(Vec::new()),
                };
                let mut found = Vec::new();
                for self_field in self_fields {
                    for entry in lookup(referrer, self_field, wanted.clone())? {
                        if !found.iter().any(|e: &Entry| e.entry_id == entry.entry_id) {
                            found.push(entry);
                        }
                    }
                }
                Ok(found)
            }
        }
    }
}

/// Live entries of `resource` whose `field` matches `wanted`
///
/// Uses the repository's referenceable lookup when it can, a full scan otherwise.
fn lookup(resource: &Resource, field: &str, wanted: Value) -> Result<Vec<Entry>> {
    if resource.config.is_referenceable(field) {
        let mut filters = Map::new();
        filters.insert(field.to_string(), wanted);
        return resource.entry_repository.find_by_referenceable_fields(&filters);
    }
    Ok(resource
        .entry_repository
        .all_entries()?
        .into_iter()
        .filter(|entry| field_matches(entry, field, &wanted))
        .collect())
}
