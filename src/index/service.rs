//! Indexing service
//!
//! Keeps a resource's search index in step with its entries: full reindexing
//! behind an alias, single-entry upserts and deletes, and the reference updates
//! those trigger in other resources.

use super::client::SearchIndexClient;
use super::references::ReferenceUpdater;
use super::transform::IndexTransformer;
use crate::config::IndexSettings;
use crate::error::KarpError;
use crate::models::{DomainEvent, Entry, IndexEntry, Resource};
use crate::plugins::PluginRegistry;
use crate::repository::ResourceRepository;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub struct IndexService {
    transformer: IndexTransformer,
    index: Arc<dyn SearchIndexClient>,
    references: ReferenceUpdater,
}

impl IndexService {
    pub fn new(
        resources: Arc<dyn ResourceRepository>,
        index: Arc<dyn SearchIndexClient>,
        plugins: PluginRegistry,
        settings: IndexSettings,
    ) -> Self {
        let transformer = IndexTransformer::new(resources, plugins, settings);
        let references = ReferenceUpdater::new(transformer.clone(), Arc::clone(&index));
        Self {
            transformer,
            index,
            references,
        }
    }

    pub fn transformer(&self) -> &IndexTransformer {
        &self.transformer
    }

    pub fn references(&self) -> &ReferenceUpdater {
        &self.references
    }

    /// Index documents for every live entry of a resource
    pub fn pre_process_resource(&self, resource: &Resource) -> Result<Vec<IndexEntry>> {
        resource
            .entry_repository
            .all_entries()?
            .iter()
            .map(|entry| self.transformer.transform_to_index_entry(resource, entry))
            .collect()
    }

    /// Build a fresh index for a resource and point its alias at it
    ///
    /// Returns the name of the new index.
    pub fn reindex(&self, resource: &Resource) -> Result<String> {
        let index_name = self
            .index
            .create_index(&resource.resource_id, &resource.config)?;
        let documents = self.pre_process_resource(resource)?;
        info!(
            resource_id = %resource.resource_id,
            index = %index_name,
            count = documents.len(),
            "Reindexing resource"
        );
        self.index.add_entries(&index_name, &documents)?;
        self.index.publish_index(&resource.resource_id, &index_name)?;
        Ok(index_name)
    }

    /// Publishing a resource rebuilds its index
    pub fn publish_index(&self, resource: &Resource) -> Result<String> {
        self.reindex(resource)
    }

    /// Upsert entries into the resource's alias
    ///
    /// With `update_refs`, documents of other entries that embed these entries are
    /// updated as well.
    pub fn add_entries(&self, resource: &Resource, entries: &[Entry], update_refs: bool) -> Result<()> {
        let documents = entries
            .iter()
            .map(|entry| self.transformer.transform_to_index_entry(resource, entry))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            resource_id = %resource.resource_id,
            count = documents.len(),
            update_refs,
            "Adding entries"
        );
        self.index.add_entries(&resource.resource_id, &documents)?;
        if update_refs {
            self.references.update_references(resource, entries)?;
        }
        Ok(())
    }

    /// Remove an entry from the resource's alias and update entries referring to it
    pub fn delete_entry(&self, resource: &Resource, entry: &Entry) -> Result<()> {
        debug!(
            resource_id = %resource.resource_id,
            entry_id = %entry.entry_id,
            "Deleting entry"
        );
        self.index
            .delete_entry(&resource.resource_id, &entry.entry_id)?;
        self.references
            .update_references(resource, std::slice::from_ref(entry))
    }

    /// Apply a domain event to the index
    pub fn handle_event(&self, event: &DomainEvent) -> Result<()> {
        debug!(event = event.name(), resource_id = event.resource_id(), "Handling event");
        match event {
            DomainEvent::EntryAdded { entry } | DomainEvent::EntryUpdated { entry } => {
                let resource = self.resource(&entry.resource_id, None)?;
                self.add_entries(&resource, std::slice::from_ref(entry), true)
            }
            DomainEvent::EntryDiscarded { entry } => {
                let resource = self.resource(&entry.resource_id, None)?;
                self.delete_entry(&resource, entry)
            }
            DomainEvent::ResourcePublished {
                resource_id,
                version,
                ..
            } => {
                let resource = self.resource(resource_id, Some(*version))?;
                self.publish_index(&resource).map(|_| ())
            }
        }
    }

    fn resource(&self, resource_id: &str, version: Option<u32>) -> Result<Arc<Resource>> {
        self.transformer
            .resources()
            .get_by_resource_id(resource_id, version)?
            .ok_or_else(|| KarpError::ResourceNotFound {
                resource_id: resource_id.to_string(),
                version,
            })
    }
}
