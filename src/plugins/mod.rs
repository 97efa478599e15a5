//! Plugin functions for virtual fields
//!
//! A virtual field with `{"plugin": "<id>"}` is computed by the plugin registered
//! under that id. The registry is built up front and handed to the transformer.

use crate::error::KarpError;
use crate::models::EntryBody;
use crate::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Computes the value of a virtual field from an entry body
pub trait PluginFunction: Send + Sync {
    fn apply(&self, resource_id: &str, version: u32, entry: &EntryBody) -> Result<Value>;
}

impl<F> PluginFunction for F
where
    F: Fn(&str, u32, &EntryBody) -> Result<Value> + Send + Sync,
{
    fn apply(&self, resource_id: &str, version: u32, entry: &EntryBody) -> Result<Value> {
        self(resource_id, version, entry)
    }
}

/// Plugins by id
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn PluginFunction>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin, replacing any plugin with the same id
    pub fn register(&mut self, id: impl Into<String>, plugin: Arc<dyn PluginFunction>) {
        self.plugins.insert(id.into(), plugin);
    }

    pub fn with(mut self, id: impl Into<String>, plugin: impl PluginFunction + 'static) -> Self {
        self.register(id, Arc::new(plugin));
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn PluginFunction>> {
        self.plugins.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.plugins.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run plugin `id` for an entry of the given resource
    pub fn apply(
        &self,
        id: &str,
        resource_id: &str,
        version: u32,
        entry: &EntryBody,
    ) -> Result<Value> {
        let plugin = self
            .plugins
            .get(id)
            .ok_or_else(|| KarpError::PluginNotFound(id.to_string()))?;
        trace!(plugin = id, resource_id, version, "Applying plugin");
        plugin.apply(resource_id, version, entry)
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.plugins.keys().collect();
        ids.sort();
        f.debug_struct("PluginRegistry").field("plugins", &ids).finish()
    }
}
