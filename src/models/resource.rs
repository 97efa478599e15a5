use chrono::Utc;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::entry::{id_string, EntryBody};
use super::events::DomainEvent;
use crate::repository::EntryRepository;
use crate::schema::ResourceConfig;

/// A versioned resource with its config and the entries it owns
#[derive(Clone)]
pub struct Resource {
    pub resource_id: String,
    pub version: u32,
    pub config: ResourceConfig,
    pub is_published: bool,
    pub entry_repository: Arc<dyn EntryRepository>,
}

impl Resource {
    pub fn new(
        resource_id: impl Into<String>,
        version: u32,
        config: ResourceConfig,
        entry_repository: Arc<dyn EntryRepository>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            version,
            config,
            is_published: false,
            entry_repository,
        }
    }

    /// Display name, falling back to the id
    pub fn name(&self) -> &str {
        self.config
            .resource_name
            .as_deref()
            .unwrap_or(&self.resource_id)
    }

    /// Entry id of a body according to the config's `id` field
    pub fn entry_id_from_body(&self, body: &EntryBody) -> Option<String> {
        let id_field = self.config.id.as_deref()?;
        body.get(id_field).and_then(id_string)
    }

    /// Whether this resource is the target described by an optional id and version
    ///
    /// A missing id means the reference stays inside `referrer`.
    pub fn is_target_of(
        &self,
        resource_id: Option<&str>,
        version: Option<u32>,
        referrer: &Resource,
    ) -> bool {
        match resource_id {
            None => self.resource_id == referrer.resource_id,
            Some(id) => {
                id == self.resource_id && version.is_none_or(|v| v == self.version)
            }
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("resource_id", &self.resource_id)
            .field("version", &self.version)
            .field("is_published", &self.is_published)
            .field("fields", &self.config.fields.len())
            .finish()
    }
}

/// Mark a resource as published
pub fn publish(
    resource: &Resource,
    user: impl Into<String>,
    message: impl Into<String>,
) -> (Resource, DomainEvent) {
    let published = Resource {
        is_published: true,
        ..resource.clone()
    };
    let event = DomainEvent::ResourcePublished {
        resource_id: published.resource_id.clone(),
        version: published.version,
        timestamp: Utc::now(),
        user: user.into(),
        message: message.into(),
    };
    (published, event)
}

/// Convert a JSON object into an entry body
pub fn body_from_value(value: Value) -> Option<EntryBody> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryEntryRepository;
    use serde_json::json;

    fn resource(id: &str, version: u32) -> Resource {
        let config = ResourceConfig {
            resource_id: Some(id.into()),
            id: Some("code".into()),
            ..ResourceConfig::default()
        };
        Resource::new(id, version, config, Arc::new(InMemoryEntryRepository::new(id, vec![])))
    }

    #[test]
    fn test_entry_id_from_body() {
        let places = resource("places", 1);
        let body = body_from_value(json!({"code": 7, "name": "x"})).unwrap();
        assert_eq!(places.entry_id_from_body(&body), Some("7".into()));

        let body = body_from_value(json!({"name": "x"})).unwrap();
        assert_eq!(places.entry_id_from_body(&body), None);
        assert!(body_from_value(json!([1])).is_none());
    }

    #[test]
    fn test_is_target_of() {
        let places = resource("places", 1);
        let municipalities = resource("municipalities", 2);

        assert!(places.is_target_of(None, None, &places));
        assert!(!municipalities.is_target_of(None, None, &places));
        assert!(municipalities.is_target_of(Some("municipalities"), Some(2), &places));
        assert!(!municipalities.is_target_of(Some("municipalities"), Some(1), &places));
        assert!(municipalities.is_target_of(Some("municipalities"), None, &places));
    }

    #[test]
    fn test_publish() {
        let places = resource("places", 3);
        let (published, event) = publish(&places, "alice", "go");
        assert!(published.is_published);
        assert!(!places.is_published);
        match event {
            DomainEvent::ResourcePublished { resource_id, version, .. } => {
                assert_eq!(resource_id, "places");
                assert_eq!(version, 3);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(places.name(), "places");
    }
}
