use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::Entry;

/// Changes to entries and resources that the index has to follow
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    EntryAdded {
        entry: Entry,
    },
    EntryUpdated {
        entry: Entry,
    },
    EntryDiscarded {
        entry: Entry,
    },
    ResourcePublished {
        resource_id: String,
        version: u32,
        timestamp: DateTime<Utc>,
        user: String,
        message: String,
    },
}

impl DomainEvent {
    /// The entry an entry event carries
    pub fn entry(&self) -> Option<&Entry> {
        match self {
            DomainEvent::EntryAdded { entry }
            | DomainEvent::EntryUpdated { entry }
            | DomainEvent::EntryDiscarded { entry } => Some(entry),
            DomainEvent::ResourcePublished { .. } => None,
        }
    }

    pub fn resource_id(&self) -> &str {
        match self {
            DomainEvent::ResourcePublished { resource_id, .. } => resource_id,
            DomainEvent::EntryAdded { entry }
            | DomainEvent::EntryUpdated { entry }
            | DomainEvent::EntryDiscarded { entry } => &entry.resource_id,
        }
    }

    /// Get the event name for logging
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::EntryAdded { .. } => "entry_added",
            DomainEvent::EntryUpdated { .. } => "entry_updated",
            DomainEvent::EntryDiscarded { .. } => "entry_discarded",
            DomainEvent::ResourcePublished { .. } => "resource_published",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_tag() {
        let event = DomainEvent::ResourcePublished {
            resource_id: "places".into(),
            version: 2,
            timestamp: Utc::now(),
            user: "alice".into(),
            message: "release".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "resource_published");
        assert_eq!(value["version"], 2);

        let back: DomainEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.resource_id(), "places");
        assert!(back.entry().is_none());
        assert_eq!(back.name(), "resource_published");
    }
}
