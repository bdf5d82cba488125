//! The event payload published on the engine's event bus.

use crate::enums::EventKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub event_kind: EventKind,
    pub entity_kind: String,
    pub entity_id: String,
    pub message: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub metadata: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl EngineEvent {
    pub fn new(
        event_kind: EventKind,
        entity_kind: impl Into<String>,
        entity_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_kind,
            entity_kind: entity_kind.into(),
            entity_id: entity_id.into(),
            message: message.into(),
            old_value: None,
            new_value: None,
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_values(
        mut self,
        old_value: Option<String>,
        new_value: Option<String>,
    ) -> Self {
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}
