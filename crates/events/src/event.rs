use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use corpreg_core::CompanyId;

/// Stable event name; also the message key on the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "company_create")]
    CompanyCreated,
    #[serde(rename = "company_update")]
    CompanyUpdated,
    #[serde(rename = "company_delete")]
    CompanyDeleted,
}

impl EventName {
    pub fn as_str(self) -> &'static str {
        match self {
            EventName::CompanyCreated => "company_create",
            EventName::CompanyUpdated => "company_update",
            EventName::CompanyDeleted => "company_delete",
        }
    }
}

impl core::fmt::Display for EventName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable fact published after a mutation.
///
/// `payload` is the JSON-encoded value exactly as it goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEvent {
    pub name: EventName,
    pub payload: Vec<u8>,
}

impl DomainEvent {
    pub fn new(name: EventName, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name,
            payload: payload.into(),
        }
    }

    /// Minimal payload for deletes: `{"id": <n>}`.
    pub fn company_deleted(id: CompanyId) -> Self {
        Self::new(
            EventName::CompanyDeleted,
            serde_json::json!({ "id": id }).to_string(),
        )
    }

    pub fn payload_json(&self) -> Result<JsonValue, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}
