//! Payloads returned by the transport.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat channel as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub uuid: Uuid,
    pub name: String,
    pub category: String,
}

impl ChannelSummary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            category: "General".to_string(),
        }
    }
}

/// An agent recently seen in chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatterPresence {
    pub agent: String,
    pub active: bool,
}
