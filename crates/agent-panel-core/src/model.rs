//! Data model shared by the panel, its transport and its subscribers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque session identifier issued by the agent backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// How a session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOrigin {
    /// Silent login with an externally issued access token.
    Token,
    /// Interactive login with identity and secret.
    Credentials,
}

/// Authenticated context held in process memory only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Backend session identifier.
    pub id: SessionId,
    /// Handshake that produced this session.
    pub established_via: SessionOrigin,
}

impl Session {
    /// Create a session record.
    #[must_use]
    pub fn new(id: impl Into<SessionId>, established_via: SessionOrigin) -> Self {
        Self {
            id: id.into(),
            established_via,
        }
    }
}

/// Author of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Typed by the user.
    User,
    /// Produced by the agent backend.
    Agent,
    /// Produced by this subsystem (session notices, soft failures).
    System,
}

impl Role {
    /// Map a backend role string onto a transcript role.
    ///
    /// Anything that is neither `user` nor `system` is treated as agent output.
    #[must_use]
    pub fn from_wire(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "user" => Self::User,
            "system" => Self::System,
            _ => Self::Agent,
        }
    }
}

/// A single transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Name of the backend agent that produced the reply, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_label: Option<String>,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            agent_label: None,
        }
    }

    #[must_use]
    pub fn agent(content: impl Into<String>, agent_label: Option<String>) -> Self {
        Self {
            role: Role::Agent,
            content: content.into(),
            agent_label,
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            agent_label: None,
        }
    }
}

/// Server-owned summary of a past conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "createdAt")]
    pub created_at: String,
}

/// Authentication and session health indicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Event received on the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl ChannelEvent {
    /// Event type that asks subscribers to reload their data.
    pub const REFRESH: &'static str = "refresh";

    #[must_use]
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Whether this is a `refresh` notification.
    #[must_use]
    pub fn is_refresh(&self) -> bool {
        self.kind == Self::REFRESH
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_from_wire() {
        assert_eq!(Role::from_wire("user"), Role::User);
        assert_eq!(Role::from_wire("System"), Role::System);
        assert_eq!(Role::from_wire("assistant"), Role::Agent);
        assert_eq!(Role::from_wire("bot"), Role::Agent);
        assert_eq!(Role::from_wire("something-new"), Role::Agent);
    }

    #[test]
    fn test_summary_accepts_camel_case_timestamp() {
        let summary: ConversationSummary = serde_json::from_value(json!({
            "id": "c1",
            "title": "Parking",
            "createdAt": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(summary.created_at, "2024-05-01T10:00:00Z");
    }

    #[test]
    fn test_channel_event_payload_defaults_to_null() {
        let event: ChannelEvent = serde_json::from_str(r#"{"type":"refresh"}"#).unwrap();
        assert!(event.is_refresh());
        assert_eq!(event.payload, Value::Null);
    }
}
