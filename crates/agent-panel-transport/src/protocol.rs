//! Wire protocol for agent backend payloads.

use agent_panel_core::{ConversationSummary, Message, Role};
use serde::{Deserialize, Serialize};

/// Body of a credential login.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialLoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Body of a token login.
#[derive(Debug, Clone, Serialize)]
pub struct TokenLoginRequest<'a> {
    pub token: &'a str,
}

/// Body of a chat message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
}

/// Reply to either login call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl LoginResponse {
    /// Session id of a successful login.
    ///
    /// A reply claiming success without a usable id counts as a rejection.
    #[must_use]
    pub fn accepted_session(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.session_id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

/// Reply to a chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub agent_used: Option<String>,
}

/// Reply to a conversation listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationListResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub conversations: Vec<ConversationSummary>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One message of a stored conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub agent_used: Option<String>,
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        let role = Role::from_wire(&wire.role);
        let agent_label = match role {
            Role::Agent => wire.agent_used,
            Role::User | Role::System => None,
        };
        Self {
            role,
            content: wire.content,
            agent_label,
        }
    }
}

/// Reply to a conversation history fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Reply to calls that only acknowledge (new, load, logout).
///
/// Backends that answer with an empty object are taken as successful.
#[derive(Debug, Clone, Deserialize)]
pub struct AckResponse {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

const fn default_true() -> bool {
    true
}
