//! Transport seams between the panel and the agent backend.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::SessionId;

/// Backend operation reachable through a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Identity and secret handshake.
    CredentialLogin,
    /// Externally issued access token handshake.
    TokenLogin,
    /// Send one chat message and wait for the reply.
    SendMessage,
    /// List past conversations.
    ListConversations,
    /// Reset the backend-side conversation context.
    NewConversation,
    /// Make a past conversation the session's active context.
    LoadConversation(String),
    /// Fetch the full message history of a conversation.
    ConversationMessages(String),
    /// End the session.
    Logout,
}

impl Endpoint {
    /// Whether calls to this endpoint must carry a session id.
    #[must_use]
    pub const fn requires_session(&self) -> bool {
        !matches!(self, Self::CredentialLogin | Self::TokenLogin)
    }

    /// Short name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CredentialLogin => "credential_login",
            Self::TokenLogin => "token_login",
            Self::SendMessage => "send_message",
            Self::ListConversations => "list_conversations",
            Self::NewConversation => "new_conversation",
            Self::LoadConversation(_) => "load_conversation",
            Self::ConversationMessages(_) => "conversation_messages",
            Self::Logout => "logout",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Transport error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Session is no longer authorized")]
    Unauthorized,
    #[error("Backend unreachable: {0}")]
    Unreachable(String),
    #[error("Backend returned {code}: {body}")]
    Status { code: u16, body: String },
    #[error("Backend rejected the request: {0}")]
    Rejected(String),
    #[error("Malformed response: {0}")]
    Decode(String),
    #[error("Channel error: {0}")]
    Channel(String),
}

impl TransportError {
    /// Whether the backend reported the session as invalid.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Request/response access to the agent backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one call with a JSON payload, returning the decoded JSON body.
    ///
    /// # Errors
    /// Returns [`TransportError::Unauthorized`] when the backend rejects the
    /// session, and other variants for network or protocol failures.
    async fn call(
        &self,
        endpoint: Endpoint,
        payload: Value,
        session: Option<&SessionId>,
    ) -> Result<Value, TransportError>;
}

/// Inbound text frames of an open channel; the stream ends when the peer closes.
pub type FrameStream = futures::stream::BoxStream<'static, Result<String, TransportError>>;

/// Opens the persistent push connection.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Connect to `url`.
    ///
    /// # Errors
    /// Returns error if the connection cannot be established.
    async fn open_channel(&self, url: &str) -> Result<FrameStream, TransportError>;
}
