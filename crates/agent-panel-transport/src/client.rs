//! Typed agent backend client over any [`Transport`].

use std::sync::Arc;

use agent_panel_core::{ConversationSummary, Endpoint, Message, SessionId, Transport, TransportError};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::protocol::{
    AckResponse, ChatRequest, ChatResponse, ConversationListResponse, CredentialLoginRequest,
    HistoryResponse, LoginResponse, TokenLoginRequest,
};

/// Agent backend client.
///
/// Cheap to clone; all clones share the underlying transport.
#[derive(Clone)]
pub struct AgentClient {
    transport: Arc<dyn Transport>,
}

impl AgentClient {
    /// Create a client over the given transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Credential handshake. The reply's `success` flag is left to the caller.
    ///
    /// # Errors
    /// Returns error if the call fails or the reply is malformed.
    pub async fn login(&self, identity: &str, secret: &str) -> Result<LoginResponse, TransportError> {
        let body = serde_json::to_value(CredentialLoginRequest {
            username: identity,
            password: secret,
        })?;
        self.call(Endpoint::CredentialLogin, body, None).await
    }

    /// Token handshake. The reply's `success` flag is left to the caller.
    ///
    /// # Errors
    /// Returns error if the call fails or the reply is malformed.
    pub async fn token_login(&self, token: &str) -> Result<LoginResponse, TransportError> {
        let body = serde_json::to_value(TokenLoginRequest { token })?;
        self.call(Endpoint::TokenLogin, body, None).await
    }

    /// Send one chat message. A `success: false` reply is returned as-is.
    ///
    /// # Errors
    /// Returns error if the call fails or the reply is malformed.
    pub async fn send_message(
        &self,
        session: &SessionId,
        text: &str,
    ) -> Result<ChatResponse, TransportError> {
        let body = serde_json::to_value(ChatRequest { message: text })?;
        self.call(Endpoint::SendMessage, body, Some(session)).await
    }

    /// List past conversations in server order.
    ///
    /// # Errors
    /// Returns error if the call fails or the backend rejects it.
    pub async fn list_conversations(
        &self,
        session: &SessionId,
    ) -> Result<Vec<ConversationSummary>, TransportError> {
        let reply: ConversationListResponse = self
            .call(Endpoint::ListConversations, Value::Null, Some(session))
            .await?;
        if !reply.success {
            return Err(rejected(reply.message, "could not list conversations"));
        }
        Ok(reply.conversations)
    }

    /// Reset the backend-side conversation context.
    ///
    /// # Errors
    /// Returns error if the call fails or the backend rejects it.
    pub async fn new_conversation(&self, session: &SessionId) -> Result<(), TransportError> {
        self.ack(Endpoint::NewConversation, session).await
    }

    /// Make `conversation_id` the session's active context.
    ///
    /// # Errors
    /// Returns error if the call fails or the backend rejects it.
    pub async fn load_conversation(
        &self,
        session: &SessionId,
        conversation_id: &str,
    ) -> Result<(), TransportError> {
        self.ack(Endpoint::LoadConversation(conversation_id.to_string()), session)
            .await
    }

    /// Fetch the full message history of a conversation.
    ///
    /// # Errors
    /// Returns error if the call fails or the backend rejects it.
    pub async fn conversation_messages(
        &self,
        session: &SessionId,
        conversation_id: &str,
    ) -> Result<Vec<Message>, TransportError> {
        let reply: HistoryResponse = self
            .call(
                Endpoint::ConversationMessages(conversation_id.to_string()),
                Value::Null,
                Some(session),
            )
            .await?;
        if !reply.success {
            return Err(rejected(reply.message, "could not load conversation messages"));
        }
        Ok(reply.messages.into_iter().map(Message::from).collect())
    }

    /// End the session on the backend.
    ///
    /// # Errors
    /// Returns error if the call fails or the backend rejects it.
    pub async fn logout(&self, session: &SessionId) -> Result<(), TransportError> {
        self.ack(Endpoint::Logout, session).await
    }

    async fn ack(&self, endpoint: Endpoint, session: &SessionId) -> Result<(), TransportError> {
        let name = endpoint.name();
        let reply: AckResponse = self.call(endpoint, json!({}), Some(session)).await?;
        if reply.success {
            Ok(())
        } else {
            Err(rejected(reply.message, name))
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        payload: Value,
        session: Option<&SessionId>,
    ) -> Result<T, TransportError> {
        let name = endpoint.name();
        let value = self.transport.call(endpoint, payload, session).await?;
        serde_json::from_value(value).map_err(|e| {
            tracing::warn!(endpoint = name, "malformed reply: {e}");
            TransportError::Decode(e.to_string())
        })
    }
}

fn rejected(message: Option<String>, fallback: &str) -> TransportError {
    TransportError::Rejected(message.unwrap_or_else(|| fallback.to_string()))
}
