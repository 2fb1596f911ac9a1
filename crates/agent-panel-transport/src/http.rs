//! HTTP transport backed by `reqwest`.

use agent_panel_core::{Endpoint, PanelConfig, SessionId, Transport, TransportError};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;

/// HTTP transport for the agent backend.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    session_header: String,
}

impl HttpTransport {
    /// Create a transport from panel configuration.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the client cannot be built.
    pub fn new(config: &PanelConfig) -> Result<Self, TransportError> {
        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| TransportError::Unreachable(format!("invalid base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TransportError::Unreachable(format!(
                "invalid base URL: {}",
                config.api_base_url
            )));
        }
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            session_header: config.session_header.clone(),
        })
    }

    fn route(endpoint: &Endpoint) -> (Method, Vec<&str>) {
        match endpoint {
            Endpoint::CredentialLogin => (Method::POST, vec!["auth", "login"]),
            Endpoint::TokenLogin => (Method::POST, vec!["auth", "token"]),
            Endpoint::SendMessage => (Method::POST, vec!["chat"]),
            Endpoint::ListConversations => (Method::GET, vec!["conversations"]),
            Endpoint::NewConversation => (Method::POST, vec!["conversations", "new"]),
            Endpoint::LoadConversation(id) => {
                (Method::POST, vec!["conversations", id.as_str(), "load"])
            }
            Endpoint::ConversationMessages(id) => {
                (Method::GET, vec!["conversations", id.as_str(), "messages"])
            }
            Endpoint::Logout => (Method::POST, vec!["auth", "logout"]),
        }
    }

    fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(
        &self,
        endpoint: Endpoint,
        payload: Value,
        session: Option<&SessionId>,
    ) -> Result<Value, TransportError> {
        if endpoint.requires_session() && session.is_none() {
            tracing::warn!(endpoint = %endpoint, "refusing session call without a session id");
            return Err(TransportError::Unauthorized);
        }

        let (method, segments) = Self::route(&endpoint);
        let url = self.url_for(&segments);
        tracing::debug!(endpoint = %endpoint, %method, %url, "calling agent backend");

        let mut request = self.client.request(method.clone(), url);
        if let Some(session) = session {
            request = request.header(self.session_header.as_str(), session.as_str());
        }
        if method != Method::GET {
            request = request.json(&payload);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(endpoint = %endpoint, "request failed: {e}");
            TransportError::Unreachable(e.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::info!(endpoint = %endpoint, "backend reported session unauthorized");
            return Err(TransportError::Unauthorized);
        }

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            tracing::error!(endpoint = %endpoint, "backend error: {status} - {body}");
            return Err(TransportError::Status {
                code: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        Ok(serde_json::from_str(&body)?)
    }
}
