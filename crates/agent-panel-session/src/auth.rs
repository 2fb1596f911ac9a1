//! Session authenticator.
//!
//! Two handshakes produce a session: identity and secret, or the access token
//! issued by the surrounding application. Only one handshake may be in flight;
//! the `Authenticating` state is the guard.

use agent_panel_core::{ConnectionStatus, Session, SessionId, SessionOrigin, TransportError};
use agent_panel_transport::protocol::LoginResponse;

use crate::{
    ChatPanel, PanelEvent, SessionState,
    error::AuthError,
    panel::Inner,
    state::Activity,
};

const DEFAULT_INVALID_CREDENTIALS: &str = "Invalid username or password";
const DEFAULT_TOKEN_REJECTED: &str = "Your sign-in could not be verified. Please sign in again.";

impl ChatPanel {
    /// Authenticate with identity and secret.
    ///
    /// An empty secret fails without contacting the backend.
    ///
    /// # Errors
    /// Returns the failure that was also recorded as the panel's error state.
    pub async fn authenticate_with_credentials(
        &self,
        identity: &str,
        secret: &str,
    ) -> Result<SessionId, AuthError> {
        let (attempt, replaced) = {
            let mut inner = self.lock();
            if matches!(inner.session, SessionState::Authenticating) {
                return Err(AuthError::InProgress);
            }
            if secret.is_empty() {
                if inner.session.session().is_none() {
                    self.fail(&mut inner, &AuthError::EmptySecret);
                }
                return Err(AuthError::EmptySecret);
            }
            let replaced = inner.session.session().cloned();
            (self.begin_auth(&mut inner), replaced)
        };
        self.logout_replaced(replaced).await;

        tracing::info!(identity, "authenticating with credentials");
        let reply = self.client.login(identity, secret).await;
        self.finish_auth(attempt, SessionOrigin::Credentials, reply)
    }

    /// Authenticate with an externally issued access token.
    ///
    /// # Errors
    /// Returns the failure that was also recorded as the panel's error state.
    pub async fn authenticate_with_token(&self, token: Option<&str>) -> Result<SessionId, AuthError> {
        let (attempt, replaced) = {
            let mut inner = self.lock();
            if matches!(inner.session, SessionState::Authenticating) {
                return Err(AuthError::InProgress);
            }
            let replaced = inner.session.session().cloned();
            (self.begin_auth(&mut inner), replaced)
        };
        self.logout_replaced(replaced).await;
        self.token_handshake(attempt, token).await
    }

    /// Manual retry: repeat the token handshake with a fresh token.
    ///
    /// # Errors
    /// Returns the failure that was also recorded as the panel's error state.
    pub async fn reconnect(&self) -> Result<SessionId, AuthError> {
        let attempt = {
            let mut inner = self.lock();
            if let Some(session) = inner.session.session() {
                return Ok(session.id.clone());
            }
            if matches!(inner.session, SessionState::Authenticating) {
                return Err(AuthError::InProgress);
            }
            self.begin_auth(&mut inner)
        };
        self.run_token_handshake(attempt).await
    }

    /// Enter `Authenticating`, invalidating anything in flight.
    pub(crate) fn begin_auth(&self, inner: &mut Inner) -> u64 {
        inner.session = SessionState::Authenticating;
        inner.epoch += 1;
        inner.activity = Activity::Idle;
        self.emit(PanelEvent::StatusChanged(ConnectionStatus::Connecting));
        inner.epoch
    }

    /// Token handshake using the configured token source.
    pub(crate) async fn run_token_handshake(&self, attempt: u64) -> Result<SessionId, AuthError> {
        let token = self.tokens.access_token();
        self.token_handshake(attempt, token.as_deref()).await
    }

    async fn token_handshake(
        &self,
        attempt: u64,
        token: Option<&str>,
    ) -> Result<SessionId, AuthError> {
        let Some(token) = token.filter(|t| !t.trim().is_empty()) else {
            tracing::warn!("no access token available for silent login");
            return self.finish_auth(attempt, SessionOrigin::Token, Err(AuthError::MissingToken));
        };

        tracing::info!("authenticating with access token");
        let reply = self.client.token_login(token).await;
        self.finish_auth(attempt, SessionOrigin::Token, reply)
    }

    fn finish_auth<E>(
        &self,
        attempt: u64,
        origin: SessionOrigin,
        reply: Result<LoginResponse, E>,
    ) -> Result<SessionId, AuthError>
    where
        E: Into<AuthFailure>,
    {
        let outcome = match reply {
            Ok(reply) => {
                let accepted = reply.accepted_session().map(SessionId::from);
                accepted.ok_or_else(|| rejection(origin, reply.message))
            }
            Err(e) => Err(e.into().into_auth_error(origin)),
        };

        let mut inner = self.lock();
        if inner.epoch != attempt || !matches!(inner.session, SessionState::Authenticating) {
            tracing::debug!(attempt, "discarding superseded handshake result");
            return Err(AuthError::Superseded);
        }

        match outcome {
            Ok(id) => {
                tracing::info!(session = %id, ?origin, "session established");
                inner.session = SessionState::Connected(Session::new(id.clone(), origin));
                inner.activity = Activity::Idle;
                inner.store.reset();
                self.emit(PanelEvent::StatusChanged(ConnectionStatus::Connected));
                self.emit(PanelEvent::TranscriptChanged);
                self.emit(PanelEvent::ConversationsChanged);
                Ok(id)
            }
            Err(e) => {
                self.fail(&mut inner, &e);
                Err(e)
            }
        }
    }

    /// Best-effort logout of a session that a new handshake is replacing.
    async fn logout_replaced(&self, replaced: Option<Session>) {
        let Some(session) = replaced else {
            return;
        };
        tracing::info!(session = %session.id, "logging out replaced session");
        if let Err(e) = self.client.logout(&session.id).await {
            tracing::warn!("best-effort logout failed: {e}");
        }
    }

    fn fail(&self, inner: &mut Inner, error: &AuthError) {
        tracing::warn!("authentication failed: {error}");
        inner.session = SessionState::Failed {
            message: error.to_string(),
        };
        self.emit(PanelEvent::StatusChanged(ConnectionStatus::Error));
    }
}

/// Handshake failure before the backend's verdict is interpreted.
pub(crate) enum AuthFailure {
    Transport(TransportError),
    Local(AuthError),
}

impl AuthFailure {
    fn into_auth_error(self, origin: SessionOrigin) -> AuthError {
        match self {
            Self::Transport(TransportError::Unauthorized) => rejection(origin, None),
            Self::Transport(e) => AuthError::Unreachable(e.to_string()),
            Self::Local(e) => e,
        }
    }
}

impl From<TransportError> for AuthFailure {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<AuthError> for AuthFailure {
    fn from(e: AuthError) -> Self {
        Self::Local(e)
    }
}

fn rejection(origin: SessionOrigin, message: Option<String>) -> AuthError {
    match origin {
        SessionOrigin::Credentials => AuthError::InvalidCredentials(
            message.unwrap_or_else(|| DEFAULT_INVALID_CREDENTIALS.to_string()),
        ),
        SessionOrigin::Token => {
            AuthError::Rejected(message.unwrap_or_else(|| DEFAULT_TOKEN_REJECTED.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use agent_panel_core::Message;
    use serde_json::json;

    use super::*;
    use crate::{
        StaticToken,
        test_support::{ScriptedTransport, panel_with, panel_with_token},
    };

    #[tokio::test]
    async fn test_empty_secret_fails_without_network_call() {
        let transport = ScriptedTransport::new();
        let panel = panel_with(&transport, StaticToken::none());

        let err = panel
            .authenticate_with_credentials("ana", "")
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::EmptySecret);
        assert_eq!(transport.total_calls(), 0);
        let snapshot = panel.snapshot();
        assert_eq!(snapshot.status, ConnectionStatus::Error);
        assert_eq!(snapshot.error.as_deref(), Some("Please enter your password"));
    }

    #[tokio::test]
    async fn test_credentials_success_clears_previous_state() {
        let transport = ScriptedTransport::new();
        transport.reply("credential_login", Ok(json!({"success": true, "session_id": "s-1"})));
        let panel = panel_with(&transport, StaticToken::none());
        panel.lock().store.push(Message::user("left over"));

        let id = panel
            .authenticate_with_credentials("ana", "pw")
            .await
            .unwrap();

        assert_eq!(id.as_str(), "s-1");
        assert_eq!(panel.status(), ConnectionStatus::Connected);
        assert!(panel.transcript().is_empty());
        assert_eq!(panel.snapshot().error, None);
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let transport = ScriptedTransport::new();
        transport.reply(
            "credential_login",
            Ok(json!({"success": false, "message": "Wrong password"})),
        );
        let panel = panel_with(&transport, StaticToken::none());

        let err = panel
            .authenticate_with_credentials("ana", "nope")
            .await
            .unwrap_err();

        assert_eq!(err, AuthError::InvalidCredentials("Wrong password".into()));
        assert_eq!(panel.snapshot().error.as_deref(), Some("Wrong password"));
        assert!(!panel.has_session());
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let transport = ScriptedTransport::new();
        transport.reply(
            "credential_login",
            Err(TransportError::Unreachable("connection refused".into())),
        );
        let panel = panel_with(&transport, StaticToken::none());

        let err = panel
            .authenticate_with_credentials("ana", "pw")
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Unreachable(_)));
        assert_eq!(panel.status(), ConnectionStatus::Error);
    }

    #[tokio::test]
    async fn test_missing_token_is_recoverable() {
        let transport = ScriptedTransport::new();
        let panel = panel_with(&transport, StaticToken::none());

        let err = panel.authenticate_with_token(None).await.unwrap_err();
        assert_eq!(err, AuthError::MissingToken);
        assert_eq!(panel.status(), ConnectionStatus::Error);
        assert_eq!(transport.total_calls(), 0);

        transport.reply("token_login", Ok(json!({"success": true, "session_id": "s-2"})));
        let id = panel.authenticate_with_token(Some("tok")).await.unwrap();
        assert_eq!(id.as_str(), "s-2");
    }

    #[tokio::test]
    async fn test_token_rejected_by_status_or_flag() {
        let transport = ScriptedTransport::new();
        transport.reply("token_login", Err(TransportError::Unauthorized));
        transport.reply("token_login", Ok(json!({"success": false})));
        let panel = panel_with(&transport, StaticToken::none());

        let first = panel.authenticate_with_token(Some("tok")).await.unwrap_err();
        let second = panel.authenticate_with_token(Some("tok")).await.unwrap_err();

        assert!(matches!(first, AuthError::Rejected(_)));
        assert!(matches!(second, AuthError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_second_handshake_while_in_flight_is_refused() {
        let transport = ScriptedTransport::new();
        let gate = transport.gate("credential_login");
        transport.reply("credential_login", Ok(json!({"success": true, "session_id": "s-1"})));
        let panel = panel_with(&transport, StaticToken::none());

        let mut first = tokio_test::task::spawn(panel.authenticate_with_credentials("ana", "pw"));
        tokio_test::assert_pending!(first.poll());
        assert_eq!(panel.status(), ConnectionStatus::Connecting);

        assert_eq!(
            panel.authenticate_with_token(Some("tok")).await,
            Err(AuthError::InProgress)
        );
        assert_eq!(
            panel.authenticate_with_credentials("ana", "").await,
            Err(AuthError::InProgress)
        );

        gate.add_permits(1);
        assert!(first.await.is_ok());
        assert_eq!(transport.total_calls(), 1);
    }

    #[tokio::test]
    async fn test_logout_during_handshake_discards_result() {
        let transport = ScriptedTransport::new();
        let gate = transport.gate("token_login");
        transport.reply("token_login", Ok(json!({"success": true, "session_id": "s-1"})));
        let panel = panel_with_token(&transport, "tok");

        let mut open = tokio_test::task::spawn(panel.open());
        tokio_test::assert_pending!(open.poll());

        panel.new_connection().await;
        gate.add_permits(1);
        open.await;

        assert_eq!(panel.status(), ConnectionStatus::Disconnected);
        assert!(!panel.has_session());
    }

    #[tokio::test]
    async fn test_relogin_logs_out_replaced_session() {
        let transport = ScriptedTransport::new();
        transport.reply("credential_login", Ok(json!({"success": true, "session_id": "s-1"})));
        transport.reply("credential_login", Ok(json!({"success": true, "session_id": "s-2"})));
        transport.reply("logout", Err(TransportError::Unreachable("down".into())));
        let panel = panel_with(&transport, StaticToken::none());
        panel.authenticate_with_credentials("ana", "pw").await.unwrap();

        let id = panel
            .authenticate_with_credentials("bea", "pw2")
            .await
            .unwrap();

        assert_eq!(id.as_str(), "s-2");
        let logouts = transport.calls_to("logout");
        assert_eq!(logouts.len(), 1);
        assert_eq!(logouts[0].2.as_ref().map(SessionId::as_str), Some("s-1"));
        assert_eq!(panel.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_first_login_sends_no_logout() {
        let transport = ScriptedTransport::new();
        transport.reply("token_login", Ok(json!({"success": true, "session_id": "s-1"})));
        let panel = panel_with(&transport, StaticToken::none());

        panel.authenticate_with_token(Some("tok")).await.unwrap();

        assert_eq!(transport.call_count("logout"), 0);
    }

    #[tokio::test]
    async fn test_reconnect_after_failure_uses_token_source() {
        let transport = ScriptedTransport::new();
        transport.reply("token_login", Err(TransportError::Unreachable("down".into())));
        transport.reply("token_login", Ok(json!({"success": true, "session_id": "s-3"})));
        let panel = panel_with_token(&transport, "tok");

        panel.open().await;
        assert_eq!(panel.status(), ConnectionStatus::Error);

        let id = panel.reconnect().await.unwrap();
        assert_eq!(id.as_str(), "s-3");
        assert_eq!(panel.status(), ConnectionStatus::Connected);
        assert_eq!(transport.call_count("token_login"), 2);
    }
}
