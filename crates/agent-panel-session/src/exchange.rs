//! Message exchange coordinator.
//!
//! At most one exchange is outstanding. A send appends the user message,
//! issues one backend call, and appends exactly one reply, so the transcript
//! always alternates user message and response.

use agent_panel_core::{Message, TransportError};
use uuid::Uuid;

use crate::{ChatPanel, PanelEvent, state::Activity};

/// Appended when a send fails for reasons other than session expiry.
pub(crate) const APOLOGY: &str =
    "Sorry, I couldn't reach the assistant just now. Please try again.";

/// Appended when the backend declines a message without explanation.
const SOFT_FAILURE_FALLBACK: &str = "The assistant could not process that message.";

/// What became of a [`ChatPanel::send`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty text, no session, or another operation in flight.
    Ignored,
    /// Agent reply appended.
    Replied,
    /// Backend declined the message; system notice appended.
    Declined,
    /// Backend rejected the session; session destroyed.
    SessionExpired,
    /// Transport failure; apology appended, session kept.
    Failed,
    /// Session changed while waiting; reply dropped.
    Discarded,
}

impl ChatPanel {
    /// Send one user message and wait for the reply.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }

        let (session_id, epoch) = {
            let mut inner = self.lock();
            let Some(session) = inner.session.session() else {
                tracing::debug!("send ignored: no session");
                return SendOutcome::Ignored;
            };
            let session_id = session.id.clone();
            if !inner.activity.is_idle() {
                tracing::debug!(activity = ?inner.activity, "send ignored: busy");
                return SendOutcome::Ignored;
            }
            inner.activity = Activity::Exchanging;
            inner.store.push(Message::user(text));
            self.emit(PanelEvent::TranscriptChanged);
            (session_id, inner.epoch)
        };

        let exchange_id = Uuid::new_v4();
        tracing::debug!(%exchange_id, session = %session_id, "sending message");
        let result = self.client.send_message(&session_id, text).await;

        let mut inner = self.lock();
        if inner.epoch != epoch {
            tracing::debug!(%exchange_id, "dropping reply for a replaced session");
            return SendOutcome::Discarded;
        }
        inner.activity = Activity::Idle;

        let outcome = match result {
            Ok(reply) if reply.success => {
                tracing::debug!(%exchange_id, agent = ?reply.agent_used, "reply received");
                inner
                    .store
                    .push(Message::agent(reply.message, reply.agent_used));
                SendOutcome::Replied
            }
            Ok(reply) => {
                tracing::info!(%exchange_id, "backend declined message");
                let notice = if reply.message.trim().is_empty() {
                    SOFT_FAILURE_FALLBACK.to_string()
                } else {
                    reply.message
                };
                inner.store.push(Message::system(notice));
                SendOutcome::Declined
            }
            Err(TransportError::Unauthorized) => {
                self.expire_session(&mut inner);
                return SendOutcome::SessionExpired;
            }
            Err(e) => {
                tracing::error!(%exchange_id, "send failed: {e}");
                inner.store.push(Message::agent(APOLOGY, None));
                SendOutcome::Failed
            }
        };
        self.emit(PanelEvent::TranscriptChanged);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use agent_panel_core::{ConnectionStatus, Role};
    use serde_json::json;

    use super::*;
    use crate::{
        PanelEvent,
        panel::SESSION_EXPIRED_NOTICE,
        test_support::{ScriptedTransport, connected_panel},
    };

    #[tokio::test]
    async fn test_send_appends_user_then_agent() {
        let transport = ScriptedTransport::new();
        transport.reply(
            "send_message",
            Ok(json!({"success": true, "message": "Desk 4B is booked.", "agent_used": "desk"})),
        );
        let panel = connected_panel(&transport).await;

        let outcome = panel.send("  Book desk 4B  ").await;

        assert_eq!(outcome, SendOutcome::Replied);
        let transcript = panel.transcript();
        assert_eq!(transcript, vec![
            Message::user("Book desk 4B"),
            Message::agent("Desk 4B is booked.", Some("desk".into())),
        ]);
        let calls = transport.calls_to("send_message");
        assert_eq!(calls[0].1, json!({"message": "Book desk 4B"}));
        assert_eq!(calls[0].2.as_ref().map(|s| s.as_str()), Some("s-1"));
    }

    #[tokio::test]
    async fn test_blank_text_is_ignored() {
        let transport = ScriptedTransport::new();
        let panel = connected_panel(&transport).await;

        assert_eq!(panel.send("   \n").await, SendOutcome::Ignored);
        assert!(panel.transcript().is_empty());
        assert_eq!(transport.call_count("send_message"), 0);
    }

    #[tokio::test]
    async fn test_send_without_session_is_ignored() {
        let transport = ScriptedTransport::new();
        let panel = crate::test_support::panel_with(&transport, crate::StaticToken::none());

        assert_eq!(panel.send("hello").await, SendOutcome::Ignored);
        assert!(panel.transcript().is_empty());
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_sends_while_busy_are_dropped() {
        let transport = ScriptedTransport::new();
        let gate = transport.gate("send_message");
        transport.reply("send_message", Ok(json!({"success": true, "message": "one"})));
        transport.reply("send_message", Ok(json!({"success": true, "message": "two"})));
        let panel = connected_panel(&transport).await;

        let mut first = tokio_test::task::spawn(panel.send("first"));
        tokio_test::assert_pending!(first.poll());
        assert!(panel.snapshot().busy);

        for text in ["second", "third", "fourth"] {
            assert_eq!(panel.send(text).await, SendOutcome::Ignored);
        }
        assert_eq!(panel.transcript().len(), 1);

        gate.add_permits(1);
        assert_eq!(first.await, SendOutcome::Replied);

        let transcript = panel.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].content, "first");
        assert_eq!(transcript[1].content, "one");
        assert_eq!(transport.call_count("send_message"), 1);
        assert!(!panel.snapshot().busy);
    }

    #[tokio::test]
    async fn test_each_accepted_send_adds_two_messages() {
        let transport = ScriptedTransport::new();
        transport.reply("send_message", Ok(json!({"success": true, "message": "a"})));
        transport.reply("send_message", Err(TransportError::Unreachable("down".into())));
        transport.reply("send_message", Ok(json!({"success": false, "message": "Not allowed"})));
        let panel = connected_panel(&transport).await;

        assert_eq!(panel.send("one").await, SendOutcome::Replied);
        assert_eq!(panel.send("two").await, SendOutcome::Failed);
        assert_eq!(panel.send("three").await, SendOutcome::Declined);

        let roles: Vec<Role> = panel.transcript().iter().map(|m| m.role).collect();
        assert_eq!(roles, [
            Role::User,
            Role::Agent,
            Role::User,
            Role::Agent,
            Role::User,
            Role::System,
        ]);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_session() {
        let transport = ScriptedTransport::new();
        transport.reply("send_message", Err(TransportError::Status {
            code: 502,
            body: "bad gateway".into(),
        }));
        transport.reply("send_message", Ok(json!({"success": true, "message": "back"})));
        let panel = connected_panel(&transport).await;

        assert_eq!(panel.send("hello").await, SendOutcome::Failed);
        assert_eq!(panel.transcript()[1].content, APOLOGY);
        assert_eq!(panel.status(), ConnectionStatus::Connected);

        assert_eq!(panel.send("again").await, SendOutcome::Replied);
    }

    #[tokio::test]
    async fn test_unauthorized_reply_expires_session() {
        let transport = ScriptedTransport::new();
        transport.reply("send_message", Err(TransportError::Unauthorized));
        let panel = connected_panel(&transport).await;
        let mut events = panel.subscribe();

        assert_eq!(panel.send("hello").await, SendOutcome::SessionExpired);

        assert!(!panel.has_session());
        assert_eq!(panel.status(), ConnectionStatus::Disconnected);
        let transcript = panel.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1], Message::system(SESSION_EXPIRED_NOTICE));

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&PanelEvent::SessionExpired));

        assert_eq!(panel.send("still there?").await, SendOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_token_session_invalidated_mid_conversation() {
        let transport = ScriptedTransport::new();
        transport.reply("token_login", Ok(json!({"success": true, "session_id": "s-7"})));
        transport.reply("send_message", Err(TransportError::Unauthorized));
        let panel = crate::test_support::panel_with_token(&transport, "tok");
        panel.open().await;
        assert_eq!(panel.status(), ConnectionStatus::Connected);

        panel.send("What is on the menu?").await;

        assert!(!panel.has_session());
        assert_eq!(panel.status(), ConnectionStatus::Disconnected);
        let system: Vec<_> = panel
            .transcript()
            .into_iter()
            .filter(|m| m.role == Role::System)
            .collect();
        assert_eq!(system.len(), 1);
    }

    #[tokio::test]
    async fn test_reply_after_logout_is_discarded() {
        let transport = ScriptedTransport::new();
        let gate = transport.gate("send_message");
        transport.reply("send_message", Ok(json!({"success": true, "message": "late"})));
        let panel = connected_panel(&transport).await;

        let mut pending = tokio_test::task::spawn(panel.send("hello"));
        tokio_test::assert_pending!(pending.poll());

        panel.new_connection().await;
        gate.add_permits(1);

        assert_eq!(pending.await, SendOutcome::Discarded);
        assert!(panel.transcript().is_empty());
    }
}
