//! Tagged state guards for the panel.
//!
//! Each guard is an enum rather than a set of flags so that combinations such
//! as "connected without a session" or "sending while loading" cannot exist.

use agent_panel_core::{ConnectionStatus, ConversationSummary, Message, Session};
use serde::Serialize;

/// Authentication state of the panel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No session and no handshake in flight.
    #[default]
    Disconnected,
    /// One handshake in flight.
    Authenticating,
    /// Session established.
    Connected(Session),
    /// Last handshake failed; waiting for a manual retry.
    Failed { message: String },
}

impl SessionState {
    /// Status shown to the user.
    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        match self {
            Self::Disconnected => ConnectionStatus::Disconnected,
            Self::Authenticating => ConnectionStatus::Connecting,
            Self::Connected(_) => ConnectionStatus::Connected,
            Self::Failed { .. } => ConnectionStatus::Error,
        }
    }

    /// The live session, if any.
    #[must_use]
    pub const fn session(&self) -> Option<&Session> {
        match self {
            Self::Connected(session) => Some(session),
            _ => None,
        }
    }

    /// Error text of a failed handshake.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed { message } => Some(message),
            _ => None,
        }
    }
}

/// Transcript-mutating work in flight.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Activity {
    #[default]
    Idle,
    /// Waiting for the reply to a sent message.
    Exchanging,
    /// Fetching a past conversation into the transcript.
    Loading { conversation_id: String },
    /// Resetting the backend context for a new chat.
    Resetting,
}

impl Activity {
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// History overlay inside an open panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOverlay {
    #[default]
    Closed,
    Open,
}

/// Visibility of the panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PanelView {
    #[default]
    Closed,
    Open { history: HistoryOverlay },
}

impl PanelView {
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open { .. })
    }

    #[must_use]
    pub const fn is_history_open(self) -> bool {
        matches!(
            self,
            Self::Open {
                history: HistoryOverlay::Open
            }
        )
    }
}

/// Notification for the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum PanelEvent {
    /// The message input should take focus.
    FocusInput,
    StatusChanged(ConnectionStatus),
    TranscriptChanged,
    ConversationsChanged,
    /// The backend rejected the session; re-authentication is required.
    SessionExpired,
}

/// Read-only view of everything the panel renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelSnapshot {
    pub status: ConnectionStatus,
    pub error: Option<String>,
    pub view: PanelView,
    pub transcript: Vec<Message>,
    pub conversations: Vec<ConversationSummary>,
    pub active_conversation: Option<String>,
    /// Input should be disabled while this is set.
    pub busy: bool,
}
