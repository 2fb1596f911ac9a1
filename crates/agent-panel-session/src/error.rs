//! Error types surfaced by the panel.

use agent_panel_core::TransportError;
use thiserror::Error;

/// Authentication failure. The display text is shown to the user as-is.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Please enter your password")]
    EmptySecret,
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("No access token available. Please sign in to the application first.")]
    MissingToken,
    #[error("{0}")]
    Rejected(String),
    #[error("Could not reach the assistant: {0}")]
    Unreachable(String),
    #[error("Authentication already in progress")]
    InProgress,
    #[error("Authentication was superseded")]
    Superseded,
}

/// Conversation operation error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PanelError {
    #[error("No active session")]
    NoSession,
    #[error("Another operation is in progress")]
    Busy,
    #[error("Session expired")]
    SessionExpired,
    #[error("Session changed while the request was in flight")]
    Superseded,
    #[error(transparent)]
    Transport(#[from] TransportError),
}
