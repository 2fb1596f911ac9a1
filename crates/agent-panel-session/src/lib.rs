//! Session, conversation and panel state for the agent chat panel.
//!
//! Provides:
//! - `ChatPanel` - authenticator, message exchange, conversation store and
//!   panel controller behind one handle
//! - `TokenSource` - access to the externally issued login token
//! - Tagged state guards (`SessionState`, `Activity`, `PanelView`)

pub mod auth;
pub mod conversation;
pub mod error;
pub mod exchange;
pub mod panel;
pub mod state;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use conversation::ConversationStore;
pub use error::{AuthError, PanelError};
pub use exchange::SendOutcome;
pub use panel::ChatPanel;
pub use state::{Activity, HistoryOverlay, PanelEvent, PanelSnapshot, PanelView, SessionState};
pub use token::{EnvToken, StaticToken, TokenSource};
