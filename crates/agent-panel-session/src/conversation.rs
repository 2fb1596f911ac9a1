//! Conversation store: the active transcript and past conversations.

use agent_panel_core::{ConversationSummary, Message, SessionId, TransportError};

use crate::{
    ChatPanel, PanelEvent,
    error::PanelError,
    state::{Activity, HistoryOverlay, PanelView},
};

/// Transcript and conversation cache for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationStore {
    transcript: Vec<Message>,
    conversations: Option<Vec<ConversationSummary>>,
    active: Option<String>,
}

impl ConversationStore {
    /// Messages in display order.
    #[must_use]
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Cached conversation list in server order; empty until fetched.
    #[must_use]
    pub fn conversations(&self) -> &[ConversationSummary] {
        self.conversations.as_deref().unwrap_or_default()
    }

    /// Conversation the transcript was loaded from, if any.
    #[must_use]
    pub fn active_conversation(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Append one message.
    pub fn push(&mut self, message: Message) {
        self.transcript.push(message);
    }

    /// Begin a fresh, unsaved conversation.
    pub fn start_new(&mut self) {
        self.transcript.clear();
        self.active = None;
    }

    /// Replace the transcript wholesale with a loaded conversation.
    pub fn replace(&mut self, conversation_id: impl Into<String>, messages: Vec<Message>) {
        self.transcript = messages;
        self.active = Some(conversation_id.into());
    }

    /// Store the conversation list exactly as the server ordered it.
    pub fn set_conversations(&mut self, conversations: Vec<ConversationSummary>) {
        self.conversations = Some(conversations);
    }

    /// Forget everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl ChatPanel {
    /// Start a new chat: clear the transcript and reset the backend context.
    ///
    /// Returns `false` without doing anything when there is no session or an
    /// operation is in flight.
    pub async fn start_new(&self) -> bool {
        let (session_id, epoch) = {
            let mut inner = self.lock();
            let Some(session) = inner.session.session() else {
                return false;
            };
            let session_id = session.id.clone();
            if !inner.activity.is_idle() {
                return false;
            }
            inner.activity = Activity::Resetting;
            inner.store.start_new();
            self.emit(PanelEvent::TranscriptChanged);
            (session_id, inner.epoch)
        };

        let reset = self.client.new_conversation(&session_id).await;
        {
            let mut inner = self.lock();
            if inner.epoch == epoch {
                inner.activity = Activity::Idle;
            }
        }

        match reset {
            Ok(()) => tracing::debug!("backend conversation context reset"),
            Err(e) => {
                self.note_failure(epoch, "new conversation", &e);
            }
        }
        true
    }

    /// Fetch the conversation list and cache it.
    ///
    /// # Errors
    /// Returns error if there is no session or the backend call fails.
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, PanelError> {
        let (session_id, epoch) = self.current_session()?;

        match self.client.list_conversations(&session_id).await {
            Ok(conversations) => {
                let mut inner = self.lock();
                if inner.epoch != epoch {
                    return Err(PanelError::Superseded);
                }
                inner.store.set_conversations(conversations.clone());
                self.emit(PanelEvent::ConversationsChanged);
                Ok(conversations)
            }
            Err(e) => Err(self.note_failure(epoch, "list conversations", &e)),
        }
    }

    /// Open the history overlay and fetch the conversation list for it.
    ///
    /// Fetch failures are logged; the overlay stays open with whatever was
    /// cached before.
    pub async fn open_history(&self) {
        {
            let mut inner = self.lock();
            if !inner.view.is_open() {
                return;
            }
            inner.view = PanelView::Open {
                history: HistoryOverlay::Open,
            };
        }
        if let Err(e) = self.list_conversations().await {
            tracing::warn!("could not refresh conversation history: {e}");
        }
    }

    /// Open the history overlay if closed, close it otherwise.
    pub async fn toggle_history(&self) {
        let history_open = self.lock().view.is_history_open();
        if history_open {
            self.close_history();
        } else {
            self.open_history().await;
        }
    }

    /// Load a past conversation into the transcript.
    ///
    /// First marks the conversation active on the backend, then fetches its
    /// messages and replaces the transcript. If either phase fails the
    /// transcript is left exactly as it was. The two phases are not atomic on
    /// the backend side.
    ///
    /// # Errors
    /// Returns error if there is no session, an operation is in flight, or a
    /// backend call fails.
    pub async fn load_conversation(&self, conversation_id: &str) -> Result<(), PanelError> {
        let (session_id, epoch) = {
            let mut inner = self.lock();
            let Some(session) = inner.session.session() else {
                return Err(PanelError::NoSession);
            };
            let session_id = session.id.clone();
            if !inner.activity.is_idle() {
                return Err(PanelError::Busy);
            }
            inner.activity = Activity::Loading {
                conversation_id: conversation_id.to_string(),
            };
            (session_id, inner.epoch)
        };

        tracing::info!(conversation = conversation_id, "loading conversation");
        let fetched = match self
            .client
            .load_conversation(&session_id, conversation_id)
            .await
        {
            Ok(()) => {
                self.client
                    .conversation_messages(&session_id, conversation_id)
                    .await
            }
            Err(e) => Err(e),
        };

        let mut inner = self.lock();
        if inner.epoch != epoch {
            return Err(PanelError::Superseded);
        }
        inner.activity = Activity::Idle;

        match fetched {
            Ok(messages) => {
                tracing::debug!(
                    conversation = conversation_id,
                    count = messages.len(),
                    "conversation loaded"
                );
                inner.store.replace(conversation_id, messages);
                if inner.view.is_open() {
                    inner.view = PanelView::Open {
                        history: HistoryOverlay::Closed,
                    };
                }
                self.emit(PanelEvent::TranscriptChanged);
                Ok(())
            }
            Err(TransportError::Unauthorized) => {
                self.expire_session(&mut inner);
                Err(PanelError::SessionExpired)
            }
            Err(e) => {
                tracing::warn!(conversation = conversation_id, "load failed: {e}");
                Err(PanelError::Transport(e))
            }
        }
    }

    fn current_session(&self) -> Result<(SessionId, u64), PanelError> {
        let inner = self.lock();
        inner
            .session
            .session()
            .map(|session| (session.id.clone(), inner.epoch))
            .ok_or(PanelError::NoSession)
    }

    /// Log a failed conversation call, expiring the session on 401.
    fn note_failure(&self, epoch: u64, what: &str, error: &TransportError) -> PanelError {
        if !error.is_unauthorized() {
            tracing::warn!("{what} failed: {error}");
            return PanelError::Transport(error.clone());
        }
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return PanelError::Superseded;
        }
        self.expire_session(&mut inner);
        PanelError::SessionExpired
    }
}
