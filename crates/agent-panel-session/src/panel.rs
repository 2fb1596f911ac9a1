//! Chat panel handle and its visibility controller.
//!
//! All panel state lives behind one synchronous mutex. Every operation checks
//! and transitions its guard under the lock, releases it across the backend
//! call, then re-acquires it to apply the result. The lock is never held
//! across an await point.
//!
//! Every transition that invalidates in-flight work (starting a handshake,
//! destroying a session) bumps an epoch. Results that come back under an older
//! epoch are discarded, so a reply never lands in a transcript it does not
//! belong to.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use agent_panel_core::{ConnectionStatus, Message, Transport};
use agent_panel_transport::AgentClient;
use tokio::sync::broadcast;

use crate::{
    ConversationStore,
    state::{Activity, HistoryOverlay, PanelEvent, PanelSnapshot, PanelView, SessionState},
    token::TokenSource,
};

const EVENT_CAPACITY: usize = 256;

/// Shown when the backend rejects the session mid-conversation.
pub(crate) const SESSION_EXPIRED_NOTICE: &str =
    "Your session has expired. Please reconnect to continue.";

pub(crate) struct Inner {
    pub(crate) session: SessionState,
    pub(crate) activity: Activity,
    pub(crate) view: PanelView,
    pub(crate) store: ConversationStore,
    pub(crate) epoch: u64,
}

/// One chat panel instance: at most one session, one transcript and one
/// outstanding exchange at a time.
pub struct ChatPanel {
    pub(crate) client: AgentClient,
    pub(crate) tokens: Arc<dyn TokenSource>,
    inner: Mutex<Inner>,
    events: broadcast::Sender<PanelEvent>,
}

impl ChatPanel {
    /// Create a closed, disconnected panel.
    #[must_use]
    pub fn new(client: AgentClient, tokens: Arc<dyn TokenSource>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            client,
            tokens,
            inner: Mutex::new(Inner {
                session: SessionState::Disconnected,
                activity: Activity::Idle,
                view: PanelView::Closed,
                store: ConversationStore::default(),
                epoch: 0,
            }),
            events,
        }
    }

    /// Create a panel directly over a transport.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>, tokens: Arc<dyn TokenSource>) -> Self {
        Self::new(AgentClient::new(transport), tokens)
    }

    /// Subscribe to rendering notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.events.subscribe()
    }

    /// Current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.lock().session.status()
    }

    /// Whether a session is live.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.lock().session.session().is_some()
    }

    /// Copy of the current transcript.
    #[must_use]
    pub fn transcript(&self) -> Vec<Message> {
        self.lock().store.transcript().to_vec()
    }

    /// Everything the panel renders.
    #[must_use]
    pub fn snapshot(&self) -> PanelSnapshot {
        let inner = self.lock();
        PanelSnapshot {
            status: inner.session.status(),
            error: inner.session.error_message().map(str::to_owned),
            view: inner.view,
            transcript: inner.store.transcript().to_vec(),
            conversations: inner.store.conversations().to_vec(),
            active_conversation: inner.store.active_conversation().map(str::to_owned),
            busy: !inner.activity.is_idle(),
        }
    }

    /// Open the panel.
    ///
    /// Requests input focus and, when there is no session and nothing in
    /// flight, starts exactly one silent token handshake.
    pub async fn open(&self) {
        let attempt = {
            let mut inner = self.lock();
            if !inner.view.is_open() {
                inner.view = PanelView::Open {
                    history: HistoryOverlay::Closed,
                };
                self.emit(PanelEvent::FocusInput);
            }
            if matches!(inner.session, SessionState::Disconnected) {
                Some(self.begin_auth(&mut inner))
            } else {
                None
            }
        };

        if let Some(attempt) = attempt {
            tracing::info!("panel opened without a session, auto-connecting");
            let _ = self.run_token_handshake(attempt).await;
        }
    }

    /// Close the panel. In-flight work keeps running.
    pub fn close(&self) {
        self.lock().view = PanelView::Closed;
    }

    /// Open the panel if closed, close it otherwise.
    pub async fn toggle(&self) {
        let is_open = self.lock().view.is_open();
        if is_open {
            self.close();
        } else {
            self.open().await;
        }
    }

    /// Close the history overlay.
    pub fn close_history(&self) {
        let mut inner = self.lock();
        if inner.view.is_open() {
            inner.view = PanelView::Open {
                history: HistoryOverlay::Closed,
            };
        }
    }

    /// Log out from the widget and return to a disconnected state.
    ///
    /// The remote logout is best-effort; its failure is only logged.
    pub async fn new_connection(&self) {
        let previous = {
            let mut inner = self.lock();
            let previous = std::mem::take(&mut inner.session);
            inner.epoch += 1;
            inner.activity = Activity::Idle;
            inner.store.reset();
            if inner.view.is_open() {
                inner.view = PanelView::Open {
                    history: HistoryOverlay::Closed,
                };
            }
            self.emit(PanelEvent::StatusChanged(ConnectionStatus::Disconnected));
            self.emit(PanelEvent::TranscriptChanged);
            self.emit(PanelEvent::ConversationsChanged);
            previous
        };

        if let Some(session) = previous.session() {
            tracing::info!(session = %session.id, "logging out");
            if let Err(e) = self.client.logout(&session.id).await {
                tracing::warn!("best-effort logout failed: {e}");
            }
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn emit(&self, event: PanelEvent) {
        let _ = self.events.send(event);
    }

    /// Tear down a session the backend no longer accepts.
    pub(crate) fn expire_session(&self, inner: &mut Inner) {
        tracing::info!("session expired, re-authentication required");
        inner.session = SessionState::Disconnected;
        inner.epoch += 1;
        inner.activity = Activity::Idle;
        inner.store.push(Message::system(SESSION_EXPIRED_NOTICE));
        self.emit(PanelEvent::StatusChanged(ConnectionStatus::Disconnected));
        self.emit(PanelEvent::SessionExpired);
        self.emit(PanelEvent::TranscriptChanged);
    }
}
