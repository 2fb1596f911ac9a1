//! Self-healing realtime push channel.
//!
//! The supervisor keeps exactly one connection open for the lifetime of the
//! application. Every close or failed connect schedules one reconnection after
//! a fixed delay; there is no retry cap and no backoff. Inbound `refresh`
//! events are republished on the [`EventBus`], everything else is ignored.

use std::{sync::Arc, time::Duration};

use agent_panel_core::{ChannelConnector, ChannelEvent, EventBus, PanelConfig};
use futures::StreamExt;
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};

/// Lifecycle of the realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Supervisor created, loop not yet running.
    Idle,
    /// Connection attempt in progress.
    Connecting,
    /// Connected and receiving events.
    Open,
    /// Connection lost; a reconnection is scheduled.
    Closed,
    /// Torn down; no further attempts.
    Stopped,
}

/// Supervisor for the realtime channel.
pub struct ChannelSupervisor {
    connector: Arc<dyn ChannelConnector>,
    url: String,
    reconnect_delay: Duration,
    bus: EventBus,
}

impl ChannelSupervisor {
    /// Create a supervisor for `url`.
    #[must_use]
    pub fn new(
        connector: Arc<dyn ChannelConnector>,
        url: impl Into<String>,
        reconnect_delay: Duration,
        bus: EventBus,
    ) -> Self {
        Self {
            connector,
            url: url.into(),
            reconnect_delay,
            bus,
        }
    }

    /// Create a supervisor from panel configuration.
    #[must_use]
    pub fn from_config(
        connector: Arc<dyn ChannelConnector>,
        config: &PanelConfig,
        bus: EventBus,
    ) -> Self {
        Self::new(
            connector,
            config.realtime_url.clone(),
            config.reconnect_delay,
            bus,
        )
    }

    /// Start the connection loop on the current runtime.
    #[must_use]
    pub fn spawn(self) -> SupervisorHandle {
        let (state_tx, state_rx) = watch::channel(ChannelState::Idle);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(state_tx, shutdown_rx));

        SupervisorHandle {
            state: state_rx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    async fn run(self, state: watch::Sender<ChannelState>, mut shutdown: oneshot::Receiver<()>) {
        loop {
            state.send_replace(ChannelState::Connecting);
            tracing::debug!(url = %self.url, "connecting realtime channel");

            let opened = tokio::select! {
                _ = &mut shutdown => break,
                res = self.connector.open_channel(&self.url) => res,
            };

            match opened {
                Ok(mut frames) => {
                    state.send_replace(ChannelState::Open);
                    tracing::info!(url = %self.url, "realtime channel open");

                    loop {
                        tokio::select! {
                            _ = &mut shutdown => {
                                state.send_replace(ChannelState::Stopped);
                                tracing::info!("realtime channel stopped");
                                return;
                            }
                            next = frames.next() => match next {
                                Some(Ok(text)) => self.dispatch(&text),
                                Some(Err(e)) => {
                                    tracing::warn!("realtime channel error: {e}");
                                    break;
                                }
                                None => break,
                            },
                        }
                    }
                }
                Err(e) => tracing::warn!("realtime channel connect failed: {e}"),
            }

            state.send_replace(ChannelState::Closed);
            tracing::info!(
                delay_ms = self.reconnect_delay.as_millis(),
                "realtime channel closed, reconnect scheduled"
            );

            tokio::select! {
                _ = &mut shutdown => break,
                () = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        state.send_replace(ChannelState::Stopped);
        tracing::info!("realtime channel stopped");
    }

    fn dispatch(&self, text: &str) {
        match serde_json::from_str::<ChannelEvent>(text) {
            Ok(event) if event.is_refresh() => {
                self.bus.publish(event);
            }
            Ok(event) => tracing::debug!(kind = %event.kind, "ignoring channel event"),
            Err(e) => tracing::warn!("dropping malformed channel payload: {e}"),
        }
    }
}

/// Handle to a running supervisor.
///
/// Dropping the handle stops the loop as well; [`SupervisorHandle::shutdown`]
/// additionally waits for it to finish.
pub struct SupervisorHandle {
    state: watch::Receiver<ChannelState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SupervisorHandle {
    /// Current channel state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Cancel any pending reconnection, close an open connection and wait for
    /// the loop to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("realtime supervisor task failed: {e}");
            }
        }
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
