//! Process-wide broadcast of realtime channel events.

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::ChannelEvent;

/// Default channel capacity; slower subscribers lag past this.
const DEFAULT_CAPACITY: usize = 1024;

/// Publish/subscribe bus for events arriving on the realtime channel.
///
/// Publishers never block and never learn who listens. Events are transient:
/// a subscriber only sees events published after it subscribed.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChannelEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus that buffers up to `capacity` events per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event, returning how many subscribers will see it.
    pub fn publish(&self, event: ChannelEvent) -> usize {
        let kind = event.kind.clone();
        let delivered = self.sender.send(event).unwrap_or(0);
        tracing::debug!(kind = %kind, delivered, "published channel event");
        delivered
    }

    /// Get a receiver for live events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.sender.subscribe()
    }

    /// Stream of live events that skips over lag notifications.
    #[must_use]
    pub fn subscribe_stream(&self) -> futures::stream::BoxStream<'static, ChannelEvent> {
        BroadcastStream::new(self.subscribe())
            .filter_map(|res| async move {
                match res {
                    Ok(event) => Some(event),
                    Err(e) => {
                        tracing::warn!("event subscriber lagged: {e}");
                        None
                    }
                }
            })
            .boxed()
    }
}
