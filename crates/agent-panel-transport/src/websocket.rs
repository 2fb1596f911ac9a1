//! WebSocket channel connector backed by `tokio-tungstenite`.

use agent_panel_core::{ChannelConnector, FrameStream, TransportError};
use async_trait::async_trait;
use futures::{StreamExt, future};
use tokio_tungstenite::tungstenite::Message;

/// Opens the realtime channel as a WebSocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Create a connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// What a single WebSocket message means to the channel.
enum Frame {
    Text(String),
    Skip,
    Closed,
    Failed(TransportError),
}

fn classify(msg: Result<Message, tokio_tungstenite::tungstenite::Error>) -> Frame {
    match msg {
        Ok(Message::Text(text)) => Frame::Text(text.as_str().to_owned()),
        Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
            Ok(text) => Frame::Text(text),
            Err(_) => {
                tracing::warn!("dropping non-UTF-8 binary frame");
                Frame::Skip
            }
        },
        Ok(Message::Close(_)) => Frame::Closed,
        Ok(_) => Frame::Skip,
        Err(e) => Frame::Failed(TransportError::Channel(e.to_string())),
    }
}

#[async_trait]
impl ChannelConnector for WebSocketConnector {
    async fn open_channel(&self, url: &str) -> Result<FrameStream, TransportError> {
        let (socket, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?;
        tracing::debug!(url, "websocket connected");

        // Only the inbound half is used; the write half is dropped with the stream.
        let frames = socket
            .map(classify)
            .take_while(|frame| future::ready(!matches!(frame, Frame::Closed)))
            .filter_map(|frame| {
                future::ready(match frame {
                    Frame::Text(text) => Some(Ok(text)),
                    Frame::Failed(e) => Some(Err(e)),
                    Frame::Skip | Frame::Closed => None,
                })
            });

        Ok(frames.boxed())
    }
}
