//! Transport layer for the conversational agent panel.
//!
//! Provides:
//! - Wire protocol for backend payloads
//! - `AgentClient` - typed calls over any `Transport`
//! - `ChannelSupervisor` - self-healing realtime push connection
//! - HTTP transport (feature: http)
//! - WebSocket channel connector (feature: websocket)

pub mod client;
pub mod protocol;
pub mod realtime;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use client::AgentClient;
pub use realtime::{ChannelState, ChannelSupervisor, SupervisorHandle};

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnector;
