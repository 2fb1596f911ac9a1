//! Core abstractions for the conversational agent panel.
//!
//! This crate provides the fundamental building blocks:
//! - `EventBus` - Process-wide broadcast of realtime channel events
//! - Data model (`Session`, `Message`, `ConversationSummary`, `ConnectionStatus`)
//! - `PanelConfig` - Endpoint and timing configuration
//! - `Transport` and `ChannelConnector` traits

pub mod config;
pub mod event_bus;
pub mod model;
pub mod traits;

pub use config::{ConfigError, PanelConfig};
pub use event_bus::EventBus;
pub use model::{
    ChannelEvent, ConnectionStatus, ConversationSummary, Message, Role, Session, SessionId,
    SessionOrigin,
};
pub use traits::{ChannelConnector, Endpoint, FrameStream, Transport, TransportError};
