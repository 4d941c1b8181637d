//! WebSocket transport
//!
//! One task per connection, reporting generation-tagged events back to the
//! owner, plus the reconnect backoff policy used by the streaming client.

mod backoff;
mod client;
mod types;

pub use backoff::Backoff;
pub use client::TungsteniteConnector;
pub(crate) use client::sleep_until_opt;
pub use types::{
    ConnectionHandle, StreamConnector, StreamEvent, StreamEventKind, WsConfig, WsError,
};
