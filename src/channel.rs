//! The connection boundary consumed by the engine.

use std::{future::Future, sync::Arc};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::{
    error::ChannelError,
    request::RequestEvent,
    wire::{ForkData, LibData, RelayStatus, SocketMessage},
};

/// Notifications pushed by the transport into the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connect,
    Disconnect,
    Error(String),
    Status(RelayStatus),
    Message(SocketMessage),
    LibUpdate(LibData),
    Fork(ForkData),
}

impl ChannelEvent {
    /// Maps a named socket event and its payload to a [`ChannelEvent`].
    ///
    /// Returns `None` for unknown event names and for payloads that do not match the expected
    /// shape.
    #[must_use]
    pub fn decode(name: &str, payload: Value) -> Option<Self> {
        let event = match name {
            "connect" => ChannelEvent::Connect,
            "disconnect" => ChannelEvent::Disconnect,
            "error" => ChannelEvent::Error(match payload {
                Value::String(message) => message,
                other => other.to_string(),
            }),
            "status" => ChannelEvent::Status(RelayStatus::from(payload.as_str()?)),
            "message" => ChannelEvent::Message(serde_json::from_value(payload).ok()?),
            "lib_update" => ChannelEvent::LibUpdate(serde_json::from_value(payload).ok()?),
            "fork_event" => ChannelEvent::Fork(serde_json::from_value(payload).ok()?),
            _ => return None,
        };
        Some(event)
    }
}

/// A bidirectional event channel to the stream server.
///
/// Implementations own the transport. Once [`Channel::connect`] has been called they push every
/// inbound notification, including reconnects performed on their own, into `events`.
pub trait Channel: Send + Sync + 'static {
    /// Opens the transport. Resolves once the channel is connected.
    fn connect(
        &self,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Closes the transport. No further events are expected afterwards.
    fn disconnect(&self) -> impl Future<Output = ()> + Send;

    fn is_connected(&self) -> bool;

    /// Emits `payload` under `event` and waits for the server's acknowledgement.
    fn emit(
        &self,
        event: RequestEvent,
        payload: Value,
    ) -> impl Future<Output = Result<Value, ChannelError>> + Send;
}

impl<C: Channel> Channel for Arc<C> {
    fn connect(
        &self,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send {
        (**self).connect(events)
    }

    fn disconnect(&self) -> impl Future<Output = ()> + Send {
        (**self).disconnect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn emit(
        &self,
        event: RequestEvent,
        payload: Value,
    ) -> impl Future<Output = Result<Value, ChannelError>> + Send {
        (**self).emit(event, payload)
    }
}
