//! Hyperion-Stream is a client engine for Hyperion action and delta streams.
//!
//! The main entry point is [`StreamClient`], built via [`StreamClientBuilder`] from a
//! [`Channel`] (the socket transport) and a [`FinalityResolver`](resolver::FinalityResolver)
//! (used to resolve the `"LIB"` start position).
//!
//! After connecting, submit one or more filtered requests with
//! [`StreamClient::stream_actions`] or [`StreamClient::stream_deltas`]. Delivered records are
//! passed to the data handler registered on the builder, and lifecycle events are fanned out to
//! listeners registered with `on` / `once`.
//!
//! # Ordering
//!
//! Records are delivered one at a time in arrival order across all subscriptions of a
//! connection; the next record waits for the data handler's future to complete. Within a
//! subscription, historical records always come before live ones: live records that arrive
//! during the backfill are held back until it has completed (see [`GateState`]).
//!
//! # Finality
//!
//! With [`StreamClientBuilder::irreversible_stream`] enabled, delivered records are kept until a
//! `lib_update` reports their block as irreversible. They are then emitted again, in delivery
//! order, as [`ClientEvent::IrreversibleData`] and passed to the irreversible handler.
//!
//! A request with a non-zero `read_until` bound closes the connection once the irreversible
//! block passes it.
//!
//! # Reconnects
//!
//! After a transport drop the engine replays every accepted request. Numeric start positions are
//! raised to the last delivered block, so ranges that were already delivered are not requested
//! again. Records in flight at the moment of the drop may be delivered twice.

#[macro_use]
mod logging;

pub mod resolver;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod wire;

mod channel;
mod error;
mod events;
mod record;
mod request;
mod stream_client;
mod types;

pub use channel::{Channel, ChannelEvent};
pub use error::{ChannelError, Rejection, ResolveError, StreamError};
pub use events::{ClientEvent, EventBus, EventKind, Listener, ListenerId};
pub use record::{Record, normalize_action, normalize_delta};
pub use request::{
    ActionRequest, DeltaRequest, RequestEvent, RequestFilter, StreamRequest, clamp_start,
};
pub use stream_client::{
    DEFAULT_COMMAND_BUFFER_CAPACITY, DEFAULT_GRACE_PERIOD, EngineSnapshot, GateState,
    RecordHandler, StreamClient, StreamClientBuilder, SubscriptionSnapshot,
};
pub use types::{BlockPosition, DeliveryMode, IRREVERSIBLE_TOKEN, RecordKind, SubscriptionId};
pub use wire::{ForkData, LibData, RelayStatus, SubscriptionAck};
