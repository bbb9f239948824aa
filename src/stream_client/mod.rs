//! The stream client engine.
//!
//! [`StreamClientBuilder`] spawns a single service task that owns all engine state. The
//! [`StreamClient`] handle talks to it over a command channel; the transport pushes
//! [`ChannelEvent`](crate::ChannelEvent)s into it directly.
//!
//! # Delivery order
//!
//! Records are handed to the data handler one at a time, in arrival order across all
//! subscriptions of the connection. The next record is only admitted once the handler's future
//! has completed.
//!
//! Per subscription, historical records are delivered before live ones. Live records that arrive
//! while the backfill is still running are held back and released, oldest first, once every
//! announced historical record has been delivered (or reported as filtered) and the grace period
//! has elapsed without further history.
//!
//! # Reconnects
//!
//! When the transport comes back (a `connect` event, or a `relay_restored` status while offline)
//! every accepted request is submitted again. Numeric start positions are raised to the last
//! delivered block so already delivered ranges are not requested again. Records in flight at the
//! moment of the drop may still be delivered twice.
//!
//! # Example
//!
//! ```rust,no_run
//! use hyperion_stream::{
//!     ActionRequest, BlockPosition, StreamClientBuilder, resolver::ChainInfoResolverBuilder,
//! };
//! # use hyperion_stream::test_utils::MockChannel;
//!
//! # async fn example() -> anyhow::Result<()> {
//! # let channel = MockChannel::new();
//! let resolver = ChainInfoResolverBuilder::new("https://api.example.com").build()?;
//! let client = StreamClientBuilder::new(channel, resolver)
//!     .irreversible_stream(true)
//!     .data_handler(|record| async move {
//!         println!("{} @ {}", record.subscription_id, record.block_num);
//!     })
//!     .build()?;
//!
//! client.connect().await?;
//! let ack = client
//!     .stream_actions(
//!         ActionRequest::new("eosio.token", "transfer").start_from(BlockPosition::Irreversible),
//!     )
//!     .await?;
//! println!("streaming from {}", ack.starting_block);
//! # Ok(()) }
//! ```

mod builder;
mod client;
mod delivery_queue;
mod finality_buffer;
mod gate;
mod resend;
mod service;
mod tracker;

use std::sync::Arc;

use futures::future::BoxFuture;

pub use builder::{DEFAULT_COMMAND_BUFFER_CAPACITY, StreamClientBuilder};
pub use client::{EngineSnapshot, StreamClient, SubscriptionSnapshot};
pub use gate::{DEFAULT_GRACE_PERIOD, GateState};

use crate::Record;

/// Async consumer of delivered (or irreversible) records.
pub type RecordHandler = Arc<dyn Fn(Record) -> BoxFuture<'static, ()> + Send + Sync>;
