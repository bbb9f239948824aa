//! Test doubles and assertion helpers, available with the `test-utils` feature.

pub mod macros;
mod mock_channel;
mod static_resolver;

pub use mock_channel::MockChannel;
pub use static_resolver::StaticResolver;

use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    ChannelEvent, ClientEvent, DeliveryMode, EventKind, StreamClient, StreamError, SubscriptionId,
    wire::{LibData, MessageType, SocketMessage},
};

/// Subscribes to `kinds` and returns every matching event as a stream.
///
/// # Errors
///
/// Fails if the engine has stopped.
pub async fn record_events(
    client: &StreamClient,
    kinds: &[EventKind],
) -> Result<UnboundedReceiverStream<ClientEvent>, StreamError> {
    let (tx, rx) = mpsc::unbounded_channel();
    for &kind in kinds {
        let tx = tx.clone();
        client
            .on(kind, move |event| {
                let _ = tx.send(event.clone());
            })
            .await?;
    }
    Ok(UnboundedReceiverStream::new(rx))
}

/// A `trace_init` announcing `results` historical records starting at `first_block`.
#[must_use]
pub fn trace_init(id: &str, first_block: u64, results: u64) -> ChannelEvent {
    ChannelEvent::Message(SocketMessage {
        message_type: MessageType::TraceInit,
        mode: Some(DeliveryMode::History),
        req_uuid: Some(SubscriptionId::new(id)),
        results: Some(results),
        first_block: Some(first_block),
        filtered: 0,
        message: None,
        messages: None,
        error: None,
    })
}

/// A batch of `transfer` action traces, one per block.
#[must_use]
pub fn action_batch(id: &str, mode: DeliveryMode, blocks: &[u64]) -> ChannelEvent {
    let traces = blocks.iter().map(|&block| action_trace(block)).collect();
    batch(MessageType::ActionTrace, id, mode, traces)
}

/// A batch of `accounts` table deltas, one per block.
#[must_use]
pub fn delta_batch(id: &str, mode: DeliveryMode, blocks: &[u64]) -> ChannelEvent {
    let traces = blocks
        .iter()
        .map(|&block| json!({ "block_num": block, "code": "eosio.token", "table": "accounts" }))
        .collect();
    batch(MessageType::DeltaTrace, id, mode, traces)
}

#[must_use]
pub fn action_trace(block_num: u64) -> Value {
    json!({
        "block_num": block_num,
        "act": { "account": "eosio.token", "name": "transfer", "data": {} }
    })
}

#[must_use]
pub fn lib_update(block_num: u64) -> ChannelEvent {
    ChannelEvent::LibUpdate(LibData { chain_id: None, block_num, block_id: None })
}

fn batch(
    message_type: MessageType,
    id: &str,
    mode: DeliveryMode,
    traces: Vec<Value>,
) -> ChannelEvent {
    ChannelEvent::Message(SocketMessage {
        message_type,
        mode: Some(mode),
        req_uuid: Some(SubscriptionId::new(id)),
        results: None,
        first_block: None,
        filtered: 0,
        message: None,
        messages: Some(traces),
        error: None,
    })
}
