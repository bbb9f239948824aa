//! Shapes of the payloads exchanged with the stream server.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    BlockPosition, DeliveryMode, RecordKind, StreamError, SubscriptionId, error::Rejection,
};

/// Discriminator of a `message` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    ActionTrace,
    DeltaTrace,
    TraceInit,
    #[serde(other)]
    Unknown,
}

impl MessageType {
    #[must_use]
    pub fn record_kind(self) -> Option<RecordKind> {
        match self {
            MessageType::ActionTrace => Some(RecordKind::Action),
            MessageType::DeltaTrace => Some(RecordKind::Delta),
            MessageType::TraceInit | MessageType::Unknown => None,
        }
    }
}

/// A `message` payload: either a batch of traces or a history bootstrap (`trace_init`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DeliveryMode>,
    #[serde(rename = "reqUUID", default, skip_serializing_if = "Option::is_none")]
    pub req_uuid: Option<SubscriptionId>,
    /// Number of historical matches announced by a `trace_init`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_block: Option<u64>,
    /// Historical matches dropped server side while building this batch.
    #[serde(default)]
    pub filtered: u64,
    /// A single JSON-encoded trace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl SocketMessage {
    /// Returns `true` when the message carries a batch or a single encoded trace.
    #[must_use]
    pub fn has_traces(&self) -> bool {
        self.messages.is_some() || self.message.is_some()
    }

    /// Returns `true` for a batched message, the only shape that reports `filtered`.
    #[must_use]
    pub fn is_batch(&self) -> bool {
        self.messages.is_some()
    }

    /// Takes the traces out of the message, decoding the single-trace form.
    ///
    /// # Errors
    ///
    /// Fails when `message` is not valid JSON.
    pub fn take_traces(&mut self) -> Result<Vec<Value>, serde_json::Error> {
        if let Some(batch) = self.messages.take() {
            return Ok(batch);
        }
        match self.message.take() {
            Some(encoded) => Ok(vec![serde_json::from_str(&encoded)?]),
            None => Ok(Vec::new()),
        }
    }
}

/// A `lib_update` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    pub block_num: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<String>,
}

/// A `fork_event` payload: blocks `starting_block..=ending_block` were replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    pub starting_block: u64,
    pub ending_block: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_id: Option<String>,
}

/// Relay status notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayStatus {
    RelayRestored,
    RelayDown,
    Other(String),
}

impl From<&str> for RelayStatus {
    fn from(value: &str) -> Self {
        match value {
            "relay_restored" => RelayStatus::RelayRestored,
            "relay_down" => RelayStatus::RelayDown,
            other => RelayStatus::Other(other.to_owned()),
        }
    }
}

/// Outcome of an accepted stream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionAck {
    pub status: String,
    pub subscription_id: SubscriptionId,
    /// The start position actually sent, after resolution and clamping.
    pub starting_block: BlockPosition,
}

const ACK_OK: &str = "OK";

/// Interprets the acknowledgement of a stream request.
///
/// Only `status == "OK"` accepts the request; an accepted acknowledgement must name the new
/// subscription under `reqUUID`.
pub(crate) fn parse_ack(
    ack: Value,
    starting_block: BlockPosition,
) -> Result<SubscriptionAck, StreamError> {
    if ack.get("status").and_then(Value::as_str) != Some(ACK_OK) {
        return Err(StreamError::Rejected(Rejection::from_ack(ack)));
    }
    let subscription_id = ack
        .get("reqUUID")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| StreamError::MalformedAck(format!("missing reqUUID in {ack}")))?;

    Ok(SubscriptionAck {
        status: ACK_OK.to_owned(),
        subscription_id: SubscriptionId::new(subscription_id),
        starting_block,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn batch_message_shape() {
        let mut msg: SocketMessage = serde_json::from_value(json!({
            "type": "action_trace",
            "mode": "history",
            "reqUUID": "abc",
            "filtered": 2,
            "messages": [{"block_num": 1}, {"block_num": 2}]
        }))
        .unwrap();

        assert_eq!(msg.message_type.record_kind(), Some(RecordKind::Action));
        assert_eq!(msg.mode, Some(DeliveryMode::History));
        assert!(msg.is_batch());
        assert_eq!(msg.take_traces().unwrap().len(), 2);
        assert!(!msg.has_traces());
    }

    #[test]
    fn single_message_is_decoded() {
        let mut msg: SocketMessage = serde_json::from_value(json!({
            "type": "delta_trace",
            "mode": "live",
            "reqUUID": "abc",
            "message": "{\"block_num\": 9}"
        }))
        .unwrap();

        assert_eq!(msg.filtered, 0);
        assert_eq!(msg.take_traces().unwrap(), vec![json!({"block_num": 9})]);
    }

    #[test]
    fn unknown_message_types_are_tolerated() {
        let msg: SocketMessage = serde_json::from_value(json!({"type": "heartbeat"})).unwrap();
        assert_eq!(msg.message_type, MessageType::Unknown);
    }

    #[test]
    fn ack_ok_requires_request_id() {
        let ack = parse_ack(json!({"status": "OK", "reqUUID": "r-1"}), BlockPosition::Number(5))
            .unwrap();
        assert_eq!(ack.subscription_id.as_str(), "r-1");
        assert_eq!(ack.starting_block, BlockPosition::Number(5));

        let missing = parse_ack(json!({"status": "OK"}), BlockPosition::Head);
        assert!(matches!(missing, Err(StreamError::MalformedAck(_))));
    }

    #[test]
    fn non_ok_ack_is_a_rejection() {
        let result = parse_ack(json!({"status": "ERROR", "error": "bad"}), BlockPosition::Head);
        match result {
            Err(StreamError::Rejected(rejection)) => assert_eq!(rejection.to_string(), "bad"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }
}
