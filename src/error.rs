use std::{fmt, mem::discriminant, sync::Arc};

use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by the stream client.
///
/// Every failure is scoped to a single submission or to the current connection; none of them
/// poisons the engine. [`StreamError::ServiceShutdown`] is the only variant after which the
/// client handle is no longer usable.
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    /// A subscription was submitted while the channel was not open.
    #[error("Client is not connected, call connect before sending requests")]
    NotConnected,

    /// The connection boundary failed to deliver a request or its acknowledgement.
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// The symbolic finality position could not be resolved to a block number.
    #[error("Finality lookup failed: {0}")]
    FinalityLookup(#[from] ResolveError),

    /// The server refused the subscription.
    #[error("Subscription rejected: {0}")]
    Rejected(Rejection),

    /// The acknowledgement did not have the expected shape.
    #[error("Malformed acknowledgement: {0}")]
    MalformedAck(String),

    /// The engine task has stopped and no longer accepts commands.
    #[error("Stream service has shut down")]
    ServiceShutdown,

    /// The configured command buffer capacity is invalid (must be greater than zero).
    #[error("Command buffer capacity must be greater than 0")]
    InvalidBufferCapacity,

    /// The configured endpoint is not a valid URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl PartialEq for StreamError {
    fn eq(&self, other: &Self) -> bool {
        discriminant(self) == discriminant(other)
    }
}

/// Failures reported by a [`Channel`](crate::Channel) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The transport is not open.
    #[error("channel is closed")]
    Closed,

    /// The request was sent but the peer never acknowledged it.
    #[error("acknowledgement dropped")]
    AckDropped,

    /// Any other transport level failure.
    #[error("{0}")]
    Transport(String),
}

/// Failures while resolving the current irreversible block.
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// The lookup did not complete within the configured call timeout.
    #[error("Operation timed out")]
    Timeout,

    /// The HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(Arc<reqwest::Error>),

    /// The endpoint answered but the body did not contain a usable block number.
    #[error("Malformed chain info response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for ResolveError {
    fn from(error: reqwest::Error) -> Self {
        ResolveError::Http(Arc::new(error))
    }
}

impl From<tokio::time::error::Elapsed> for ResolveError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ResolveError::Timeout
    }
}

/// Negative acknowledgement returned by the server for a stream request.
#[derive(Debug, Clone)]
pub struct Rejection {
    /// Value of the `status` field, when present.
    pub status: Option<String>,
    /// Human readable reason, when present.
    pub reason: Option<String>,
    /// The full acknowledgement payload.
    pub payload: Value,
}

impl Rejection {
    pub(crate) fn from_ack(payload: Value) -> Self {
        let status = payload.get("status").map(|status| match status {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        let reason = payload.get("error").and_then(Value::as_str).map(str::to_owned);
        Self { status, reason, payload }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.status, &self.reason) {
            (_, Some(reason)) => write!(f, "{reason}"),
            (Some(status), None) => write!(f, "status {status}"),
            (None, None) => write!(f, "{}", self.payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn rejection_prefers_reason_over_status() {
        let rejection = Rejection::from_ack(json!({"status": "ERROR", "error": "invalid table"}));

        assert_eq!(rejection.status.as_deref(), Some("ERROR"));
        assert_eq!(rejection.to_string(), "invalid table");
    }

    #[test]
    fn rejection_with_boolean_status() {
        let rejection = Rejection::from_ack(json!({"status": false}));

        assert_eq!(rejection.status.as_deref(), Some("false"));
        assert_eq!(rejection.to_string(), "status false");
    }

    #[test]
    fn stream_errors_compare_by_variant() {
        assert_eq!(StreamError::NotConnected, StreamError::NotConnected);
        assert_eq!(
            StreamError::FinalityLookup(ResolveError::Timeout),
            StreamError::FinalityLookup(ResolveError::MalformedResponse(String::new()))
        );
        assert_ne!(StreamError::NotConnected, StreamError::ServiceShutdown);
    }
}
