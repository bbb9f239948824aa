//! Stream requests and start-position resolution.

use serde::{Deserialize, Serialize};

use crate::{
    BlockPosition, RecordKind,
    error::ResolveError,
    resolver::FinalityResolver,
};

/// Outbound events a request can be emitted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestEvent {
    ActionStream,
    DeltaStream,
}

impl RequestEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RequestEvent::ActionStream => "action_stream_request",
            RequestEvent::DeltaStream => "delta_stream_request",
        }
    }
}

impl std::fmt::Display for RequestEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `(field, value)` filter applied server side, e.g. `("act.data.to", "eosio")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFilter {
    pub field: String,
    pub value: String,
}

impl RequestFilter {
    #[must_use]
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self { field: field.into(), value: value.into() }
    }
}

/// Request for a filtered stream of action traces.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionRequest {
    pub contract: String,
    pub account: String,
    pub action: String,
    #[serde(default)]
    pub filters: Vec<RequestFilter>,
    #[serde(default)]
    pub start_from: BlockPosition,
    #[serde(default)]
    pub read_until: BlockPosition,
}

impl ActionRequest {
    /// Streams `action` on `contract`. Use `"*"` as a wildcard for either.
    #[must_use]
    pub fn new(contract: impl Into<String>, action: impl Into<String>) -> Self {
        Self { contract: contract.into(), action: action.into(), ..Self::default() }
    }

    /// Restricts the stream to actions notifying `account`.
    #[must_use]
    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = account.into();
        self
    }

    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(RequestFilter::new(field, value));
        self
    }

    #[must_use]
    pub fn start_from(mut self, position: impl Into<BlockPosition>) -> Self {
        self.start_from = position.into();
        self
    }

    #[must_use]
    pub fn read_until(mut self, position: impl Into<BlockPosition>) -> Self {
        self.read_until = position.into();
        self
    }
}

/// Request for a filtered stream of table deltas.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeltaRequest {
    pub code: String,
    pub table: String,
    pub scope: String,
    pub payer: String,
    #[serde(default)]
    pub filters: Vec<RequestFilter>,
    #[serde(default)]
    pub start_from: BlockPosition,
    #[serde(default)]
    pub read_until: BlockPosition,
}

impl DeltaRequest {
    /// Streams changes to `table` of contract `code`.
    #[must_use]
    pub fn new(code: impl Into<String>, table: impl Into<String>) -> Self {
        Self { code: code.into(), table: table.into(), ..Self::default() }
    }

    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    #[must_use]
    pub fn payer(mut self, payer: impl Into<String>) -> Self {
        self.payer = payer.into();
        self
    }

    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(RequestFilter::new(field, value));
        self
    }

    #[must_use]
    pub fn start_from(mut self, position: impl Into<BlockPosition>) -> Self {
        self.start_from = position.into();
        self
    }

    #[must_use]
    pub fn read_until(mut self, position: impl Into<BlockPosition>) -> Self {
        self.read_until = position.into();
        self
    }
}

/// Either kind of stream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRequest {
    Action(ActionRequest),
    Delta(DeltaRequest),
}

impl StreamRequest {
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            StreamRequest::Action(_) => RecordKind::Action,
            StreamRequest::Delta(_) => RecordKind::Delta,
        }
    }

    #[must_use]
    pub fn event(&self) -> RequestEvent {
        match self {
            StreamRequest::Action(_) => RequestEvent::ActionStream,
            StreamRequest::Delta(_) => RequestEvent::DeltaStream,
        }
    }

    #[must_use]
    pub fn start_from(&self) -> BlockPosition {
        match self {
            StreamRequest::Action(req) => req.start_from,
            StreamRequest::Delta(req) => req.start_from,
        }
    }

    #[must_use]
    pub fn read_until(&self) -> BlockPosition {
        match self {
            StreamRequest::Action(req) => req.read_until,
            StreamRequest::Delta(req) => req.read_until,
        }
    }

    fn set_start_from(&mut self, position: BlockPosition) {
        match self {
            StreamRequest::Action(req) => req.start_from = position,
            StreamRequest::Delta(req) => req.start_from = position,
        }
    }

    fn set_read_until(&mut self, position: BlockPosition) {
        match self {
            StreamRequest::Action(req) => req.read_until = position,
            StreamRequest::Delta(req) => req.read_until = position,
        }
    }

    /// The request as sent over the channel.
    pub(crate) fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            StreamRequest::Action(req) => serde_json::to_value(req),
            StreamRequest::Delta(req) => serde_json::to_value(req),
        }
    }

    /// Returns `true` once `finality` has passed a non-zero `read_until` bound.
    #[must_use]
    pub fn bound_exceeded(&self, finality: u64) -> bool {
        self.read_until().block_number().is_some_and(|until| until < finality)
    }

    /// Replaces the irreversible token with a concrete block and clamps a numeric start
    /// position to `last_delivered`.
    ///
    /// The resolver is only consulted when one of the positions is
    /// [`BlockPosition::Irreversible`]. A start of [`BlockPosition::Head`] is passed through
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error when the lookup fails; the request is left unchanged.
    pub async fn resolve_positions<R: FinalityResolver>(
        &mut self,
        resolver: &R,
        last_delivered: Option<u64>,
    ) -> Result<(), ResolveError> {
        let needs_lookup =
            self.start_from().is_irreversible() || self.read_until().is_irreversible();
        let irreversible = if needs_lookup {
            Some(resolver.resolve_irreversible_block().await?)
        } else {
            None
        };

        if let Some(lib) = irreversible {
            if self.read_until().is_irreversible() {
                self.set_read_until(BlockPosition::from(lib));
            }
        }

        let start = match (self.start_from(), irreversible) {
            (BlockPosition::Irreversible, Some(lib)) => {
                debug!(block_num = lib, "Stream starting at irreversible block");
                BlockPosition::from(lib)
            }
            (start, _) => clamp_start(start, last_delivered),
        };
        self.set_start_from(start);

        Ok(())
    }
}

impl From<ActionRequest> for StreamRequest {
    fn from(value: ActionRequest) -> Self {
        StreamRequest::Action(value)
    }
}

impl From<DeltaRequest> for StreamRequest {
    fn from(value: DeltaRequest) -> Self {
        StreamRequest::Delta(value)
    }
}

/// Raises a numeric start position to `last_delivered` so a replay never asks for blocks below
/// the last one handed to the consumer.
///
/// The last delivered block itself is requested again: a block can hold several records and
/// only some of them may have been delivered.
#[must_use]
pub fn clamp_start(start: BlockPosition, last_delivered: Option<u64>) -> BlockPosition {
    match (start, last_delivered) {
        (BlockPosition::Number(from), Some(last)) if last > from => {
            debug!(requested = from, clamped = last, "Clamping start position");
            BlockPosition::Number(last)
        }
        (position, _) => position,
    }
}
