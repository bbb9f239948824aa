use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::{
    ActionRequest, BlockPosition, ClientEvent, DeltaRequest, EventKind, ListenerId, RecordKind,
    StreamError, StreamRequest, SubscriptionAck, SubscriptionId,
    stream_client::{
        GateState,
        service::{Command, ListenerSlot},
    },
};

/// Handle to a running stream engine.
///
/// Cheap to clone. The engine stops, closing the channel, once every handle has been dropped.
#[derive(Debug, Clone)]
pub struct StreamClient {
    command_sender: mpsc::Sender<Command>,
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    /// Whether the engine considers the server reachable.
    pub online: bool,
    /// Whether the transport reports an open connection.
    pub connected: bool,
    pub last_delivered_block: Option<u64>,
    pub finality_watermark: Option<u64>,
    /// Records waiting in the delivery queue.
    pub queued: usize,
    /// Delivered records not yet irreversible.
    pub reversible: usize,
    /// Tracked subscriptions in acceptance order.
    pub subscriptions: Vec<SubscriptionSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    pub subscription_id: SubscriptionId,
    pub kind: RecordKind,
    pub start_from: BlockPosition,
    pub read_until: BlockPosition,
    pub gate: GateState,
    pub started: bool,
    pub delivery_counter: u64,
    pub filtered_count: u64,
    pub expected_history_total: Option<u64>,
    pub first_block: Option<u64>,
    /// Live records held back until the backfill completes.
    pub pending_live: usize,
}

impl EngineSnapshot {
    #[must_use]
    pub fn subscription(&self, id: &SubscriptionId) -> Option<&SubscriptionSnapshot> {
        self.subscriptions.iter().find(|subscription| &subscription.subscription_id == id)
    }
}

impl StreamClient {
    pub(crate) fn new(command_sender: mpsc::Sender<Command>) -> Self {
        Self { command_sender }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, StreamError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_sender
            .send(command(response_tx))
            .await
            .map_err(|_| StreamError::ServiceShutdown)?;
        response_rx.await.map_err(|_| StreamError::ServiceShutdown)
    }

    /// Opens the channel and replays any request accepted before a previous drop.
    ///
    /// Does nothing if the channel is already open.
    ///
    /// # Errors
    ///
    /// * [`StreamError::Channel`] - if the transport fails to connect.
    /// * [`StreamError::ServiceShutdown`] - if the engine has stopped.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub async fn connect(&self) -> Result<(), StreamError> {
        self.request(|response| Command::Connect { response }).await?
    }

    /// Closes the channel and forgets every subscription and delivery watermark.
    ///
    /// # Errors
    ///
    /// * [`StreamError::ServiceShutdown`] - if the engine has stopped.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub async fn disconnect(&self) -> Result<(), StreamError> {
        self.request(|response| Command::Disconnect { response }).await
    }

    /// Requests a filtered stream of action traces.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit).
    pub async fn stream_actions(
        &self,
        request: ActionRequest,
    ) -> Result<SubscriptionAck, StreamError> {
        self.submit(request.into()).await
    }

    /// Requests a filtered stream of table deltas.
    ///
    /// # Errors
    ///
    /// See [`submit`](Self::submit).
    pub async fn stream_deltas(
        &self,
        request: DeltaRequest,
    ) -> Result<SubscriptionAck, StreamError> {
        self.submit(request.into()).await
    }

    /// Submits a stream request.
    ///
    /// A `"LIB"` position is resolved through the configured resolver first, and a numeric
    /// `start_from` below the last delivered block is raised to it. The request is tracked, and
    /// replayed after reconnects, only once the server acknowledges it.
    ///
    /// # Errors
    ///
    /// * [`StreamError::NotConnected`] - if the channel is not open.
    /// * [`StreamError::FinalityLookup`] - if the irreversible block could not be resolved.
    /// * [`StreamError::Rejected`] - if the server refused the request.
    /// * [`StreamError::MalformedAck`] - if the acknowledgement did not name the subscription.
    /// * [`StreamError::Channel`] - if the request or its acknowledgement was lost.
    /// * [`StreamError::ServiceShutdown`] - if the engine has stopped.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub async fn submit(&self, request: StreamRequest) -> Result<SubscriptionAck, StreamError> {
        self.request(|response| Command::Submit { request, response }).await?
    }

    /// Registers a persistent listener for `kind`.
    ///
    /// # Errors
    ///
    /// * [`StreamError::ServiceShutdown`] - if the engine has stopped.
    pub async fn on<F>(&self, kind: EventKind, listener: F) -> Result<ListenerId, StreamError>
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        let listener = ListenerSlot(Arc::new(listener));
        self.request(|response| Command::Listen { kind, once: false, listener, response }).await
    }

    /// Registers a listener that runs for at most one event of `kind`.
    ///
    /// # Errors
    ///
    /// * [`StreamError::ServiceShutdown`] - if the engine has stopped.
    pub async fn once<F>(&self, kind: EventKind, listener: F) -> Result<ListenerId, StreamError>
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        let listener = ListenerSlot(Arc::new(listener));
        self.request(|response| Command::Listen { kind, once: true, listener, response }).await
    }

    /// Removes a listener. Returns `false` if it had already been removed or consumed.
    ///
    /// # Errors
    ///
    /// * [`StreamError::ServiceShutdown`] - if the engine has stopped.
    pub async fn off(&self, id: ListenerId) -> Result<bool, StreamError> {
        self.request(|response| Command::Unlisten { id, response }).await
    }

    /// The highest block number handed to the data handler on this connection.
    ///
    /// # Errors
    ///
    /// * [`StreamError::ServiceShutdown`] - if the engine has stopped.
    pub async fn last_block_num(&self) -> Result<Option<u64>, StreamError> {
        Ok(self.snapshot().await?.last_delivered_block)
    }

    /// # Errors
    ///
    /// * [`StreamError::ServiceShutdown`] - if the engine has stopped.
    pub async fn snapshot(&self) -> Result<EngineSnapshot, StreamError> {
        self.request(|response| Command::Snapshot { response }).await
    }
}
