use std::{future::Future, sync::Arc, time::Duration};

use futures::FutureExt;

use crate::{
    Channel, ClientEvent, EventBus, EventKind, Record, StreamError,
    resolver::FinalityResolver,
    stream_client::{
        DEFAULT_GRACE_PERIOD, RecordHandler, StreamClient,
        service::{Service, ServiceConfig},
    },
};

/// Default capacity of the command channel between client handles and the service.
pub const DEFAULT_COMMAND_BUFFER_CAPACITY: usize = 128;

/// Builder for a [`StreamClient`].
pub struct StreamClientBuilder<C, R> {
    channel: C,
    resolver: R,
    grace_period: Duration,
    irreversible_stream: bool,
    command_buffer_capacity: usize,
    data_handler: Option<RecordHandler>,
    irreversible_handler: Option<RecordHandler>,
    bus: EventBus,
}

impl<C: Channel, R: FinalityResolver> StreamClientBuilder<C, R> {
    /// Creates a builder with default settings.
    ///
    /// `resolver` is only consulted for requests using
    /// [`BlockPosition::Irreversible`](crate::BlockPosition::Irreversible).
    #[must_use]
    pub fn new(channel: C, resolver: R) -> Self {
        Self {
            channel,
            resolver,
            grace_period: DEFAULT_GRACE_PERIOD,
            irreversible_stream: false,
            command_buffer_capacity: DEFAULT_COMMAND_BUFFER_CAPACITY,
            data_handler: None,
            irreversible_handler: None,
            bus: EventBus::new(),
        }
    }

    /// Sets how long a completed backfill must stay complete before live records flow.
    ///
    /// Default is [`DEFAULT_GRACE_PERIOD`].
    #[must_use]
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Keeps delivered records until their block becomes irreversible, then emits them again as
    /// [`ClientEvent::IrreversibleData`] and passes them to the irreversible handler.
    #[must_use]
    pub fn irreversible_stream(mut self, enabled: bool) -> Self {
        self.irreversible_stream = enabled;
        self
    }

    /// Default is [`DEFAULT_COMMAND_BUFFER_CAPACITY`]. Must be greater than zero.
    #[must_use]
    pub fn command_buffer_capacity(mut self, capacity: usize) -> Self {
        self.command_buffer_capacity = capacity;
        self
    }

    /// Sets the consumer of delivered records.
    ///
    /// The next record is only delivered once the returned future completes.
    #[must_use]
    pub fn data_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.data_handler = Some(boxed_handler(handler));
        self
    }

    /// Sets the consumer of irreversible records. Requires
    /// [`irreversible_stream`](Self::irreversible_stream).
    #[must_use]
    pub fn irreversible_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.irreversible_handler = Some(boxed_handler(handler));
        self
    }

    /// Registers a listener before the client starts, so no early event is missed.
    #[must_use]
    pub fn on<F>(mut self, kind: EventKind, listener: F) -> Self
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.bus.on(kind, Arc::new(listener));
        self
    }

    /// Like [`on`](Self::on), but the listener is removed after its first invocation.
    #[must_use]
    pub fn once<F>(mut self, kind: EventKind, listener: F) -> Self
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.bus.once(kind, Arc::new(listener));
        self
    }

    /// Spawns the engine on the current tokio runtime and returns a handle to it.
    ///
    /// The channel is not opened yet; call [`StreamClient::connect`].
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidBufferCapacity`] if the command buffer capacity is zero.
    pub fn build(self) -> Result<StreamClient, StreamError> {
        if self.command_buffer_capacity == 0 {
            return Err(StreamError::InvalidBufferCapacity);
        }

        if self.irreversible_handler.is_some() && !self.irreversible_stream {
            warn!("Irreversible handler set without irreversible_stream, it will never run");
        }

        debug!(
            grace_period_ms = self.grace_period.as_millis(),
            irreversible_stream = self.irreversible_stream,
            command_buffer_capacity = self.command_buffer_capacity,
            "Building StreamClient"
        );

        let config = ServiceConfig {
            grace_period: self.grace_period,
            irreversible_stream: self.irreversible_stream,
            data_handler: self.data_handler,
            irreversible_handler: self.irreversible_handler,
            bus: self.bus,
        };
        let (service, command_sender) =
            Service::new(self.channel, self.resolver, config, self.command_buffer_capacity);
        tokio::spawn(service.run());

        Ok(StreamClient::new(command_sender))
    }
}

fn boxed_handler<F, Fut>(handler: F) -> RecordHandler
where
    F: Fn(Record) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |record| handler(record).boxed())
}
