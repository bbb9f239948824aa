use std::{collections::VecDeque, future::pending};

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::time::delay_queue::Key;

use crate::{
    Channel, ChannelEvent, ChannelError, ClientEvent, EventBus, EventKind, Listener, ListenerId,
    Record, StreamError, StreamRequest, SubscriptionId,
    resolver::FinalityResolver,
    stream_client::{
        EngineSnapshot, RecordHandler, SubscriptionSnapshot,
        delivery_queue::DeliveryQueue,
        finality_buffer::FinalityBuffer,
        gate::GraceTimers,
        tracker::{Admission, RequestTracker},
    },
    wire::{LibData, MessageType, RelayStatus, SocketMessage, SubscriptionAck, parse_ack},
};

#[derive(Debug)]
pub(crate) enum Command {
    Connect {
        response: oneshot::Sender<Result<(), StreamError>>,
    },
    Disconnect {
        response: oneshot::Sender<()>,
    },
    Submit {
        request: StreamRequest,
        response: oneshot::Sender<Result<SubscriptionAck, StreamError>>,
    },
    Listen {
        kind: EventKind,
        once: bool,
        listener: ListenerSlot,
        response: oneshot::Sender<ListenerId>,
    },
    Unlisten {
        id: ListenerId,
        response: oneshot::Sender<bool>,
    },
    Snapshot {
        response: oneshot::Sender<EngineSnapshot>,
    },
}

/// Wrapper so [`Command`] can derive `Debug`.
pub(crate) struct ListenerSlot(pub Listener);

impl std::fmt::Debug for ListenerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Listener")
    }
}

pub(crate) struct ServiceConfig {
    pub grace_period: std::time::Duration,
    pub irreversible_stream: bool,
    pub data_handler: Option<RecordHandler>,
    pub irreversible_handler: Option<RecordHandler>,
    pub bus: EventBus,
}

/// Owns every piece of engine state. Runs on its own task until all client handles are dropped.
pub(crate) struct Service<C, R> {
    pub(super) channel: C,
    pub(super) resolver: R,
    commands: mpsc::Receiver<Command>,
    inbound_tx: mpsc::UnboundedSender<ChannelEvent>,
    inbound: mpsc::UnboundedReceiver<ChannelEvent>,
    pub(super) tracker: RequestTracker,
    pub(super) queue: DeliveryQueue,
    timers: GraceTimers,
    finality: FinalityBuffer,
    irreversible_queue: VecDeque<Record>,
    data_handler: Option<RecordHandler>,
    irreversible_handler: Option<RecordHandler>,
    in_flight: Option<BoxFuture<'static, ()>>,
    irreversible_in_flight: Option<BoxFuture<'static, ()>>,
    bus: EventBus,
    irreversible_stream: bool,
    online: bool,
    pub(super) last_delivered: Option<u64>,
    finality_watermark: Option<u64>,
}

impl<C: Channel, R: FinalityResolver> Service<C, R> {
    pub fn new(
        channel: C,
        resolver: R,
        config: ServiceConfig,
        command_buffer_capacity: usize,
    ) -> (Self, mpsc::Sender<Command>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(command_buffer_capacity);
        let (inbound_tx, inbound) = mpsc::unbounded_channel();

        let service = Self {
            channel,
            resolver,
            commands: cmd_rx,
            inbound_tx,
            inbound,
            tracker: RequestTracker::default(),
            queue: DeliveryQueue::default(),
            timers: GraceTimers::new(config.grace_period),
            finality: FinalityBuffer::default(),
            irreversible_queue: VecDeque::new(),
            data_handler: config.data_handler,
            irreversible_handler: config.irreversible_handler,
            in_flight: None,
            irreversible_in_flight: None,
            bus: config.bus,
            irreversible_stream: config.irreversible_stream,
            online: false,
            last_delivered: None,
            finality_watermark: None,
        };

        (service, cmd_tx)
    }

    pub async fn run(mut self) {
        info!("Starting stream service");

        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    if let Some(command) = cmd {
                        self.handle_command(command).await;
                    } else {
                        info!("All client handles dropped, shutting down");
                        break;
                    }
                }
                Some(event) = self.inbound.recv() => {
                    self.handle_channel_event(event).await;
                }
                Some((id, key)) = self.timers.next_expired(), if !self.timers.is_empty() => {
                    self.on_grace_expired(&id, &key);
                }
                () = poll_slot(&mut self.in_flight), if self.in_flight.is_some() => {
                    self.in_flight = None;
                    if self.queue.is_empty() {
                        self.bus.emit(&ClientEvent::Drain);
                    }
                }
                () = poll_slot(&mut self.irreversible_in_flight), if self.irreversible_in_flight.is_some() => {
                    self.irreversible_in_flight = None;
                }
            }

            self.pump();
            self.pump_irreversible();
        }

        if self.channel.is_connected() {
            self.channel.disconnect().await;
        }
        info!("Stream service stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { response } => {
                let result = self.connect().await;
                let _ = response.send(result);
            }
            Command::Disconnect { response } => {
                info!("Disconnect requested");
                self.close().await;
                let _ = response.send(());
            }
            Command::Submit { request, response } => {
                let result = self.submit(request).await;
                if let Err(e) = &result {
                    warn!(error = %e, "Stream request failed");
                }
                let _ = response.send(result);
            }
            Command::Listen { kind, once, listener, response } => {
                let id = if once {
                    self.bus.once(kind, listener.0)
                } else {
                    self.bus.on(kind, listener.0)
                };
                let _ = response.send(id);
            }
            Command::Unlisten { id, response } => {
                let _ = response.send(self.bus.off(id));
            }
            Command::Snapshot { response } => {
                let _ = response.send(self.snapshot());
            }
        }
    }

    async fn connect(&mut self) -> Result<(), StreamError> {
        if self.channel.is_connected() {
            debug!("Channel already connected");
            return Ok(());
        }
        self.channel.connect(self.inbound_tx.clone()).await?;
        info!("Channel connected");
        self.on_online().await;
        Ok(())
    }

    async fn on_online(&mut self) {
        self.online = true;
        self.bus.emit(&ClientEvent::Connect);
        self.resend().await;
    }

    /// Resolves, emits and registers one stream request.
    pub(super) async fn submit(
        &mut self,
        mut request: StreamRequest,
    ) -> Result<SubscriptionAck, StreamError> {
        if !self.channel.is_connected() {
            return Err(StreamError::NotConnected);
        }

        request.resolve_positions(&self.resolver, self.last_delivered).await?;

        let payload = request
            .to_payload()
            .map_err(|e| StreamError::Channel(ChannelError::Transport(e.to_string())))?;
        let ack = self.channel.emit(request.event(), payload).await?;
        let ack = parse_ack(ack, request.start_from())?;

        info!(
            subscription_id = %ack.subscription_id,
            event = %request.event(),
            start_from = %request.start_from(),
            read_until = %request.read_until(),
            "Stream request accepted"
        );
        self.tracker.accept(ack.subscription_id.clone(), request);
        trace!(subscriptions = self.tracker.len(), "Subscription tracked");

        Ok(ack)
    }

    async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connect => {
                if self.online {
                    trace!("Ignoring connect while online");
                } else {
                    info!("Channel reconnected");
                    self.on_online().await;
                }
            }
            ChannelEvent::Disconnect => self.on_transport_down(),
            ChannelEvent::Error(message) => {
                warn!(error = %message, "Channel reported an error");
            }
            ChannelEvent::Status(RelayStatus::RelayRestored) => {
                if !self.online {
                    info!("Relay restored");
                    self.online = true;
                    self.resend().await;
                }
            }
            ChannelEvent::Status(RelayStatus::RelayDown) => {
                warn!("Relay down");
                self.online = false;
            }
            ChannelEvent::Status(RelayStatus::Other(status)) => {
                debug!(status = %status, "Unhandled relay status");
            }
            ChannelEvent::Message(message) => self.on_message(message).await,
            ChannelEvent::LibUpdate(lib) => self.on_lib_update(lib).await,
            ChannelEvent::Fork(fork) => {
                info!(
                    starting_block = fork.starting_block,
                    ending_block = fork.ending_block,
                    "Fork detected"
                );
                self.bus.emit(&ClientEvent::Fork(fork));
            }
        }
    }

    /// The transport dropped. Replay state is kept for the next `connect`.
    ///
    /// Queued and held records of the dropped subscriptions are discarded. No gate may move while
    /// offline; the replay requests those records again from `last_delivered`.
    fn on_transport_down(&mut self) {
        let stale: Vec<SubscriptionId> = self.tracker.iter().map(|(id, _)| id.clone()).collect();
        let purged = self.queue.purge(&stale);
        warn!(last_delivered = ?self.last_delivered, purged, "Channel disconnected");
        self.online = false;
        for tracked in self.tracker.iter_mut() {
            tracked.cancel_grace(&mut self.timers);
            tracked.pending_live.clear();
        }
        self.timers.clear();
        self.finality_watermark = None;
        self.bus.emit(&ClientEvent::Disconnect);
    }

    /// Closes the channel and forgets every subscription.
    async fn close(&mut self) {
        self.channel.disconnect().await;
        self.online = false;
        self.timers.clear();
        self.tracker.clear();
        self.queue.clear();
        self.finality.clear();
        self.last_delivered = None;
        self.finality_watermark = None;
        self.bus.emit(&ClientEvent::Disconnect);
    }

    async fn on_message(&mut self, mut message: SocketMessage) {
        // only data messages carry stream errors
        let error = if message.has_traces() { message.error.take() } else { None };
        if let Some(error) = error.filter(|error| !error.is_null()) {
            let reason = match error {
                Value::String(reason) => reason,
                other => other.to_string(),
            };
            error!(
                subscription_id = ?message.req_uuid,
                error = %reason,
                "Server reported a stream error"
            );
            self.bus.emit(&ClientEvent::Error(reason));
            self.close().await;
            return;
        }

        let Some(id) = message.req_uuid.clone() else {
            warn!(message_type = ?message.message_type, "Dropping message without reqUUID");
            return;
        };

        match message.message_type {
            MessageType::TraceInit => {
                let Some(tracked) = self.tracker.get_mut(&id) else {
                    warn!(subscription_id = %id, "trace_init for untracked subscription");
                    return;
                };
                let results = message.results.unwrap_or_default();
                debug!(
                    subscription_id = %id,
                    first_block = ?message.first_block,
                    results,
                    "History announced"
                );
                tracked.announce_history(results, message.first_block, &mut self.timers);
            }
            MessageType::ActionTrace | MessageType::DeltaTrace => self.enqueue_traces(id, message),
            MessageType::Unknown => trace!(subscription_id = %id, "Ignoring unknown message type"),
        }
    }

    fn enqueue_traces(&mut self, id: SubscriptionId, mut message: SocketMessage) {
        let Some(kind) = message.message_type.record_kind() else {
            return;
        };
        let Some(mode) = message.mode else {
            warn!(subscription_id = %id, "Dropping traces without a delivery mode");
            return;
        };

        if message.is_batch() {
            if let Some(tracked) = self.tracker.get_mut(&id) {
                tracked.filtered_count += message.filtered;
            }
        }

        let traces = match message.take_traces() {
            Ok(traces) => traces,
            Err(e) => {
                warn!(subscription_id = %id, error = %e, "Dropping undecodable trace");
                return;
            }
        };

        for trace in traces {
            match Record::from_trace(id.clone(), kind, mode, trace) {
                Some(record) => self.queue.push(record),
                None => warn!(subscription_id = %id, "Dropping trace without block_num"),
            }
        }
    }

    async fn on_lib_update(&mut self, lib: LibData) {
        let finality = lib.block_num;

        if self.irreversible_stream {
            let drained = self.finality.drain_through(finality);
            if !drained.is_empty() {
                debug!(
                    block_num = finality,
                    records = drained.len(),
                    "Records became irreversible"
                );
            }
            self.irreversible_queue.extend(drained);
        }

        self.finality_watermark =
            Some(self.finality_watermark.map_or(finality, |watermark| watermark.max(finality)));
        self.bus.emit(&ClientEvent::LibUpdate(lib));

        if self.tracker.bound_exceeded(finality) {
            info!(block_num = finality, "Irreversible block passed read_until, disconnecting");
            self.close().await;
        }
    }

    fn on_grace_expired(&mut self, id: &SubscriptionId, key: &Key) {
        let Some(tracked) = self.tracker.get_mut(id) else {
            return;
        };
        let Some(released) = tracked.go_live(key) else {
            return;
        };
        info!(
            subscription_id = %id,
            released = released.len(),
            "History complete, switching to live"
        );
        self.queue.requeue_front(released.into_iter());
        self.bus.emit(&ClientEvent::SwitchingToLive(id.clone()));
    }

    /// Admits queued records until one is handed to the data handler or the queue runs dry.
    fn pump(&mut self) {
        while self.in_flight.is_none() {
            let Some(record) = self.queue.pop() else {
                break;
            };
            if self.queue.is_empty() {
                self.bus.emit(&ClientEvent::Empty);
            }

            self.admit(record);

            if self.in_flight.is_none() && self.queue.is_empty() {
                self.bus.emit(&ClientEvent::Drain);
            }
        }
    }

    fn admit(&mut self, record: Record) {
        let Some(tracked) = self.tracker.get_mut(&record.subscription_id) else {
            warn!(
                subscription_id = %record.subscription_id,
                block_num = record.block_num,
                "Dropping record for untracked subscription"
            );
            return;
        };

        if let Admission::Deliver { record, switched_to_live } =
            tracked.admit(record, &mut self.timers)
        {
            if switched_to_live {
                info!(subscription_id = %record.subscription_id, "Subscription started live");
                self.bus.emit(&ClientEvent::SwitchingToLive(record.subscription_id.clone()));
            }
            self.deliver(record);
        }
    }

    fn deliver(&mut self, record: Record) {
        let block_num = record.block_num;
        self.last_delivered =
            Some(self.last_delivered.map_or(block_num, |last| last.max(block_num)));
        trace!(
            subscription_id = %record.subscription_id,
            mode = ?record.mode,
            block_num,
            "Delivering record"
        );

        self.bus.emit(&ClientEvent::Data(record.clone()));
        if self.irreversible_stream {
            self.finality.push(record.clone());
        }
        if let Some(handler) = &self.data_handler {
            self.in_flight = Some(handler(record));
        }
    }

    fn pump_irreversible(&mut self) {
        while self.irreversible_in_flight.is_none() {
            let Some(record) = self.irreversible_queue.pop_front() else {
                break;
            };
            self.bus.emit(&ClientEvent::IrreversibleData(record.clone()));
            if let Some(handler) = &self.irreversible_handler {
                self.irreversible_in_flight = Some(handler(record));
            }
        }
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            online: self.online,
            connected: self.channel.is_connected(),
            last_delivered_block: self.last_delivered,
            finality_watermark: self.finality_watermark,
            queued: self.queue.len(),
            reversible: self.finality.len(),
            subscriptions: self
                .tracker
                .iter()
                .map(|(id, tracked)| SubscriptionSnapshot {
                    subscription_id: id.clone(),
                    kind: tracked.request.kind(),
                    start_from: tracked.request.start_from(),
                    read_until: tracked.request.read_until(),
                    gate: tracked.gate.state(),
                    started: tracked.started(),
                    delivery_counter: tracked.delivery_counter,
                    filtered_count: tracked.filtered_count,
                    expected_history_total: tracked.expected_history_total,
                    first_block: tracked.first_block,
                    pending_live: tracked.pending_live.len(),
                })
                .collect(),
        }
    }
}

/// Awaits the future in `slot`, or never resolves when the slot is empty.
async fn poll_slot(slot: &mut Option<BoxFuture<'static, ()>>) {
    match slot {
        Some(future) => future.await,
        None => pending().await,
    }
}
