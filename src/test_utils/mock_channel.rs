use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::{Channel, ChannelError, ChannelEvent, RequestEvent, wire::RelayStatus};

/// In-memory [`Channel`] driven by the test.
///
/// Requests are acknowledged from a scripted queue; once it is empty every request is accepted
/// under a fresh `req-N` id. Inbound events are injected with [`MockChannel::inject`].
#[derive(Debug, Default)]
pub struct MockChannel {
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    fail_connect: bool,
    events: Option<mpsc::UnboundedSender<ChannelEvent>>,
    acks: VecDeque<Result<Value, ChannelError>>,
    next_id: u64,
    emitted: Vec<(RequestEvent, Value)>,
    disconnects: usize,
}

impl MockChannel {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Makes the next [`Channel::connect`] fail.
    pub fn fail_next_connect(&self) {
        self.state().fail_connect = true;
    }

    /// Queues the acknowledgement for the next request.
    pub fn push_ack(&self, ack: Value) {
        self.state().acks.push_back(Ok(ack));
    }

    /// Queues a transport failure for the next request.
    pub fn push_ack_error(&self, error: ChannelError) {
        self.state().acks.push_back(Err(error));
    }

    /// Delivers `event` to the engine as if it came from the server.
    ///
    /// # Panics
    ///
    /// If the channel was never connected.
    pub fn inject(&self, event: ChannelEvent) {
        let state = self.state();
        let events = state.events.as_ref().expect("channel was never connected");
        let _ = events.send(event);
    }

    /// Simulates a transport drop.
    pub fn drop_connection(&self) {
        self.state().connected = false;
        self.inject(ChannelEvent::Disconnect);
    }

    /// Simulates the transport reconnecting on its own.
    pub fn restore(&self) {
        self.state().connected = true;
        self.inject(ChannelEvent::Connect);
    }

    pub fn relay_status(&self, status: RelayStatus) {
        self.inject(ChannelEvent::Status(status));
    }

    /// Every request emitted so far, in order.
    #[must_use]
    pub fn emitted(&self) -> Vec<(RequestEvent, Value)> {
        self.state().emitted.clone()
    }

    /// Number of explicit [`Channel::disconnect`] calls.
    #[must_use]
    pub fn disconnects(&self) -> usize {
        self.state().disconnects
    }
}

impl Channel for MockChannel {
    async fn connect(
        &self,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Result<(), ChannelError> {
        let mut state = self.state();
        if std::mem::take(&mut state.fail_connect) {
            return Err(ChannelError::Transport("connection refused".to_owned()));
        }
        state.connected = true;
        let _ = events.send(ChannelEvent::Connect);
        state.events = Some(events);
        Ok(())
    }

    async fn disconnect(&self) {
        let mut state = self.state();
        state.connected = false;
        state.disconnects += 1;
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    async fn emit(&self, event: RequestEvent, payload: Value) -> Result<Value, ChannelError> {
        let mut state = self.state();
        if !state.connected {
            return Err(ChannelError::Closed);
        }
        state.emitted.push((event, payload));
        if let Some(ack) = state.acks.pop_front() {
            return ack;
        }
        state.next_id += 1;
        Ok(json!({ "status": "OK", "reqUUID": format!("req-{}", state.next_id) }))
    }
}
