//! Typed lifecycle notifications and their listener registry.

use std::{fmt, sync::Arc};

use crate::{
    Record, SubscriptionId,
    wire::{ForkData, LibData},
};

/// A lifecycle notification emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A record is about to be handed to the data handler.
    Data(Record),
    /// A record became irreversible and is about to be handed to the irreversible handler.
    IrreversibleData(Record),
    /// The delivery queue has no more pending records.
    Empty,
    /// The last in-flight handler finished and nothing else is queued.
    Drain,
    LibUpdate(LibData),
    Fork(ForkData),
    Connect,
    Disconnect,
    /// A subscription finished its backfill and now passes live records through.
    SwitchingToLive(SubscriptionId),
    /// A server-side stream error. The channel is closed right after.
    Error(String),
}

/// Discriminant of [`ClientEvent`], used to register listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Data,
    IrreversibleData,
    Empty,
    Drain,
    LibUpdate,
    Fork,
    Connect,
    Disconnect,
    SwitchingToLive,
    Error,
}

impl ClientEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::Data(_) => EventKind::Data,
            ClientEvent::IrreversibleData(_) => EventKind::IrreversibleData,
            ClientEvent::Empty => EventKind::Empty,
            ClientEvent::Drain => EventKind::Drain,
            ClientEvent::LibUpdate(_) => EventKind::LibUpdate,
            ClientEvent::Fork(_) => EventKind::Fork,
            ClientEvent::Connect => EventKind::Connect,
            ClientEvent::Disconnect => EventKind::Disconnect,
            ClientEvent::SwitchingToLive(_) => EventKind::SwitchingToLive,
            ClientEvent::Error(_) => EventKind::Error,
        }
    }
}

pub type Listener = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// Handle returned on registration, used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

struct Registration {
    id: ListenerId,
    kind: EventKind,
    once: bool,
    listener: Listener,
}

/// Fans events out to listeners registered per [`EventKind`].
///
/// Every emission runs all persistent listeners of the event's kind in registration order, then
/// consumes at most one pending one-shot listener, oldest first.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    registrations: Vec<Registration>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, kind: EventKind, listener: Listener) -> ListenerId {
        self.register(kind, listener, false)
    }

    pub fn once(&mut self, kind: EventKind, listener: Listener) -> ListenerId {
        self.register(kind, listener, true)
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.registrations.len();
        self.registrations.retain(|registration| registration.id != id);
        self.registrations.len() != before
    }

    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registrations.iter().filter(|registration| registration.kind == kind).count()
    }

    pub fn emit(&mut self, event: &ClientEvent) {
        let kind = event.kind();

        for registration in &self.registrations {
            if registration.kind == kind && !registration.once {
                (registration.listener)(event);
            }
        }

        if let Some(index) = self
            .registrations
            .iter()
            .position(|registration| registration.kind == kind && registration.once)
        {
            let registration = self.registrations.remove(index);
            (registration.listener)(event);
        }
    }

    fn register(&mut self, kind: EventKind, listener: Listener, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.registrations.push(Registration { id, kind, once, listener });
        id
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus").field("listeners", &self.registrations.len()).finish()
    }
}
