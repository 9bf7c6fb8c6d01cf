//! The listener-bus seam.
//!
//! The engine emits [`Event`]s through an [`EventBus`] it does not own the
//! semantics of: delivery order is the order lines arrived (dispatch happens
//! on the read task), but whether handling is inline, queued, or fanned out
//! to workers is the bus's business. Handlers must not block the bus for
//! long; they are on the ingest path.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::mpsc;
use tracing::debug;

use crate::events::{Event, EventKind};

/// Where events go.
pub trait EventBus: Send + Sync {
    /// Deliver one event. Called on the read task, in line order.
    fn on_event(&self, event: Event);

    /// The connection that owned this bus is gone; release resources.
    /// Called exactly once, after the final `Disconnect` event.
    fn shutdown(&self);
}

/// A bus that logs every event at debug level. The default when the
/// configuration does not name one.
#[derive(Debug, Default)]
pub struct TracingBus;

impl EventBus for TracingBus {
    fn on_event(&self, event: Event) {
        debug!(connection_id = event.connection_id, kind = ?event.kind, "event");
    }

    fn shutdown(&self) {}
}

/// A bus that forwards events into an unbounded channel, for consumers who
/// want to pull events from their own task.
pub struct ChannelEventBus {
    tx: Mutex<Option<mpsc::UnboundedSender<Event>>>,
}

impl ChannelEventBus {
    /// Create the bus and the receiving half.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl EventBus for ChannelEventBus {
    fn on_event(&self, event: Event) {
        let guard = self.tx.lock().expect("bus lock poisoned");
        if let Some(tx) = guard.as_ref() {
            // A dropped receiver just means nobody is listening any more.
            let _ = tx.send(event);
        }
    }

    fn shutdown(&self) {
        self.tx.lock().expect("bus lock poisoned").take();
    }
}

/// Stamps events with the connection id and hands them to the bus.
pub(crate) struct Dispatcher {
    bus: Arc<dyn EventBus>,
    connection_id: AtomicU32,
}

impl Dispatcher {
    pub(crate) fn new(bus: Arc<dyn EventBus>) -> Self {
        Self {
            bus,
            connection_id: AtomicU32::new(0),
        }
    }

    pub(crate) fn set_connection_id(&self, id: u32) {
        self.connection_id.store(id, Ordering::Relaxed);
    }

    pub(crate) fn emit(&self, kind: EventKind) {
        self.bus
            .on_event(Event::now(self.connection_id.load(Ordering::Relaxed), kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_bus_delivers_in_order() {
        let (bus, mut rx) = ChannelEventBus::new();
        for attempt in 1..=3 {
            bus.on_event(Event::now(1, EventKind::ConnectAttemptStart { attempt }));
        }
        for expected in 1..=3 {
            let event = rx.try_recv().unwrap();
            match event.kind {
                EventKind::ConnectAttemptStart { attempt } => assert_eq!(attempt, expected),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[test]
    fn test_channel_bus_shutdown_closes() {
        let (bus, mut rx) = ChannelEventBus::new();
        bus.shutdown();
        bus.on_event(Event::now(1, EventKind::ConnectAttemptStart { attempt: 1 }));
        assert!(rx.try_recv().is_err());
    }
}
