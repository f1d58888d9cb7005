//! Event Bus
//!
//! Publish/subscribe fan-out for [`ClientEvent`]s. Handlers are registered per
//! [`EventKind`] and invoked synchronously, in registration order, on the task
//! that emits the event.
//!
//! A panicking handler does not stop delivery. The panic is logged and
//! reported as a `websocket.error` event carrying
//! [`StreamError::HandlerPanicked`]; panics inside error handlers are only
//! logged.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::events::{ClientEvent, EventKind};
use crate::application::ports::StreamError;

/// Identifier returned by [`EventBus::on`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

/// Callback invoked for each matching event.
pub type EventHandler = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

struct Registration {
    id: HandlerId,
    kind: EventKind,
    handler: EventHandler,
}

/// Registry of event handlers.
pub struct EventBus {
    next_id: AtomicU64,
    handlers: RwLock<Vec<Registration>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.read().len())
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register a handler for one event kind.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push(Registration {
            id,
            kind,
            handler: Arc::new(handler),
        });
        tracing::trace!(event = %kind, handler = id.0, "Handler registered");
        id
    }

    /// Remove a handler. Returns `false` if it was not registered.
    pub fn off(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|registration| registration.id != id);
        before != handlers.len()
    }

    /// Number of handlers registered for a kind.
    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers
            .read()
            .iter()
            .filter(|registration| registration.kind == kind)
            .count()
    }

    /// Deliver an event to every handler registered for its kind.
    ///
    /// The handler list is snapshotted first, so handlers may call `on`/`off`.
    pub fn emit(&self, event: &ClientEvent) {
        let kind = event.kind();
        let targets: Vec<EventHandler> = self
            .handlers
            .read()
            .iter()
            .filter(|registration| registration.kind == kind)
            .map(|registration| Arc::clone(&registration.handler))
            .collect();

        if targets.is_empty() {
            tracing::trace!(event = %kind, "No handlers for event");
            return;
        }

        for handler in targets {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                let message = panic_message(payload.as_ref());
                tracing::error!(event = %kind, panic = %message, "Event handler panicked");

                if kind != EventKind::Error {
                    self.emit(&ClientEvent::error(StreamError::HandlerPanicked {
                        event: kind,
                        message,
                    }));
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
