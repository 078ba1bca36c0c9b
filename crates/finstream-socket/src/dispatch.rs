//! Event-type to handler routing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{HandlerError, StreamError};
use crate::messages::{Event, EventType};

/// Callback invoked on the read task for each matching event.
pub type EventHandler = Arc<dyn Fn(&Event) -> Result<(), HandlerError> + Send + Sync>;

/// One handler per event type; the last registration wins.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<EventType, EventHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("event_types", &self.registered())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event_type`, replacing any previous one.
    pub fn insert(&self, event_type: EventType, handler: EventHandler) {
        let replaced = self
            .handlers
            .write()
            .expect("handler registry lock is not poisoned")
            .insert(event_type, handler)
            .is_some();
        tracing::debug!(%event_type, replaced, "registered stream handler");
    }

    pub fn remove(&self, event_type: EventType) -> bool {
        self.handlers
            .write()
            .expect("handler registry lock is not poisoned")
            .remove(&event_type)
            .is_some()
    }

    pub fn registered(&self) -> Vec<EventType> {
        self.handlers
            .read()
            .expect("handler registry lock is not poisoned")
            .keys()
            .copied()
            .collect()
    }

    /// Invokes the handler for `event` on the calling thread.
    ///
    /// Heartbeats are never delivered. Returns whether a handler ran. The
    /// registry lock is released before the handler is called, so handlers
    /// may register other handlers.
    pub fn dispatch(&self, event: &Event) -> Result<bool, StreamError> {
        if event.event_type == EventType::Heartbeat {
            return Ok(false);
        }

        let handler = self
            .handlers
            .read()
            .expect("handler registry lock is not poisoned")
            .get(&event.event_type)
            .cloned();

        let Some(handler) = handler else {
            tracing::trace!(event_type = %event.event_type, "no handler registered");
            return Ok(false);
        };

        handler(event).map_err(|source| StreamError::Handler {
            event_type: event.event_type,
            source,
        })?;
        Ok(true)
    }
}
