//! Event listeners.

use std::{
    any::Any,
    borrow::Cow,
    collections::HashMap,
    fmt::Debug,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, PoisonError, RwLock},
};

use serde_json::Value;

use crate::config::DEFAULT_LOG_TARGET;

/// Listener can be registered to a client and process events.
///
/// Listeners run on the connection's receive task, one after another. A
/// listener that blocks stalls frame processing, so long running work should
/// be handed off, e.g. with `tokio::spawn` or a channel. A panic in a listener
/// is caught and logged, the connection keeps running.
pub trait Listener: Send + Sync {
    /// callback will be executed when a matching event is received
    fn on_event(&self, event: &str, args: &[Value]);
}

impl<F> Listener for F
where
    F: Fn(&str, &[Value]) + Send + Sync,
{
    fn on_event(&self, event: &str, args: &[Value]) {
        self(event, args)
    }
}

/// Registry from event name to listeners.
pub struct EventDispatcher {
    listeners: RwLock<HashMap<String, Vec<Arc<dyn Listener>>>>,
    log_target: Cow<'static, str>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self {
            listeners: RwLock::default(),
            log_target: Cow::Borrowed(DEFAULT_LOG_TARGET),
        }
    }
}

impl Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        f.debug_map()
            .entries(listeners.iter().map(|(name, list)| (name, list.len())))
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl EventDispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log target dispatch diagnostics are written under.
    pub fn with_log_target<S: Into<Cow<'static, str>>>(mut self, target: S) -> Self {
        self.log_target = target.into();
        self
    }

    pub(crate) fn target(&self) -> &str {
        &self.log_target
    }

    /// Register `listener` for events named `event`.
    ///
    /// Listeners sharing a name are invoked in registration order.
    pub fn on<S, L>(&self, event: S, listener: L)
    where
        S: Into<String>,
        L: Listener + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event.into())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Number of listeners registered for `event`
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
            .map(Vec::len)
            .unwrap_or_default()
    }

    /// Invoke every listener registered under `event`, returns how many ran.
    ///
    /// A panicking listener is logged and counted, the rest still run.
    pub fn fire(&self, event: &str, args: &[Value]) -> usize {
        // listeners may register more listeners, don't hold the lock while calling
        let listeners = match self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event)
        {
            Some(list) => list.clone(),
            None => {
                log::trace!(target: self.target(), "No listener for event {}", event);
                return 0;
            }
        };

        for listener in listeners.iter() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event, args)));
            if let Err(payload) = result {
                log::error!(
                    target: self.target(),
                    "Listener of event {} panicked: {}",
                    event,
                    panic_message(&*payload)
                );
            }
        }

        listeners.len()
    }
}
