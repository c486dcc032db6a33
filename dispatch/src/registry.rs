//! Ordered handler table for one context

use crate::event::MessageEvent;
use core_types::SubscriptionId;

/// What a handler returns; `Err` is a recorded fault, never a crash
pub type HandlerResult = Result<(), String>;

/// A registered message handler
pub type Handler = Box<dyn FnMut(&mut MessageEvent) -> HandlerResult>;

/// How long a registration stays in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Stays registered until removed explicitly
    Persistent,
    /// Removed after its first invocation
    Once,
}

/// A fault collected while dispatching one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFault {
    /// The registration whose handler faulted
    pub subscription: SubscriptionId,
    /// The handler's error text
    pub detail: String,
}

struct HandlerEntry {
    id: SubscriptionId,
    channel: String,
    retention: Retention,
    callback: Handler,
}

/// Per-context table mapping channel name to ordered handlers
///
/// One flat list in registration order: per-channel order falls out of
/// filtering, and `channels()` reflects first-registration order, which
/// is what listener bookkeeping observes.
#[derive(Default)]
pub struct DispatchRegistry {
    entries: Vec<HandlerEntry>,
}

impl DispatchRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers a persistent handler on a channel
    pub fn register(
        &mut self,
        channel: impl Into<String>,
        callback: impl FnMut(&mut MessageEvent) -> HandlerResult + 'static,
    ) -> SubscriptionId {
        self.insert(channel.into(), Retention::Persistent, Box::new(callback))
    }

    /// Registers a handler that unregisters itself after one invocation
    pub fn register_once(
        &mut self,
        channel: impl Into<String>,
        callback: impl FnMut(&mut MessageEvent) -> HandlerResult + 'static,
    ) -> SubscriptionId {
        self.insert(channel.into(), Retention::Once, Box::new(callback))
    }

    fn insert(&mut self, channel: String, retention: Retention, callback: Handler) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.entries.push(HandlerEntry {
            id,
            channel,
            retention,
            callback,
        });
        id
    }

    /// Removes one registration; returns whether it existed
    pub fn remove(&mut self, subscription: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != subscription);
        self.entries.len() != before
    }

    /// Removes every registration on a channel; returns how many
    pub fn remove_channel(&mut self, channel: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.channel != channel);
        before - self.entries.len()
    }

    /// Removes every registration; returns how many
    pub fn remove_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Returns the channels with at least one registration, in
    /// first-registration order
    pub fn channels(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for entry in &self.entries {
            if !seen.contains(&entry.channel) {
                seen.push(entry.channel.clone());
            }
        }
        seen
    }

    /// Returns the number of handlers registered on a channel
    pub fn handler_count(&self, channel: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.channel == channel)
            .count()
    }

    /// Returns whether the registry has no registrations
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Delivers one message to every handler on its channel
    ///
    /// Handlers run in registration order, synchronously, each to
    /// completion. `Once` registrations that fired are removed after the
    /// pass. Handler faults are collected and returned; a fault does not
    /// stop the remaining handlers.
    pub fn dispatch(&mut self, event: &mut MessageEvent) -> Vec<DispatchFault> {
        let mut faults = Vec::new();
        let mut fired_once = Vec::new();

        for entry in self.entries.iter_mut() {
            if entry.channel != event.channel() {
                continue;
            }
            if let Err(detail) = (entry.callback)(event) {
                faults.push(DispatchFault {
                    subscription: entry.id,
                    detail,
                });
            }
            if entry.retention == Retention::Once {
                fired_once.push(entry.id);
            }
        }

        if !fired_once.is_empty() {
            self.entries.retain(|entry| !fired_once.contains(&entry.id));
        }
        faults
    }
}
