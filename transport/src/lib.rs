//! # Transport
//!
//! Per-context mailboxes with deterministic FIFO delivery.
//!
//! ## Philosophy
//!
//! Delivery order is the contract: envelopes queued for one destination
//! come back out in the order they went in, regardless of channel name or
//! source. Everything else (dispatch, replies, lifecycle) is layered on
//! top of this single guarantee.

use core_types::ContextId;
use ipc::Envelope;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Transport error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Destination context was attached once but has been torn down
    #[error("transport closed: {0} has been torn down")]
    Closed(ContextId),

    /// Destination context was never attached
    #[error("unknown destination {0}")]
    Unknown(ContextId),
}

/// FIFO mailbox for one attached context
#[derive(Debug, Default)]
struct Mailbox {
    queue: VecDeque<Envelope>,
}

/// Routes envelopes into per-context mailboxes
///
/// The switchboard owns one mailbox per attached context. Detaching a
/// context closes its mailbox permanently; the undelivered envelopes are
/// handed back to the caller so they can be accounted for.
#[derive(Debug, Default)]
pub struct Switchboard {
    mailboxes: HashMap<ContextId, Mailbox>,
    closed: HashSet<ContextId>,
}

impl Switchboard {
    /// Creates an empty switchboard
    pub fn new() -> Self {
        Self {
            mailboxes: HashMap::new(),
            closed: HashSet::new(),
        }
    }

    /// Attaches a mailbox for a context
    pub fn attach(&mut self, context: ContextId) {
        self.mailboxes.entry(context).or_default();
    }

    /// Detaches a context, returning its undelivered envelopes
    ///
    /// After detach, sends to the context fail with `Closed` forever; a
    /// context id is never reattached.
    pub fn detach(&mut self, context: ContextId) -> Vec<Envelope> {
        self.closed.insert(context);
        match self.mailboxes.remove(&context) {
            Some(mailbox) => mailbox.queue.into(),
            None => Vec::new(),
        }
    }

    /// Returns whether a context currently has a mailbox
    pub fn is_attached(&self, context: ContextId) -> bool {
        self.mailboxes.contains_key(&context)
    }

    /// Queues an envelope for a destination
    ///
    /// Never blocks; ordering is FIFO per destination.
    pub fn send(&mut self, destination: ContextId, envelope: Envelope) -> Result<(), TransportError> {
        match self.mailboxes.get_mut(&destination) {
            Some(mailbox) => {
                mailbox.queue.push_back(envelope);
                Ok(())
            }
            None if self.closed.contains(&destination) => Err(TransportError::Closed(destination)),
            None => Err(TransportError::Unknown(destination)),
        }
    }

    /// Pops the next envelope queued for a context
    pub fn pop(&mut self, context: ContextId) -> Option<Envelope> {
        self.mailboxes
            .get_mut(&context)
            .and_then(|mailbox| mailbox.queue.pop_front())
    }

    /// Returns the number of envelopes queued for a context
    pub fn queued_len(&self, context: ContextId) -> usize {
        self.mailboxes
            .get(&context)
            .map(|mailbox| mailbox.queue.len())
            .unwrap_or(0)
    }

    /// Returns the number of envelopes queued across all mailboxes
    pub fn pending_total(&self) -> usize {
        self.mailboxes
            .values()
            .map(|mailbox| mailbox.queue.len())
            .sum()
    }

    /// Checks whether every mailbox is empty
    pub fn is_idle(&self) -> bool {
        self.mailboxes
            .values()
            .all(|mailbox| mailbox.queue.is_empty())
    }

    /// Returns the attached context ids
    pub fn attached_contexts(&self) -> Vec<ContextId> {
        self.mailboxes.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipc::Payload;

    fn envelope(source: ContextId, channel: &str) -> Envelope {
        Envelope::new(source, channel, Payload::new(&"args").unwrap())
    }

    #[test]
    fn test_fifo_order_per_destination() {
        let mut switchboard = Switchboard::new();
        let source = ContextId::new();
        let destination = ContextId::new();
        switchboard.attach(destination);

        switchboard.send(destination, envelope(source, "a")).unwrap();
        switchboard.send(destination, envelope(source, "b")).unwrap();
        switchboard.send(destination, envelope(source, "a")).unwrap();

        assert_eq!(switchboard.pop(destination).unwrap().channel, "a");
        assert_eq!(switchboard.pop(destination).unwrap().channel, "b");
        assert_eq!(switchboard.pop(destination).unwrap().channel, "a");
        assert!(switchboard.pop(destination).is_none());
    }

    #[test]
    fn test_send_to_unknown_context() {
        let mut switchboard = Switchboard::new();
        let destination = ContextId::new();
        assert_eq!(
            switchboard.send(destination, envelope(ContextId::new(), "c")),
            Err(TransportError::Unknown(destination))
        );
    }

    #[test]
    fn test_send_after_detach_is_closed() {
        let mut switchboard = Switchboard::new();
        let destination = ContextId::new();
        switchboard.attach(destination);
        switchboard.detach(destination);

        assert_eq!(
            switchboard.send(destination, envelope(ContextId::new(), "c")),
            Err(TransportError::Closed(destination))
        );
        assert!(!switchboard.is_attached(destination));
    }

    #[test]
    fn test_detach_returns_undelivered() {
        let mut switchboard = Switchboard::new();
        let source = ContextId::new();
        let destination = ContextId::new();
        switchboard.attach(destination);

        switchboard.send(destination, envelope(source, "a")).unwrap();
        switchboard.send(destination, envelope(source, "b")).unwrap();

        let undelivered = switchboard.detach(destination);
        assert_eq!(undelivered.len(), 2);
        assert_eq!(undelivered[0].channel, "a");
        assert_eq!(undelivered[1].channel, "b");
    }

    #[test]
    fn test_idle_accounting() {
        let mut switchboard = Switchboard::new();
        let destination = ContextId::new();
        switchboard.attach(destination);
        assert!(switchboard.is_idle());

        switchboard.send(destination, envelope(ContextId::new(), "c")).unwrap();
        assert!(!switchboard.is_idle());
        assert_eq!(switchboard.queued_len(destination), 1);
        assert_eq!(switchboard.pending_total(), 1);

        switchboard.pop(destination);
        assert!(switchboard.is_idle());
    }
}
