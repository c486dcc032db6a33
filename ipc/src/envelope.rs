//! Envelope structure and delivery modes

use crate::message::{MessageId, Payload};
use core_types::{CallId, ContextId};
use serde::{Deserialize, Serialize};

/// How an envelope is delivered and answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMode {
    /// Queue and forget; the sender never learns the outcome
    FireAndForget,
    /// Sender suspends until one reply value is recorded for `call`
    Synchronous { call: CallId },
    /// Request/response against the channel's single responder
    Request { call: CallId },
}

impl DeliveryMode {
    /// Returns the correlated call ID, if the mode carries one
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            DeliveryMode::FireAndForget => None,
            DeliveryMode::Synchronous { call } | DeliveryMode::Request { call } => Some(*call),
        }
    }

    /// Returns whether the sender is suspended on this envelope
    pub fn is_blocking(&self) -> bool {
        !matches!(self, DeliveryMode::FireAndForget)
    }
}

/// Message envelope containing routing and metadata
///
/// This is the outer wrapper for every message crossing the bridge. The
/// actual argument graph is type-erased so transport and routing stay
/// payload-agnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique identifier for this message
    pub id: MessageId,
    /// Context that sent the message
    pub source: ContextId,
    /// Channel name the message is addressed to
    pub channel: String,
    /// Delivery mode (and correlation, when blocking)
    pub mode: DeliveryMode,
    /// Encoded argument graph (type-erased)
    pub payload: Payload,
}

impl Envelope {
    /// Creates a fire-and-forget envelope
    pub fn new(source: ContextId, channel: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: MessageId::new(),
            source,
            channel: channel.into(),
            mode: DeliveryMode::FireAndForget,
            payload,
        }
    }

    /// Marks the envelope as a synchronous send correlated to `call`
    pub fn with_sync_call(mut self, call: CallId) -> Self {
        self.mode = DeliveryMode::Synchronous { call };
        self
    }

    /// Marks the envelope as a request correlated to `call`
    pub fn with_request_call(mut self, call: CallId) -> Self {
        self.mode = DeliveryMode::Request { call };
        self
    }

    /// Checks whether a sender is suspended on this envelope
    pub fn is_blocking(&self) -> bool {
        self.mode.is_blocking()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> Payload {
        Payload::new(&"args").unwrap()
    }

    #[test]
    fn test_envelope_defaults_to_fire_and_forget() {
        let source = ContextId::new();
        let envelope = Envelope::new(source, "message", payload());

        assert_eq!(envelope.source, source);
        assert_eq!(envelope.channel, "message");
        assert_eq!(envelope.mode, DeliveryMode::FireAndForget);
        assert!(!envelope.is_blocking());
        assert_eq!(envelope.mode.call_id(), None);
    }

    #[test]
    fn test_envelope_with_sync_call() {
        let call = CallId::new();
        let envelope = Envelope::new(ContextId::new(), "echo", payload()).with_sync_call(call);

        assert!(envelope.is_blocking());
        assert_eq!(envelope.mode.call_id(), Some(call));
        assert_eq!(envelope.mode, DeliveryMode::Synchronous { call });
    }

    #[test]
    fn test_envelope_with_request_call() {
        let call = CallId::new();
        let envelope = Envelope::new(ContextId::new(), "fetch", payload()).with_request_call(call);

        assert!(envelope.is_blocking());
        assert_eq!(envelope.mode, DeliveryMode::Request { call });
    }

    #[test]
    fn test_envelope_ids_are_unique() {
        let source = ContextId::new();
        let a = Envelope::new(source, "c", payload());
        let b = Envelope::new(source, "c", payload());
        assert_ne!(a.id, b.id);
    }
}
