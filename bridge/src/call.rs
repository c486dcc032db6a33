//! Pending-call bookkeeping for blocking sends

use core_types::ContextId;
use dispatch::ReplyCell;
use value_graph::Value;

/// How a resolved call ended
#[derive(Debug, Clone)]
pub enum CallOutcome {
    /// The honored reply value (possibly `Null` for an unanswered
    /// synchronous send)
    Value(Value),
    /// No responder was registered on the request channel
    NoHandler,
    /// The responder rejected the request with an error
    Rejected(String),
}

/// State machine for one blocking call
///
/// `Sent` when the envelope is queued; `AwaitingReply` once the
/// destination's dispatch of it begins; then exactly one of `Resolved`
/// or `Cancelled`, never both and never neither.
#[derive(Debug, Clone)]
pub enum CallState {
    /// Envelope queued, destination has not started dispatching it
    Sent,
    /// Destination dispatch is running
    AwaitingReply,
    /// A reply was recorded
    Resolved(CallOutcome),
    /// An endpoint was torn down before a reply was recorded
    Cancelled,
}

impl CallState {
    /// Returns whether the call can still make progress
    pub fn is_pending(&self) -> bool {
        matches!(self, CallState::Sent | CallState::AwaitingReply)
    }
}

pub(crate) struct PendingCall {
    pub caller: ContextId,
    pub destination: ContextId,
    pub channel: String,
    pub slot: ReplyCell,
    pub state: CallState,
}

impl PendingCall {
    pub fn new(
        caller: ContextId,
        destination: ContextId,
        channel: String,
        slot: ReplyCell,
    ) -> Self {
        Self {
            caller,
            destination,
            channel,
            slot,
            state: CallState::Sent,
        }
    }
}
