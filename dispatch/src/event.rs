//! The event object handed to handlers, and the single-assignment reply slot

use core_types::ContextId;
use std::cell::RefCell;
use std::rc::Rc;
use value_graph::Value;

/// Write-once reply slot shared between a pending call and its dispatch
///
/// The first write is the one honored; later writes are accepted and
/// discarded. This makes the "several handlers answer one synchronous
/// call" race benign: no ordering of writes can corrupt the slot.
#[derive(Debug, Clone, Default)]
pub struct ReplyCell(Rc<RefCell<Option<Value>>>);

impl ReplyCell {
    /// Creates an empty reply slot
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(None)))
    }

    /// Records a reply value; returns whether this write was the one observed
    pub fn set(&self, value: Value) -> bool {
        let mut slot = self.0.borrow_mut();
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        true
    }

    /// Returns whether a reply has been recorded
    pub fn is_set(&self) -> bool {
        self.0.borrow().is_some()
    }

    /// Returns a clone of the recorded reply, if any
    pub fn get(&self) -> Option<Value> {
        self.0.borrow().clone()
    }
}

/// A delivered message, as seen by handlers
///
/// Carries the decoded arguments plus the two reply mechanisms: the
/// synchronous return slot (present only for blocking sends) and the
/// asymmetric `reply` queue for answering an async message on another
/// channel.
#[derive(Debug)]
pub struct MessageEvent {
    channel: String,
    source: ContextId,
    args: Vec<Value>,
    return_slot: Option<ReplyCell>,
    outgoing: Vec<(String, Vec<Value>)>,
}

impl MessageEvent {
    /// Creates an event for a fire-and-forget message
    pub fn fire_and_forget(source: ContextId, channel: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            channel: channel.into(),
            source,
            args,
            return_slot: None,
            outgoing: Vec::new(),
        }
    }

    /// Creates an event for a synchronous message with its reply slot
    pub fn synchronous(
        source: ContextId,
        channel: impl Into<String>,
        args: Vec<Value>,
        slot: ReplyCell,
    ) -> Self {
        Self {
            channel: channel.into(),
            source,
            args,
            return_slot: Some(slot),
            outgoing: Vec::new(),
        }
    }

    /// Returns the channel the message arrived on
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Returns the sending context
    pub fn source(&self) -> ContextId {
        self.source
    }

    /// Returns the decoded arguments
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Returns whether a sender is suspended on this message
    pub fn is_synchronous(&self) -> bool {
        self.return_slot.is_some()
    }

    /// Records the synchronous return value
    ///
    /// Returns whether the write was observed: false for async messages
    /// and for any write after the first.
    pub fn set_return_value(&mut self, value: Value) -> bool {
        match &self.return_slot {
            Some(slot) => slot.set(value),
            None => false,
        }
    }

    /// Queues an asymmetric reply to the sending context
    ///
    /// The reply is sent fire-and-forget on `channel` after dispatch of
    /// this message completes.
    pub fn reply(&mut self, channel: impl Into<String>, args: Vec<Value>) {
        self.outgoing.push((channel.into(), args));
    }

    /// Takes the queued asymmetric replies
    pub fn take_outgoing(&mut self) -> Vec<(String, Vec<Value>)> {
        std::mem::take(&mut self.outgoing)
    }
}
