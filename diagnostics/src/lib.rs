//! # Diagnostics
//!
//! Structured logging for the message bridge.
//!
//! ## Philosophy
//!
//! Logging is explicit and structured, not text-based or printf-style.
//! The bridge never swallows a failure silently: anything it is allowed
//! to drop (a handler fault, a reply to a dead context) leaves a record
//! here, and tests assert on those records.

use core_types::{CallId, ContextId};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational messages
    Info,
    /// Warnings
    Warn,
    /// Errors
    Error,
}

/// A structured log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Source context (if known)
    pub source: Option<ContextId>,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Creates a new log entry
    pub fn new(level: LogLevel, message: String) -> Self {
        Self {
            level,
            source: None,
            message,
            fields: Vec::new(),
        }
    }

    /// Sets the source context
    pub fn with_source(mut self, source: ContextId) -> Self {
        self.source = Some(source);
        self
    }

    /// Adds a field to the log entry
    pub fn with_field(mut self, key: String, value: String) -> Self {
        self.fields.push((key, value));
        self
    }
}

/// An event the bridge recorded instead of surfacing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEvent {
    /// A handler returned an error while processing a message
    HandlerFault {
        context: ContextId,
        channel: String,
        detail: String,
    },
    /// A pending synchronous call was cancelled by context teardown
    CallCancelled { call: CallId, context: ContextId },
    /// A queued message was dropped because its destination was torn down
    MessageDropped {
        destination: ContextId,
        channel: String,
    },
    /// A handler's reply could not be delivered or encoded
    ReplyDropped {
        destination: ContextId,
        channel: String,
        detail: String,
    },
    /// A delivered payload failed to decode in the receiving context
    DecodeFault {
        context: ContextId,
        channel: String,
        detail: String,
    },
}

impl DeliveryEvent {
    /// Renders the event as a structured log entry
    pub fn to_entry(&self) -> LogEntry {
        match self {
            DeliveryEvent::HandlerFault {
                context,
                channel,
                detail,
            } => LogEntry::new(LogLevel::Warn, "handler fault".to_string())
                .with_source(*context)
                .with_field("channel".to_string(), channel.clone())
                .with_field("detail".to_string(), detail.clone()),
            DeliveryEvent::CallCancelled { call, context } => {
                LogEntry::new(LogLevel::Warn, "pending call cancelled".to_string())
                    .with_source(*context)
                    .with_field("call".to_string(), call.to_string())
            }
            DeliveryEvent::MessageDropped {
                destination,
                channel,
            } => LogEntry::new(LogLevel::Info, "message dropped".to_string())
                .with_source(*destination)
                .with_field("channel".to_string(), channel.clone()),
            DeliveryEvent::ReplyDropped {
                destination,
                channel,
                detail,
            } => LogEntry::new(LogLevel::Warn, "reply dropped".to_string())
                .with_source(*destination)
                .with_field("channel".to_string(), channel.clone())
                .with_field("detail".to_string(), detail.clone()),
            DeliveryEvent::DecodeFault {
                context,
                channel,
                detail,
            } => LogEntry::new(LogLevel::Error, "payload decode fault".to_string())
                .with_source(*context)
                .with_field("channel".to_string(), channel.clone())
                .with_field("detail".to_string(), detail.clone()),
        }
    }
}

/// Append-only record of delivery events
///
/// Owned by the bridge; tests read it back to verify that drops and
/// faults were accounted for rather than lost.
#[derive(Debug, Clone, Default)]
pub struct DeliveryLog {
    events: Vec<DeliveryEvent>,
}

impl DeliveryLog {
    /// Creates an empty log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Records an event
    pub fn record(&mut self, event: DeliveryEvent) {
        self.events.push(event);
    }

    /// Returns all recorded events in order
    pub fn events(&self) -> &[DeliveryEvent] {
        &self.events
    }

    /// Returns the number of recorded events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Counts recorded handler faults
    pub fn handler_fault_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, DeliveryEvent::HandlerFault { .. }))
            .count()
    }

    /// Counts cancelled calls
    pub fn cancelled_call_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, DeliveryEvent::CallCancelled { .. }))
            .count()
    }

    /// Counts dropped messages (replies included)
    pub fn dropped_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    DeliveryEvent::MessageDropped { .. } | DeliveryEvent::ReplyDropped { .. }
                )
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_log_entry_creation() {
        let entry = LogEntry::new(LogLevel::Info, "test message".to_string());
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "test message");
        assert!(entry.source.is_none());
        assert!(entry.fields.is_empty());
    }

    #[test]
    fn test_delivery_log_counts() {
        let context = ContextId::new();
        let mut log = DeliveryLog::new();
        assert!(log.is_empty());

        log.record(DeliveryEvent::HandlerFault {
            context,
            channel: "c".to_string(),
            detail: "boom".to_string(),
        });
        log.record(DeliveryEvent::MessageDropped {
            destination: context,
            channel: "c".to_string(),
        });
        log.record(DeliveryEvent::CallCancelled {
            call: CallId::new(),
            context,
        });

        assert_eq!(log.len(), 3);
        assert_eq!(log.handler_fault_count(), 1);
        assert_eq!(log.dropped_count(), 1);
        assert_eq!(log.cancelled_call_count(), 1);
    }

    #[test]
    fn test_event_to_entry_carries_fields() {
        let context = ContextId::new();
        let event = DeliveryEvent::HandlerFault {
            context,
            channel: "echo".to_string(),
            detail: "boom".to_string(),
        };
        let entry = event.to_entry();
        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(entry.source, Some(context));
        assert!(entry
            .fields
            .iter()
            .any(|(key, value)| key == "channel" && value == "echo"));
    }
}
