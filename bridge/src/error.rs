//! Bridge error types

use core_types::ContextId;
use thiserror::Error;
use value_graph::SerializationError;

/// Errors surfaced to callers of the bridge
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IpcError {
    /// An endpoint of the operation has been torn down
    #[error("IPC method called after context was released")]
    ChannelReleased,

    /// The context id never belonged to this bridge
    #[error("unknown context: {0}")]
    UnknownContext(ContextId),

    /// The payload could not cross the boundary
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// A request was made on a channel with no responder
    #[error("no handler registered for '{0}'")]
    NoHandler(String),

    /// A second responder was registered on a request channel
    #[error("attempted to register a second handler for '{0}'")]
    HandlerAlreadyRegistered(String),

    /// The channel's responder rejected the request
    #[error("handler for '{channel}' rejected the call: {detail}")]
    HandlerRejected { channel: String, detail: String },
}
