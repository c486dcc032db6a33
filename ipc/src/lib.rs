//! # Inter-Context Messaging (IPC)
//!
//! This crate defines the wire types of the message bridge.
//!
//! ## Philosophy
//!
//! - **Messages, not shared memory**: All communication is explicit message passing
//! - **Traceable**: Every envelope has a message ID, and synchronous sends a call ID
//! - **Self-describing**: An envelope names its source context, channel, and
//!   delivery mode; nothing is inferred from transport state
//!
//! ## Architecture
//!
//! An `Envelope` is the unit of delivery. It carries:
//! - Routing information (source context, channel name)
//! - Delivery mode (fire-and-forget, synchronous, request)
//! - A type-erased payload (the encoded argument graph)

pub mod envelope;
pub mod message;

pub use envelope::{DeliveryMode, Envelope};
pub use message::{MessageId, Payload};
