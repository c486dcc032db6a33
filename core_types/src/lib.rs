//! # Core Types
//!
//! Shared identifier types for the message bridge.
//!
//! ## Philosophy
//!
//! - **Opaque, not guessable**: Identifiers are random UUIDs, never indices
//! - **Typed, not interchangeable**: A context id cannot be confused with a
//!   call id at compile time
//! - **Serializable**: Every id can cross the context boundary inside an
//!   envelope

pub mod ids;

pub use ids::{CallId, ContextId, SubscriptionId};
