//! # Bridge
//!
//! The broker connecting isolated execution contexts.
//!
//! ## Purpose
//!
//! `MessageBridge` is an in-process implementation of the cross-context
//! messaging protocol:
//! - Runs under `cargo test`
//! - Deterministic (explicit delivery pump, no real concurrency)
//! - Inspectable (pending calls, mailboxes, and the delivery log are all
//!   queryable)
//!
//! ## Philosophy
//!
//! **Testability is a first-class design constraint.**
//!
//! Each context models a single-threaded cooperative event loop; the
//! bridge is the only way across. Delivery happens when the bridge is
//! pumped (`deliver_next`, `run_until_idle`), which makes every
//! interleaving a test can care about reproducible. A blocking send is
//! the one suspension point: the caller's loop stands still while the
//! destination's mailbox is pumped until the reply slot resolves.

pub mod broker;
pub mod call;
pub mod error;

pub use broker::{BridgeConfig, MessageBridge, Responder};
pub use call::{CallOutcome, CallState};
pub use error::IpcError;
