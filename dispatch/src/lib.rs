//! # Dispatch
//!
//! Per-context handler tables and the event object handlers receive.
//!
//! ## Philosophy
//!
//! - **Order is observable**: handlers on one channel run in registration
//!   order, every time
//! - **Many handlers, one reply**: any number of handlers may observe a
//!   message; at most one reply value is honored, by construction
//! - **Faults are data**: a failing handler never interrupts the others;
//!   its fault is collected and handed to the caller of `dispatch`

pub mod event;
pub mod registry;

pub use event::{MessageEvent, ReplyCell};
pub use registry::{DispatchFault, DispatchRegistry, Handler, HandlerResult, Retention};
