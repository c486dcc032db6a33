//! # Value Graph
//!
//! Payload values for the message bridge, and the codec that carries them
//! across the context boundary.
//!
//! ## Philosophy
//!
//! - **Graphs, not trees**: two argument positions may alias the same
//!   list or map cell, including self-reference; aliasing inside one
//!   message survives the round trip
//! - **Reject, don't mangle**: a value that cannot cross the boundary
//!   (a live host handle, a non-finite float) fails encoding with a
//!   typed error before anything is sent
//! - **Bytes are bytes**: binary payloads are a first-class value kind,
//!   never smuggled through strings
//!
//! ## Architecture
//!
//! `Value` is the in-context representation: scalars are plain, while
//! lists and maps are reference-counted cells so identity is observable.
//! The codec flattens a value graph into an indexed node table
//! (`ArgsGraph`) in which aliases become back-references, then rebuilds
//! the cells on the far side with a reserve-then-fill pass that cannot
//! recurse into a cycle.

pub mod codec;
pub mod value;

pub use codec::{decode_args, encode_args, ArgsGraph, SerializationError};
pub use value::{deep_eq, ForeignHandle, ListRef, MapRef, Value};
