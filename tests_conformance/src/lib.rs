//! Test utilities for bridge conformance tests
//!
//! This crate hosts the integration suite that drives the whole stack:
//! contexts, transport, dispatch, correlation, and teardown together.
//! The helpers here keep individual tests focused on the property they
//! check.

use bridge::MessageBridge;
use core_types::ContextId;
use value_graph::{MapRef, Value};

/// Creates a bridge with one host and one guest context
pub fn test_bootstrap() -> (MessageBridge, ContextId, ContextId) {
    let mut bridge = MessageBridge::new();
    let host = bridge.create_context("host");
    let guest = bridge.create_context("guest");
    (bridge, host, guest)
}

/// Builds a map value from key/value pairs
pub fn map_of(entries: &[(&str, Value)]) -> Value {
    let map = MapRef::new();
    for (key, value) in entries {
        map.insert(*key, value.clone());
    }
    Value::Map(map)
}
