//! Teardown and Lifecycle Tests
//!
//! Validates the lifecycle guard: a torn-down context is unreachable for
//! every bridge operation, in-flight work is cancelled or dropped with a
//! record, and nothing ever hangs.

use bridge::{CallState, IpcError};
use core_types::ContextId;
use diagnostics::DeliveryEvent;
use std::cell::RefCell;
use std::rc::Rc;
use tests_conformance::test_bootstrap;
use value_graph::Value;

#[test]
fn test_send_to_destroyed_destination_fails_fast() {
    let (mut bridge, host, guest) = test_bootstrap();
    bridge.destroy_context(host).expect("destroy failed");

    assert_eq!(
        bridge.send(guest, host, "message", &[Value::Int(1)]),
        Err(IpcError::ChannelReleased)
    );
    assert_eq!(
        bridge.send_sync(guest, host, "echo", &[]).unwrap_err(),
        IpcError::ChannelReleased
    );
    assert_eq!(
        bridge.invoke(guest, host, "fetch", &[]).unwrap_err(),
        IpcError::ChannelReleased
    );
}

#[test]
fn test_send_from_destroyed_context_fails_fast() {
    let (mut bridge, host, guest) = test_bootstrap();
    bridge.destroy_context(guest).expect("destroy failed");

    assert_eq!(
        bridge.send(guest, host, "message", &[]),
        Err(IpcError::ChannelReleased)
    );
}

#[test]
fn test_registration_on_destroyed_context_fails() {
    let (mut bridge, host, _guest) = test_bootstrap();
    bridge.destroy_context(host).expect("destroy failed");

    assert!(matches!(
        bridge.on(host, "message", |_event| Ok(())),
        Err(IpcError::ChannelReleased)
    ));
    assert_eq!(
        bridge.registered_channels(host),
        Err(IpcError::ChannelReleased)
    );
}

#[test]
fn test_unknown_context_is_distinct_from_released() {
    let (mut bridge, host, _guest) = test_bootstrap();
    let stranger = ContextId::new();

    assert_eq!(
        bridge.send(stranger, host, "message", &[]),
        Err(IpcError::UnknownContext(stranger))
    );
}

#[test]
fn test_queued_messages_dropped_on_teardown() {
    let (mut bridge, host, guest) = test_bootstrap();

    let fired = Rc::new(RefCell::new(false));
    {
        let fired = fired.clone();
        bridge
            .on(host, "message", move |_event| {
                *fired.borrow_mut() = true;
                Ok(())
            })
            .expect("Failed to register handler");
    }

    bridge
        .send(guest, host, "message", &[])
        .expect("send failed");
    // Teardown races ahead of delivery: the handler must never fire.
    bridge.destroy_context(host).expect("destroy failed");
    bridge.run_until_idle();

    assert!(!*fired.borrow());
    assert_eq!(bridge.log().dropped_count(), 1);
    assert!(matches!(
        bridge.log().events().first(),
        Some(DeliveryEvent::MessageDropped { channel, .. }) if channel == "message"
    ));
}

#[test]
fn test_pending_call_cancelled_by_destination_teardown() {
    let (mut bridge, host, guest) = test_bootstrap();

    let call = bridge
        .post_sync_call(guest, host, "echo", &[Value::Int(1)])
        .expect("post failed");
    assert!(matches!(bridge.call_state(call), Some(CallState::Sent)));

    bridge.destroy_context(host).expect("destroy failed");

    assert!(matches!(bridge.call_state(call), Some(CallState::Cancelled)));
    assert_eq!(bridge.log().cancelled_call_count(), 1);
    assert_eq!(bridge.pending_call_count(), 0);
}

#[test]
fn test_pending_call_cancelled_by_caller_teardown() {
    let (mut bridge, host, guest) = test_bootstrap();

    let call = bridge
        .post_sync_call(guest, host, "echo", &[])
        .expect("post failed");
    bridge.destroy_context(guest).expect("destroy failed");

    assert!(matches!(bridge.call_state(call), Some(CallState::Cancelled)));

    // The orphaned envelope is still queued at the host; delivering it
    // must not resurrect the call or invoke a reply path.
    bridge.run_until_idle();
    assert!(matches!(bridge.call_state(call), Some(CallState::Cancelled)));
}

#[test]
fn test_destroy_is_not_idempotent() {
    let (mut bridge, host, _guest) = test_bootstrap();
    bridge.destroy_context(host).expect("destroy failed");
    assert_eq!(bridge.destroy_context(host), Err(IpcError::ChannelReleased));
}

#[test]
fn test_reply_to_destroyed_sender_is_dropped_with_record() {
    let (mut bridge, host, guest) = test_bootstrap();

    bridge
        .on(host, "ping", |event| {
            event.reply("pong", vec![Value::Int(1)]);
            Ok(())
        })
        .expect("Failed to register handler");

    bridge.send(guest, host, "ping", &[]).expect("send failed");
    bridge.destroy_context(guest).expect("destroy failed");
    bridge.run_until_idle();

    // The ping was dispatched, but its pong had nowhere to go.
    assert_eq!(bridge.log().dropped_count(), 1);
}

#[test]
fn test_surviving_context_keeps_working() {
    let (mut bridge, host, guest) = test_bootstrap();
    let other = bridge.create_context("other");

    bridge
        .on(host, "echo", |event| {
            let message = event.args()[0].clone();
            event.set_return_value(message);
            Ok(())
        })
        .expect("Failed to register handler");

    bridge.destroy_context(guest).expect("destroy failed");

    let reply = bridge
        .send_sync(other, host, "echo", &[Value::Int(9)])
        .expect("send_sync failed");
    assert!(matches!(reply, Value::Int(9)));
}
