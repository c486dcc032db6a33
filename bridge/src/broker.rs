//! The message broker owning contexts, mailboxes, and pending calls

use crate::call::{CallOutcome, CallState, PendingCall};
use crate::error::IpcError;
use core_types::{CallId, ContextId, SubscriptionId};
use diagnostics::{DeliveryEvent, DeliveryLog};
use dispatch::{DispatchRegistry, HandlerResult, MessageEvent, ReplyCell, Retention};
use ipc::{DeliveryMode, Envelope, Payload};
use std::collections::{HashMap, HashSet};
use transport::{Switchboard, TransportError};
use value_graph::{decode_args, encode_args, ArgsGraph, SerializationError, Value};

/// A request/response handler: returns the reply value or rejects
pub type Responder = Box<dyn FnMut(&MessageEvent) -> Result<Value, String>>;

/// Tunables for a bridge instance
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Upper bound on delivery passes per pump, against runaway loops
    pub max_delivery_passes: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_delivery_passes: 1000,
        }
    }
}

impl BridgeConfig {
    /// Creates the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delivery pass bound
    pub fn with_max_delivery_passes(mut self, passes: usize) -> Self {
        self.max_delivery_passes = passes;
        self
    }
}

struct ResponderEntry {
    retention: Retention,
    callback: Responder,
}

struct ContextState {
    name: String,
    registry: DispatchRegistry,
    responders: HashMap<String, ResponderEntry>,
}

impl ContextState {
    fn new(name: String) -> Self {
        Self {
            name,
            registry: DispatchRegistry::new(),
            responders: HashMap::new(),
        }
    }
}

enum RawOutcome {
    Value(Value),
    NoHandler,
    Rejected(String),
}

/// The broker connecting execution contexts
///
/// Owns every context's dispatch registry, the switchboard of mailboxes,
/// the pending-call table, and the delivery log. All delivery happens
/// when the bridge is pumped, so message interleavings are deterministic
/// and directly testable.
pub struct MessageBridge {
    config: BridgeConfig,
    contexts: HashMap<ContextId, ContextState>,
    context_order: Vec<ContextId>,
    released: HashSet<ContextId>,
    switchboard: Switchboard,
    calls: HashMap<CallId, PendingCall>,
    log: DeliveryLog,
}

impl MessageBridge {
    /// Creates a bridge with default configuration
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    /// Creates a bridge with explicit configuration
    pub fn with_config(config: BridgeConfig) -> Self {
        Self {
            config,
            contexts: HashMap::new(),
            context_order: Vec::new(),
            released: HashSet::new(),
            switchboard: Switchboard::new(),
            calls: HashMap::new(),
            log: DeliveryLog::new(),
        }
    }

    // ===== Context lifecycle =====

    /// Creates a context with a human-readable name for debugging
    pub fn create_context(&mut self, name: impl Into<String>) -> ContextId {
        let context = ContextId::new();
        self.contexts.insert(context, ContextState::new(name.into()));
        self.context_order.push(context);
        self.switchboard.attach(context);
        context
    }

    /// Tears a context down
    ///
    /// Atomically drops its handler registrations, drops and logs its
    /// undelivered mail, and cancels every pending blocking call whose
    /// sender or receiver it was. Every later bridge operation naming
    /// the context fails with `ChannelReleased`.
    pub fn destroy_context(&mut self, context: ContextId) -> Result<(), IpcError> {
        self.ensure_live(context)?;
        self.contexts.remove(&context);
        self.released.insert(context);

        let undelivered = self.switchboard.detach(context);
        for envelope in undelivered {
            self.log.record(DeliveryEvent::MessageDropped {
                destination: context,
                channel: envelope.channel,
            });
        }

        let mut cancelled = Vec::new();
        for (id, pending) in self.calls.iter_mut() {
            if pending.state.is_pending()
                && (pending.caller == context || pending.destination == context)
            {
                pending.state = CallState::Cancelled;
                cancelled.push(*id);
            }
        }
        for id in cancelled {
            self.log.record(DeliveryEvent::CallCancelled { call: id, context });
        }
        Ok(())
    }

    // ===== Handler registration =====

    /// Registers a persistent handler on a channel
    pub fn on(
        &mut self,
        context: ContextId,
        channel: impl Into<String>,
        handler: impl FnMut(&mut MessageEvent) -> HandlerResult + 'static,
    ) -> Result<SubscriptionId, IpcError> {
        Ok(self.context_mut(context)?.registry.register(channel, handler))
    }

    /// Registers a handler that unregisters itself after one invocation
    pub fn once(
        &mut self,
        context: ContextId,
        channel: impl Into<String>,
        handler: impl FnMut(&mut MessageEvent) -> HandlerResult + 'static,
    ) -> Result<SubscriptionId, IpcError> {
        Ok(self
            .context_mut(context)?
            .registry
            .register_once(channel, handler))
    }

    /// Removes one registration; returns whether it existed
    pub fn remove_listener(
        &mut self,
        context: ContextId,
        subscription: SubscriptionId,
    ) -> Result<bool, IpcError> {
        Ok(self.context_mut(context)?.registry.remove(subscription))
    }

    /// Removes registrations on one channel, or every registration
    pub fn remove_all_listeners(
        &mut self,
        context: ContextId,
        channel: Option<&str>,
    ) -> Result<usize, IpcError> {
        let registry = &mut self.context_mut(context)?.registry;
        Ok(match channel {
            Some(channel) => registry.remove_channel(channel),
            None => registry.remove_all(),
        })
    }

    /// Returns the channels with at least one registration
    pub fn registered_channels(&self, context: ContextId) -> Result<Vec<String>, IpcError> {
        Ok(self.context_ref(context)?.registry.channels())
    }

    /// Returns the number of handlers registered on a channel
    pub fn handler_count(&self, context: ContextId, channel: &str) -> Result<usize, IpcError> {
        Ok(self.context_ref(context)?.registry.handler_count(channel))
    }

    // ===== Request responders =====

    /// Registers the channel's single request responder
    pub fn handle(
        &mut self,
        context: ContextId,
        channel: impl Into<String>,
        responder: impl FnMut(&MessageEvent) -> Result<Value, String> + 'static,
    ) -> Result<(), IpcError> {
        self.insert_responder(
            context,
            channel.into(),
            Retention::Persistent,
            Box::new(responder),
        )
    }

    /// Registers a responder that removes itself after one request
    pub fn handle_once(
        &mut self,
        context: ContextId,
        channel: impl Into<String>,
        responder: impl FnMut(&MessageEvent) -> Result<Value, String> + 'static,
    ) -> Result<(), IpcError> {
        self.insert_responder(context, channel.into(), Retention::Once, Box::new(responder))
    }

    fn insert_responder(
        &mut self,
        context: ContextId,
        channel: String,
        retention: Retention,
        callback: Responder,
    ) -> Result<(), IpcError> {
        let state = self.context_mut(context)?;
        if state.responders.contains_key(&channel) {
            return Err(IpcError::HandlerAlreadyRegistered(channel));
        }
        state
            .responders
            .insert(channel, ResponderEntry { retention, callback });
        Ok(())
    }

    /// Removes the channel's responder; returns whether one existed
    pub fn remove_handler(
        &mut self,
        context: ContextId,
        channel: &str,
    ) -> Result<bool, IpcError> {
        Ok(self.context_mut(context)?.responders.remove(channel).is_some())
    }

    // ===== Sending =====

    /// Queues a fire-and-forget message
    ///
    /// Fails fast if either endpoint has been torn down or the arguments
    /// cannot be encoded; once this returns `Ok`, the sender learns
    /// nothing further about delivery or handling.
    pub fn send(
        &mut self,
        from: ContextId,
        to: ContextId,
        channel: impl Into<String>,
        args: &[Value],
    ) -> Result<(), IpcError> {
        let channel = channel.into();
        self.ensure_live(from)?;
        self.ensure_live(to)?;
        let envelope = Self::encode_envelope(from, &channel, args)?;
        self.switchboard
            .send(to, envelope)
            .map_err(Self::transport_error)
    }

    /// Posts a synchronous call without pumping (step mode)
    ///
    /// The call starts in `Sent`; `deliver_next`/`run_until_idle` move it
    /// through the state machine, observable via `call_state`.
    pub fn post_sync_call(
        &mut self,
        from: ContextId,
        to: ContextId,
        channel: impl Into<String>,
        args: &[Value],
    ) -> Result<CallId, IpcError> {
        self.post_call(from, to, channel.into(), args, true)
    }

    /// Posts a request call without pumping (step mode)
    pub fn post_request_call(
        &mut self,
        from: ContextId,
        to: ContextId,
        channel: impl Into<String>,
        args: &[Value],
    ) -> Result<CallId, IpcError> {
        self.post_call(from, to, channel.into(), args, false)
    }

    fn post_call(
        &mut self,
        from: ContextId,
        to: ContextId,
        channel: String,
        args: &[Value],
        synchronous: bool,
    ) -> Result<CallId, IpcError> {
        self.ensure_live(from)?;
        self.ensure_live(to)?;
        let envelope = Self::encode_envelope(from, &channel, args)?;
        let call = CallId::new();
        let envelope = if synchronous {
            envelope.with_sync_call(call)
        } else {
            envelope.with_request_call(call)
        };
        self.calls
            .insert(call, PendingCall::new(from, to, channel, ReplyCell::new()));
        if let Err(err) = self.switchboard.send(to, envelope) {
            self.calls.remove(&call);
            return Err(Self::transport_error(err));
        }
        Ok(call)
    }

    /// Sends a message and suspends until exactly one reply is honored
    ///
    /// The destination's mailbox is pumped in FIFO order (earlier queued
    /// messages are dispatched first), modeling the suspended caller
    /// loop. Resolves with `Null` when no handler answers.
    pub fn send_sync(
        &mut self,
        from: ContextId,
        to: ContextId,
        channel: impl Into<String>,
        args: &[Value],
    ) -> Result<Value, IpcError> {
        let call = self.post_sync_call(from, to, channel, args)?;
        self.pump_call(call, to)
    }

    /// Sends a request to the channel's single responder and suspends
    ///
    /// Fails with `NoHandler` when no responder is registered, and with
    /// `HandlerRejected` when the responder returns an error.
    pub fn invoke(
        &mut self,
        from: ContextId,
        to: ContextId,
        channel: impl Into<String>,
        args: &[Value],
    ) -> Result<Value, IpcError> {
        let call = self.post_request_call(from, to, channel, args)?;
        self.pump_call(call, to)
    }

    fn pump_call(&mut self, call: CallId, destination: ContextId) -> Result<Value, IpcError> {
        for _ in 0..self.config.max_delivery_passes {
            if let Some(result) = self.take_resolution(call) {
                return result;
            }
            if !self.deliver_next(destination)? {
                break;
            }
        }
        // The envelope is gone without a resolution: its mailbox was torn
        // down under the call.
        self.calls.remove(&call);
        Err(IpcError::ChannelReleased)
    }

    fn take_resolution(&mut self, call: CallId) -> Option<Result<Value, IpcError>> {
        let still_pending = match self.calls.get(&call) {
            Some(pending) => pending.state.is_pending(),
            None => return Some(Err(IpcError::ChannelReleased)),
        };
        if still_pending {
            return None;
        }
        let pending = self.calls.remove(&call)?;
        match pending.state {
            CallState::Resolved(CallOutcome::Value(value)) => Some(Ok(value)),
            CallState::Resolved(CallOutcome::NoHandler) => {
                Some(Err(IpcError::NoHandler(pending.channel)))
            }
            CallState::Resolved(CallOutcome::Rejected(detail)) => {
                Some(Err(IpcError::HandlerRejected {
                    channel: pending.channel,
                    detail,
                }))
            }
            CallState::Cancelled => Some(Err(IpcError::ChannelReleased)),
            CallState::Sent | CallState::AwaitingReply => None,
        }
    }

    /// Returns the state of a posted call, if it is still tracked
    pub fn call_state(&self, call: CallId) -> Option<CallState> {
        self.calls.get(&call).map(|pending| pending.state.clone())
    }

    // ===== Delivery =====

    /// Dispatches the next queued message for a context
    ///
    /// Returns whether a message was dispatched. All handler work for
    /// the message completes within this call (the delivery tick).
    pub fn deliver_next(&mut self, context: ContextId) -> Result<bool, IpcError> {
        self.ensure_live(context)?;
        let envelope = match self.switchboard.pop(context) {
            Some(envelope) => envelope,
            None => return Ok(false),
        };
        let source = envelope.source;
        let channel = envelope.channel.clone();
        let mode = envelope.mode;

        let args = match Self::decode_payload(&envelope) {
            Ok(args) => args,
            Err(detail) => {
                self.fail_decode(context, &channel, mode, detail);
                return Ok(true);
            }
        };

        match mode {
            DeliveryMode::FireAndForget => {
                self.deliver_event(context, source, &channel, args, None);
            }
            DeliveryMode::Synchronous { call } => {
                let slot = match self.calls.get_mut(&call) {
                    Some(pending) if pending.state.is_pending() => {
                        pending.state = CallState::AwaitingReply;
                        Some(pending.slot.clone())
                    }
                    // Caller torn down while the envelope was in flight:
                    // nobody can observe a reply.
                    _ => None,
                };
                match slot {
                    Some(slot) => {
                        self.deliver_event(context, source, &channel, args, Some(slot.clone()));
                        let value = match slot.get() {
                            Some(value) => self.reencode_reply(source, &channel, value),
                            None => Value::Null,
                        };
                        if let Some(pending) = self.calls.get_mut(&call) {
                            pending.state = CallState::Resolved(CallOutcome::Value(value));
                        }
                    }
                    None => {
                        self.log.record(DeliveryEvent::MessageDropped {
                            destination: context,
                            channel,
                        });
                    }
                }
            }
            DeliveryMode::Request { call } => {
                let active = matches!(
                    self.calls.get(&call),
                    Some(pending) if pending.state.is_pending()
                );
                if !active {
                    self.log.record(DeliveryEvent::MessageDropped {
                        destination: context,
                        channel,
                    });
                    return Ok(true);
                }
                if let Some(pending) = self.calls.get_mut(&call) {
                    pending.state = CallState::AwaitingReply;
                }
                let outcome = self.run_responder(context, source, &channel, args);
                if let Some(pending) = self.calls.get_mut(&call) {
                    pending.state = CallState::Resolved(outcome);
                }
            }
        }
        Ok(true)
    }

    /// Delivers queued messages everywhere until all mailboxes are empty
    ///
    /// Contexts are pumped in creation order, one message per context per
    /// pass, bounded by the configured pass limit.
    pub fn run_until_idle(&mut self) {
        for _ in 0..self.config.max_delivery_passes {
            let mut delivered = false;
            for context in self.context_order.clone() {
                if !self.contexts.contains_key(&context) {
                    continue;
                }
                if let Ok(true) = self.deliver_next(context) {
                    delivered = true;
                }
            }
            if !delivered {
                break;
            }
        }
    }

    fn deliver_event(
        &mut self,
        context: ContextId,
        source: ContextId,
        channel: &str,
        args: Vec<Value>,
        slot: Option<ReplyCell>,
    ) {
        let mut event = match slot {
            Some(slot) => MessageEvent::synchronous(source, channel, args, slot),
            None => MessageEvent::fire_and_forget(source, channel, args),
        };
        let faults = match self.contexts.get_mut(&context) {
            Some(state) => state.registry.dispatch(&mut event),
            None => Vec::new(),
        };
        for fault in faults {
            self.log.record(DeliveryEvent::HandlerFault {
                context,
                channel: channel.to_string(),
                detail: fault.detail,
            });
        }
        self.route_outgoing(context, source, event.take_outgoing());
    }

    fn run_responder(
        &mut self,
        context: ContextId,
        source: ContextId,
        channel: &str,
        args: Vec<Value>,
    ) -> CallOutcome {
        let event = MessageEvent::fire_and_forget(source, channel, args);
        let mut fault = None;
        let raw = match self.contexts.get_mut(&context) {
            Some(state) => match state.responders.get_mut(channel) {
                Some(entry) => {
                    let result = (entry.callback)(&event);
                    if entry.retention == Retention::Once {
                        state.responders.remove(channel);
                    }
                    match result {
                        Ok(value) => RawOutcome::Value(value),
                        Err(detail) => {
                            fault = Some(detail.clone());
                            RawOutcome::Rejected(detail)
                        }
                    }
                }
                None => RawOutcome::NoHandler,
            },
            None => RawOutcome::NoHandler,
        };
        if let Some(detail) = fault {
            self.log.record(DeliveryEvent::HandlerFault {
                context,
                channel: channel.to_string(),
                detail,
            });
        }
        match raw {
            RawOutcome::Value(value) => match Self::roundtrip_value(&value) {
                Ok(value) => CallOutcome::Value(value),
                Err(err) => {
                    CallOutcome::Rejected(format!("reply value could not be serialized: {}", err))
                }
            },
            RawOutcome::NoHandler => CallOutcome::NoHandler,
            RawOutcome::Rejected(detail) => CallOutcome::Rejected(detail),
        }
    }

    fn route_outgoing(
        &mut self,
        from: ContextId,
        destination: ContextId,
        outgoing: Vec<(String, Vec<Value>)>,
    ) {
        for (channel, args) in outgoing {
            if !self.contexts.contains_key(&destination) {
                self.log.record(DeliveryEvent::ReplyDropped {
                    destination,
                    channel,
                    detail: "destination context released".to_string(),
                });
                continue;
            }
            let envelope = match Self::encode_envelope(from, &channel, &args) {
                Ok(envelope) => envelope,
                Err(err) => {
                    self.log.record(DeliveryEvent::ReplyDropped {
                        destination,
                        channel,
                        detail: err.to_string(),
                    });
                    continue;
                }
            };
            if let Err(err) = self.switchboard.send(destination, envelope) {
                self.log.record(DeliveryEvent::ReplyDropped {
                    destination,
                    channel,
                    detail: err.to_string(),
                });
            }
        }
    }

    fn fail_decode(
        &mut self,
        context: ContextId,
        channel: &str,
        mode: DeliveryMode,
        detail: String,
    ) {
        self.log.record(DeliveryEvent::DecodeFault {
            context,
            channel: channel.to_string(),
            detail: detail.clone(),
        });
        // A blocking caller must still resolve, never wedge.
        match mode {
            DeliveryMode::FireAndForget => {}
            DeliveryMode::Synchronous { call } => {
                if let Some(pending) = self.calls.get_mut(&call) {
                    if pending.state.is_pending() {
                        pending.state = CallState::Resolved(CallOutcome::Value(Value::Null));
                    }
                }
            }
            DeliveryMode::Request { call } => {
                if let Some(pending) = self.calls.get_mut(&call) {
                    if pending.state.is_pending() {
                        pending.state = CallState::Resolved(CallOutcome::Rejected(format!(
                            "request payload could not be decoded: {}",
                            detail
                        )));
                    }
                }
            }
        }
    }

    // ===== Introspection =====

    /// Returns the number of live contexts
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Returns a context's debug name
    pub fn context_name(&self, context: ContextId) -> Option<&str> {
        self.contexts.get(&context).map(|state| state.name.as_str())
    }

    /// Returns the number of unresolved blocking calls
    pub fn pending_call_count(&self) -> usize {
        self.calls
            .values()
            .filter(|pending| pending.state.is_pending())
            .count()
    }

    /// Checks whether every mailbox is empty
    pub fn is_idle(&self) -> bool {
        self.switchboard.is_idle()
    }

    /// Returns the delivery log
    pub fn log(&self) -> &DeliveryLog {
        &self.log
    }

    // ===== Internals =====

    fn ensure_live(&self, context: ContextId) -> Result<(), IpcError> {
        self.context_ref(context).map(|_| ())
    }

    fn context_ref(&self, context: ContextId) -> Result<&ContextState, IpcError> {
        if self.released.contains(&context) {
            return Err(IpcError::ChannelReleased);
        }
        self.contexts
            .get(&context)
            .ok_or(IpcError::UnknownContext(context))
    }

    fn context_mut(&mut self, context: ContextId) -> Result<&mut ContextState, IpcError> {
        if self.released.contains(&context) {
            return Err(IpcError::ChannelReleased);
        }
        self.contexts
            .get_mut(&context)
            .ok_or(IpcError::UnknownContext(context))
    }

    fn encode_envelope(
        from: ContextId,
        channel: &str,
        args: &[Value],
    ) -> Result<Envelope, SerializationError> {
        let graph = encode_args(args)?;
        let payload =
            Payload::new(&graph).map_err(|err| SerializationError::Encode(err.to_string()))?;
        Ok(Envelope::new(from, channel, payload))
    }

    fn decode_payload(envelope: &Envelope) -> Result<Vec<Value>, String> {
        let graph: ArgsGraph = envelope
            .payload
            .deserialize()
            .map_err(|err| err.to_string())?;
        decode_args(&graph).map_err(|err| err.to_string())
    }

    /// Ships a reply value back through the codec, as the boundary would
    fn reencode_reply(&mut self, destination: ContextId, channel: &str, value: Value) -> Value {
        match Self::roundtrip_value(&value) {
            Ok(value) => value,
            Err(err) => {
                self.log.record(DeliveryEvent::ReplyDropped {
                    destination,
                    channel: channel.to_string(),
                    detail: err.to_string(),
                });
                Value::Null
            }
        }
    }

    fn roundtrip_value(value: &Value) -> Result<Value, SerializationError> {
        let graph = encode_args(std::slice::from_ref(value))?;
        let mut decoded = decode_args(&graph)?;
        decoded
            .pop()
            .ok_or_else(|| SerializationError::Decode("empty argument graph".to_string()))
    }

    fn transport_error(err: TransportError) -> IpcError {
        match err {
            TransportError::Closed(_) => IpcError::ChannelReleased,
            TransportError::Unknown(context) => IpcError::UnknownContext(context),
        }
    }
}

impl Default for MessageBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use value_graph::deep_eq;

    #[test]
    fn test_create_and_destroy_context() {
        let mut bridge = MessageBridge::new();
        let guest = bridge.create_context("guest");
        assert_eq!(bridge.context_count(), 1);
        assert_eq!(bridge.context_name(guest), Some("guest"));

        bridge.destroy_context(guest).unwrap();
        assert_eq!(bridge.context_count(), 0);
        assert_eq!(bridge.destroy_context(guest), Err(IpcError::ChannelReleased));
    }

    #[test]
    fn test_unknown_context_is_not_released() {
        let mut bridge = MessageBridge::new();
        let stranger = ContextId::new();
        assert_eq!(
            bridge.destroy_context(stranger),
            Err(IpcError::UnknownContext(stranger))
        );
    }

    #[test]
    fn test_send_then_pump_fires_handler() {
        let mut bridge = MessageBridge::new();
        let host = bridge.create_context("host");
        let guest = bridge.create_context("guest");

        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = seen.clone();
            bridge
                .on(host, "message", move |event| {
                    seen.borrow_mut().push(event.args().to_vec());
                    Ok(())
                })
                .unwrap();
        }

        bridge
            .send(guest, host, "message", &[Value::Int(7)])
            .unwrap();
        assert!(seen.borrow().is_empty());

        assert!(bridge.deliver_next(host).unwrap());
        assert_eq!(seen.borrow().len(), 1);
        assert!(deep_eq(&seen.borrow()[0][0], &Value::Int(7)));
        assert!(bridge.is_idle());
    }

    #[test]
    fn test_send_sync_echo() {
        let mut bridge = MessageBridge::new();
        let host = bridge.create_context("host");
        let guest = bridge.create_context("guest");

        bridge
            .on(host, "echo", |event| {
                let value = event.args()[0].clone();
                event.set_return_value(value);
                Ok(())
            })
            .unwrap();

        let reply = bridge
            .send_sync(guest, host, "echo", &[Value::text("test")])
            .unwrap();
        assert!(deep_eq(&reply, &Value::text("test")));
        assert_eq!(bridge.pending_call_count(), 0);
    }

    #[test]
    fn test_send_sync_without_handler_resolves_null() {
        let mut bridge = MessageBridge::new();
        let host = bridge.create_context("host");
        let guest = bridge.create_context("guest");

        let reply = bridge.send_sync(guest, host, "nobody", &[]).unwrap();
        assert!(matches!(reply, Value::Null));
    }

    #[test]
    fn test_event_reply_routes_back_to_sender() {
        let mut bridge = MessageBridge::new();
        let host = bridge.create_context("host");
        let guest = bridge.create_context("guest");

        bridge
            .on(host, "ping", |event| {
                event.reply("pong", vec![Value::Int(1)]);
                Ok(())
            })
            .unwrap();

        let pongs = Rc::new(RefCell::new(0));
        {
            let pongs = pongs.clone();
            bridge
                .on(guest, "pong", move |_event| {
                    *pongs.borrow_mut() += 1;
                    Ok(())
                })
                .unwrap();
        }

        bridge.send(guest, host, "ping", &[]).unwrap();
        bridge.run_until_idle();
        assert_eq!(*pongs.borrow(), 1);
    }

    #[test]
    fn test_handler_fault_is_logged_not_fatal() {
        let mut bridge = MessageBridge::new();
        let host = bridge.create_context("host");
        let guest = bridge.create_context("guest");

        bridge
            .on(host, "work", |_event| Err("boom".to_string()))
            .unwrap();

        bridge.send(guest, host, "work", &[]).unwrap();
        bridge.run_until_idle();
        assert_eq!(bridge.log().handler_fault_count(), 1);
    }

    #[test]
    fn test_invoke_round_trip() {
        let mut bridge = MessageBridge::new();
        let host = bridge.create_context("host");
        let guest = bridge.create_context("guest");

        bridge
            .handle(host, "double", |event| match event.args().first() {
                Some(Value::Int(n)) => Ok(Value::Int(n * 2)),
                _ => Err("expected an int".to_string()),
            })
            .unwrap();

        let reply = bridge.invoke(guest, host, "double", &[Value::Int(21)]).unwrap();
        assert!(deep_eq(&reply, &Value::Int(42)));
    }

    #[test]
    fn test_step_mode_states() {
        let mut bridge = MessageBridge::new();
        let host = bridge.create_context("host");
        let guest = bridge.create_context("guest");

        bridge
            .on(host, "echo", |event| {
                event.set_return_value(Value::Int(1));
                Ok(())
            })
            .unwrap();

        let call = bridge.post_sync_call(guest, host, "echo", &[]).unwrap();
        assert!(matches!(bridge.call_state(call), Some(CallState::Sent)));

        assert!(bridge.deliver_next(host).unwrap());
        assert!(matches!(
            bridge.call_state(call),
            Some(CallState::Resolved(CallOutcome::Value(Value::Int(1))))
        ));
    }
}
