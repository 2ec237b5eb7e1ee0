//! Channels - one bound namespace, multiplexed to native instances
//!
//! Lifecycle is one-shot: Unbound → Bound → Closed. Inbound messages arrive on
//! the scripting runtime's thread; routing is decided there, the native calls run
//! on the channel's execution context and never block the handler.

mod message;
mod stubs;

pub use message::{Message, Opcode};

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::binding::{NativeProxy, Scope};
use crate::config::BridgeConfig;
use crate::core::Value;
use crate::errors::BridgeError;
use crate::interop::ExecutionContext;
use crate::logging;
use crate::reflect::{Member, NativeObject};
use crate::script::{MessageHandler, Origin, ScriptRuntime, UserScriptId};

static SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_identifier() -> String {
    SEQUENCE.fetch_add(1, Ordering::Relaxed).to_string()
}

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Unbound,
    Bound,
    Closed,
}

struct Binding {
    scope: Arc<Scope>,
    principal: Arc<NativeProxy>,
    instances: HashMap<i64, Arc<NativeProxy>>,
    user_script: UserScriptId,
}

enum State {
    Unbound,
    /// `bind` is in progress outside the lock
    Binding,
    Bound(Binding),
    Closed,
}

pub struct Channel {
    runtime: Weak<dyn ScriptRuntime>,
    context: ExecutionContext,
    config: BridgeConfig,
    state: Mutex<State>,
    this: Weak<Channel>,
}

/// Registered with the runtime; does not keep the channel alive
struct Endpoint(Weak<Channel>);

impl MessageHandler for Endpoint {
    fn did_receive_message(&self, body: serde_json::Value) {
        match self.0.upgrade() {
            Some(channel) => channel.receive(body),
            None => trace!("Message for a dropped channel ignored"),
        }
    }
}

impl Channel {
    /// Channel running native calls on the default queue
    pub fn new(runtime: &Arc<dyn ScriptRuntime>) -> Arc<Self> {
        let config = BridgeConfig::default();
        let context = config.channel.default_context();
        Self::with_config(runtime, context, config)
    }

    pub fn with_context(runtime: &Arc<dyn ScriptRuntime>, context: ExecutionContext) -> Arc<Self> {
        Self::with_config(runtime, context, BridgeConfig::default())
    }

    pub fn with_config(
        runtime: &Arc<dyn ScriptRuntime>,
        context: ExecutionContext,
        config: BridgeConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            runtime: Arc::downgrade(runtime),
            context,
            config,
            state: Mutex::new(State::Unbound),
            this: this.clone(),
        })
    }

    /// Bind `object` to `namespace`, inject its bootstrap script and return the
    /// principal proxy (instance 0)
    pub fn bind(&self, object: NativeObject, namespace: &str) -> Result<Arc<NativeProxy>, BridgeError> {
        let runtime = self.runtime.upgrade().ok_or(BridgeError::Transport)?;
        {
            let mut state = self.state.lock();
            if !matches!(*state, State::Unbound) {
                return Err(BridgeError::AlreadyBound);
            }
            *state = State::Binding;
        }

        match self.establish(&runtime, object, namespace) {
            Ok(binding) => {
                let principal = binding.principal.clone();
                logging::log_bind(&binding.scope.identifier, namespace, binding.scope.table.class_name());
                *self.state.lock() = State::Bound(binding);
                Ok(principal)
            }
            Err(err) => {
                *self.state.lock() = State::Unbound;
                Err(err)
            }
        }
    }

    fn establish(
        &self,
        runtime: &Arc<dyn ScriptRuntime>,
        object: NativeObject,
        namespace: &str,
    ) -> Result<Binding, BridgeError> {
        let class = object.class();
        let table = class.table()?;
        let identifier = object.channel_identifier().unwrap_or_else(next_identifier);

        runtime.add_message_handler(&identifier, Arc::new(Endpoint(self.this.clone())))?;

        let scope = Arc::new(Scope {
            identifier: identifier.clone(),
            class,
            table,
            context: self.context.clone(),
            bound: self.config.invocation.wait_bound(),
            runtime: self.runtime.clone(),
        });
        let principal = NativeProxy::new(self.this.clone(), scope.clone(), namespace.to_string(), object);

        let source = stubs::generate(&identifier, &self.config.channel.script_helper, &principal, &scope.table);
        let user_script = runtime.add_user_script(&source);

        let mut instances = HashMap::new();
        instances.insert(0, principal.clone());
        Ok(Binding { scope, principal, instances, user_script })
    }

    /// Release every instance and the identifier; the channel cannot be bound again
    pub fn unbind(&self) {
        let binding = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, State::Closed) {
                State::Bound(binding) => binding,
                other => {
                    *state = other;
                    return;
                }
            }
        };

        let Binding { scope, principal, instances, user_script } = binding;
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.remove_message_handler(&scope.identifier);
            runtime.remove_user_script(user_script);
        }
        for proxy in instances.values() {
            proxy.detach();
        }
        logging::log_unbind(&scope.identifier, principal.namespace());
    }

    pub fn state(&self) -> ChannelState {
        match &*self.state.lock() {
            State::Unbound | State::Binding => ChannelState::Unbound,
            State::Bound(_) => ChannelState::Bound,
            State::Closed => ChannelState::Closed,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.state() == ChannelState::Bound
    }

    pub fn identifier(&self) -> Option<String> {
        match &*self.state.lock() {
            State::Bound(binding) => Some(binding.scope.identifier.clone()),
            _ => None,
        }
    }

    pub fn principal(&self) -> Option<Arc<NativeProxy>> {
        match &*self.state.lock() {
            State::Bound(binding) => Some(binding.principal.clone()),
            _ => None,
        }
    }

    pub fn instance(&self, target: i64) -> Option<Arc<NativeProxy>> {
        match &*self.state.lock() {
            State::Bound(binding) => binding.instances.get(&target).cloned(),
            _ => None,
        }
    }

    /// Ids of live instances, sorted
    pub fn instance_ids(&self) -> Vec<i64> {
        match &*self.state.lock() {
            State::Bound(binding) => {
                let mut ids: Vec<i64> = binding.instances.keys().copied().collect();
                ids.sort_unstable();
                ids
            }
            _ => Vec::new(),
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Inbound messages
    // ------------------------------------------------------------------

    /// Route one message posted by the script side
    pub fn receive(&self, body: serde_json::Value) {
        let Some(message) = Message::decode(&body) else {
            self.forward_raw(body);
            return;
        };

        let (scope, principal, instance) = match &*self.state.lock() {
            State::Bound(binding) => (
                binding.scope.clone(),
                binding.principal.clone(),
                binding.instances.get(&message.target).cloned(),
            ),
            _ => {
                logging::log_message_dropped(&BridgeError::Protocol("channel is not bound".into()), &body);
                return;
            }
        };

        let result = match (&message.opcode, instance) {
            (Opcode::Release, Some(_)) if message.target == 0 => {
                self.unbind();
                Ok(())
            }
            (Opcode::Release, Some(_)) => {
                self.release_instance(message.target);
                Ok(())
            }
            (Opcode::Member(name), Some(proxy)) => self.dispatch(&scope, &proxy, name, &message),
            (Opcode::Create, None) => self.create_instance(scope, &principal, &message),
            (Opcode::Release, None) => {
                Err(BridgeError::Protocol(format!("invalid instance id: {}", message.target)))
            }
            (Opcode::Create, Some(_)) => Err(BridgeError::unknown_member("+")),
            (Opcode::Member(name), None) => {
                Err(BridgeError::Protocol(format!("'{}' sent to missing instance {}", name, message.target)))
            }
        };

        if let Err(err) = result {
            logging::log_message_dropped(&err, &body);
        }
    }

    fn dispatch(&self, scope: &Scope, proxy: &NativeProxy, name: &str, message: &Message) -> Result<(), BridgeError> {
        let origin = proxy.mirror().origin();
        match scope.table.get(name) {
            Some(Member::Property { .. }) => {
                let value = origin.wrap(message.operand.clone().unwrap_or_default());
                proxy.update_property(name, value)
            }
            Some(Member::Method { .. }) => {
                let Some(args) = message.arguments() else {
                    trace!(method = name, "Malformed operand ignored");
                    return Ok(());
                };
                let args: Vec<Value> = args.iter().cloned().map(|arg| origin.wrap(arg)).collect();
                proxy.invoke_method(name, args)
            }
            _ => Err(BridgeError::unknown_member(name)),
        }
    }

    fn create_instance(&self, scope: Arc<Scope>, principal: &NativeProxy, message: &Message) -> Result<(), BridgeError> {
        let target = message.target;
        let namespace = format!("{}[{}]", principal.namespace(), target);
        let origin = Origin::detached(namespace.clone(), self.runtime.clone());
        let args: Vec<Value> = match &message.operand {
            Some(serde_json::Value::Array(items)) => items.iter().cloned().map(|arg| origin.wrap(arg)).collect(),
            _ => Vec::new(),
        };

        let class = scope.table.class_name().to_string();
        let proxy = NativeProxy::construct(self.this.clone(), scope, namespace.clone(), args).map_err(|err| {
            logging::log_construction_failed(&class, &err);
            err
        })?;

        let registered = match &mut *self.state.lock() {
            State::Bound(binding) if !binding.instances.contains_key(&target) => {
                binding.instances.insert(target, proxy.clone());
                true
            }
            _ => false,
        };

        if registered {
            logging::log_instance_bound(target, &namespace);
        } else {
            debug!(target, "Instance slot taken or channel closed; discarding new instance");
            proxy.detach();
        }
        Ok(())
    }

    fn release_instance(&self, target: i64) {
        let removed = match &mut *self.state.lock() {
            State::Bound(binding) => binding.instances.remove(&target),
            _ => None,
        };
        // Detach outside the lock; dispose goes back to the runtime
        if let Some(proxy) = removed {
            proxy.detach();
            logging::log_instance_unbound(target, proxy.namespace());
        }
    }

    fn forward_raw(&self, body: serde_json::Value) {
        let principal = match &*self.state.lock() {
            State::Bound(binding) => Some(binding.principal.clone()),
            _ => None,
        };
        let consumed = principal.is_some_and(|p| p.object().receive_raw_message(&body));
        if !consumed {
            logging::log_message_dropped(&BridgeError::Protocol("unknown message".into()), &body);
        }
    }
}

impl MessageHandler for Channel {
    fn did_receive_message(&self, body: serde_json::Value) {
        self.receive(body);
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.unbind();
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("identifier", &self.identifier())
            .field("state", &self.state())
            .field("context", &self.context)
            .finish()
    }
}
