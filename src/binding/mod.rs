//! Native proxies - script-facing wrappers around native objects
//!
//! One proxy per channel entry. The proxy owns the wrapped object, keeps its
//! observable properties subscribed, and routes script operations through the
//! generic invoker onto the channel's execution context. Names the capability
//! table does not know fall through to the script value behind the proxy.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::channel::Channel;
use crate::core::Value;
use crate::errors::{BridgeError, LookupError};
use crate::interop::{self, CallOptions, ExecutionContext, WaitBound};
use crate::reflect::{CapabilityTable, Class, Member, NativeObject, SubscriptionId};
use crate::script::{ScriptMirror, ScriptRuntime, ValueCompletion};

/// What every proxy of one bound channel shares
pub(crate) struct Scope {
    pub identifier: String,
    pub class: Arc<Class>,
    pub table: Arc<CapabilityTable>,
    pub context: ExecutionContext,
    pub bound: WaitBound,
    pub runtime: Weak<dyn ScriptRuntime>,
}

pub struct NativeProxy {
    channel: Weak<Channel>,
    scope: Arc<Scope>,
    object: NativeObject,
    mirror: Arc<ScriptMirror>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    detached: AtomicBool,
    this: Weak<NativeProxy>,
}

impl NativeProxy {
    /// Wrap a ready-made object
    pub(crate) fn new(channel: Weak<Channel>, scope: Arc<Scope>, namespace: String, object: NativeObject) -> Arc<Self> {
        let mirror = ScriptMirror::root_detached(namespace, scope.runtime.clone());
        let proxy = Arc::new_cyclic(|this| Self {
            channel,
            scope,
            object,
            mirror,
            subscriptions: Mutex::new(Vec::new()),
            detached: AtomicBool::new(false),
            this: this.clone(),
        });
        proxy.bind_observers();
        proxy
    }

    /// Build a secondary instance through the class's default constructor.
    ///
    /// A trailing mirror is taken as the continuation when the constructor is catch-all
    /// or the argument count exceeds its arity by one; it is resolved with the new
    /// proxy once the instance is bound.
    pub(crate) fn construct(
        channel: Weak<Channel>,
        scope: Arc<Scope>,
        namespace: String,
        mut args: Vec<Value>,
    ) -> Result<Arc<Self>, BridgeError> {
        let class = scope.table.class_name().to_string();
        let Some(Member::Constructor { selector, arity }) = scope.table.default_member().cloned() else {
            return Err(BridgeError::construction(class, "class is not a constructor"));
        };

        let mut promise = None;
        if arity < 0 || arity as usize + 1 == args.len() {
            if let Some(Value::Mirror(mirror)) = args.last() {
                promise = Some(mirror.clone());
                args.pop();
            }
        }
        let args = if arity < 0 { vec![Value::Array(args)] } else { args };

        // The proxy does not exist until the object does: no current caller here
        let options = CallOptions::new(scope.context.clone()).with_bound(scope.bound);
        let object = interop::construct(&scope.class, &selector, &args, &options)?
            .ok_or_else(|| BridgeError::construction(class, "constructor produced nothing"))?;

        let proxy = Self::new(channel, scope, namespace, object);
        proxy.sync_properties();
        if let Some(promise) = promise {
            promise.call_method_with("resolve", &[Value::Native(proxy.clone())], None);
        }
        Ok(proxy)
    }

    /// Proxy driving the native call running on this thread, if any
    pub fn current() -> Option<Arc<NativeProxy>> {
        interop::current_caller()
    }

    pub fn namespace(&self) -> &str {
        self.mirror.namespace()
    }

    pub fn object(&self) -> &NativeObject {
        &self.object
    }

    /// Script value this proxy stands for
    pub fn mirror(&self) -> &Arc<ScriptMirror> {
        &self.mirror
    }

    pub fn table(&self) -> &CapabilityTable {
        &self.scope.table
    }

    pub fn channel(&self) -> Option<Arc<Channel>> {
        self.channel.upgrade()
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    fn options(&self) -> CallOptions {
        CallOptions::new(self.scope.context.clone())
            .with_bound(self.scope.bound)
            .with_caller(self.this.clone())
    }

    fn method(&self, name: &str) -> Result<(&str, i32), BridgeError> {
        match self.scope.table.get(name) {
            Some(Member::Method { selector, arity, .. }) => Ok((selector, *arity)),
            Some(_) => Err(LookupError::NotAMethod { name: name.to_string() }.into()),
            None => Err(BridgeError::unknown_member(name)),
        }
    }

    // ------------------------------------------------------------------
    // Script-originated operations (never block)
    // ------------------------------------------------------------------

    /// Fire-and-forget call of an exposed method
    pub fn invoke_method(&self, name: &str, args: Vec<Value>) -> Result<(), BridgeError> {
        let (selector, arity) = self.method(name)?;
        let args = if arity < 0 { vec![Value::Array(args)] } else { args };
        interop::invoke(&self.object, selector, &args, false, &self.options())?;
        Ok(())
    }

    /// Fire-and-forget write of an exposed property
    pub fn update_property(&self, name: &str, value: Value) -> Result<(), BridgeError> {
        match self.scope.table.get(name) {
            Some(Member::Property { setter: Some(setter), .. }) => {
                interop::invoke(&self.object, setter, &[value], false, &self.options())?;
                Ok(())
            }
            Some(Member::Property { setter: None, .. }) => Err(BridgeError::read_only(name)),
            _ => Err(BridgeError::unknown_member(name)),
        }
    }

    // ------------------------------------------------------------------
    // Synchronous access, native first, then the script side
    // ------------------------------------------------------------------

    pub fn call_method_sync(&self, name: &str, args: Vec<Value>) -> Result<Value, BridgeError> {
        match self.method(name) {
            Ok((selector, arity)) => {
                let args = if arity < 0 { vec![Value::Array(args)] } else { args };
                Ok(interop::invoke(&self.object, selector, &args, true, &self.options())?)
            }
            Err(_) if !self.scope.table.contains(name) => self.mirror.call_method(name, &args),
            Err(err) => Err(err),
        }
    }

    /// Call a method and report the result to `completion`
    pub fn call_method(&self, name: &str, args: Vec<Value>, completion: Option<ValueCompletion>) {
        if self.scope.table.contains(name) {
            let result = self.call_method_sync(name, args);
            if let Some(completion) = completion {
                completion(result);
            }
        } else {
            self.mirror.call_method_with(name, &args, completion);
        }
    }

    pub fn property(&self, name: &str) -> Result<Value, BridgeError> {
        match self.scope.table.get(name) {
            Some(Member::Property { getter, .. }) => {
                Ok(interop::invoke(&self.object, getter, &[], true, &self.options())?)
            }
            Some(_) => Err(BridgeError::unknown_member(name)),
            None => self.mirror.property(name),
        }
    }

    /// Write a property, waiting for the setter; read-only properties are rejected
    pub fn set_property(&self, name: &str, value: Value) -> Result<(), BridgeError> {
        match self.scope.table.get(name) {
            Some(Member::Property { setter: Some(setter), .. }) => {
                interop::invoke(&self.object, setter, &[value], true, &self.options())?;
                Ok(())
            }
            Some(Member::Property { setter: None, .. }) => Err(BridgeError::read_only(name)),
            Some(_) => Err(BridgeError::unknown_member(name)),
            None => self.mirror.set_property(name, &value),
        }
    }

    // ------------------------------------------------------------------
    // Property observation
    // ------------------------------------------------------------------

    fn bind_observers(&self) {
        let Some(observers) = self.object.observers() else { return };
        let mut subscriptions = self.subscriptions.lock();
        for (_, member) in self.scope.table.properties() {
            let Some(getter) = member.getter() else { continue };
            let proxy = self.this.clone();
            let id = observers.subscribe(
                getter,
                Arc::new(move |key: &str, value: &Value| {
                    if let Some(proxy) = proxy.upgrade() {
                        proxy.property_changed(key, value);
                    }
                }),
            );
            subscriptions.push(id);
        }
    }

    fn property_changed(&self, key: &str, value: &Value) {
        if self.is_detached() {
            return;
        }
        let Some(name) = self.scope.table.exposed_name_for_key(key, self.scope.class.policy()) else {
            debug!(key, namespace = self.namespace(), "Change of unexposed property ignored");
            return;
        };
        let script = property_cache_script(self.namespace(), &name, value);
        if let Some(runtime) = self.mirror.runtime() {
            trace!(property = %name, namespace = self.namespace(), "Pushing property change");
            runtime.evaluate(&script, None);
        }
    }

    /// Push every exposed property's current value into the script-side cache
    pub(crate) fn sync_properties(&self) {
        let mut script = String::new();
        for (name, _) in self.scope.table.properties() {
            let value = match self.property(name) {
                Ok(value) => value,
                Err(err) => {
                    warn!(property = name, namespace = self.namespace(), error = %err, "Property read failed; caching undefined");
                    Value::Undefined
                }
            };
            script.push_str(&property_cache_script(self.namespace(), name, &value));
            script.push_str(";\n");
        }
        if script.is_empty() {
            return;
        }
        if let Some(runtime) = self.mirror.runtime() {
            runtime.evaluate(&script, None);
        }
    }

    /// Tear down: unsubscribe, finalize the object, tell the script side to dispose.
    /// Idempotent.
    pub(crate) fn detach(&self) {
        if self.detached.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(observers) = self.object.observers() {
            for id in self.subscriptions.lock().drain(..) {
                observers.unsubscribe(id);
            }
        }
        self.object.finalize_for_script();
        self.mirror.call_method_with("dispose", &[Value::Bool(true)], None);
        debug!(namespace = self.namespace(), channel = %self.scope.identifier, "Proxy detached");
    }
}

fn property_cache_script(namespace: &str, name: &str, value: &Value) -> String {
    format!("{}.$properties['{}'] = {}", namespace, name, crate::script::serialize(value))
}

impl Drop for NativeProxy {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for NativeProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeProxy")
            .field("namespace", &self.namespace())
            .field("class", &self.scope.table.class_name())
            .field("detached", &self.is_detached())
            .finish()
    }
}
