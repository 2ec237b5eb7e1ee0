//! Script mirrors - native handles on values living in the scripting runtime
//!
//! A mirror addresses its value either by a namespace path or by a reference id
//! minted by the runtime's retain ledger. Every expression that needs an object
//! result is wrapped in `<origin>.$retainObject(...)`, so the reply carries a
//! sentinel the bridge turns into a reference mirror. Dropping that mirror
//! releases the id exactly once.

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::trace;

use super::runtime::{Completion, ScriptRuntime};
use super::serialize::{serialize, serialize_args};
use crate::core::Value;
use crate::errors::BridgeError;

/// Signature of a reference sentinel (`$sig`)
pub const REFERENCE_SIGNATURE: u64 = 0x5857_574F;

/// Receives the decoded result of one evaluation
pub type ValueCompletion = Box<dyn FnOnce(Result<Value, BridgeError>) + Send + 'static>;

/// The namespace that owns a retain ledger, plus the runtime it lives in
pub struct Origin {
    namespace: String,
    runtime: Weak<dyn ScriptRuntime>,
}

impl Origin {
    pub fn new(namespace: impl Into<String>, runtime: &Arc<dyn ScriptRuntime>) -> Arc<Self> {
        Arc::new(Self { namespace: namespace.into(), runtime: Arc::downgrade(runtime) })
    }

    pub(crate) fn detached(namespace: impl Into<String>, runtime: Weak<dyn ScriptRuntime>) -> Arc<Self> {
        Arc::new(Self { namespace: namespace.into(), runtime })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn runtime(&self) -> Option<Arc<dyn ScriptRuntime>> {
        self.runtime.upgrade()
    }

    fn retaining(&self, expression: &str) -> String {
        format!("{}.$retainObject({})", self.namespace, expression)
    }

    /// Decode a reply, turning reference sentinels into mirrors
    pub fn wrap(self: &Arc<Self>, json: serde_json::Value) -> Value {
        use serde_json::Value as Json;
        match json {
            Json::Object(map) => {
                let signed = map.get("$sig").and_then(Json::as_u64) == Some(REFERENCE_SIGNATURE);
                if signed {
                    if let Some(id) = map.get("$ref").and_then(Json::as_i64).filter(|id| *id != 0) {
                        return Value::Mirror(ScriptMirror::reference(id, self));
                    }
                    if let Some(ns) = map.get("$ns").and_then(Json::as_str) {
                        return Value::Mirror(ScriptMirror::with_path(ns, self));
                    }
                }
                Value::Object(map.into_iter().map(|(k, v)| (k, self.wrap(v))).collect())
            }
            Json::Array(items) => Value::Array(items.into_iter().map(|v| self.wrap(v)).collect()),
            other => Value::from_json(other),
        }
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Origin").field("namespace", &self.namespace).finish()
    }
}

/// How a mirror addresses its value; fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    /// The origin's own namespace; deleted on drop
    Root,
    /// Any other stable path; nothing to release
    Path,
    /// Retained by the runtime under this id; released on drop
    Reference(i64),
}

pub struct ScriptMirror {
    namespace: String,
    address: Address,
    origin: Arc<Origin>,
}

impl ScriptMirror {
    /// Mirror owning `namespace`; the runtime-side object is deleted when it drops
    pub fn root(namespace: impl Into<String>, runtime: &Arc<dyn ScriptRuntime>) -> Arc<Self> {
        let origin = Origin::new(namespace, runtime);
        Arc::new(Self { namespace: origin.namespace.clone(), address: Address::Root, origin })
    }

    pub(crate) fn root_detached(namespace: impl Into<String>, runtime: Weak<dyn ScriptRuntime>) -> Arc<Self> {
        let origin = Origin::detached(namespace, runtime);
        Arc::new(Self { namespace: origin.namespace.clone(), address: Address::Root, origin })
    }

    pub fn with_path(namespace: impl Into<String>, origin: &Arc<Origin>) -> Arc<Self> {
        Arc::new(Self { namespace: namespace.into(), address: Address::Path, origin: origin.clone() })
    }

    pub fn reference(id: i64, origin: &Arc<Origin>) -> Arc<Self> {
        Arc::new(Self {
            namespace: format!("{}.$references[{}]", origin.namespace, id),
            address: Address::Reference(id),
            origin: origin.clone(),
        })
    }

    /// The runtime's global object, reached through the helper's context
    pub fn window(runtime: &Arc<dyn ScriptRuntime>, helper: &str) -> Arc<Self> {
        let origin = Origin::new(format!("{}.context", helper), runtime);
        Self::with_path("window", &origin)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn origin(&self) -> &Arc<Origin> {
        &self.origin
    }

    pub fn runtime(&self) -> Option<Arc<dyn ScriptRuntime>> {
        self.origin.runtime()
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Evaluate `expression`, blocking for the reply
    pub fn evaluate_sync(&self, expression: &str) -> Result<Value, BridgeError> {
        let runtime = self.runtime().ok_or(BridgeError::Transport)?;
        let reply = runtime.evaluate_sync(&self.origin.retaining(expression))?;
        Ok(self.origin.wrap(reply))
    }

    /// Evaluate `expression` without blocking.
    ///
    /// Without a completion the expression is sent as is and its result discarded.
    pub fn evaluate(&self, expression: &str, completion: Option<ValueCompletion>) {
        let Some(runtime) = self.runtime() else {
            if let Some(completion) = completion {
                completion(Err(BridgeError::Transport));
            }
            return;
        };

        match completion {
            None => runtime.evaluate(expression, None),
            Some(completion) => {
                let origin = self.origin.clone();
                let reply: Completion = Box::new(move |result| completion(result.map(|json| origin.wrap(json))));
                runtime.evaluate(&self.origin.retaining(expression), Some(reply));
            }
        }
    }

    /// Fire-and-forget evaluation that still reports a gone runtime
    fn post(&self, expression: &str) -> Result<(), BridgeError> {
        let runtime = self.runtime().ok_or(BridgeError::Transport)?;
        runtime.evaluate(expression, None);
        Ok(())
    }

    fn property_path(&self, name: Option<&str>) -> String {
        match name {
            None => self.namespace.clone(),
            Some("") => format!("{}['']", self.namespace),
            Some(name) if name.parse::<i64>().is_ok() => format!("{}[{}]", self.namespace, name),
            Some(name) => format!("{}.{}", self.namespace, name),
        }
    }

    fn call_expression(&self, name: Option<&str>, args: &[Value]) -> String {
        format!("{}({})", self.property_path(name), serialize_args(args))
    }

    // ------------------------------------------------------------------
    // Object operations
    // ------------------------------------------------------------------

    /// Call the value itself as a function
    pub fn call(&self, args: &[Value]) -> Result<Value, BridgeError> {
        self.evaluate_sync(&self.call_expression(None, args))
    }

    pub fn call_with(&self, args: &[Value], completion: Option<ValueCompletion>) {
        self.evaluate(&self.call_expression(None, args), completion)
    }

    /// `new` on the value; a construction yielding nothing is a script error
    pub fn construct(&self, args: &[Value]) -> Result<Value, BridgeError> {
        let expression = format!("new {}", self.call_expression(None, args));
        match self.evaluate_sync(&expression)? {
            value if value.is_nullish() => Err(BridgeError::Script(format!("{} produced no object", expression))),
            value => Ok(value),
        }
    }

    pub fn construct_with(&self, args: &[Value], completion: Option<ValueCompletion>) {
        self.evaluate(&format!("new {}", self.call_expression(None, args)), completion)
    }

    pub fn call_method(&self, name: &str, args: &[Value]) -> Result<Value, BridgeError> {
        self.evaluate_sync(&self.call_expression(Some(name), args))
    }

    pub fn call_method_with(&self, name: &str, args: &[Value], completion: Option<ValueCompletion>) {
        self.evaluate(&self.call_expression(Some(name), args), completion)
    }

    pub fn property(&self, name: &str) -> Result<Value, BridgeError> {
        self.evaluate_sync(&self.property_path(Some(name)))
    }

    /// Assign a property; does not wait for the runtime
    pub fn set_property(&self, name: &str, value: &Value) -> Result<(), BridgeError> {
        self.post(&format!("{} = {}", self.property_path(Some(name)), serialize(value)))
    }

    pub fn delete_property(&self, name: &str) -> Result<bool, BridgeError> {
        let result = self.evaluate_sync(&format!("delete {}", self.property_path(Some(name))))?;
        Ok(result.as_bool().unwrap_or(false))
    }

    pub fn has_property(&self, name: &str) -> Result<bool, BridgeError> {
        let result = self.evaluate_sync(&format!("{} != undefined", self.property_path(Some(name))))?;
        Ok(result.as_bool().unwrap_or(false))
    }

    pub fn value_at(&self, index: u32) -> Result<Value, BridgeError> {
        self.evaluate_sync(&format!("{}[{}]", self.namespace, index))
    }

    pub fn set_value_at(&self, index: u32, value: &Value) -> Result<(), BridgeError> {
        self.post(&format!("{}[{}] = {}", self.namespace, index, serialize(value)))
    }

    /// `Object.defineProperty` on the value
    pub fn define_property(&self, name: &str, descriptor: &Value) -> Result<Value, BridgeError> {
        self.evaluate_sync(&format!(
            "Object.defineProperty({}, {}, {})",
            self.namespace,
            serialize(&Value::from(name)),
            serialize(descriptor)
        ))
    }
}

impl Drop for ScriptMirror {
    fn drop(&mut self) {
        let script = match self.address {
            Address::Root => format!("delete {}", self.namespace),
            Address::Reference(id) => format!("{}.$releaseObject({})", self.origin.namespace, id),
            Address::Path => return,
        };
        if let Some(runtime) = self.origin.runtime() {
            trace!(namespace = %self.namespace, "Releasing script value");
            runtime.evaluate(&script, None);
        }
    }
}

impl fmt::Debug for ScriptMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptMirror")
            .field("namespace", &self.namespace)
            .field("address", &self.address)
            .finish()
    }
}
