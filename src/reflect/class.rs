//! Runtime class descriptions
//!
//! A native type describes its scriptable surface once, through [`Scriptable::define`].
//! The resulting [`Class`] is the only thing the bridge introspects: it plays the role
//! of a reflective runtime class, listing properties and callables together with their
//! true signatures and type-erased implementations.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use tracing::debug;

use super::observe::Observers;
use super::policy::{ScriptingPolicy, TypePolicy};
use super::table::CapabilityTable;
use crate::core::Value;
use crate::errors::{BridgeError, InvocationError};
use crate::interop::{NativeType, NativeValue};

/// Selector of the default (catch-all) invocation entry point
pub const DEFAULT_METHOD_SELECTOR: &str = "invoke_default_method";

/// Selector of the catch-all script constructor
pub const SCRIPT_INITIALIZER_SELECTOR: &str = "init_by_script";

/// A native object as the bridge holds it
pub type NativeObject = Arc<dyn ScriptObject>;

pub type MethodImpl =
    Arc<dyn Fn(&dyn Any, &[NativeValue]) -> Result<NativeValue, InvocationError> + Send + Sync>;

pub type ConstructorImpl = Arc<dyn Fn(&[NativeValue]) -> Option<NativeObject> + Send + Sync>;

static CLASSES: Lazy<DashMap<TypeId, Arc<Class>>> = Lazy::new(DashMap::new);

/// Plugin contract of a native type exposed to scripts.
///
/// Only `define` is required. The associated functions are the type-level naming and
/// exclusion policies; the `&self` methods are per-instance hooks.
pub trait Scriptable: Any + Send + Sync + Sized {
    /// Declare properties, methods and constructors
    fn define(class: &mut ClassBuilder<Self>);

    /// Exposed name for a method selector; `None` keeps the selector
    fn script_name_for_method(_selector: &str) -> Option<String> {
        None
    }

    /// Exposed name for a property key; `None` keeps the key
    fn script_name_for_key(_key: &str) -> Option<String> {
        None
    }

    fn is_method_excluded_from_script(selector: &str) -> bool {
        selector.starts_with('_')
    }

    fn is_key_excluded_from_script(key: &str) -> bool {
        key.starts_with('_')
    }

    /// Channel identifier to use instead of the process-wide sequence
    fn channel_identifier(&self) -> Option<String> {
        None
    }

    /// Rewrite one generated stub; `key` is a member name or `.base`, `.local`, `.global`
    fn rewrite_generated_stub(&self, stub: String, _key: &str) -> String {
        stub
    }

    /// Called once when the proxy wrapping this object goes away
    fn finalize_for_script(&self) {}

    /// Offered every message the channel cannot decode; return `true` if consumed
    fn receive_raw_message(&self, _body: &serde_json::Value) -> bool {
        false
    }

    /// Observer list the object notifies on property mutation
    fn observers(&self) -> Option<&Observers> {
        None
    }
}

/// Object-safe view of a [`Scriptable`] value
pub trait ScriptObject: Send + Sync {
    fn class(&self) -> Arc<Class>;
    fn as_any(&self) -> &dyn Any;
    fn channel_identifier(&self) -> Option<String>;
    fn rewrite_generated_stub(&self, stub: String, key: &str) -> String;
    fn finalize_for_script(&self);
    fn receive_raw_message(&self, body: &serde_json::Value) -> bool;
    fn observers(&self) -> Option<&Observers>;
}

impl<T: Scriptable> ScriptObject for T {
    fn class(&self) -> Arc<Class> {
        Class::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn channel_identifier(&self) -> Option<String> {
        Scriptable::channel_identifier(self)
    }

    fn rewrite_generated_stub(&self, stub: String, key: &str) -> String {
        Scriptable::rewrite_generated_stub(self, stub, key)
    }

    fn finalize_for_script(&self) {
        Scriptable::finalize_for_script(self)
    }

    fn receive_raw_message(&self, body: &serde_json::Value) -> bool {
        Scriptable::receive_raw_message(self, body)
    }

    fn observers(&self) -> Option<&Observers> {
        Scriptable::observers(self)
    }
}

impl dyn ScriptObject {
    pub fn downcast_ref<T: Scriptable>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// What kind of callable a class member is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
    Method,
    /// The default invocation entry point; takes the whole argument list
    DefaultMethod,
    /// Catch-all script constructor; takes the whole argument list
    ScriptInitializer,
    Constructor,
}

impl CallableKind {
    pub fn is_constructor(self) -> bool {
        matches!(self, Self::ScriptInitializer | Self::Constructor)
    }
}

/// True signature of a callable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub selector: String,
    pub params: Vec<NativeType>,
    pub returns: NativeType,
    /// Last parameter is a promise-style continuation
    pub promise: bool,
}

impl Signature {
    #[inline]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

enum Body {
    Method(MethodImpl),
    Constructor(ConstructorImpl),
}

pub struct Callable {
    kind: CallableKind,
    signature: Signature,
    body: Body,
}

impl Callable {
    pub fn kind(&self) -> CallableKind {
        self.kind
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn selector(&self) -> &str {
        &self.signature.selector
    }

    /// Call a method body on `target`; constructors are rejected
    pub fn call(&self, target: &dyn Any, args: &[NativeValue]) -> Result<NativeValue, InvocationError> {
        match &self.body {
            Body::Method(f) => f(target, args),
            Body::Constructor(_) => Err(InvocationError::UnresolvableTarget {
                class: "instance".to_string(),
                selector: self.signature.selector.clone(),
            }),
        }
    }

    /// Run a constructor body; `Ok(None)` means it produced nothing
    pub fn instantiate(&self, args: &[NativeValue]) -> Result<Option<NativeObject>, InvocationError> {
        match &self.body {
            Body::Constructor(f) => Ok(f(args)),
            Body::Method(_) => Err(InvocationError::UnresolvableTarget {
                class: "class".to_string(),
                selector: self.signature.selector.clone(),
            }),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("kind", &self.kind)
            .field("signature", &self.signature)
            .finish()
    }
}

/// A declared property and its accessor selectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: String,
    pub ty: NativeType,
    pub getter: String,
    pub setter: Option<String>,
}

/// Reflective description of one native type
pub struct Class {
    name: &'static str,
    type_id: TypeId,
    properties: Vec<PropertyInfo>,
    callables: Vec<Arc<Callable>>,
    policy: Arc<dyn ScriptingPolicy>,
    table: OnceCell<Arc<CapabilityTable>>,
}

impl Class {
    /// Class of `T`, described on first use and cached for the process lifetime
    pub fn of<T: Scriptable>() -> Arc<Class> {
        let id = TypeId::of::<T>();
        if let Some(class) = CLASSES.get(&id) {
            return class.clone();
        }

        // Describe outside the map lock; `define` may touch other classes
        let mut builder = ClassBuilder::<T>::new();
        T::define(&mut builder);
        let class = Arc::new(builder.finish());
        debug!(class = class.name, callables = class.callables.len(), "Class described");

        CLASSES.entry(id).or_insert(class).clone()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Unqualified type name, for messages
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    pub fn callables(&self) -> impl Iterator<Item = &Arc<Callable>> {
        self.callables.iter()
    }

    /// Resolve a selector against this class; the last declaration wins
    pub fn resolve(&self, selector: &str) -> Option<&Arc<Callable>> {
        self.callables.iter().rev().find(|c| c.selector() == selector)
    }

    pub fn policy(&self) -> &dyn ScriptingPolicy {
        self.policy.as_ref()
    }

    /// Capability table under this class's own policy, built once
    pub fn table(&self) -> Result<Arc<CapabilityTable>, BridgeError> {
        self.table
            .get_or_try_init(|| CapabilityTable::build(self, self.policy.as_ref()).map(Arc::new))
            .cloned()
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("properties", &self.properties)
            .field("callables", &self.callables)
            .finish()
    }
}

fn target<'a, T: 'static>(obj: &'a dyn Any, selector: &str) -> Result<&'a T, InvocationError> {
    obj.downcast_ref::<T>().ok_or_else(|| InvocationError::TargetMismatch {
        class: std::any::type_name::<T>().to_string(),
        selector: selector.to_string(),
    })
}

/// Collects the scriptable surface of `T`
pub struct ClassBuilder<T> {
    properties: Vec<PropertyInfo>,
    callables: Vec<Arc<Callable>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Scriptable> ClassBuilder<T> {
    fn new() -> Self {
        Self {
            properties: Vec::new(),
            callables: Vec::new(),
            _marker: PhantomData,
        }
    }

    fn push_method<F>(&mut self, kind: CallableKind, signature: Signature, f: F)
    where
        F: Fn(&T, &[NativeValue]) -> NativeValue + Send + Sync + 'static,
    {
        let selector = signature.selector.clone();
        let body: MethodImpl = Arc::new(move |obj, args| Ok(f(target::<T>(obj, &selector)?, args)));
        self.callables.push(Arc::new(Callable { kind, signature, body: Body::Method(body) }));
    }

    fn push_constructor<F>(&mut self, kind: CallableKind, signature: Signature, f: F)
    where
        F: Fn(&[NativeValue]) -> Option<T> + Send + Sync + 'static,
    {
        let body: ConstructorImpl =
            Arc::new(move |args| f(args).map(|object| Arc::new(object) as NativeObject));
        self.callables.push(Arc::new(Callable { kind, signature, body: Body::Constructor(body) }));
    }

    /// Read-write property; accessors are `name` and `set_name`
    pub fn property<G, S>(&mut self, name: &str, ty: NativeType, get: G, set: S) -> &mut Self
    where
        G: Fn(&T) -> NativeValue + Send + Sync + 'static,
        S: Fn(&T, NativeValue) + Send + Sync + 'static,
    {
        let setter = format!("set_{}", name);
        self.readonly_property(name, ty, get);
        if let Some(prop) = self.properties.last_mut() {
            prop.setter = Some(setter.clone());
        }
        self.push_method(
            CallableKind::Method,
            Signature { selector: setter, params: vec![ty], returns: NativeType::Void, promise: false },
            move |this, args| {
                set(this, args.first().cloned().unwrap_or_default());
                NativeValue::Void
            },
        );
        self
    }

    pub fn readonly_property<G>(&mut self, name: &str, ty: NativeType, get: G) -> &mut Self
    where
        G: Fn(&T) -> NativeValue + Send + Sync + 'static,
    {
        self.properties.push(PropertyInfo {
            name: name.to_string(),
            ty,
            getter: name.to_string(),
            setter: None,
        });
        self.push_method(
            CallableKind::Method,
            Signature { selector: name.to_string(), params: Vec::new(), returns: ty, promise: false },
            move |this, _| get(this),
        );
        self
    }

    pub fn method<F>(&mut self, selector: &str, params: &[NativeType], returns: NativeType, f: F) -> &mut Self
    where
        F: Fn(&T, &[NativeValue]) -> NativeValue + Send + Sync + 'static,
    {
        self.push_method(
            CallableKind::Method,
            Signature { selector: selector.to_string(), params: params.to_vec(), returns, promise: false },
            f,
        );
        self
    }

    /// Promise-style method; the script appends a continuation, delivered as the last
    /// argument (`NativeValue::Object` holding a mirror)
    pub fn async_method<F>(&mut self, selector: &str, params: &[NativeType], f: F) -> &mut Self
    where
        F: Fn(&T, &[NativeValue]) + Send + Sync + 'static,
    {
        let mut params = params.to_vec();
        params.push(NativeType::Object);
        self.push_method(
            CallableKind::Method,
            Signature { selector: selector.to_string(), params, returns: NativeType::Void, promise: true },
            move |this, args| {
                f(this, args);
                NativeValue::Void
            },
        );
        self
    }

    /// Entry point used when the plugin itself is called as a function
    pub fn default_method<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&T, &[Value]) -> Value + Send + Sync + 'static,
    {
        self.push_method(
            CallableKind::DefaultMethod,
            Signature {
                selector: DEFAULT_METHOD_SELECTOR.to_string(),
                params: vec![NativeType::Object],
                returns: NativeType::Object,
                promise: false,
            },
            move |this, args| NativeValue::Object(f(this, list_argument(args))),
        );
        self
    }

    /// Catch-all constructor for `new` requests from script
    pub fn script_initializer<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&[Value]) -> Option<T> + Send + Sync + 'static,
    {
        self.push_constructor(
            CallableKind::ScriptInitializer,
            Signature {
                selector: SCRIPT_INITIALIZER_SELECTOR.to_string(),
                params: vec![NativeType::Object],
                returns: NativeType::Object,
                promise: false,
            },
            move |args| f(list_argument(args)),
        );
        self
    }

    /// Fixed-arity constructor; scriptable only if the policy maps it to the empty name
    pub fn constructor<F>(&mut self, selector: &str, params: &[NativeType], f: F) -> &mut Self
    where
        F: Fn(&[NativeValue]) -> Option<T> + Send + Sync + 'static,
    {
        self.push_constructor(
            CallableKind::Constructor,
            Signature {
                selector: selector.to_string(),
                params: params.to_vec(),
                returns: NativeType::Object,
                promise: false,
            },
            f,
        );
        self
    }

    fn finish(self) -> Class {
        Class {
            name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            properties: self.properties,
            callables: self.callables,
            policy: Arc::new(TypePolicy::<T>::new()),
            table: OnceCell::new(),
        }
    }
}

fn list_argument(args: &[NativeValue]) -> &[Value] {
    match args.first() {
        Some(NativeValue::Object(Value::Array(items))) => items,
        _ => &[],
    }
}
