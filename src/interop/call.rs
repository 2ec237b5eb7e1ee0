//! Generic invocation of native callables by selector
//!
//! A call is prepared on the caller's thread (signature resolution, arity check,
//! argument marshaling) and then executed on the target execution context.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use tracing::{trace, warn};

use super::context::{ExecutionContext, WaitBound};
use super::marshal::{from_native, marshal_args, MarshalError};
use super::types::{NativeType, NativeValue};
use crate::binding::NativeProxy;
use crate::core::Value;
use crate::errors::InvocationError;
use crate::reflect::{Callable, Class, NativeObject};

thread_local! {
    static CURRENT_CALLER: RefCell<Option<Weak<NativeProxy>>> = const { RefCell::new(None) };
}

/// Publishes the proxy driving a native call for the duration of that call
pub(crate) struct CallerScope {
    saved: Option<Weak<NativeProxy>>,
}

impl CallerScope {
    pub(crate) fn enter(caller: Option<Weak<NativeProxy>>) -> Self {
        let saved = CURRENT_CALLER.with(|c| c.replace(caller));
        Self { saved }
    }
}

impl Drop for CallerScope {
    fn drop(&mut self) {
        let saved = self.saved.take();
        CURRENT_CALLER.with(|c| *c.borrow_mut() = saved);
    }
}

/// Proxy on whose behalf the current thread is running a native call
pub(crate) fn current_caller() -> Option<Arc<NativeProxy>> {
    CURRENT_CALLER.with(|c| c.borrow().as_ref().and_then(Weak::upgrade))
}

/// Options shared by every call issued from one proxy
#[derive(Clone)]
pub struct CallOptions {
    pub context: ExecutionContext,
    pub bound: WaitBound,
    pub caller: Option<Weak<NativeProxy>>,
}

impl CallOptions {
    pub fn new(context: ExecutionContext) -> Self {
        Self { context, bound: WaitBound::default(), caller: None }
    }

    pub fn with_bound(mut self, bound: WaitBound) -> Self {
        self.bound = bound;
        self
    }

    pub fn with_caller(mut self, caller: Weak<NativeProxy>) -> Self {
        self.caller = Some(caller);
        self
    }
}

fn prepare_args(callable: &Callable, args: &[Value]) -> Result<Vec<NativeValue>, InvocationError> {
    let signature = callable.signature();
    if args.len() != signature.arity() {
        super::record_marshaling_error();
        return Err(InvocationError::ArityMismatch {
            selector: signature.selector.clone(),
            expected: signature.arity(),
            found: args.len(),
        });
    }

    marshal_args(args, &signature.params).map_err(|(index, err)| {
        super::record_marshaling_error();
        let selector = signature.selector.clone();
        match err {
            MarshalError::Mismatch { expected, found } => {
                InvocationError::ArgumentType { selector, index, expected, found }
            }
            MarshalError::Unsupported(ty) => InvocationError::UnsupportedType { selector, index, ty: ty.name() },
        }
    })
}

/// A method call with its arguments already converted
pub struct NativeCall {
    object: NativeObject,
    callable: Arc<Callable>,
    args: Vec<NativeValue>,
}

impl NativeCall {
    /// Resolve `selector` on the object's runtime class and convert `args`
    pub fn prepare(object: &NativeObject, selector: &str, args: &[Value]) -> Result<Self, InvocationError> {
        let class = object.class();
        let callable = class
            .resolve(selector)
            .filter(|c| !c.kind().is_constructor())
            .cloned()
            .ok_or_else(|| InvocationError::UnresolvableTarget {
                class: class.short_name().to_string(),
                selector: selector.to_string(),
            })?;
        let args = prepare_args(&callable, args)?;
        Ok(Self { object: object.clone(), callable, args })
    }

    pub fn selector(&self) -> &str {
        self.callable.selector()
    }

    pub fn return_type(&self) -> NativeType {
        self.callable.signature().returns
    }

    /// Run the call on `options.context`; without `wait` the result is always `Undefined`
    pub fn perform(self, wait: bool, options: &CallOptions) -> Value {
        super::record_call();
        let returns = self.return_type();
        let selector = self.selector().to_string();
        let caller = options.caller.clone();

        trace!(selector = %selector, context = options.context.label(), wait, "Native call");
        let result = options.context.perform(wait, options.bound, move || {
            let _scope = CallerScope::enter(caller);
            match self.callable.call(self.object.as_any(), &self.args) {
                Ok(raw) => Some(raw),
                Err(err) => {
                    crate::logging::log_invocation_error(&err);
                    None
                }
            }
        });

        match result {
            Some(Some(raw)) => from_native(raw, returns),
            Some(None) => Value::Undefined,
            None => {
                if wait {
                    warn!(selector = %selector, "Native call produced no result");
                }
                Value::Undefined
            }
        }
    }
}

/// Call `selector` on `object` with boxed arguments.
///
/// Preparation errors surface here even for fire-and-forget calls; execution errors
/// abandon the call and yield `Undefined`.
pub fn invoke(
    object: &NativeObject,
    selector: &str,
    args: &[Value],
    wait: bool,
    options: &CallOptions,
) -> Result<Value, InvocationError> {
    Ok(NativeCall::prepare(object, selector, args)?.perform(wait, options))
}

/// Allocate and initialize an instance of `class` through constructor `selector`.
///
/// Always waits. `Ok(None)` means the constructor produced nothing or the wait gave up.
pub fn construct(
    class: &Class,
    selector: &str,
    args: &[Value],
    options: &CallOptions,
) -> Result<Option<NativeObject>, InvocationError> {
    let callable = class
        .resolve(selector)
        .filter(|c| c.kind().is_constructor())
        .cloned()
        .ok_or_else(|| InvocationError::UnresolvableTarget {
            class: class.short_name().to_string(),
            selector: selector.to_string(),
        })?;
    let args = prepare_args(&callable, args)?;

    super::record_call();
    let caller = options.caller.clone();
    let built = options.context.perform(true, options.bound, move || {
        let _scope = CallerScope::enter(caller);
        callable.instantiate(&args)
    });

    match built {
        Some(Ok(object)) => Ok(object),
        Some(Err(err)) => Err(err),
        None => Ok(None),
    }
}
