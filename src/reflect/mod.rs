//! Reflection - what a native type exposes to scripts
//!
//! Architecture:
//! - `class.rs` - runtime class descriptions and the plugin contract
//! - `policy.rs` - name remapping and exclusion policies
//! - `table.rs` - capability table built from a class under a policy
//! - `observe.rs` - observer lists for property change propagation

mod class;
mod observe;
mod policy;
mod table;

pub use class::{
    Callable, CallableKind, Class, ClassBuilder, ConstructorImpl, MethodImpl, NativeObject,
    PropertyInfo, ScriptObject, Scriptable, Signature, DEFAULT_METHOD_SELECTOR,
    SCRIPT_INITIALIZER_SELECTOR,
};
pub use observe::{ObserverFn, Observers, SubscriptionId};
pub use policy::{ExposeAll, ScriptingPolicy, TypePolicy};
pub use table::{CapabilityTable, Member};
