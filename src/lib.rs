//! ScriptBridge - native objects in a scripting runtime, script values in native code
//!
//! A `Channel` binds one native object under a script namespace and injects a bootstrap
//! script that forwards script-side calls back as messages. Script values reached from
//! native code are `ScriptMirror`s.

// Core modules
pub mod core;
pub mod errors;
pub mod config;
pub mod logging;

// Bridge layers
pub mod reflect;
pub mod interop;
pub mod script;
pub mod binding;
pub mod channel;
pub mod asset;

// Re-export commonly used items
pub use core::Value;
pub use errors::{BridgeError, InvocationError, LookupError};
pub use config::BridgeConfig;
pub use reflect::{CapabilityTable, Class, ClassBuilder, Member, NativeObject, Observers, ScriptObject, Scriptable};
pub use interop::{ExecutionContext, NativeType, NativeValue, RunLoop, TaskQueue, WaitBound};
pub use script::{MessageHandler, ScriptMirror, ScriptRuntime, UserScriptId};
pub use binding::NativeProxy;
pub use channel::{Channel, ChannelState};
pub use asset::{AssetBody, AssetRequest, AssetResponder, AssetResponse};
