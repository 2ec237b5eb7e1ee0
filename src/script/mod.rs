//! Script side of the bridge
//!
//! Architecture:
//! - `runtime.rs` - the scripting runtime interface (evaluate, handlers, user scripts)
//! - `mirror.rs` - mirrors on script values and the retain/release ledger
//! - `serialize.rs` - values to script literal syntax

mod mirror;
mod runtime;
mod serialize;

pub use mirror::{Address, Origin, ScriptMirror, ValueCompletion, REFERENCE_SIGNATURE};
pub use runtime::{Completion, MessageHandler, ScriptRuntime, UserScriptId};
pub use serialize::{serialize, serialize_args};
