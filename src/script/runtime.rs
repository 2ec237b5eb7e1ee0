//! The scripting runtime as the bridge sees it
//!
//! The engine itself is an external collaborator. It evaluates script text on its
//! own single-threaded event queue, delivers posted messages to named handlers, and
//! injects user scripts into documents it loads.

use std::fmt;
use std::sync::Arc;

use crate::errors::BridgeError;

/// Receives the raw result of one evaluation
pub type Completion = Box<dyn FnOnce(Result<serde_json::Value, BridgeError>) + Send + 'static>;

/// Endpoint for messages a script posts to a named handler
pub trait MessageHandler: Send + Sync {
    fn did_receive_message(&self, body: serde_json::Value);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserScriptId(pub u64);

impl fmt::Display for UserScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user-script-{}", self.0)
    }
}

pub trait ScriptRuntime: Send + Sync {
    /// Queue `script` for evaluation; `completion` receives the result if given
    fn evaluate(&self, script: &str, completion: Option<Completion>);

    /// Evaluate and block until the runtime replies.
    ///
    /// Exceptions thrown by the script come back as [`BridgeError::Script`].
    fn evaluate_sync(&self, script: &str) -> Result<serde_json::Value, BridgeError>;

    /// Route messages posted to `name` to `handler`; fails if the name is taken
    fn add_message_handler(&self, name: &str, handler: Arc<dyn MessageHandler>) -> Result<(), BridgeError>;

    fn remove_message_handler(&self, name: &str);

    /// Inject `source` at document start of the current and every later document
    fn add_user_script(&self, source: &str) -> UserScriptId;

    fn remove_user_script(&self, id: UserScriptId);
}
