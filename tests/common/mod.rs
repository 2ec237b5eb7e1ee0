//! Shared fixtures: a recording runtime and a small observable plugin

#![allow(dead_code)]

use parking_lot::Mutex;
use scriptbridge::errors::BridgeError;
use scriptbridge::interop::{ExecutionContext, NativeType, NativeValue, TaskQueue};
use scriptbridge::reflect::{ClassBuilder, Observers, Scriptable};
use scriptbridge::script::{Completion, MessageHandler, ScriptRuntime, UserScriptId};
use scriptbridge::{NativeProxy, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Records scripts, keeps handlers and user scripts, answers evaluations from a queue
#[derive(Default)]
pub struct MockRuntime {
    scripts: Mutex<Vec<String>>,
    replies: Mutex<VecDeque<serde_json::Value>>,
    handlers: Mutex<HashMap<String, Arc<dyn MessageHandler>>>,
    user_scripts: Mutex<HashMap<u64, String>>,
    next_script: AtomicU64,
}

impl MockRuntime {
    pub fn new() -> (Arc<MockRuntime>, Arc<dyn ScriptRuntime>) {
        let mock = Arc::new(MockRuntime::default());
        let runtime: Arc<dyn ScriptRuntime> = mock.clone();
        (mock, runtime)
    }

    pub fn reply(&self, value: serde_json::Value) {
        self.replies.lock().push_back(value);
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().clone()
    }

    pub fn clear_scripts(&self) {
        self.scripts.lock().clear();
    }

    pub fn scripts_containing(&self, needle: &str) -> Vec<String> {
        self.scripts.lock().iter().filter(|s| s.contains(needle)).cloned().collect()
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.lock().contains_key(name)
    }

    pub fn user_scripts(&self) -> Vec<String> {
        self.user_scripts.lock().values().cloned().collect()
    }

    /// Deliver `body` as if a script had posted it to handler `name`
    pub fn post(&self, name: &str, body: serde_json::Value) -> bool {
        let handler = self.handlers.lock().get(name).cloned();
        match handler {
            Some(handler) => {
                handler.did_receive_message(body);
                true
            }
            None => false,
        }
    }

    fn next_reply(&self) -> serde_json::Value {
        self.replies.lock().pop_front().unwrap_or(serde_json::Value::Null)
    }
}

impl ScriptRuntime for MockRuntime {
    fn evaluate(&self, script: &str, completion: Option<Completion>) {
        self.scripts.lock().push(script.to_string());
        if let Some(completion) = completion {
            completion(Ok(self.next_reply()));
        }
    }

    fn evaluate_sync(&self, script: &str) -> Result<serde_json::Value, BridgeError> {
        self.scripts.lock().push(script.to_string());
        Ok(self.next_reply())
    }

    fn add_message_handler(&self, name: &str, handler: Arc<dyn MessageHandler>) -> Result<(), BridgeError> {
        let mut handlers = self.handlers.lock();
        if handlers.contains_key(name) {
            return Err(BridgeError::NameConflict { class: "handler".into(), name: name.into() });
        }
        handlers.insert(name.to_string(), handler);
        Ok(())
    }

    fn remove_message_handler(&self, name: &str) {
        self.handlers.lock().remove(name);
    }

    fn add_user_script(&self, source: &str) -> UserScriptId {
        let id = self.next_script.fetch_add(1, Ordering::SeqCst);
        self.user_scripts.lock().insert(id, source.to_string());
        UserScriptId(id)
    }

    fn remove_user_script(&self, id: UserScriptId) {
        self.user_scripts.lock().remove(&id.0);
    }
}

/// Observable counter; constructible from script with an optional start value
#[derive(Default)]
pub struct Counter {
    pub count: AtomicI64,
    pub observers: Observers,
    pub raw: Mutex<Vec<serde_json::Value>>,
    pub channel_name: Option<String>,
}

impl Counter {
    pub fn named(name: &str) -> Self {
        Self { channel_name: Some(name.to_string()), ..Self::default() }
    }

    fn set(&self, value: i64) {
        self.count.store(value, Ordering::SeqCst);
        self.observers.notify("count", &Value::Int(value));
    }
}

impl Scriptable for Counter {
    fn define(class: &mut ClassBuilder<Self>) {
        class
            .property(
                "count",
                NativeType::I64,
                |c| NativeValue::I64(c.count.load(Ordering::SeqCst)),
                |c, v| c.set(v.to_i64()),
            )
            .readonly_property("step", NativeType::I32, |_| NativeValue::I32(1))
            .method("increment", &[], NativeType::Void, |c, _| {
                c.set(c.count.load(Ordering::SeqCst) + 1);
                NativeValue::Void
            })
            .method("add", &[NativeType::I64, NativeType::I64], NativeType::I64, |c, args| {
                let total = c.count.load(Ordering::SeqCst) + args[0].to_i64() + args[1].to_i64();
                c.set(total);
                NativeValue::I64(total)
            })
            .method("whoami", &[], NativeType::String, |_, _| {
                let namespace = NativeProxy::current().map(|p| p.namespace().to_string());
                namespace.unwrap_or_default().into()
            })
            .script_initializer(|args| {
                let counter = Counter::default();
                let start = args.first().and_then(Value::as_i64).unwrap_or(0);
                counter.count.store(start, Ordering::SeqCst);
                Some(counter)
            });
    }

    fn channel_identifier(&self) -> Option<String> {
        self.channel_name.clone()
    }

    fn receive_raw_message(&self, body: &serde_json::Value) -> bool {
        self.raw.lock().push(body.clone());
        true
    }

    fn observers(&self) -> Option<&Observers> {
        Some(&self.observers)
    }
}

/// Dedicated queue so tests do not share a worker
pub fn queue(label: &str) -> ExecutionContext {
    ExecutionContext::Queue(TaskQueue::new(label))
}
