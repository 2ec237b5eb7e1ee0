//! Property observation
//!
//! A native object that wants its property changes pushed to script owns an
//! [`Observers`] list and calls [`Observers::notify`] after every mutation.
//! Callbacks run on whichever thread performed the mutation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::Value;

pub type ObserverFn = Arc<dyn Fn(&str, &Value) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Entry {
    id: SubscriptionId,
    key: String,
    callback: ObserverFn,
}

#[derive(Default)]
pub struct Observers {
    next_id: AtomicU64,
    entries: RwLock<Vec<Entry>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, key: &str, callback: ObserverFn) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push(Entry { id, key: key.to_string(), callback });
        id
    }

    /// Returns `false` if the subscription was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    /// Deliver a change of `key` to every subscriber of that key
    pub fn notify(&self, key: &str, value: &Value) {
        // Callbacks may subscribe or unsubscribe; never call them under the lock
        let callbacks: Vec<ObserverFn> = self
            .entries
            .read()
            .iter()
            .filter(|e| e.key == key)
            .map(|e| e.callback.clone())
            .collect();
        for callback in callbacks {
            callback(key, value);
        }
    }

    pub fn subscriber_count(&self, key: &str) -> usize {
        self.entries.read().iter().filter(|e| e.key == key).count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("subscriptions", &self.entries.read().len())
            .finish()
    }
}
