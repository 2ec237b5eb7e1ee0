//! Capability table: exposed name → operation descriptor, one per native type

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, error};

use super::class::{CallableKind, Class};
use super::policy::ScriptingPolicy;
use crate::errors::BridgeError;

/// Selectors never exposed, whatever the policy says
const BUILTIN_EXCLUSIONS: &[&str] = &[
    "drop",
    "clone",
    "define",
    "channel_identifier",
    "rewrite_generated_stub",
    "finalize_for_script",
    "receive_raw_message",
    "observers",
];

/// Operation descriptor of one exposed member
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    /// `arity < 0` marks the catch-all method
    Method { selector: String, arity: i32, is_async: bool },
    /// No setter means read-only
    Property { getter: String, setter: Option<String> },
    /// `arity < 0` takes the raw argument list plus an optional trailing continuation
    Constructor { selector: String, arity: i32 },
}

impl Member {
    pub fn is_method(&self) -> bool {
        matches!(self, Self::Method { .. })
    }

    pub fn is_property(&self) -> bool {
        matches!(self, Self::Property { .. })
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self, Self::Constructor { .. })
    }

    /// Selector of a method or constructor
    pub fn selector(&self) -> Option<&str> {
        match self {
            Self::Method { selector, .. } | Self::Constructor { selector, .. } => Some(selector),
            Self::Property { .. } => None,
        }
    }

    pub fn getter(&self) -> Option<&str> {
        match self {
            Self::Property { getter, .. } => Some(getter),
            _ => None,
        }
    }

    pub fn setter(&self) -> Option<&str> {
        match self {
            Self::Property { setter, .. } => setter.as_deref(),
            _ => None,
        }
    }

    pub fn arity(&self) -> Option<i32> {
        match self {
            Self::Method { arity, .. } | Self::Constructor { arity, .. } => Some(*arity),
            Self::Property { .. } => None,
        }
    }

    /// Type tag appended to stub keys: `#<arity><p|a>`, empty for catch-all methods.
    /// Constructors always take a continuation, counted in the arity.
    pub fn stub_type(&self) -> String {
        let (promise, arity) = match self {
            Self::Method { arity, is_async, .. } => (*is_async, *arity),
            Self::Constructor { arity, .. } => (true, if *arity < 0 { *arity } else { *arity + 1 }),
            Self::Property { .. } => (false, -1),
        };
        if !promise && arity < 0 {
            return String::new();
        }
        let arity = if arity >= 0 { arity.to_string() } else { String::new() };
        format!("#{}{}", arity, if promise { 'p' } else { 'a' })
    }
}

/// Immutable map of a native type's exposed members
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityTable {
    class: String,
    members: BTreeMap<String, Member>,
}

impl CapabilityTable {
    /// Build the table for `class`, properties first, then callables.
    ///
    /// Fails with [`BridgeError::NameConflict`] when two members end up under the same
    /// exposed name.
    pub fn build(class: &Class, policy: &dyn ScriptingPolicy) -> Result<Self, BridgeError> {
        let mut table = Self {
            class: class.short_name().to_string(),
            members: BTreeMap::new(),
        };
        let mut known: HashSet<&str> = BUILTIN_EXCLUSIONS.iter().copied().collect();

        for prop in class.properties() {
            if !known.insert(prop.getter.as_str()) {
                continue;
            }
            let setter = prop
                .setter
                .as_deref()
                .filter(|setter| known.insert(*setter))
                .map(str::to_string);

            if policy.is_key_excluded(&prop.name) {
                continue;
            }
            let name = policy.script_name_for_key(&prop.name).unwrap_or_else(|| prop.name.clone());
            table.insert(name, Member::Property { getter: prop.getter.clone(), setter })?;
        }

        for callable in class.callables() {
            let selector = callable.selector();
            if known.contains(selector) {
                continue;
            }
            let signature = callable.signature();
            let arity = signature.arity() as i32;

            let (name, member) = match callable.kind() {
                CallableKind::DefaultMethod => {
                    if policy.is_method_excluded(selector) {
                        continue;
                    }
                    (String::new(), Member::Method { selector: selector.to_string(), arity: -1, is_async: false })
                }
                CallableKind::Method => {
                    if policy.is_method_excluded(selector) {
                        continue;
                    }
                    let name = policy.script_name_for_method(selector).unwrap_or_else(|| selector.to_string());
                    let member = Member::Method { selector: selector.to_string(), arity, is_async: signature.promise };
                    (name, member)
                }
                CallableKind::ScriptInitializer => {
                    (String::new(), Member::Constructor { selector: selector.to_string(), arity: -1 })
                }
                CallableKind::Constructor => {
                    let name = policy.script_name_for_method(selector).unwrap_or_else(|| selector.to_string());
                    if !name.is_empty() {
                        continue;
                    }
                    (name, Member::Constructor { selector: selector.to_string(), arity })
                }
            };
            table.insert(name, member)?;
        }

        debug!(class = %table.class, members = table.members.len(), "Capability table built");
        Ok(table)
    }

    fn insert(&mut self, name: String, member: Member) -> Result<(), BridgeError> {
        if self.members.contains_key(&name) {
            error!(class = %self.class, member = %name, "Conflict in member name");
            return Err(BridgeError::NameConflict { class: self.class.clone(), name });
        }
        self.members.insert(name, member);
        Ok(())
    }

    pub fn class_name(&self) -> &str {
        &self.class
    }

    pub fn get(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// The default member, if any
    pub fn default_member(&self) -> Option<&Member> {
        self.members.get("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members.iter().map(|(name, member)| (name.as_str(), member))
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.iter().filter(|(_, member)| member.is_property())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Exposed name for a native property key, remapped through `policy` when the key
    /// is not itself exposed
    pub fn exposed_name_for_key(&self, key: &str, policy: &dyn ScriptingPolicy) -> Option<String> {
        if self.members.get(key).is_some_and(Member::is_property) {
            return Some(key.to_string());
        }
        let name = policy.script_name_for_key(key)?;
        self.members.get(&name).filter(|m| m.is_property()).map(|_| name)
    }
}
