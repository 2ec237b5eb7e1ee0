//! Error taxonomy for the bridge
//!
//! Nothing here is fatal to the process. Protocol and lookup errors are logged and the
//! offending message is dropped; invocation errors abandon a single call; only a
//! capability-table name conflict aborts the operation that triggered it.

use std::fmt;

/// Failure of a single native call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    /// The selector no longer resolves on the object's runtime class
    UnresolvableTarget { class: String, selector: String },
    /// Argument count differs from the callable's true arity
    ArityMismatch { selector: String, expected: usize, found: usize },
    /// A boxed argument cannot be converted to the declared parameter kind
    ArgumentType { selector: String, index: usize, expected: &'static str, found: &'static str },
    /// Parameter kind that cannot be produced from a script value
    UnsupportedType { selector: String, index: usize, ty: &'static str },
    /// The implementation was handed an object of the wrong concrete type
    TargetMismatch { class: String, selector: String },
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvableTarget { class, selector } => {
                write!(f, "{} does not respond to '{}'", class, selector)
            }
            Self::ArityMismatch { selector, expected, found } => {
                write!(f, "'{}' expects {} arguments, got {}", selector, expected, found)
            }
            Self::ArgumentType { selector, index, expected, found } => {
                write!(f, "argument {} of '{}': expected {}, found {}", index, selector, expected, found)
            }
            Self::UnsupportedType { selector, index, ty } => {
                write!(f, "argument {} of '{}' has unsupported type {}", index, selector, ty)
            }
            Self::TargetMismatch { class, selector } => {
                write!(f, "'{}' invoked on an object that is not a {}", selector, class)
            }
        }
    }
}

impl std::error::Error for InvocationError {}

/// Member lookup failure on a capability table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    UnknownMember { name: String },
    ReadOnly { name: String },
    NotAMethod { name: String },
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMember { name } => write!(f, "no member named '{}'", name),
            Self::ReadOnly { name } => write!(f, "property '{}' is readonly", name),
            Self::NotAMethod { name } => write!(f, "member '{}' is not a method", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Malformed message shape or unknown opcode
    Protocol(String),
    Lookup(LookupError),
    /// No constructor, or the constructor produced nothing
    Construction { class: String, reason: String },
    Invocation(InvocationError),
    /// The scripting runtime endpoint is gone
    Transport,
    /// The scripting runtime reported an exception
    Script(String),
    NameConflict { class: String, name: String },
    AlreadyBound,
    Config(String),
}

impl BridgeError {
    pub fn unknown_member(name: impl Into<String>) -> Self {
        Self::Lookup(LookupError::UnknownMember { name: name.into() })
    }

    pub fn read_only(name: impl Into<String>) -> Self {
        Self::Lookup(LookupError::ReadOnly { name: name.into() })
    }

    pub fn construction(class: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Construction { class: class.into(), reason: reason.into() }
    }

    /// Short machine-friendly tag, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "protocol",
            Self::Lookup(_) => "lookup",
            Self::Construction { .. } => "construction",
            Self::Invocation(_) => "invocation",
            Self::Transport => "transport",
            Self::Script(_) => "script",
            Self::NameConflict { .. } => "name_conflict",
            Self::AlreadyBound => "already_bound",
            Self::Config(_) => "config",
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(msg) => write!(f, "protocol error: {}", msg),
            Self::Lookup(err) => write!(f, "lookup error: {}", err),
            Self::Construction { class, reason } => {
                write!(f, "failed to construct {}: {}", class, reason)
            }
            Self::Invocation(err) => write!(f, "invocation error: {}", err),
            Self::Transport => write!(f, "scripting runtime is gone"),
            Self::Script(msg) => write!(f, "script exception: {}", msg),
            Self::NameConflict { class, name } => {
                write!(f, "{} has a conflict in member name '{}'", class, name)
            }
            Self::AlreadyBound => write!(f, "channel is already bound or closed"),
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Invocation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InvocationError> for BridgeError {
    fn from(err: InvocationError) -> Self {
        Self::Invocation(err)
    }
}

impl From<LookupError> for BridgeError {
    fn from(err: LookupError) -> Self {
        Self::Lookup(err)
    }
}
