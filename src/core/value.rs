//! Boxed dynamic values crossing the bridge
//!
//! `Value` is what travels between the two heaps: decoded message operands, arguments
//! for native calls, return values, and values serialized back into the runtime.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::binding::NativeProxy;
use crate::script::ScriptMirror;

#[derive(Clone, Default)]
pub enum Value {
    /// Absent value; `undefined` on the script side
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    /// Milliseconds since the Unix epoch
    Date(f64),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    /// A value living in the scripting runtime
    Mirror(Arc<ScriptMirror>),
    /// A native object exposed through a channel
    Native(Arc<NativeProxy>),
    /// Something with no script representation; serialized as a descriptive placeholder
    Opaque(String),
}

impl Value {
    #[inline]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(n) => Some(*n != 0),
            Self::UInt(n) => Some(*n != 0),
            Self::Float(f) => Some(*f != 0.0 && !f.is_nan()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::UInt(n) => Some(*n as i64),
            Self::Float(f) => Some(*f as i64),
            Self::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(n) => Some(*n as u64),
            Self::UInt(n) => Some(*n),
            Self::Float(f) => Some(*f as u64),
            Self::Bool(b) => Some(*b as u64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::UInt(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Date(ms) => Some(*ms),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mirror(&self) -> Option<&Arc<ScriptMirror>> {
        match self {
            Self::Mirror(mirror) => Some(mirror),
            _ => None,
        }
    }

    pub fn as_native(&self) -> Option<&Arc<NativeProxy>> {
        match self {
            Self::Native(proxy) => Some(proxy),
            _ => None,
        }
    }

    /// Script-facing name of the value's type, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) | Self::UInt(_) | Self::Float(_) => "number",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Mirror(_) => "script object",
            Self::Native(_) => "native object",
            Self::Opaque(_) => "opaque",
        }
    }

    /// Plain structural conversion; reference sentinels stay ordinary objects here.
    /// Decoding sentinels into mirrors needs an origin, see [`crate::script::Origin::wrap`].
    pub fn from_json(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::Array(items.into_iter().map(Self::from_json).collect()),
            Json::Object(map) => Self::Object(
                map.into_iter().map(|(k, v)| (k, Self::from_json(v))).collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Int(a), Self::UInt(b)) | (Self::UInt(b), Self::Int(a)) => {
                *a >= 0 && *a as u64 == *b
            }
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Mirror(a), Self::Mirror(b)) => Arc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) => Arc::ptr_eq(a, b),
            (Self::Opaque(a), Self::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "Undefined"),
            Self::Null => write!(f, "Null"),
            Self::Bool(b) => write!(f, "Bool({})", b),
            Self::Int(n) => write!(f, "Int({})", n),
            Self::UInt(n) => write!(f, "UInt({})", n),
            Self::Float(x) => write!(f, "Float({})", x),
            Self::String(s) => write!(f, "String({:?})", s),
            Self::Date(ms) => write!(f, "Date({})", ms),
            Self::Array(items) => f.debug_list().entries(items).finish(),
            Self::Object(map) => f.debug_map().entries(map).finish(),
            Self::Mirror(mirror) => write!(f, "Mirror({})", mirror.namespace()),
            Self::Native(proxy) => write!(f, "Native({})", proxy.namespace()),
            Self::Opaque(desc) => write!(f, "Opaque({})", desc),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::UInt(n as u64)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::UInt(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<Arc<ScriptMirror>> for Value {
    fn from(mirror: Arc<ScriptMirror>) -> Self {
        Self::Mirror(mirror)
    }
}

impl From<Arc<NativeProxy>> for Value {
    fn from(proxy: Arc<NativeProxy>) -> Self {
        Self::Native(proxy)
    }
}
