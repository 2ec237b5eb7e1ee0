//! Type definitions for native call marshaling
//!
//! A closed set of parameter kinds plus the raw value container a native
//! implementation receives and returns.

use crate::core::Value;

/// Declared kind of a native parameter or return value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NativeType {
    Void,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    /// Reference kind; receives strings as `Value::String`
    String,
    /// Reference kind; any boxed value passes through untouched
    Object,
    /// Raw native address; cannot be produced from a script value except null
    Pointer,
}

impl NativeType {
    /// Get size of type in bytes
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Self::Void => 0,
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
            Self::String | Self::Object | Self::Pointer => core::mem::size_of::<usize>(),
        }
    }

    #[inline]
    pub const fn is_integral(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64 |
                      Self::U8 | Self::U16 | Self::U32 | Self::U64)
    }

    /// Reference kinds pass nil through instead of zero-filling
    #[inline]
    pub const fn is_reference(self) -> bool {
        matches!(self, Self::String | Self::Object)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::String => "string",
            Self::Object => "object",
            Self::Pointer => "pointer",
        }
    }
}

/// Raw value handed to and returned from native implementations
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NativeValue {
    #[default]
    Void,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Object(Value),
    Pointer(usize),
}

impl NativeValue {
    /// Zero bit-pattern of the given kind; what a nil argument becomes for scalar parameters
    pub fn zeroed(ty: NativeType) -> Self {
        match ty {
            NativeType::Void => Self::Void,
            NativeType::Bool => Self::Bool(false),
            NativeType::I8 => Self::I8(0),
            NativeType::I16 => Self::I16(0),
            NativeType::I32 => Self::I32(0),
            NativeType::I64 => Self::I64(0),
            NativeType::U8 => Self::U8(0),
            NativeType::U16 => Self::U16(0),
            NativeType::U32 => Self::U32(0),
            NativeType::U64 => Self::U64(0),
            NativeType::F32 => Self::F32(0.0),
            NativeType::F64 => Self::F64(0.0),
            NativeType::String | NativeType::Object => Self::Object(Value::Null),
            NativeType::Pointer => Self::Pointer(0),
        }
    }

    /// Kind of the contained value
    pub fn ty(&self) -> NativeType {
        match self {
            Self::Void => NativeType::Void,
            Self::Bool(_) => NativeType::Bool,
            Self::I8(_) => NativeType::I8,
            Self::I16(_) => NativeType::I16,
            Self::I32(_) => NativeType::I32,
            Self::I64(_) => NativeType::I64,
            Self::U8(_) => NativeType::U8,
            Self::U16(_) => NativeType::U16,
            Self::U32(_) => NativeType::U32,
            Self::U64(_) => NativeType::U64,
            Self::F32(_) => NativeType::F32,
            Self::F64(_) => NativeType::F64,
            Self::Object(_) => NativeType::Object,
            Self::Pointer(_) => NativeType::Pointer,
        }
    }

    /// Lossy integer view of any scalar
    pub fn to_i64(&self) -> i64 {
        match self {
            Self::Bool(b) => *b as i64,
            Self::I8(n) => *n as i64,
            Self::I16(n) => *n as i64,
            Self::I32(n) => *n as i64,
            Self::I64(n) => *n,
            Self::U8(n) => *n as i64,
            Self::U16(n) => *n as i64,
            Self::U32(n) => *n as i64,
            Self::U64(n) => *n as i64,
            Self::F32(x) => *x as i64,
            Self::F64(x) => *x as i64,
            Self::Object(v) => v.as_i64().unwrap_or(0),
            Self::Pointer(p) => *p as i64,
            Self::Void => 0,
        }
    }

    /// Lossy floating point view of any scalar
    pub fn to_f64(&self) -> f64 {
        match self {
            Self::F32(x) => *x as f64,
            Self::F64(x) => *x,
            Self::U64(n) => *n as f64,
            Self::Object(v) => v.as_f64().unwrap_or(0.0),
            other => other.to_i64() as f64,
        }
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Object(v) => v.as_bool().unwrap_or(!v.is_nullish()),
            other => other.to_f64() != 0.0,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Object(v) => v.as_str(),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Object(v) => v,
            _ => Value::Undefined,
        }
    }
}

impl From<bool> for NativeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for NativeValue {
    fn from(n: i32) -> Self {
        Self::I32(n)
    }
}

impl From<i64> for NativeValue {
    fn from(n: i64) -> Self {
        Self::I64(n)
    }
}

impl From<f64> for NativeValue {
    fn from(x: f64) -> Self {
        Self::F64(x)
    }
}

impl From<Value> for NativeValue {
    fn from(v: Value) -> Self {
        Self::Object(v)
    }
}

impl From<String> for NativeValue {
    fn from(s: String) -> Self {
        Self::Object(Value::String(s))
    }
}
