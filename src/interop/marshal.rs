//! Type marshaling - script value ↔ native value conversions
//!
//! Design: one conversion table indexed by the declared parameter kind.
//! Numbers widen/narrow with `as` semantics, nil becomes the zero value of
//! scalar kinds, reference kinds pass through.

use super::types::{NativeType, NativeValue};
use crate::core::Value;

/// Why a boxed value could not become a native argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarshalError {
    Mismatch { expected: &'static str, found: &'static str },
    Unsupported(NativeType),
}

/// Marshal a boxed value to the declared native kind
pub fn to_native(value: &Value, ty: NativeType) -> Result<NativeValue, MarshalError> {
    if ty == NativeType::Void {
        return Err(MarshalError::Unsupported(ty));
    }
    if value.is_nullish() {
        if ty.is_reference() {
            return Ok(NativeValue::Object(value.clone()));
        }
        return Ok(NativeValue::zeroed(ty));
    }

    match ty {
        NativeType::Object => Ok(NativeValue::Object(value.clone())),
        NativeType::String => match value {
            Value::String(_) => Ok(NativeValue::Object(value.clone())),
            Value::Bool(b) => Ok(NativeValue::Object(Value::String(b.to_string()))),
            Value::Int(n) => Ok(NativeValue::Object(Value::String(n.to_string()))),
            Value::UInt(n) => Ok(NativeValue::Object(Value::String(n.to_string()))),
            Value::Float(x) => Ok(NativeValue::Object(Value::String(x.to_string()))),
            other => Err(mismatch(ty, other)),
        },
        NativeType::Bool => value.as_bool().map(NativeValue::Bool).ok_or_else(|| mismatch(ty, value)),
        NativeType::F32 => number(value, ty).map(|x| NativeValue::F32(x as f32)),
        NativeType::F64 => number(value, ty).map(NativeValue::F64),
        ty if ty.is_integral() => integer(value, ty),
        _ => Err(MarshalError::Unsupported(ty)),
    }
}

fn number(value: &Value, ty: NativeType) -> Result<f64, MarshalError> {
    match value {
        Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::Bool(_) | Value::Date(_) => {
            value.as_f64().ok_or_else(|| mismatch(ty, value))
        }
        other => Err(mismatch(ty, other)),
    }
}

fn integer(value: &Value, ty: NativeType) -> Result<NativeValue, MarshalError> {
    // Unsigned sources keep their full range before narrowing
    let bits: u64 = match value {
        Value::Int(n) => *n as u64,
        Value::UInt(n) => *n,
        Value::Float(x) => {
            if matches!(ty, NativeType::U8 | NativeType::U16 | NativeType::U32 | NativeType::U64) {
                *x as u64
            } else {
                *x as i64 as u64
            }
        }
        Value::Bool(b) => *b as u64,
        other => return Err(mismatch(ty, other)),
    };

    Ok(match ty {
        NativeType::I8 => NativeValue::I8(bits as i8),
        NativeType::I16 => NativeValue::I16(bits as i16),
        NativeType::I32 => NativeValue::I32(bits as i32),
        NativeType::I64 => NativeValue::I64(bits as i64),
        NativeType::U8 => NativeValue::U8(bits as u8),
        NativeType::U16 => NativeValue::U16(bits as u16),
        NativeType::U32 => NativeValue::U32(bits as u32),
        NativeType::U64 => NativeValue::U64(bits),
        other => return Err(MarshalError::Unsupported(other)),
    })
}

fn mismatch(ty: NativeType, found: &Value) -> MarshalError {
    MarshalError::Mismatch { expected: ty.name(), found: found.type_name() }
}

/// Box a raw native value using the declared return kind
pub fn from_native(value: NativeValue, ty: NativeType) -> Value {
    if ty == NativeType::Void {
        return Value::Undefined;
    }

    match value {
        NativeValue::Void => Value::Undefined,
        NativeValue::Bool(b) => Value::Bool(b),
        NativeValue::I8(n) => Value::Int(n as i64),
        NativeValue::I16(n) => Value::Int(n as i64),
        NativeValue::I32(n) => Value::Int(n as i64),
        NativeValue::I64(n) => Value::Int(n),
        NativeValue::U8(n) => Value::Int(n as i64),
        NativeValue::U16(n) => Value::Int(n as i64),
        NativeValue::U32(n) => Value::Int(n as i64),
        NativeValue::U64(n) => Value::UInt(n),
        NativeValue::F32(x) => Value::Float(x as f64),
        NativeValue::F64(x) => Value::Float(x),
        NativeValue::Object(v) => v,
        NativeValue::Pointer(0) => Value::Null,
        NativeValue::Pointer(p) => Value::Opaque(format!("native pointer 0x{:x}", p)),
    }
}

/// Marshal an argument list against declared parameter kinds.
///
/// Returns the index of the first argument that failed together with the reason.
pub fn marshal_args(
    args: &[Value],
    types: &[NativeType],
) -> Result<Vec<NativeValue>, (usize, MarshalError)> {
    debug_assert_eq!(args.len(), types.len());

    args.iter()
        .zip(types)
        .enumerate()
        .map(|(i, (arg, &ty))| to_native(arg, ty).map_err(|e| (i, e)))
        .collect()
}
