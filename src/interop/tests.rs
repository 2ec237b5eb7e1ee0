//! Test suite for interop module

use super::*;
use super::call::CallerScope;
use crate::core::Value;
use crate::errors::InvocationError;
use crate::reflect::{Class, ClassBuilder, NativeObject, Scriptable, SCRIPT_INITIALIZER_SELECTOR};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Calculator {
    total: AtomicI64,
}

impl Scriptable for Calculator {
    fn define(class: &mut ClassBuilder<Self>) {
        class
            .method("add", &[NativeType::I32, NativeType::I32], NativeType::I64, |_, args| {
                NativeValue::I64(args[0].to_i64() + args[1].to_i64())
            })
            .method("halve", &[NativeType::F64], NativeType::F64, |_, args| {
                NativeValue::F64(args[0].to_f64() / 2.0)
            })
            .method("narrow", &[NativeType::I8], NativeType::I8, |_, args| args[0].clone())
            .method("echo", &[NativeType::Object], NativeType::Object, |_, args| args[0].clone())
            .method("accumulate", &[NativeType::I64], NativeType::Void, |c, args| {
                c.total.fetch_add(args[0].to_i64(), Ordering::SeqCst);
                NativeValue::Void
            })
            .method("total", &[], NativeType::I64, |c, _| NativeValue::I64(c.total.load(Ordering::SeqCst)))
            .method("explode", &[], NativeType::Void, |_, _| panic!("native failure"))
            .script_initializer(|args| {
                let calc = Calculator::default();
                calc.total.store(args.len() as i64, Ordering::SeqCst);
                Some(calc)
            });
    }
}

fn options() -> CallOptions {
    CallOptions::new(ExecutionContext::Queue(TaskQueue::new("test.interop")))
        .with_bound(WaitBound { slice: Duration::from_millis(500), max_slices: 4 })
}

fn calculator() -> NativeObject {
    Arc::new(Calculator::default())
}

#[test]
fn test_native_type_sizes() {
    assert_eq!(NativeType::I8.size(), 1);
    assert_eq!(NativeType::I16.size(), 2);
    assert_eq!(NativeType::I32.size(), 4);
    assert_eq!(NativeType::F64.size(), 8);
    assert_eq!(NativeType::Object.size(), std::mem::size_of::<usize>());
    assert_eq!(NativeType::Void.size(), 0);
}

#[test]
fn test_marshal_nil_becomes_zero() {
    assert_eq!(to_native(&Value::Null, NativeType::I32), Ok(NativeValue::I32(0)));
    assert_eq!(to_native(&Value::Undefined, NativeType::F64), Ok(NativeValue::F64(0.0)));
    assert_eq!(to_native(&Value::Null, NativeType::Bool), Ok(NativeValue::Bool(false)));
    assert_eq!(to_native(&Value::Null, NativeType::Object), Ok(NativeValue::Object(Value::Null)));
}

#[test]
fn test_marshal_narrowing_and_widening() {
    assert_eq!(to_native(&Value::Int(300), NativeType::I8), Ok(NativeValue::I8(44)));
    assert_eq!(to_native(&Value::Float(2.9), NativeType::I32), Ok(NativeValue::I32(2)));
    assert_eq!(to_native(&Value::Int(7), NativeType::F32), Ok(NativeValue::F32(7.0)));
    assert_eq!(to_native(&Value::Bool(true), NativeType::U16), Ok(NativeValue::U16(1)));
    assert_eq!(to_native(&Value::UInt(u64::MAX), NativeType::U64), Ok(NativeValue::U64(u64::MAX)));
}

#[test]
fn test_marshal_rejects_mismatched_kinds() {
    assert_eq!(
        to_native(&Value::from("3"), NativeType::I32),
        Err(MarshalError::Mismatch { expected: "i32", found: "string" })
    );
    assert_eq!(
        to_native(&Value::Int(1), NativeType::Pointer),
        Err(MarshalError::Unsupported(NativeType::Pointer))
    );
    assert_eq!(to_native(&Value::Int(1), NativeType::Void), Err(MarshalError::Unsupported(NativeType::Void)));
}

#[test]
fn test_marshal_strings_accept_primitives() {
    assert_eq!(
        to_native(&Value::Int(5), NativeType::String),
        Ok(NativeValue::Object(Value::from("5")))
    );
}

#[test]
fn test_from_native_boxing() {
    assert_eq!(from_native(NativeValue::I8(-3), NativeType::I8), Value::Int(-3));
    assert_eq!(from_native(NativeValue::U64(9), NativeType::U64), Value::UInt(9));
    assert_eq!(from_native(NativeValue::I64(1), NativeType::Void), Value::Undefined);
    assert_eq!(from_native(NativeValue::Pointer(0), NativeType::Pointer), Value::Null);
    assert!(matches!(from_native(NativeValue::Pointer(16), NativeType::Pointer), Value::Opaque(_)));
}

#[test]
fn test_invoke_sync_returns_boxed_result() {
    let calc = calculator();
    let options = options();
    assert_eq!(invoke(&calc, "add", &[Value::Int(2), Value::Float(3.0)], true, &options), Ok(Value::Int(5)));
    assert_eq!(invoke(&calc, "halve", &[Value::Int(5)], true, &options), Ok(Value::Float(2.5)));
    assert_eq!(invoke(&calc, "narrow", &[Value::Int(258)], true, &options), Ok(Value::Int(2)));
    assert_eq!(
        invoke(&calc, "echo", &[Value::from("hi")], true, &options),
        Ok(Value::from("hi"))
    );
}

#[test]
fn test_invoke_arity_mismatch() {
    let calc = calculator();
    let options = options();
    for args in [vec![Value::Int(1)], vec![Value::Int(1), Value::Int(2), Value::Int(3)]] {
        let err = invoke(&calc, "add", &args, false, &options).unwrap_err();
        assert_eq!(
            err,
            InvocationError::ArityMismatch { selector: "add".into(), expected: 2, found: args.len() }
        );
    }
    // The target stays usable
    assert_eq!(invoke(&calc, "add", &[Value::Int(1), Value::Int(1)], true, &options), Ok(Value::Int(2)));
}

#[test]
fn test_invoke_argument_type_error() {
    let calc = calculator();
    let err = invoke(&calc, "add", &[Value::from("x"), Value::Int(1)], true, &options()).unwrap_err();
    assert!(matches!(err, InvocationError::ArgumentType { index: 0, .. }));
}

#[test]
fn test_invoke_unknown_selector() {
    let err = invoke(&calculator(), "subtract", &[], true, &options()).unwrap_err();
    assert!(matches!(err, InvocationError::UnresolvableTarget { ref selector, .. } if selector == "subtract"));
}

#[test]
fn test_fire_and_forget_then_sync_read() {
    let calc = calculator();
    let options = options();
    assert_eq!(invoke(&calc, "accumulate", &[Value::Int(4)], false, &options), Ok(Value::Undefined));
    assert_eq!(invoke(&calc, "accumulate", &[Value::Int(6)], false, &options), Ok(Value::Undefined));
    // Same serial queue: the read runs after both writes
    assert_eq!(invoke(&calc, "total", &[], true, &options), Ok(Value::Int(10)));
}

#[test]
fn test_panicking_call_yields_undefined() {
    let calc = calculator();
    let options = options();
    assert_eq!(invoke(&calc, "explode", &[], true, &options), Ok(Value::Undefined));
    assert_eq!(invoke(&calc, "total", &[], true, &options), Ok(Value::Int(0)));
}

#[test]
fn test_construct_with_script_initializer() {
    let class = Class::of::<Calculator>();
    let list = Value::Array(vec![Value::Int(1), Value::Int(2)]);
    let object = construct(&class, SCRIPT_INITIALIZER_SELECTOR, &[list], &options())
        .unwrap()
        .expect("instance");
    let calc = object.downcast_ref::<Calculator>().unwrap();
    assert_eq!(calc.total.load(Ordering::SeqCst), 2);
}

#[test]
fn test_construct_rejects_methods() {
    let class = Class::of::<Calculator>();
    let err = construct(&class, "add", &[Value::Int(1), Value::Int(2)], &options()).err();
    assert!(matches!(err, Some(InvocationError::UnresolvableTarget { .. })));
}

#[test]
fn test_stats_count_calls_and_errors() {
    let before = stats();
    let calc = calculator();
    let _ = invoke(&calc, "total", &[], true, &options());
    let _ = invoke(&calc, "add", &[], true, &options());
    let after = stats();
    assert!(after.calls_made > before.calls_made);
    assert!(after.marshaling_errors > before.marshaling_errors);
}

#[test]
fn test_caller_scope_restores_previous() {
    assert!(current_caller().is_none());
    {
        let _outer = CallerScope::enter(None);
        {
            let _inner = CallerScope::enter(Some(std::sync::Weak::new()));
            // A dangling handle upgrades to nothing
            assert!(current_caller().is_none());
        }
        assert!(current_caller().is_none());
    }
    assert!(current_caller().is_none());
}

#[test]
fn test_marshal_dispatch_by_kind() {
    assert_eq!(to_native(&Value::Undefined, NativeType::Object), Ok(NativeValue::Object(Value::Undefined)));
    assert_eq!(to_native(&Value::Null, NativeType::String), Ok(NativeValue::Object(Value::Null)));
    assert_eq!(to_native(&Value::Null, NativeType::I32), Ok(NativeValue::zeroed(NativeType::I32)));
    assert_eq!(to_native(&Value::Int(7), NativeType::U16), Ok(NativeValue::U16(7)));
    assert_eq!(
        to_native(&Value::Int(1), NativeType::Pointer),
        Err(MarshalError::Unsupported(NativeType::Pointer))
    );
}
