mod common;

use common::{queue, Counter, MockRuntime};
use scriptbridge::interop::{ExecutionContext, NativeType, NativeValue, RunLoop};
use scriptbridge::reflect::{ClassBuilder, Scriptable};
use scriptbridge::script::REFERENCE_SIGNATURE;
use scriptbridge::{Channel, NativeProxy, Value};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

static SEEDED_WITHOUT_CALLER: AtomicBool = AtomicBool::new(false);

/// Constructible only through a fixed-arity constructor exposed as the default member
struct Seeded {
    seed: i64,
}

impl Scriptable for Seeded {
    fn define(class: &mut ClassBuilder<Self>) {
        class
            .readonly_property("seed", NativeType::I64, |s| NativeValue::I64(s.seed))
            .readonly_property("fragile", NativeType::I64, |_| panic!("getter failure"))
            .constructor("with_seed", &[NativeType::I64], |args| {
                SEEDED_WITHOUT_CALLER.store(NativeProxy::current().is_none(), Ordering::SeqCst);
                Some(Seeded { seed: args[0].to_i64() })
            });
    }

    fn script_name_for_method(selector: &str) -> Option<String> {
        (selector == "with_seed").then(String::new)
    }
}

/// Catch-all method plus an async method; not constructible from script
#[derive(Default)]
struct Calc {
    last: AtomicI64,
}

impl Scriptable for Calc {
    fn define(class: &mut ClassBuilder<Self>) {
        class
            .readonly_property("last", NativeType::I64, |c| NativeValue::I64(c.last.load(Ordering::SeqCst)))
            .default_method(|c, args| {
                c.last.store(args.len() as i64, Ordering::SeqCst);
                Value::Int(args.len() as i64)
            })
            .async_method("fetch", &[NativeType::String], |_, args| {
                if let Some(NativeValue::Object(Value::Mirror(promise))) = args.last() {
                    promise.call_method_with("resolve", &[Value::from("done")], None);
                }
            });
    }
}

fn continuation(id: i64) -> serde_json::Value {
    json!({"$sig": REFERENCE_SIGNATURE, "$ref": id})
}

#[test]
fn test_fixed_arity_constructor_takes_continuation() {
    let (mock, runtime) = MockRuntime::new();
    let channel = Channel::with_context(&runtime, queue("seeded"));
    channel.bind(Arc::new(Seeded { seed: 1 }), "seeded").unwrap();
    let id = channel.identifier().unwrap();
    assert!(mock.user_scripts()[0].contains(&format!("createPlugin('{}', 'seeded', '#2p')", id)));
    mock.clear_scripts();

    mock.post(&id, json!({"$opcode": "+", "$target": 2, "$operand": [8, continuation(2)]}));

    let instance = channel.instance(2).unwrap();
    assert_eq!(instance.property("seed").unwrap(), Value::Int(8));
    assert!(SEEDED_WITHOUT_CALLER.load(Ordering::SeqCst));
    assert_eq!(
        mock.scripts_containing(".resolve("),
        vec!["seeded[2].$references[2].resolve(seeded[2])".to_string()]
    );
}

#[test]
fn test_failing_getter_is_cached_as_undefined() {
    let (mock, runtime) = MockRuntime::new();
    let channel = Channel::with_context(&runtime, queue("fragile"));
    channel.bind(Arc::new(Seeded { seed: 1 }), "seeded").unwrap();
    let id = channel.identifier().unwrap();
    mock.clear_scripts();

    mock.post(&id, json!({"$opcode": "+", "$target": 5, "$operand": [3, continuation(1)]}));

    assert_eq!(channel.instance_ids(), vec![0, 5]);
    let sync = mock.scripts_containing("seeded[5].$properties['seed'] = 3");
    assert_eq!(sync.len(), 1);
    assert!(sync[0].contains("seeded[5].$properties['fragile'] = undefined"));
}

#[test]
fn test_fixed_arity_constructor_rejects_wrong_arguments() {
    let (mock, runtime) = MockRuntime::new();
    let channel = Channel::with_context(&runtime, queue("seeded.bad"));
    channel.bind(Arc::new(Seeded { seed: 1 }), "seeded").unwrap();
    let id = channel.identifier().unwrap();

    mock.post(&id, json!({"$opcode": "+", "$target": 3, "$operand": [8, 9]}));
    assert_eq!(channel.instance_ids(), vec![0]);
    assert!(channel.is_bound());
}

#[test]
fn test_catch_all_method_over_the_wire() {
    let (mock, runtime) = MockRuntime::new();
    let channel = Channel::with_context(&runtime, queue("calc.default"));
    let principal = channel.bind(Arc::new(Calc::default()), "calc").unwrap();
    let id = channel.identifier().unwrap();

    mock.post(&id, json!({"$opcode": "", "$operand": [1, 2, 3]}));
    assert_eq!(principal.property("last").unwrap(), Value::Int(3));

    mock.post(&id, json!({"$opcode": ""}));
    assert_eq!(principal.property("last").unwrap(), Value::Int(0));
}

#[test]
fn test_async_method_resolves_wire_continuation() {
    let (mock, runtime) = MockRuntime::new();
    let channel = Channel::with_context(&runtime, queue("calc.fetch"));
    let principal = channel.bind(Arc::new(Calc::default()), "calc").unwrap();
    let id = channel.identifier().unwrap();
    mock.clear_scripts();

    mock.post(&id, json!({"$opcode": "fetch", "$operand": ["x", continuation(4)]}));
    principal.property("last").unwrap();

    assert_eq!(
        mock.scripts_containing(".resolve("),
        vec!["calc.$references[4].resolve(\"done\")".to_string()]
    );
}

#[test]
fn test_create_on_non_constructible_class_registers_nothing() {
    let (mock, runtime) = MockRuntime::new();
    let channel = Channel::with_context(&runtime, queue("calc.create"));
    channel.bind(Arc::new(Calc::default()), "calc").unwrap();
    let id = channel.identifier().unwrap();
    mock.clear_scripts();

    mock.post(&id, json!({"$opcode": "+", "$target": 1, "$operand": [continuation(5)]}));

    assert_eq!(channel.instance_ids(), vec![0]);
    assert!(channel.instance(1).is_none());
    assert!(mock.scripts_containing(".resolve(").is_empty());
    assert!(channel.is_bound());
}

#[test]
fn test_channel_on_run_loop() {
    let (mock, runtime) = MockRuntime::new();
    let run_loop = RunLoop::spawn("channel.loop");
    let channel = Channel::with_context(&runtime, ExecutionContext::RunLoop(run_loop.clone()));
    let counter = Arc::new(Counter::named("looped"));
    let principal = channel.bind(counter.clone(), "counter").unwrap();

    mock.post("looped", json!({"$opcode": "count", "$operand": 42}));
    assert_eq!(principal.property("count").unwrap(), Value::Int(42));

    let notifier = counter.clone();
    std::thread::spawn(move || notifier.observers.notify("count", &Value::Int(99)))
        .join()
        .unwrap();
    assert!(mock.scripts().iter().any(|s| s == "counter.$properties['count'] = 99"));

    channel.unbind();
    run_loop.stop();
}
