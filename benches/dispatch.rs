//! Dispatch benchmarks
//!
//! Measures message decoding, routing and native invocation through a bound channel.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use scriptbridge::channel::Message;
use scriptbridge::errors::BridgeError;
use scriptbridge::interop::{self, CallOptions, ExecutionContext, TaskQueue};
use scriptbridge::reflect::{ClassBuilder, NativeObject, Scriptable};
use scriptbridge::script::{Completion, MessageHandler, ScriptRuntime, UserScriptId};
use scriptbridge::{Channel, NativeType, NativeValue, Value};
use serde_json::json;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Runtime that discards everything
struct Sink;

impl ScriptRuntime for Sink {
    fn evaluate(&self, _script: &str, completion: Option<Completion>) {
        if let Some(completion) = completion {
            completion(Ok(serde_json::Value::Null));
        }
    }

    fn evaluate_sync(&self, _script: &str) -> Result<serde_json::Value, BridgeError> {
        Ok(serde_json::Value::Null)
    }

    fn add_message_handler(&self, _name: &str, _handler: Arc<dyn MessageHandler>) -> Result<(), BridgeError> {
        Ok(())
    }

    fn remove_message_handler(&self, _name: &str) {}

    fn add_user_script(&self, _source: &str) -> UserScriptId {
        UserScriptId(0)
    }

    fn remove_user_script(&self, _id: UserScriptId) {}
}

#[derive(Default)]
struct Accumulator {
    total: AtomicI64,
}

impl Scriptable for Accumulator {
    fn define(class: &mut ClassBuilder<Self>) {
        class
            .method("add", &[NativeType::I64], NativeType::I64, |a, args| {
                NativeValue::I64(a.total.fetch_add(args[0].to_i64(), Ordering::Relaxed))
            })
            .method("total", &[], NativeType::I64, |a, _| NativeValue::I64(a.total.load(Ordering::Relaxed)));
    }
}

fn bench_decode(c: &mut Criterion) {
    let body = json!({"$opcode": "add", "$target": 0, "$operand": [1, "two", {"three": 3}]});
    c.bench_function("decode_message", |b| b.iter(|| Message::decode(black_box(&body))));
}

fn bench_invoke(c: &mut Criterion) {
    let object: NativeObject = Arc::new(Accumulator::default());
    let options = CallOptions::new(ExecutionContext::Queue(TaskQueue::new("bench.invoke")));
    let args = [Value::Int(1)];

    let mut group = c.benchmark_group("invoke");
    for wait in [true, false] {
        group.bench_with_input(BenchmarkId::from_parameter(if wait { "sync" } else { "async" }), &wait, |b, &wait| {
            b.iter(|| interop::invoke(&object, "add", black_box(&args), wait, &options))
        });
    }
    group.finish();
    // Drain outstanding fire-and-forget calls
    let _ = interop::invoke(&object, "total", &[], true, &options);
}

fn bench_channel_round_trip(c: &mut Criterion) {
    let runtime: Arc<dyn ScriptRuntime> = Arc::new(Sink);
    let channel = Channel::with_context(&runtime, ExecutionContext::Queue(TaskQueue::new("bench.channel")));
    let principal = match channel.bind(Arc::new(Accumulator::default()), "acc") {
        Ok(principal) => principal,
        Err(err) => panic!("bind failed: {}", err),
    };
    let body = json!({"$opcode": "add", "$operand": [1]});

    c.bench_function("channel_receive", |b| b.iter(|| channel.receive(black_box(body.clone()))));
    c.bench_function("proxy_call_sync", |b| {
        b.iter(|| principal.call_method_sync("total", Vec::new()))
    });
}

criterion_group!(benches, bench_decode, bench_invoke, bench_channel_round_trip);
criterion_main!(benches);
