//! Interoperability - generic invocation of native callables
//!
//! Design: signature resolution plus a conversion table over a closed set of kinds
//!
//! Architecture:
//! - `types.rs` - native kinds and raw values (NativeType, NativeValue)
//! - `marshal.rs` - script value ↔ native value conversions
//! - `context.rs` - execution contexts (task queue, run loop) and bounded waits
//! - `call.rs` - prepare and perform calls on an execution context

mod call;
mod context;
mod marshal;
mod types;

use std::sync::atomic::{AtomicUsize, Ordering};

pub use call::{construct, invoke, CallOptions, NativeCall};
pub(crate) use call::current_caller;
pub use context::{ExecutionContext, RunLoop, RunResult, TaskQueue, WaitBound};
pub use marshal::{from_native, marshal_args, to_native, MarshalError};
pub use types::{NativeType, NativeValue};

static CALLS_MADE: AtomicUsize = AtomicUsize::new(0);
static MARSHALING_ERRORS: AtomicUsize = AtomicUsize::new(0);
static WAIT_TIMEOUTS: AtomicUsize = AtomicUsize::new(0);

fn record_call() {
    CALLS_MADE.fetch_add(1, Ordering::Relaxed);
}

fn record_marshaling_error() {
    MARSHALING_ERRORS.fetch_add(1, Ordering::Relaxed);
}

fn record_wait_timeout() {
    WAIT_TIMEOUTS.fetch_add(1, Ordering::Relaxed);
}

/// Get interop statistics
pub fn stats() -> InteropStats {
    InteropStats {
        calls_made: CALLS_MADE.load(Ordering::Relaxed),
        marshaling_errors: MARSHALING_ERRORS.load(Ordering::Relaxed),
        wait_timeouts: WAIT_TIMEOUTS.load(Ordering::Relaxed),
    }
}

/// Interop statistics for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteropStats {
    pub calls_made: usize,
    pub marshaling_errors: usize,
    pub wait_timeouts: usize,
}

#[cfg(test)]
mod tests;
