//! Execution contexts that native calls are marshaled onto
//!
//! Two flavors, chosen once per channel: a labeled serial task queue with its own
//! worker thread, or a run loop driven by whichever thread calls [`RunLoop::run`].
//! Both are fed through a flume mailbox, the same way actors receive envelopes.

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use flume::{Receiver, RecvTimeoutError, Sender};
use once_cell::sync::Lazy;
use tracing::{debug, error, trace, warn};

use crate::config::DEFAULT_QUEUE_LABEL;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

static SHARED_QUEUES: Lazy<DashMap<String, TaskQueue>> = Lazy::new(DashMap::new);

thread_local! {
    static CURRENT_CONTEXT: Cell<u64> = const { Cell::new(0) };
}

fn next_context_id() -> u64 {
    NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Marks the current thread as running a context; restores the previous one on drop
struct ContextScope {
    saved: u64,
}

impl ContextScope {
    fn enter(id: u64) -> Self {
        let saved = CURRENT_CONTEXT.with(|c| c.replace(id));
        Self { saved }
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        CURRENT_CONTEXT.with(|c| c.set(self.saved));
    }
}

fn is_current(id: u64) -> bool {
    CURRENT_CONTEXT.with(|c| c.get() == id)
}

fn run_job(label: &str, job: Job) {
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        error!(event = "native_panic", context = label, "Native call panicked; call abandoned");
    }
}

/// How long a blocking call waits for its context before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitBound {
    pub slice: Duration,
    pub max_slices: u32,
}

impl Default for WaitBound {
    fn default() -> Self {
        Self {
            slice: Duration::from_millis(1000),
            max_slices: 3,
        }
    }
}

// ============================================================================
// Task queue
// ============================================================================

/// Labeled serial queue backed by one worker thread
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    id: u64,
    label: String,
    sender: Sender<Job>,
}

impl TaskQueue {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        debug_assert!(!label.is_empty(), "Queue must be labeled");

        let id = next_context_id();
        let (sender, receiver) = flume::unbounded::<Job>();
        let worker_label = label.clone();
        let spawned = std::thread::Builder::new()
            .name(label.clone())
            .spawn(move || Self::drain(id, worker_label, receiver));
        if let Err(err) = spawned {
            // The receiver went down with the closure; every submit will now fail
            error!(queue = %label, error = %err, "Failed to start task queue worker");
        }

        Self {
            inner: Arc::new(QueueInner { id, label, sender }),
        }
    }

    /// Process-wide queue for a label, created on first use
    pub fn shared(label: &str) -> Self {
        if let Some(queue) = SHARED_QUEUES.get(label) {
            return queue.clone();
        }
        SHARED_QUEUES
            .entry(label.to_string())
            .or_insert_with(|| TaskQueue::new(label))
            .clone()
    }

    fn drain(id: u64, label: String, receiver: Receiver<Job>) {
        let _scope = ContextScope::enter(id);
        while let Ok(job) = receiver.recv() {
            run_job(&label, job);
        }
        debug!(queue = %label, "Task queue drained");
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn is_current(&self) -> bool {
        is_current(self.inner.id)
    }

    pub fn is_alive(&self) -> bool {
        !self.inner.sender.is_disconnected()
    }

    fn submit(&self, job: Job) -> bool {
        self.inner.sender.send(job).is_ok()
    }
}

// ============================================================================
// Run loop
// ============================================================================

enum LoopEvent {
    Perform(Job),
    Stop,
}

/// Outcome of one [`RunLoop::run_once`] turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunResult {
    HandledSource,
    TimedOut,
    Stopped,
}

/// Event loop owned by a dedicated thread
#[derive(Clone)]
pub struct RunLoop {
    inner: Arc<LoopInner>,
}

struct LoopInner {
    id: u64,
    name: String,
    sender: Sender<LoopEvent>,
    receiver: Receiver<LoopEvent>,
    stopped: AtomicBool,
}

impl RunLoop {
    /// Create a loop; it processes nothing until some thread calls [`RunLoop::run`]
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            inner: Arc::new(LoopInner {
                id: next_context_id(),
                name: name.into(),
                sender,
                receiver,
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// Create a loop and run it on a fresh thread until [`RunLoop::stop`]
    pub fn spawn(name: impl Into<String>) -> Self {
        let run_loop = Self::new(name);
        let worker = run_loop.clone();
        let spawned = std::thread::Builder::new()
            .name(run_loop.inner.name.clone())
            .spawn(move || worker.run());
        if let Err(err) = spawned {
            error!(run_loop = %run_loop.inner.name, error = %err, "Failed to start run loop thread");
            run_loop.inner.stopped.store(true, Ordering::Release);
        }
        run_loop
    }

    /// Drive the loop on the calling thread until stopped
    pub fn run(&self) {
        self.inner.stopped.store(false, Ordering::Release);
        debug!(run_loop = %self.inner.name, "Run loop started");
        while self.run_once(Duration::from_secs(3600)) != RunResult::Stopped {}
        debug!(run_loop = %self.inner.name, "Run loop stopped");
    }

    /// Handle at most one event, waiting up to `timeout` for it
    pub fn run_once(&self, timeout: Duration) -> RunResult {
        if self.inner.stopped.load(Ordering::Acquire) {
            return RunResult::Stopped;
        }

        let _scope = ContextScope::enter(self.inner.id);
        match self.inner.receiver.recv_timeout(timeout) {
            Ok(LoopEvent::Perform(job)) => {
                run_job(&self.inner.name, job);
                RunResult::HandledSource
            }
            Ok(LoopEvent::Stop) | Err(RecvTimeoutError::Disconnected) => {
                self.inner.stopped.store(true, Ordering::Release);
                RunResult::Stopped
            }
            Err(RecvTimeoutError::Timeout) => RunResult::TimedOut,
        }
    }

    /// Ask the loop to stop after the events already queued
    pub fn stop(&self) {
        let _ = self.inner.sender.send(LoopEvent::Stop);
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_current(&self) -> bool {
        is_current(self.inner.id)
    }

    pub fn is_alive(&self) -> bool {
        !self.inner.stopped.load(Ordering::Acquire)
    }

    fn submit(&self, job: Job) -> bool {
        self.is_alive() && self.inner.sender.send(LoopEvent::Perform(job)).is_ok()
    }
}

// ============================================================================
// Execution context
// ============================================================================

/// Where a channel's native calls run; fixed when the channel is created
#[derive(Clone)]
pub enum ExecutionContext {
    Queue(TaskQueue),
    RunLoop(RunLoop),
}

impl ExecutionContext {
    /// The process-wide default serial queue
    pub fn default_queue() -> Self {
        Self::Queue(TaskQueue::shared(DEFAULT_QUEUE_LABEL))
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Queue(queue) => queue.label(),
            Self::RunLoop(run_loop) => run_loop.name(),
        }
    }

    pub fn is_current(&self) -> bool {
        match self {
            Self::Queue(queue) => queue.is_current(),
            Self::RunLoop(run_loop) => run_loop.is_current(),
        }
    }

    pub fn is_alive(&self) -> bool {
        match self {
            Self::Queue(queue) => queue.is_alive(),
            Self::RunLoop(run_loop) => run_loop.is_alive(),
        }
    }

    pub(crate) fn submit(&self, job: Job) -> bool {
        match self {
            Self::Queue(queue) => queue.submit(job),
            Self::RunLoop(run_loop) => run_loop.submit(job),
        }
    }

    /// Run `f` on this context.
    ///
    /// With `wait`, runs in place when already on the context, otherwise blocks for at
    /// most `bound` and yields `None` if no result arrived. Without `wait`, always
    /// enqueues and yields `None`.
    pub fn perform<R, F>(&self, wait: bool, bound: WaitBound, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if wait && self.is_current() {
            return match catch_unwind(AssertUnwindSafe(f)) {
                Ok(result) => Some(result),
                Err(_) => {
                    error!(event = "native_panic", context = self.label(), "Native call panicked; call abandoned");
                    None
                }
            };
        }

        if !wait {
            if !self.submit(Box::new(move || {
                f();
            })) {
                warn!(context = self.label(), "Execution context is gone; call dropped");
            }
            return None;
        }

        let (tx, rx) = flume::bounded(1);
        if !self.submit(Box::new(move || {
            let _ = tx.send(f());
        })) {
            warn!(context = self.label(), "Execution context is gone; call dropped");
            return None;
        }

        for slice in 0..bound.max_slices.max(1) {
            match rx.recv_timeout(bound.slice) {
                Ok(result) => return Some(result),
                Err(RecvTimeoutError::Timeout) => {
                    trace!(context = self.label(), slice, "Still waiting for native call");
                    if !self.is_alive() {
                        break;
                    }
                }
                // The job was dropped without answering (panic or context shutdown)
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }

        super::record_wait_timeout();
        warn!(
            event = "wait_timeout",
            context = self.label(),
            "Gave up waiting for native call; returning empty result"
        );
        None
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queue(queue) => write!(f, "Queue({})", queue.label()),
            Self::RunLoop(run_loop) => write!(f, "RunLoop({})", run_loop.name()),
        }
    }
}
