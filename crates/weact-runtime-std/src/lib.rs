//! Standard host services backed by Rust's `std` library.
//!
//! This crate provides a concrete implementation of the [`Host`] trait
//! defined in `weact-core`: a [`StdHost`] keeps the committed view data of
//! one instance and applies patches to it, and a [`MacrotaskQueue`] stands
//! in for the host event loop. [`StdRuntime`] bundles a shared queue with a
//! [`RuntimeConfig`] and mounts instances onto fresh hosts.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use log::{error, warn};
use weact_core::{
    apply_patch, CommitCallback, Definition, Host, Instance, Patch, RuntimeConfig, RuntimeError,
    Task, Value,
};

const LOG_TARGET: &str = "weact::host";

/// Upper bound on tasks run by one [`MacrotaskQueue::run_until_idle`] call.
/// A render loop that keeps scheduling work trips this instead of hanging.
pub const MAX_TASKS_PER_DRAIN: usize = 10_000;

/// FIFO stand-in for the host event loop.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone, Default)]
pub struct MacrotaskQueue {
    tasks: Rc<RefCell<VecDeque<Task>>>,
    waker: Rc<RefCell<Option<Rc<dyn Fn()>>>>,
}

impl MacrotaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
        self.wake();
    }

    /// Runs the oldest task. Returns `false` if the queue was empty.
    pub fn run_next(&self) -> bool {
        let next = self.tasks.borrow_mut().pop_front();
        match next {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Runs tasks, including ones scheduled meanwhile, until the queue is
    /// empty. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while ran < MAX_TASKS_PER_DRAIN && self.run_next() {
            ran += 1;
        }
        if ran == MAX_TASKS_PER_DRAIN && !self.is_empty() {
            warn!(
                target: LOG_TARGET,
                "stopped after {ran} macrotasks with {} still queued",
                self.len()
            );
        }
        ran
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Registers a waker invoked whenever a task is queued.
    pub fn set_waker(&self, waker: impl Fn() + 'static) {
        *self.waker.borrow_mut() = Some(Rc::new(waker));
    }

    pub fn clear_waker(&self) {
        *self.waker.borrow_mut() = None;
    }

    fn wake(&self) {
        let waker = self.waker.borrow().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl fmt::Debug for MacrotaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacrotaskQueue")
            .field("pending", &self.len())
            .finish()
    }
}

/// When a [`StdHost`] reports a commit as visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    /// Invoke the completion callback before `commit` returns.
    Immediate,
    /// Invoke it from the next macrotask, like an asynchronous view layer.
    #[default]
    NextMacrotask,
}

/// View state of one instance, patched in place on every commit.
pub struct StdHost {
    queue: MacrotaskQueue,
    data: RefCell<Value>,
    completion: Cell<CompletionMode>,
    commits: Cell<u64>,
    failed: Cell<u64>,
}

impl StdHost {
    pub fn new() -> Self {
        Self::with_queue(MacrotaskQueue::new())
    }

    /// A host that schedules onto a queue shared with other hosts.
    pub fn with_queue(queue: MacrotaskQueue) -> Self {
        Self {
            queue,
            data: RefCell::new(Value::object()),
            completion: Cell::new(CompletionMode::default()),
            commits: Cell::new(0),
            failed: Cell::new(0),
        }
    }

    pub fn with_completion(self, mode: CompletionMode) -> Self {
        self.completion.set(mode);
        self
    }

    pub fn completion_mode(&self) -> CompletionMode {
        self.completion.get()
    }

    pub fn set_completion_mode(&self, mode: CompletionMode) {
        self.completion.set(mode);
    }

    /// Snapshot of the committed view data.
    pub fn data(&self) -> Value {
        self.data.borrow().clone()
    }

    /// Commits applied successfully.
    pub fn commit_count(&self) -> u64 {
        self.commits.get()
    }

    /// Commits whose patch could not be applied.
    pub fn failed_commits(&self) -> u64 {
        self.failed.get()
    }

    pub fn queue(&self) -> &MacrotaskQueue {
        &self.queue
    }

    pub fn run_next_macrotask(&self) -> bool {
        self.queue.run_next()
    }

    pub fn run_until_idle(&self) -> usize {
        self.queue.run_until_idle()
    }
}

impl Default for StdHost {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdHost")
            .field("data", &*self.data.borrow())
            .field("completion", &self.completion.get())
            .field("commits", &self.commits.get())
            .field("failed", &self.failed.get())
            .finish()
    }
}

impl Host for StdHost {
    fn commit(&self, patch: Patch, on_complete: CommitCallback) {
        let applied = apply_patch(&mut self.data.borrow_mut(), &patch);
        match applied {
            Ok(()) => self.commits.set(self.commits.get() + 1),
            Err(err) => {
                self.failed.set(self.failed.get() + 1);
                error!(target: LOG_TARGET, "dropping commit {patch:?}: {err}");
            }
        }
        match self.completion.get() {
            CompletionMode::Immediate => on_complete(),
            CompletionMode::NextMacrotask => self.queue.push(on_complete),
        }
    }

    fn schedule_macrotask(&self, task: Task) {
        self.queue.push(task);
    }
}

/// An instance together with the host it renders into.
#[derive(Debug, Clone)]
pub struct Mounted {
    instance: Instance,
    host: Rc<StdHost>,
}

impl Mounted {
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn host(&self) -> &Rc<StdHost> {
        &self.host
    }

    /// Committed view data as the host sees it.
    pub fn data(&self) -> Value {
        self.host.data()
    }
}

/// Convenience container bundling a shared macrotask queue and the
/// configuration applied to every mounted instance.
#[derive(Clone, Default)]
pub struct StdRuntime {
    queue: MacrotaskQueue,
    config: RuntimeConfig,
    completion: CompletionMode,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_completion(mut self, mode: CompletionMode) -> Self {
        self.completion = mode;
        self
    }

    pub fn config(&self) -> RuntimeConfig {
        self.config
    }

    pub fn queue(&self) -> &MacrotaskQueue {
        &self.queue
    }

    /// Mounts `render` onto a fresh host sharing this runtime's queue.
    pub fn mount(
        &self,
        name: impl Into<String>,
        render: impl Fn(&Value) -> Definition + 'static,
        props: impl Into<Value>,
    ) -> Result<Mounted, RuntimeError> {
        let host =
            Rc::new(StdHost::with_queue(self.queue.clone()).with_completion(self.completion));
        let instance = Instance::builder(name, render)
            .props(props)
            .config(self.config)
            .mount(host.clone())?;
        Ok(Mounted { instance, host })
    }

    /// Drains the shared queue.
    pub fn run_until_idle(&self) -> usize {
        self.queue.run_until_idle()
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("queue", &self.queue)
            .field("config", &self.config)
            .field("completion", &self.completion)
            .finish()
    }
}
