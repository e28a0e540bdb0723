use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use weact_core::{
    apply_patch, Cleanup, CommitCallback, Definition, Host, Instance, Patch, RuntimeConfig,
    RuntimeError, Task, Value,
};

/// Host double that records every commit.
///
/// Completion callbacks are held until released with
/// [`complete_next_commit`](Self::complete_next_commit) or
/// [`complete_all_commits`](Self::complete_all_commits), so tests can observe
/// the gap between a commit and its deferred effects. Macrotasks queue up
/// until [`run_macrotasks`](Self::run_macrotasks).
pub struct TestHost {
    commits: RefCell<Vec<Patch>>,
    completions: RefCell<VecDeque<CommitCallback>>,
    macrotasks: RefCell<VecDeque<Task>>,
    data: RefCell<Value>,
    auto_complete: Cell<bool>,
}

impl TestHost {
    pub fn new() -> Self {
        Self {
            commits: RefCell::new(Vec::new()),
            completions: RefCell::new(VecDeque::new()),
            macrotasks: RefCell::new(VecDeque::new()),
            data: RefCell::new(Value::object()),
            auto_complete: Cell::new(false),
        }
    }

    /// A host that reports every commit visible before `commit` returns.
    pub fn auto_completing() -> Self {
        let host = Self::new();
        host.auto_complete.set(true);
        host
    }

    pub fn set_auto_complete(&self, enabled: bool) {
        self.auto_complete.set(enabled);
    }

    pub fn commits(&self) -> Vec<Patch> {
        self.commits.borrow().clone()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.borrow().len()
    }

    pub fn last_commit(&self) -> Option<Patch> {
        self.commits.borrow().last().cloned()
    }

    pub fn pending_completions(&self) -> usize {
        self.completions.borrow().len()
    }

    pub fn pending_macrotasks(&self) -> usize {
        self.macrotasks.borrow().len()
    }

    /// Releases the oldest held completion. Returns `false` if none was held.
    pub fn complete_next_commit(&self) -> bool {
        let next = self.completions.borrow_mut().pop_front();
        match next {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Releases held completions, including ones produced meanwhile.
    pub fn complete_all_commits(&self) -> usize {
        let mut released = 0;
        while self.complete_next_commit() {
            released += 1;
        }
        released
    }

    /// Runs queued macrotasks, including ones scheduled meanwhile.
    pub fn run_macrotasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.macrotasks.borrow_mut().pop_front();
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => break ran,
            }
        }
    }

    /// Releases completions and runs macrotasks until neither is pending.
    pub fn settle(&self) {
        while self.complete_all_commits() + self.run_macrotasks() > 0 {}
    }

    /// View data as patched by every commit so far.
    pub fn data(&self) -> Value {
        self.data.borrow().clone()
    }

    pub fn clear_commits(&self) {
        self.commits.borrow_mut().clear();
    }
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for TestHost {
    fn commit(&self, patch: Patch, on_complete: CommitCallback) {
        if let Err(err) = apply_patch(&mut self.data.borrow_mut(), &patch) {
            panic!("test host rejected {patch:?}: {err}");
        }
        self.commits.borrow_mut().push(patch);
        if self.auto_complete.get() {
            on_complete();
        } else {
            self.completions.borrow_mut().push_back(on_complete);
        }
    }

    fn schedule_macrotask(&self, task: Task) {
        self.macrotasks.borrow_mut().push_back(task);
    }
}

/// Headless harness for exercising one instance in tests.
///
/// Owns a [`TestHost`], mounts content into it and tracks the current props
/// so input changes can be driven the way a host page would.
pub struct TestRule {
    host: Rc<TestHost>,
    config: RuntimeConfig,
    props: Value,
    instance: Option<Instance>,
}

impl TestRule {
    /// A rule with hook-order checking enabled.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::new().with_hook_order_checks(true))
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            host: Rc::new(TestHost::new()),
            config,
            props: Value::Null,
            instance: None,
        }
    }

    pub fn host(&self) -> &Rc<TestHost> {
        &self.host
    }

    /// Props used by the next [`set_content`](Self::set_content).
    pub fn set_props(&mut self, props: impl Into<Value>) {
        self.props = props.into();
    }

    /// Mounts `render` and performs its first render. Content installed
    /// earlier is destroyed first.
    pub fn set_content(
        &mut self,
        render: impl Fn(&Value) -> Definition + 'static,
    ) -> Result<(), RuntimeError> {
        self.destroy();
        let instance = Instance::builder("test", render)
            .props(self.props.clone())
            .config(self.config)
            .mount(self.host.clone())?;
        self.instance = Some(instance);
        Ok(())
    }

    pub fn has_content(&self) -> bool {
        self.instance.is_some()
    }

    /// The mounted instance.
    ///
    /// # Panics
    ///
    /// Panics if no content is installed.
    pub fn instance(&self) -> &Instance {
        self.instance.as_ref().expect("no content installed")
    }

    /// Delivers new props the way the host's input-change hook would.
    pub fn change_input(&mut self, props: impl Into<Value>) {
        let props = props.into();
        let old = std::mem::replace(&mut self.props, props.clone());
        self.instance().on_external_input_changed(props, &old);
    }

    pub fn invoke(&self, method: &str, event: impl Into<Value>) -> Result<(), RuntimeError> {
        self.instance().invoke(method, &event.into())
    }

    /// Runs held completions and macrotasks until the host is idle.
    pub fn pump_until_idle(&self) {
        self.host.settle();
    }

    /// Committed view data.
    pub fn data(&self) -> Value {
        self.host.data()
    }

    /// Committed view data as JSON, for comparison with `serde_json::json!`.
    pub fn data_json(&self) -> serde_json::Value {
        serde_json::Value::from(&self.host.data())
    }

    pub fn render_count(&self) -> u64 {
        self.instance().render_count()
    }

    /// Destroys the mounted instance, if any.
    pub fn destroy(&mut self) {
        if let Some(instance) = self.instance.take() {
            instance.on_destroy();
        }
    }
}

impl Default for TestRule {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `TestRule`.
pub fn run_test_instance<R>(f: impl FnOnce(&mut TestRule) -> R) -> R {
    let mut rule = TestRule::new();
    f(&mut rule)
}

/// Shared append-only log for asserting effect and callback order.
#[derive(Clone, Default)]
pub struct EventLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    /// Removes and returns everything logged so far.
    pub fn take(&self) -> Vec<String> {
        self.entries.borrow_mut().drain(..).collect()
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Effect setup that logs `setup <label>` and returns a teardown
    /// logging `teardown <label>`.
    pub fn effect(&self, label: impl Into<String>) -> impl FnOnce() -> Cleanup + 'static {
        let log = self.clone();
        let label = label.into();
        move || {
            log.push(format!("setup {label}"));
            Cleanup::new(move || log.push(format!("teardown {label}")))
        }
    }
}

/// A patch as a JSON object (removals become `null`).
pub fn patch_json(patch: &Patch) -> serde_json::Value {
    serde_json::to_value(patch).expect("patch serializes")
}

/// Builds a [`Value`] from `serde_json::json!` input.
pub fn value(json: serde_json::Value) -> Value {
    Value::from(json)
}
