//! Render scheduling for one mounted instance.
//!
//! A render pass runs the render function under a [`RenderToken`], splits
//! the returned [`Definition`] into data and methods, diffs the data against
//! the last snapshot it produced, and commits only the difference. Deferred
//! effects staged during the pass run once the host confirms the commit, or
//! on the next macrotask when there was nothing to commit.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::mem;
use std::panic::Location;
use std::rc::{Rc, Weak};

use log::{debug, trace, warn};

use crate::collections::map::HashMap;
use crate::config::{RuntimeConfig, LOG_TARGET};
use crate::definition::{Definition, Method};
use crate::diff::diff;
use crate::effects::{Cleanup, EffectQueue, PendingEffect};
use crate::platform::{Host, Task};
use crate::render_context::RenderToken;
use crate::slot_table::{CallSignature, HookKind, HookOrderViolation, Slot, SlotTable};
use crate::value::Value;
use crate::RuntimeError;

/// Render function: props in, data and behavior out.
pub type RenderFn = Rc<dyn Fn(&Value) -> Definition>;

pub(crate) struct InstanceInner {
    pub(crate) name: String,
    render_fn: RenderFn,
    host: Rc<dyn Host>,
    config: RuntimeConfig,
    props: RefCell<Value>,
    last_committed: RefCell<Option<Value>>,
    pub(crate) slots: RefCell<SlotTable>,
    pub(crate) effects: RefCell<EffectQueue>,
    methods: RefCell<HashMap<String, Method>>,
    pub(crate) rendering: Cell<bool>,
    batching: Cell<bool>,
    input_suppressed: Cell<bool>,
    mounted: Cell<bool>,
    renders: Cell<u64>,
    commits: Cell<u64>,
}

impl InstanceInner {
    pub(crate) fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    /// Claims the next slot position for a hook of `kind` called at `location`.
    pub(crate) fn claim_cursor(&self, kind: HookKind, location: &'static Location<'static>) -> usize {
        let signature = CallSignature { kind, location };
        let (cursor, violation) = self
            .slots
            .borrow_mut()
            .advance(signature, self.config.check_hook_order);
        if let Some(violation) = violation {
            self.report_violation(&violation);
        }
        cursor
    }

    fn report_violation(&self, violation: &HookOrderViolation) {
        warn!(target: LOG_TARGET, "{}: {violation}", self.name);
    }

    /// Installs `slot`, tearing down any effect it displaces.
    pub(crate) fn install_slot(&self, cursor: usize, slot: Slot) {
        let displaced = self.slots.borrow_mut().install(cursor, slot);
        if let Some(teardown) = displaced.and_then(Slot::into_teardown) {
            teardown.run();
        }
    }

    /// Keeps `cleanup` as the teardown of the effect at `cursor`, or runs it
    /// right away if the slot is gone (the instance was destroyed meanwhile).
    pub(crate) fn store_teardown(&self, cursor: usize, cleanup: Cleanup, deferred: bool) {
        let orphaned = {
            let mut slots = self.slots.borrow_mut();
            let record = if deferred {
                slots.deferred_mut(cursor)
            } else {
                slots.effect_mut(cursor)
            };
            match record {
                Some(record) if self.mounted.get() => {
                    record.teardown = Some(cleanup);
                    None
                }
                _ => Some(cleanup),
            }
        };
        if let Some(cleanup) = orphaned {
            cleanup.run();
        }
    }

    pub(crate) fn render(self: &Rc<Self>) -> Result<(), RuntimeError> {
        if !self.mounted.get() {
            return Err(RuntimeError::Unmounted {
                instance: self.name.clone(),
            });
        }

        let definition = {
            let _token = RenderToken::acquire(self)?;
            let props = self.props.borrow().clone();
            let definition = (self.render_fn)(&props);
            if !self.mounted.get() {
                return Err(self.discard_after_destroy());
            }
            let finished = self
                .slots
                .borrow_mut()
                .finish_pass(self.config.check_hook_order);
            if let Some(violation) = finished {
                self.report_violation(&violation);
            }
            definition
        };
        let pass = self.renders.get() + 1;
        self.renders.set(pass);

        let tracing = self.config.tracing();
        let (data, methods) = definition.into_parts();
        if tracing {
            debug!(
                target: LOG_TARGET,
                "{}: render #{pass} split into data {data} and methods {:?}",
                self.name,
                methods.keys().collect::<Vec<_>>()
            );
        }
        {
            let mut installed = self.methods.borrow_mut();
            for (name, method) in methods {
                installed.insert(name, method);
            }
        }

        let previous = self
            .last_committed
            .replace(Some(data.clone()))
            .unwrap_or_else(Value::object);
        let patch = diff(&data, &previous);
        if tracing {
            debug!(target: LOG_TARGET, "{}: diff {patch:?}", self.name);
        }

        let weak = Rc::downgrade(self);
        let flush: Task = Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.flush_deferred_effects();
            }
        });
        if patch.is_empty() {
            if tracing {
                debug!(target: LOG_TARGET, "{}: data unchanged, skipping commit", self.name);
            }
            self.host.schedule_macrotask(flush);
        } else {
            self.commits.set(self.commits.get() + 1);
            if tracing {
                debug!(
                    target: LOG_TARGET,
                    "{}: committing {} field(s)",
                    self.name,
                    patch.len()
                );
            }
            self.host.commit(patch, flush);
        }
        Ok(())
    }

    /// Drops whatever a render pass that destroyed its own instance left
    /// behind.
    fn discard_after_destroy(&self) -> RuntimeError {
        self.effects.borrow_mut().clear();
        self.methods.borrow_mut().clear();
        let leftover = mem::take(&mut *self.slots.borrow_mut());
        for teardown in leftover.into_teardowns() {
            teardown.run();
        }
        if self.config.tracing() {
            debug!(target: LOG_TARGET, "{}: destroyed during render", self.name);
        }
        RuntimeError::Unmounted {
            instance: self.name.clone(),
        }
    }

    /// Re-render in response to a state change, unless a batch is open.
    ///
    /// # Panics
    ///
    /// Panics if the render is rejected (e.g. a setter called while this
    /// instance is rendering). A render that destroys its own instance is not
    /// an error here.
    pub(crate) fn request_render(self: &Rc<Self>) {
        if self.batching.get() {
            trace!(target: LOG_TARGET, "{}: render deferred to end of batch", self.name);
            return;
        }
        if !self.mounted.get() {
            return;
        }
        match self.render() {
            Ok(()) | Err(RuntimeError::Unmounted { .. }) => {}
            Err(err) => panic!("{err}"),
        }
    }

    /// Runs `f` with re-render requests suppressed, then renders once.
    pub(crate) fn batch<R>(self: &Rc<Self>, f: impl FnOnce() -> R) -> R {
        struct Restore<'a> {
            flag: &'a Cell<bool>,
            outer: bool,
        }
        impl Drop for Restore<'_> {
            fn drop(&mut self) {
                self.flag.set(self.outer);
            }
        }

        let outer = self.batching.replace(true);
        let result = {
            let _restore = Restore {
                flag: &self.batching,
                outer,
            };
            f()
        };
        if !outer {
            self.request_render();
        }
        result
    }

    /// Runs every staged deferred effect in ascending slot order, tearing
    /// down each slot's previous setup first.
    ///
    /// Setups are taken one at a time. A setup that triggers another render
    /// (and, on a synchronously completing host, a nested flush) may re-stage
    /// later slots; the newest staging is what runs.
    pub(crate) fn flush_deferred_effects(self: &Rc<Self>) {
        if !self.mounted.get() {
            return;
        }
        if self.config.tracing() {
            let staged = self.effects.borrow().len();
            if staged > 0 {
                debug!(
                    target: LOG_TARGET,
                    "{}: running {staged} deferred effect(s)",
                    self.name
                );
            }
        }
        while self.mounted.get() {
            let next = self.effects.borrow_mut().pop_first();
            let Some(PendingEffect { cursor, setup }) = next else {
                break;
            };
            let previous = self
                .slots
                .borrow_mut()
                .deferred_mut(cursor)
                .and_then(|record| record.teardown.take());
            if let Some(previous) = previous {
                previous.run();
            }
            let cleanup = setup();
            self.store_teardown(cursor, cleanup, true);
        }
    }

    fn destroy(&self) {
        if !self.mounted.replace(false) {
            return;
        }
        self.effects.borrow_mut().clear();
        self.methods.borrow_mut().clear();
        let slots = mem::take(&mut *self.slots.borrow_mut());
        let teardowns = slots.into_teardowns();
        if self.config.tracing() {
            debug!(
                target: LOG_TARGET,
                "{}: destroyed, running {} teardown(s)",
                self.name,
                teardowns.len()
            );
        }
        for teardown in teardowns {
            teardown.run();
        }
    }
}

/// Configures an instance before its first render.
pub struct InstanceBuilder {
    name: String,
    render_fn: RenderFn,
    props: Value,
    config: RuntimeConfig,
}

impl InstanceBuilder {
    pub fn props(mut self, props: impl Into<Value>) -> Self {
        self.props = props.into();
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Creates the instance and performs its first render into `host`.
    pub fn mount(self, host: Rc<dyn Host>) -> Result<Instance, RuntimeError> {
        let inner = Rc::new(InstanceInner {
            name: self.name,
            render_fn: self.render_fn,
            host,
            config: self.config,
            props: RefCell::new(self.props),
            last_committed: RefCell::new(None),
            slots: RefCell::new(SlotTable::new()),
            effects: RefCell::new(EffectQueue::default()),
            methods: RefCell::new(HashMap::new()),
            rendering: Cell::new(false),
            batching: Cell::new(false),
            input_suppressed: Cell::new(false),
            mounted: Cell::new(true),
            renders: Cell::new(0),
            commits: Cell::new(0),
        });
        if inner.config.tracing() {
            debug!(target: LOG_TARGET, "{}: mounting", inner.name);
        }
        inner.render()?;
        Ok(Instance { inner })
    }
}

/// A mounted render function and its hook state.
///
/// Cloning yields another handle to the same instance.
#[derive(Clone)]
pub struct Instance {
    inner: Rc<InstanceInner>,
}

impl Instance {
    pub fn builder(
        name: impl Into<String>,
        render: impl Fn(&Value) -> Definition + 'static,
    ) -> InstanceBuilder {
        InstanceBuilder {
            name: name.into(),
            render_fn: Rc::new(render),
            props: Value::Null,
            config: RuntimeConfig::default(),
        }
    }

    /// Host "created/mounted" lifecycle entry point.
    pub fn on_create(
        name: impl Into<String>,
        render: impl Fn(&Value) -> Definition + 'static,
        initial_props: impl Into<Value>,
        host: Rc<dyn Host>,
    ) -> Result<Self, RuntimeError> {
        Self::builder(name, render).props(initial_props).mount(host)
    }

    /// Host "input changed" lifecycle entry point.
    ///
    /// Props are replaced wholesale when `new_value` is not identical to
    /// `old_value`. The first change in a host macrotask renders right
    /// away; later changes in the same macrotask only update the props.
    pub fn on_external_input_changed(&self, new_value: Value, old_value: &Value) {
        let inner = &self.inner;
        let tracing = inner.config.tracing();
        if new_value.same(old_value) {
            if tracing {
                debug!(target: LOG_TARGET, "{}: input unchanged", inner.name);
            }
            return;
        }
        if tracing {
            debug!(
                target: LOG_TARGET,
                "{}: input changed from {old_value} to {new_value}",
                inner.name
            );
        }
        inner.props.replace(new_value);
        if !inner.mounted.get() {
            return;
        }
        if inner.rendering.get() || inner.input_suppressed.replace(true) {
            if tracing {
                debug!(
                    target: LOG_TARGET,
                    "{}: render for input change coalesced",
                    inner.name
                );
            }
            return;
        }
        let weak = Rc::downgrade(inner);
        inner.host.schedule_macrotask(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.input_suppressed.set(false);
            }
        }));
        inner.request_render();
    }

    /// Host "destroyed" lifecycle entry point. Runs every effect teardown
    /// (immediate effects first, then deferred ones, each in hook order) and
    /// discards the hook state. Idempotent.
    pub fn on_destroy(&self) {
        self.inner.destroy();
    }

    /// Renders now.
    pub fn render(&self) -> Result<(), RuntimeError> {
        self.inner.render()
    }

    /// Calls a method exposed by the latest render.
    pub fn invoke(&self, method: &str, event: &Value) -> Result<(), RuntimeError> {
        if !self.inner.mounted.get() {
            return Err(RuntimeError::Unmounted {
                instance: self.inner.name.clone(),
            });
        }
        let handler = self
            .inner
            .methods
            .borrow()
            .get(method)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownMethod {
                instance: self.inner.name.clone(),
                method: method.to_string(),
            })?;
        handler(event);
        Ok(())
    }

    /// Runs `f` with state updates batched into a single render.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.batch(f)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn props(&self) -> Value {
        self.inner.props.borrow().clone()
    }

    /// Data produced by the latest render.
    pub fn data(&self) -> Option<Value> {
        self.inner.last_committed.borrow().clone()
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.inner.methods.borrow().contains_key(name)
    }

    /// Names of the exposed methods, sorted.
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.methods.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    pub fn is_rendering(&self) -> bool {
        self.inner.rendering.get()
    }

    pub fn render_count(&self) -> u64 {
        self.inner.renders.get()
    }

    /// Renders whose diff was non-empty and went to the host.
    pub fn commit_count(&self) -> u64 {
        self.inner.commits.get()
    }

    /// Deferred effects staged but not yet run.
    pub fn pending_effects(&self) -> usize {
        self.inner.effects.borrow().len()
    }

    /// Number of hook slots in use.
    pub fn hook_count(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    pub fn hook_order_violations(&self) -> Vec<HookOrderViolation> {
        self.inner.slots.borrow().violations().to_vec()
    }

    pub fn config(&self) -> RuntimeConfig {
        self.inner.config
    }

    pub fn downgrade(&self) -> InstanceHandle {
        InstanceHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("name", &self.inner.name)
            .field("mounted", &self.inner.mounted.get())
            .field("renders", &self.inner.renders.get())
            .field("commits", &self.inner.commits.get())
            .finish()
    }
}

/// Non-owning handle to an instance, safe to capture in methods and
/// effects without keeping the instance alive.
#[derive(Clone)]
pub struct InstanceHandle {
    inner: Weak<InstanceInner>,
}

impl InstanceHandle {
    pub(crate) fn new(inner: &Rc<InstanceInner>) -> Self {
        Self {
            inner: Rc::downgrade(inner),
        }
    }

    pub fn upgrade(&self) -> Option<Instance> {
        self.inner.upgrade().map(|inner| Instance { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.inner
            .upgrade()
            .map(|inner| inner.mounted.get())
            .unwrap_or(false)
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.upgrade() {
            Some(inner) => write!(f, "InstanceHandle({})", inner.name),
            None => f.write_str("InstanceHandle(<dropped>)"),
        }
    }
}
