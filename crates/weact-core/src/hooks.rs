//! Hook primitives.
//!
//! Each hook claims exactly one slot on the rendering instance. Hooks must
//! be called unconditionally and in the same order on every render; calling
//! one outside a render function panics.

use std::fmt;
use std::marker::PhantomData;
use std::panic::Location;
use std::rc::{Rc, Weak};

use log::warn;

use crate::config::LOG_TARGET;
use crate::effects::{Cleanup, Deps};
use crate::instance::{InstanceHandle, InstanceInner};
use crate::refs::MutableRef;
use crate::render_context::current_instance;
use crate::slot_table::{HookKind, MemoRecord, Slot};

/// Updates one state slot and schedules a re-render.
///
/// Setters hold the instance weakly; once it is destroyed they do nothing.
pub struct StateSetter<T> {
    instance: Weak<InstanceInner>,
    cursor: usize,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            instance: self.instance.clone(),
            cursor: self.cursor,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for StateSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSetter")
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl<T: Clone + 'static> StateSetter<T> {
    fn new(instance: &Rc<InstanceInner>, cursor: usize) -> Self {
        Self {
            instance: Rc::downgrade(instance),
            cursor,
            _marker: PhantomData,
        }
    }

    /// Replaces the state and re-renders (or defers to the open batch).
    pub fn set(&self, value: T) {
        let Some(instance) = self.live_instance() else {
            return;
        };
        let stored = instance.slots.borrow_mut().set_state(self.cursor, value);
        if stored {
            instance.request_render();
        } else {
            self.report_lost_slot(&instance);
        }
    }

    /// Computes the next state from the latest stored one, so consecutive
    /// updates compose even before a render happens in between.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let Some(instance) = self.live_instance() else {
            return;
        };
        let Some(current) = instance.slots.borrow().state::<T>(self.cursor) else {
            self.report_lost_slot(&instance);
            return;
        };
        let next = f(&current);
        instance.slots.borrow_mut().set_state(self.cursor, next);
        instance.request_render();
    }

    /// The latest stored state, which may be ahead of the rendered one.
    pub fn get(&self) -> Option<T> {
        let instance = self.live_instance()?;
        let value = instance.slots.borrow().state::<T>(self.cursor);
        value
    }

    fn live_instance(&self) -> Option<Rc<InstanceInner>> {
        self.instance.upgrade().filter(|instance| instance.is_mounted())
    }

    fn report_lost_slot(&self, instance: &InstanceInner) {
        warn!(
            target: LOG_TARGET,
            "{}: state slot #{} no longer holds this state, update dropped",
            instance.name,
            self.cursor
        );
    }
}

/// Local state. `init` runs on the first render only.
#[track_caller]
pub fn use_state<T: Clone + 'static>(init: impl FnOnce() -> T) -> (T, StateSetter<T>) {
    let location = Location::caller();
    let instance = current_instance(HookKind::State);
    let cursor = instance.claim_cursor(HookKind::State, location);
    let existing = instance.slots.borrow().state::<T>(cursor);
    let value = match existing {
        Some(value) => value,
        None => {
            let value = init();
            instance.install_slot(cursor, Slot::State(Box::new(value.clone())));
            value
        }
    };
    (value, StateSetter::new(&instance, cursor))
}

enum EffectStep {
    Mount,
    Unchanged,
    Rerun(Option<Cleanup>),
}

/// Side effect run synchronously during render when `deps` changed.
///
/// The previous teardown runs right before the new setup. Passing
/// [`Deps::Always`] reruns on every render; an empty list runs on mount only.
#[track_caller]
pub fn use_effect(deps: Deps, setup: impl FnOnce() -> Cleanup + 'static) {
    immediate_effect(Location::caller(), deps, setup, false);
}

/// Like [`use_effect`], but skipped on the first render.
#[track_caller]
pub fn use_effect_on_update(deps: Deps, setup: impl FnOnce() -> Cleanup + 'static) {
    immediate_effect(Location::caller(), deps, setup, true);
}

fn immediate_effect(
    location: &'static Location<'static>,
    deps: Deps,
    setup: impl FnOnce() -> Cleanup + 'static,
    skip_mount: bool,
) {
    let instance = current_instance(HookKind::Effect);
    let cursor = instance.claim_cursor(HookKind::Effect, location);
    let step = match instance.slots.borrow_mut().effect_mut(cursor) {
        Some(record) => {
            let rerun = deps.changed_since(&record.deps);
            record.deps = deps.clone();
            if rerun {
                EffectStep::Rerun(record.teardown.take())
            } else {
                EffectStep::Unchanged
            }
        }
        None => EffectStep::Mount,
    };
    match step {
        EffectStep::Unchanged => {}
        EffectStep::Mount => {
            instance.install_slot(cursor, Slot::effect(deps));
            if !skip_mount {
                let cleanup = setup();
                instance.store_teardown(cursor, cleanup, false);
            }
        }
        EffectStep::Rerun(previous) => {
            if let Some(previous) = previous {
                previous.run();
            }
            let cleanup = setup();
            instance.store_teardown(cursor, cleanup, false);
        }
    }
}

/// Side effect deferred until the host confirms the commit of this render
/// (or the next macrotask when nothing was committed).
///
/// The previous teardown stays in place until the new setup is about to
/// run. Staging again before the commit settles keeps only the newest setup.
#[track_caller]
pub fn use_layout_effect(deps: Deps, setup: impl FnOnce() -> Cleanup + 'static) {
    let location = Location::caller();
    let instance = current_instance(HookKind::LayoutEffect);
    let cursor = instance.claim_cursor(HookKind::LayoutEffect, location);
    let rerun = instance
        .slots
        .borrow_mut()
        .deferred_mut(cursor)
        .map(|record| {
            let rerun = deps.changed_since(&record.deps);
            record.deps = deps.clone();
            rerun
        });
    match rerun {
        Some(false) => return,
        Some(true) => {}
        None => instance.install_slot(cursor, Slot::deferred(deps)),
    }
    instance.effects.borrow_mut().stage(cursor, Box::new(setup));
}

/// Memoized value, recomputed when `deps` changed.
#[track_caller]
pub fn use_memo<T: Clone + 'static>(deps: Deps, compute: impl FnOnce() -> T) -> T {
    let location = Location::caller();
    let instance = current_instance(HookKind::Memo);
    let cursor = instance.claim_cursor(HookKind::Memo, location);
    let cached = instance
        .slots
        .borrow_mut()
        .memo_mut::<T>(cursor)
        .and_then(|record| {
            if deps.changed_since(&record.deps) {
                None
            } else {
                record.value.downcast_ref::<T>().cloned()
            }
        });
    if let Some(value) = cached {
        return value;
    }
    let value = compute();
    instance.install_slot(
        cursor,
        Slot::Memo(MemoRecord {
            deps,
            value: Box::new(value.clone()),
        }),
    );
    value
}

/// Memoized callback: the same `Rc` is returned until `deps` change.
#[track_caller]
pub fn use_callback<F: 'static>(deps: Deps, callback: F) -> Rc<F> {
    use_memo(deps, move || Rc::new(callback))
}

/// Mutable cell that persists across renders. Writing to it never
/// re-renders.
#[track_caller]
pub fn use_ref<T: 'static>(init: impl FnOnce() -> T) -> MutableRef<T> {
    let location = Location::caller();
    let instance = current_instance(HookKind::Ref);
    let cursor = instance.claim_cursor(HookKind::Ref, location);
    let existing = instance.slots.borrow().ref_cell::<T>(cursor);
    if let Some(cell) = existing {
        return cell;
    }
    let cell = MutableRef::new(init());
    instance.install_slot(cursor, Slot::Ref(Box::new(cell.clone())));
    cell
}

/// Dispatches actions through a reducer into a state slot.
pub struct Dispatch<S, A> {
    state: StateSetter<S>,
    reducer: Rc<dyn Fn(&S, A) -> S>,
}

impl<S, A> Clone for Dispatch<S, A> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            reducer: Rc::clone(&self.reducer),
        }
    }
}

impl<S: Clone + PartialEq + 'static, A> Dispatch<S, A> {
    /// Applies the reducer to the latest state; re-renders only if the
    /// result differs.
    pub fn dispatch(&self, action: A) {
        let Some(current) = self.state.get() else {
            return;
        };
        let next = (self.reducer)(&current, action);
        if next != current {
            self.state.set(next);
        }
    }
}

impl<S, A> fmt::Debug for Dispatch<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("cursor", &self.state.cursor)
            .finish()
    }
}

#[track_caller]
pub fn use_reducer<S, A>(
    reducer: impl Fn(&S, A) -> S + 'static,
    initial: S,
) -> (S, Dispatch<S, A>)
where
    S: Clone + PartialEq + 'static,
    A: 'static,
{
    use_reducer_with_init(reducer, initial, |state| state)
}

/// [`use_reducer`] whose initial state is `init(initial_arg)`, computed on
/// the first render only.
#[track_caller]
pub fn use_reducer_with_init<S, I, A>(
    reducer: impl Fn(&S, A) -> S + 'static,
    initial_arg: I,
    init: impl FnOnce(I) -> S,
) -> (S, Dispatch<S, A>)
where
    S: Clone + PartialEq + 'static,
    A: 'static,
{
    let (state, setter) = use_state(move || init(initial_arg));
    (
        state,
        Dispatch {
            state: setter,
            reducer: Rc::new(reducer),
        },
    )
}

/// The value passed on the previous render (`None` on the first).
#[track_caller]
pub fn use_previous<T: 'static>(value: T) -> Option<T> {
    let cell = use_ref(|| None::<T>);
    cell.replace(Some(value))
}

/// Runs `f` once, after the first commit in which `condition` holds.
#[track_caller]
pub fn use_once(condition: bool, f: impl FnOnce() + 'static) {
    let done = use_ref(|| false);
    use_layout_effect(crate::deps![condition], move || {
        if condition && !done.replace(true) {
            f();
        }
        Cleanup::none()
    });
}

/// Weak handle to the rendering instance.
#[track_caller]
pub fn use_instance() -> InstanceHandle {
    let location = Location::caller();
    let instance = current_instance(HookKind::Handle);
    let cursor = instance.claim_cursor(HookKind::Handle, location);
    let present = instance.slots.borrow().is_handle(cursor);
    if !present {
        instance.install_slot(cursor, Slot::Handle);
    }
    InstanceHandle::new(&instance)
}

/// A group of state setters updated together by [`BatchUpdate::call`].
pub trait BatchTargets {
    type Values;

    fn apply(&self, values: Self::Values);
}

impl<T: Clone + 'static> BatchTargets for StateSetter<T> {
    type Values = T;

    fn apply(&self, values: T) {
        self.set(values);
    }
}

macro_rules! impl_batch_targets {
    ($($value:ident : $idx:tt),+) => {
        impl<$($value: Clone + 'static),+> BatchTargets for ($(StateSetter<$value>,)+) {
            type Values = ($($value,)+);

            fn apply(&self, values: Self::Values) {
                $(self.$idx.set(values.$idx);)+
            }
        }
    };
}

impl_batch_targets!(A: 0);
impl_batch_targets!(A: 0, B: 1);
impl_batch_targets!(A: 0, B: 1, C: 2);
impl_batch_targets!(A: 0, B: 1, C: 2, D: 3);
impl_batch_targets!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_batch_targets!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

/// Applies several state updates with a single re-render.
pub struct BatchUpdate<U> {
    instance: InstanceHandle,
    targets: U,
}

impl<U: BatchTargets> BatchUpdate<U> {
    pub fn call(&self, values: U::Values) {
        match self.instance.upgrade() {
            Some(instance) if instance.is_mounted() => {
                instance.batch(|| self.targets.apply(values));
            }
            _ => {}
        }
    }
}

impl<U: Clone> Clone for BatchUpdate<U> {
    fn clone(&self) -> Self {
        Self {
            instance: self.instance.clone(),
            targets: self.targets.clone(),
        }
    }
}

#[track_caller]
pub fn use_batch_update<U: BatchTargets>(targets: U) -> BatchUpdate<U> {
    BatchUpdate {
        instance: use_instance(),
        targets,
    }
}
