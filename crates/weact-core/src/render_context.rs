//! The instance currently rendering on this thread.
//!
//! Hook functions find their slot table through this ambient context
//! instead of an explicit parameter. Access is granted by a [`RenderToken`],
//! which exists only while a render function runs. Acquiring it fails if
//! the instance is already rendering or another instance holds the context,
//! and dropping it (also during unwinding) releases both.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::thread_local;

use crate::instance::InstanceInner;
use crate::slot_table::HookKind;
use crate::{HookError, RuntimeError};

thread_local! {
    static ACTIVE: RefCell<Option<Rc<InstanceInner>>> = const { RefCell::new(None) };
}

/// Exclusive right to render one instance on this thread.
pub(crate) struct RenderToken {
    instance: Rc<InstanceInner>,
    _not_send: PhantomData<*const ()>,
}

impl RenderToken {
    pub(crate) fn acquire(instance: &Rc<InstanceInner>) -> Result<Self, RuntimeError> {
        if instance.rendering.get() {
            return Err(RuntimeError::ReentrantRender {
                instance: instance.name.clone(),
            });
        }
        ACTIVE.with(|active| {
            let mut active = active.borrow_mut();
            if let Some(current) = active.as_ref() {
                return Err(RuntimeError::NestedRender {
                    active: current.name.clone(),
                    requested: instance.name.clone(),
                });
            }
            *active = Some(Rc::clone(instance));
            Ok(())
        })?;
        instance.rendering.set(true);
        instance.slots.borrow_mut().reset();
        Ok(Self {
            instance: Rc::clone(instance),
            _not_send: PhantomData,
        })
    }
}

impl Drop for RenderToken {
    fn drop(&mut self) {
        self.instance.rendering.set(false);
        let released = ACTIVE.with(|active| active.borrow_mut().take());
        drop(released);
    }
}

/// Whether a render function is executing on this thread.
pub fn is_rendering() -> bool {
    ACTIVE.with(|active| active.borrow().is_some())
}

pub(crate) fn try_current_instance() -> Option<Rc<InstanceInner>> {
    ACTIVE.with(|active| active.borrow().clone())
}

/// The rendering instance, for a hook of the given kind.
///
/// # Panics
///
/// Panics with [`HookError::NotRendering`] outside a render function.
#[track_caller]
pub(crate) fn current_instance(kind: HookKind) -> Rc<InstanceInner> {
    match try_current_instance() {
        Some(instance) => instance,
        None => panic!("{}", HookError::NotRendering { hook: kind.name() }),
    }
}
