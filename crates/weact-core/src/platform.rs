//! Host platform abstraction.
//!
//! The runtime never touches host state directly. It hands patches to
//! [`Host::commit`] and schedules next-tick work through
//! [`Host::schedule_macrotask`]; everything else (page registration,
//! lifecycle wiring, property declarations) stays on the host side.

use crate::patch::Patch;

/// Callback invoked by the host once committed data is visible.
pub type CommitCallback = Box<dyn FnOnce() + 'static>;

/// Unit of work run on a later host macrotask.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Field-patching host an instance renders into.
///
/// Hosts are single-threaded; callbacks are always invoked on the thread
/// that owns the instance. Implementations must not hold internal borrows
/// while invoking callbacks, since callbacks may commit again.
pub trait Host {
    /// Apply `patch` to the instance's persistent view state.
    ///
    /// `on_complete` must be invoked exactly once, after the data is
    /// visible. It may be invoked synchronously or on a later tick; the
    /// runtime treats it as the only signal that the commit landed.
    fn commit(&self, patch: Patch, on_complete: CommitCallback);

    /// Run `task` on the next host macrotask.
    fn schedule_macrotask(&self, task: Task);
}
