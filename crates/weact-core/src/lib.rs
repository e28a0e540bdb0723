#![doc = r"Hook runtime and structural data diffing for field-patching hosts."]

extern crate self as weact_core;

pub mod collections;
pub mod config;
pub mod definition;
pub mod diff;
pub mod effects;
pub mod hash;
pub mod hooks;
pub mod instance;
pub mod patch;
pub mod platform;
pub mod refs;
mod render_context;
pub mod slot_table;
pub mod value;

pub use config::{debug_enabled, set_debug, RuntimeConfig, LOG_TARGET};
pub use definition::{Definition, Method};
pub use diff::{diff, diff_tree, DiffNode};
pub use effects::{Cleanup, Deps};
pub use hash::Key;
pub use hooks::{
    use_batch_update, use_callback, use_effect, use_effect_on_update, use_instance,
    use_layout_effect, use_memo, use_once, use_previous, use_reducer, use_reducer_with_init,
    use_ref, use_state, BatchTargets, BatchUpdate, Dispatch, StateSetter,
};
pub use instance::{Instance, InstanceBuilder, InstanceHandle, RenderFn};
pub use patch::{apply_patch, parse_path, Patch, PatchError, PatchValue, PathSegment};
pub use platform::{CommitCallback, Host, Task};
pub use refs::MutableRef;
pub use render_context::is_rendering;
pub use slot_table::{CallSignature, HookKind, HookOrderViolation};
pub use value::{Map, Value};

use std::fmt;

/// Rejected render or lifecycle request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The instance asked to render while its render function was running.
    ReentrantRender { instance: String },
    /// Another instance's render function is running on this thread.
    NestedRender { active: String, requested: String },
    /// The instance was destroyed.
    Unmounted { instance: String },
    UnknownMethod { instance: String, method: String },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::ReentrantRender { instance } => {
                write!(f, "{instance}: render requested while already rendering")
            }
            RuntimeError::NestedRender { active, requested } => write!(
                f,
                "{requested}: cannot render while {active} is rendering on this thread"
            ),
            RuntimeError::Unmounted { instance } => write!(f, "{instance}: instance is destroyed"),
            RuntimeError::UnknownMethod { instance, method } => {
                write!(f, "{instance}: no method named {method:?}")
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Misuse of a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookError {
    NotRendering { hook: &'static str },
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookError::NotRendering { hook } => {
                write!(f, "{hook} called outside of a render function")
            }
        }
    }
}

impl std::error::Error for HookError {}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
