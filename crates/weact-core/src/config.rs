//! Runtime configuration and the global debug toggle.

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};

/// Log target used for all runtime diagnostics.
pub const LOG_TARGET: &str = "weact";

static DEBUG: AtomicBool = AtomicBool::new(false);

/// Turns diagnostic tracing on or off for every instance.
pub fn set_debug(enabled: bool) {
    DEBUG.store(enabled, Ordering::Relaxed);
}

pub fn debug_enabled() -> bool {
    DEBUG.load(Ordering::Relaxed)
}

/// Per-instance settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Trace prop changes, data/method splits, diffs and commit decisions.
    /// Also enabled globally by [`set_debug`].
    pub debug: bool,
    /// Record hook call sites per cursor and report order drift.
    pub check_hook_order: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            debug: false,
            check_hook_order: cfg!(debug_assertions),
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn with_hook_order_checks(mut self, enabled: bool) -> Self {
        self.check_hook_order = enabled;
        self
    }

    /// Defaults overridden by `WEACT_DEBUG` and `WEACT_CHECK_HOOK_ORDER`
    /// (`1`/`true`/`on` or `0`/`false`/`off`).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(enabled) = env_flag("WEACT_DEBUG") {
            config.debug = enabled;
        }
        if let Some(enabled) = env_flag("WEACT_CHECK_HOOK_ORDER") {
            config.check_hook_order = enabled;
        }
        config
    }

    /// Whether diagnostics should be emitted for this instance.
    pub fn tracing(&self) -> bool {
        self.debug || debug_enabled()
    }
}

fn env_flag(name: &str) -> Option<bool> {
    parse_flag(&env::var(name).ok()?)
}

pub(crate) fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
