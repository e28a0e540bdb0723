//! Effect bookkeeping: dependency arrays, teardown handles and the queue of
//! deferred effects waiting for a commit to settle.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;

use crate::hash::{hash_one, Key};

/// Dependency array of an effect or memo.
#[derive(Clone, PartialEq, Eq)]
pub enum Deps {
    /// No dependency array: rerun on every render.
    Always,
    /// Rerun when any entry differs from the previous render. An empty list
    /// runs once, on mount.
    Keys(Vec<Key>),
}

impl Deps {
    /// Equivalent to omitting the dependency array.
    pub fn always() -> Self {
        Deps::Always
    }

    /// Empty dependency array: run on mount only.
    pub fn none() -> Self {
        Deps::Keys(Vec::new())
    }

    /// Dependency array built from hashable entries, compared position by
    /// position on the next render.
    pub fn of<T: Hash>(entries: impl IntoIterator<Item = T>) -> Self {
        Deps::Keys(entries.into_iter().map(|entry| hash_one(&entry)).collect())
    }

    /// Whether an effect recorded with `previous` must rerun for `self`.
    ///
    /// A previous `Always` counts as an empty array.
    pub fn changed_since(&self, previous: &Deps) -> bool {
        let Deps::Keys(current) = self else {
            return true;
        };
        let previous: &[Key] = match previous {
            Deps::Always => &[],
            Deps::Keys(keys) => keys,
        };
        current.len() != previous.len() || current.iter().zip(previous).any(|(a, b)| a != b)
    }
}

impl Default for Deps {
    fn default() -> Self {
        Deps::Always
    }
}

impl fmt::Debug for Deps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deps::Always => f.write_str("Deps::Always"),
            Deps::Keys(keys) => write!(f, "Deps::Keys(len = {})", keys.len()),
        }
    }
}

/// Builds a [`Deps::Keys`] from heterogeneous hashable expressions.
///
/// ```
/// use weact_core::{deps, Deps};
/// let id = 3;
/// let name = "todo";
/// assert_eq!(deps![id, name], deps![3, "todo"]);
/// assert_eq!(deps![], Deps::none());
/// ```
#[macro_export]
macro_rules! deps {
    () => {
        $crate::Deps::none()
    };
    ($($dep:expr),+ $(,)?) => {
        $crate::Deps::Keys(vec![$($crate::hash::hash_one(&$dep)),+])
    };
}

/// Teardown handle returned by an effect setup.
#[derive(Default)]
pub struct Cleanup {
    teardown: Option<Box<dyn FnOnce()>>,
}

impl Cleanup {
    /// An effect with nothing to tear down.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    pub fn is_some(&self) -> bool {
        self.teardown.is_some()
    }

    pub(crate) fn run(self) {
        if let Some(teardown) = self.teardown {
            teardown();
        }
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cleanup")
            .field("present", &self.teardown.is_some())
            .finish()
    }
}

pub(crate) type EffectSetup = Box<dyn FnOnce() -> Cleanup>;

/// Setup staged by a deferred effect during render.
pub(crate) struct PendingEffect {
    pub(crate) cursor: usize,
    pub(crate) setup: EffectSetup,
}

/// Deferred effects staged during renders and not yet run.
///
/// Keyed by slot cursor so a slot staged twice before the commit settles
/// keeps only its newest setup, and popping yields ascending cursor order.
#[derive(Default)]
pub(crate) struct EffectQueue {
    pending: BTreeMap<usize, EffectSetup>,
}

impl EffectQueue {
    pub(crate) fn stage(&mut self, cursor: usize, setup: EffectSetup) {
        self.pending.insert(cursor, setup);
    }

    /// Removes the staged setup with the lowest cursor.
    pub(crate) fn pop_first(&mut self) -> Option<PendingEffect> {
        self.pending
            .pop_first()
            .map(|(cursor, setup)| PendingEffect { cursor, setup })
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}
