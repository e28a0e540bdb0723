//! Positional hook storage for one instance.
//!
//! Every hook call claims the next cursor position. Nothing is keyed by
//! name: an instance must call its hooks in the same order and number on
//! every render. When hook-order checking is enabled the table records the
//! call site of every position and reports drift as a
//! [`HookOrderViolation`].

use std::any::Any;
use std::fmt;
use std::mem;
use std::panic::Location;

use crate::effects::{Cleanup, Deps};
use crate::refs::MutableRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    State,
    Effect,
    LayoutEffect,
    Memo,
    Ref,
    /// Hooks that only capture the instance and store nothing.
    Handle,
}

impl HookKind {
    pub fn name(self) -> &'static str {
        match self {
            HookKind::State => "use_state",
            HookKind::Effect => "use_effect",
            HookKind::LayoutEffect => "use_layout_effect",
            HookKind::Memo => "use_memo",
            HookKind::Ref => "use_ref",
            HookKind::Handle => "use_instance",
        }
    }
}

/// Which hook occupied a cursor position, and where it was called from.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CallSignature {
    pub kind: HookKind,
    pub location: &'static Location<'static>,
}

impl fmt::Display for CallSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind.name(), self.location)
    }
}

impl fmt::Debug for CallSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Hook call order differed from the previous render of the same instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOrderViolation {
    Mismatch {
        cursor: usize,
        expected: CallSignature,
        found: CallSignature,
    },
    Extra {
        cursor: usize,
        found: CallSignature,
    },
    Missing {
        expected: usize,
        found: usize,
    },
}

impl fmt::Display for HookOrderViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookOrderViolation::Mismatch {
                cursor,
                expected,
                found,
            } => write!(
                f,
                "hook #{cursor} changed between renders: expected {expected}, found {found}"
            ),
            HookOrderViolation::Extra { cursor, found } => {
                write!(f, "hook #{cursor} ({found}) was not called on the previous render")
            }
            HookOrderViolation::Missing { expected, found } => write!(
                f,
                "render called {found} hooks, previous render called {expected}"
            ),
        }
    }
}

pub(crate) struct EffectRecord {
    pub(crate) deps: Deps,
    pub(crate) teardown: Option<Cleanup>,
}

pub(crate) struct MemoRecord {
    pub(crate) deps: Deps,
    pub(crate) value: Box<dyn Any>,
}

pub(crate) enum Slot {
    State(Box<dyn Any>),
    Effect(EffectRecord),
    Deferred(EffectRecord),
    Memo(MemoRecord),
    Ref(Box<dyn Any>),
    Handle,
}

impl Slot {
    pub(crate) fn effect(deps: Deps) -> Self {
        Slot::Effect(EffectRecord {
            deps,
            teardown: None,
        })
    }

    pub(crate) fn deferred(deps: Deps) -> Self {
        Slot::Deferred(EffectRecord {
            deps,
            teardown: None,
        })
    }

    /// Teardown owed by a slot that is being displaced.
    pub(crate) fn into_teardown(self) -> Option<Cleanup> {
        match self {
            Slot::Effect(record) | Slot::Deferred(record) => record.teardown,
            _ => None,
        }
    }
}

#[derive(Default)]
pub(crate) struct SlotTable {
    slots: Vec<Slot>,
    cursor: usize,
    signatures: Vec<CallSignature>,
    passes: u64,
    violations: Vec<HookOrderViolation>,
}

impl SlotTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reset(&mut self) {
        self.cursor = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn violations(&self) -> &[HookOrderViolation] {
        &self.violations
    }

    /// Claims the next cursor position for a hook call.
    pub(crate) fn advance(
        &mut self,
        signature: CallSignature,
        check: bool,
    ) -> (usize, Option<HookOrderViolation>) {
        let cursor = self.cursor;
        self.cursor += 1;

        let violation = if check && self.passes > 0 {
            match self.signatures.get(cursor) {
                Some(expected) if *expected != signature => Some(HookOrderViolation::Mismatch {
                    cursor,
                    expected: *expected,
                    found: signature,
                }),
                Some(_) => None,
                None => Some(HookOrderViolation::Extra {
                    cursor,
                    found: signature,
                }),
            }
        } else {
            None
        };

        if cursor < self.signatures.len() {
            self.signatures[cursor] = signature;
        } else {
            self.signatures.push(signature);
        }
        if let Some(violation) = &violation {
            self.violations.push(violation.clone());
        }
        (cursor, violation)
    }

    /// Closes a render pass, reporting hooks that were skipped this time.
    pub(crate) fn finish_pass(&mut self, check: bool) -> Option<HookOrderViolation> {
        let violation = (check && self.passes > 0 && self.cursor < self.signatures.len()).then(
            || HookOrderViolation::Missing {
                expected: self.signatures.len(),
                found: self.cursor,
            },
        );
        if let Some(violation) = &violation {
            self.violations.push(violation.clone());
        }
        self.signatures.truncate(self.cursor);
        self.passes += 1;
        violation
    }

    /// Puts `slot` at `cursor`, returning whatever was displaced.
    pub(crate) fn install(&mut self, cursor: usize, slot: Slot) -> Option<Slot> {
        while self.slots.len() < cursor {
            self.slots.push(Slot::Handle);
        }
        if cursor == self.slots.len() {
            self.slots.push(slot);
            None
        } else {
            Some(mem::replace(&mut self.slots[cursor], slot))
        }
    }

    pub(crate) fn is_handle(&self, cursor: usize) -> bool {
        matches!(self.slots.get(cursor), Some(Slot::Handle))
    }

    pub(crate) fn state<T: Clone + 'static>(&self, cursor: usize) -> Option<T> {
        match self.slots.get(cursor) {
            Some(Slot::State(value)) => value.downcast_ref::<T>().cloned(),
            _ => None,
        }
    }

    /// Overwrites a state slot. Fails if the slot holds something else.
    pub(crate) fn set_state<T: 'static>(&mut self, cursor: usize, value: T) -> bool {
        match self.slots.get_mut(cursor) {
            Some(Slot::State(slot)) if slot.is::<T>() => {
                *slot = Box::new(value);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn effect_mut(&mut self, cursor: usize) -> Option<&mut EffectRecord> {
        match self.slots.get_mut(cursor) {
            Some(Slot::Effect(record)) => Some(record),
            _ => None,
        }
    }

    pub(crate) fn deferred_mut(&mut self, cursor: usize) -> Option<&mut EffectRecord> {
        match self.slots.get_mut(cursor) {
            Some(Slot::Deferred(record)) => Some(record),
            _ => None,
        }
    }

    pub(crate) fn memo_mut<T: 'static>(&mut self, cursor: usize) -> Option<&mut MemoRecord> {
        match self.slots.get_mut(cursor) {
            Some(Slot::Memo(record)) if record.value.is::<T>() => Some(record),
            _ => None,
        }
    }

    pub(crate) fn ref_cell<T: 'static>(&self, cursor: usize) -> Option<MutableRef<T>> {
        match self.slots.get(cursor) {
            Some(Slot::Ref(cell)) => cell.downcast_ref::<MutableRef<T>>().cloned(),
            _ => None,
        }
    }

    /// Consumes the table, yielding teardowns in unmount order: immediate
    /// effects by ascending cursor, then deferred effects by ascending cursor.
    pub(crate) fn into_teardowns(self) -> Vec<Cleanup> {
        let mut immediate = Vec::new();
        let mut deferred = Vec::new();
        for slot in self.slots {
            match slot {
                Slot::Effect(record) => immediate.extend(record.teardown),
                Slot::Deferred(record) => deferred.extend(record.teardown),
                _ => {}
            }
        }
        immediate.extend(deferred);
        immediate
    }
}

#[cfg(test)]
#[path = "tests/slot_table_tests.rs"]
mod tests;
