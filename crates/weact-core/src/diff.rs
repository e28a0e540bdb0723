//! Structural diff between two data snapshots.
//!
//! [`diff_tree`] walks the new snapshot depth first and produces a nested
//! [`DiffNode`]; [`DiffNode::flatten`] turns that into the flat [`Patch`] the
//! host commits. [`diff`] does both.
//!
//! Rules, in order:
//!
//! 1. identical values (see [`Value::same`]) contribute nothing;
//! 2. if either side is a scalar or null, the new value replaces the old one;
//! 3. an array on one side and an object on the other is a replacement;
//! 4. if the old container has a key (or index) the new one lacks, the new
//!    container replaces the old one whole. The root object is the exception:
//!    its vanished keys are reported individually as removals, since the host
//!    cannot assign the empty path;
//! 5. otherwise the new container's own keys are compared one by one.
//!
//! A changed key the path grammar cannot address (empty, or containing `.`
//! or `[`) makes its parent a replacement. At the root there is no parent to
//! replace, so such keys are skipped with a warning.
//!
//! Applying the resulting patch to the old snapshot reproduces the new one.

use log::warn;

use crate::config::LOG_TARGET;
use crate::patch::{Patch, PatchValue, PathSegment};
use crate::value::Value;

/// Nested edit description produced before flattening.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffNode {
    /// Nothing changed below this point.
    Equal,
    /// The whole subtree is overwritten with this value.
    Replace(Value),
    /// The field disappeared.
    Remove,
    /// Some children changed; unchanged children are omitted.
    Fields(Vec<(PathSegment, DiffNode)>),
}

impl DiffNode {
    pub fn is_equal(&self) -> bool {
        matches!(self, DiffNode::Equal)
    }

    /// Flattens into path→value entries. Replacements stop the walk, so a
    /// replaced container never has descendant entries.
    pub fn flatten(self) -> Patch {
        let mut out = Patch::new();
        let mut path = String::new();
        flatten_into(self, &mut path, &mut out);
        out
    }
}

/// Computes the patch that turns `old` into `new`.
///
/// Structurally identical snapshots give an empty patch.
pub fn diff(new: &Value, old: &Value) -> Patch {
    diff_tree(new, old).flatten()
}

/// Computes the nested edit description that turns `old` into `new`.
pub fn diff_tree(new: &Value, old: &Value) -> DiffNode {
    diff_value(new, Some(old), 0)
}

fn diff_value(new: &Value, old: Option<&Value>, depth: usize) -> DiffNode {
    let Some(old) = old else {
        return DiffNode::Replace(new.clone());
    };
    if new.same(old) {
        return DiffNode::Equal;
    }
    match (new, old) {
        (Value::Array(new_items), Value::Array(old_items)) => {
            if old_items.len() > new_items.len() {
                return DiffNode::Replace(new.clone());
            }
            let fields = new_items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| {
                    let child = diff_value(item, old_items.get(index), depth + 1);
                    (!child.is_equal()).then_some((PathSegment::Index(index), child))
                })
                .collect();
            collect_fields(fields)
        }
        (Value::Object(new_map), Value::Object(old_map)) => {
            let has_removed = old_map.keys().any(|key| !new_map.contains_key(key));
            if depth > 0 && has_removed {
                return DiffNode::Replace(new.clone());
            }
            let mut fields: Vec<(PathSegment, DiffNode)> = Vec::new();
            for (key, value) in new_map.iter() {
                let child = diff_value(value, old_map.get(key), depth + 1);
                if child.is_equal() {
                    continue;
                }
                if !PathSegment::is_addressable_key(key) {
                    if depth > 0 {
                        return DiffNode::Replace(new.clone());
                    }
                    skip_unaddressable(key);
                    continue;
                }
                fields.push((PathSegment::Key(key.clone()), child));
            }
            if has_removed {
                for key in old_map.keys().filter(|key| !new_map.contains_key(*key)) {
                    if PathSegment::is_addressable_key(key) {
                        fields.push((PathSegment::Key(key.clone()), DiffNode::Remove));
                    } else {
                        skip_unaddressable(key);
                    }
                }
            }
            collect_fields(fields)
        }
        _ => DiffNode::Replace(new.clone()),
    }
}

fn skip_unaddressable(key: &str) {
    warn!(
        target: LOG_TARGET,
        "top-level field {key:?} cannot be addressed by a patch path, change dropped"
    );
}

fn collect_fields(fields: Vec<(PathSegment, DiffNode)>) -> DiffNode {
    if fields.is_empty() {
        DiffNode::Equal
    } else {
        DiffNode::Fields(fields)
    }
}

fn flatten_into(node: DiffNode, path: &mut String, out: &mut Patch) {
    match node {
        DiffNode::Equal => {}
        DiffNode::Replace(value) => out.insert(path.clone(), PatchValue::Set(value)),
        DiffNode::Remove => out.insert(path.clone(), PatchValue::Remove),
        DiffNode::Fields(fields) => {
            for (segment, child) in fields {
                let len = path.len();
                segment.push_onto(path);
                flatten_into(child, path, out);
                path.truncate(len);
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/diff_tests.rs"]
mod tests;
