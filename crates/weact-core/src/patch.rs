//! Flat path→value patches and their application.
//!
//! Paths use the host's field-addressing grammar: object keys are joined
//! with `.`, array indices are appended as `[i]`, and the empty path names
//! the root (`a.b[2].c`, `list[0]`, `""`). Keys containing `.` or `[` cannot
//! be addressed.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::collections::OrderedMap;
use crate::value::Value;

/// Value assigned at a path.
#[derive(Clone, PartialEq)]
pub enum PatchValue {
    /// Overwrite the field (creating it if needed) with this value.
    Set(Value),
    /// Remove the field. Only produced for top-level keys.
    Remove,
}

impl PatchValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            PatchValue::Set(value) => Some(value),
            PatchValue::Remove => None,
        }
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, PatchValue::Remove)
    }
}

impl fmt::Debug for PatchValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchValue::Set(value) => write!(f, "{value}"),
            PatchValue::Remove => f.write_str("<remove>"),
        }
    }
}

impl From<Value> for PatchValue {
    fn from(value: Value) -> Self {
        PatchValue::Set(value)
    }
}

/// Ordered mapping from field path to new value, as handed to the host's
/// commit primitive.
#[derive(Clone, Default, PartialEq)]
pub struct Patch {
    entries: OrderedMap<String, PatchValue>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, value: impl Into<PatchValue>) {
        self.entries.insert(path.into(), value.into());
    }

    pub fn get(&self, path: &str) -> Option<&PatchValue> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PatchValue)> {
        self.entries.iter().map(|(path, value)| (path.as_str(), value))
    }

    /// Applies the patch to a copy of `base`.
    pub fn apply_to(&self, base: &Value) -> Result<Value, PatchError> {
        let mut out = base.clone();
        apply_patch(&mut out, self)?;
        Ok(out)
    }
}

impl IntoIterator for Patch {
    type Item = (String, PatchValue);
    type IntoIter = indexmap::map::IntoIter<String, PatchValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, PatchValue)> for Patch {
    fn from_iter<I: IntoIterator<Item = (String, PatchValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

/// Serializes as a JSON object; removals become `null`.
impl Serialize for Patch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (path, value) in &self.entries {
            match value {
                PatchValue::Set(value) => map.serialize_entry(path, value)?,
                PatchValue::Remove => map.serialize_entry(path, &())?,
            }
        }
        map.end()
    }
}

/// One step of a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    /// Whether `key` survives a round trip through [`parse_path`]. Empty keys
    /// and keys containing `.` or `[` cannot be addressed.
    pub fn is_addressable_key(key: &str) -> bool {
        !key.is_empty() && !key.contains(['.', '['])
    }

    /// Appends this segment to `path` using the host grammar.
    pub fn push_onto(&self, path: &mut String) {
        match self {
            PathSegment::Key(key) => {
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(key);
            }
            PathSegment::Index(index) => {
                path.push('[');
                path.push_str(&index.to_string());
                path.push(']');
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The path does not follow the `a.b[0]` grammar.
    MalformedPath { path: String },
    /// A segment tried to descend into a scalar.
    NotAContainer { path: String, found: &'static str },
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchError::MalformedPath { path } => write!(f, "malformed field path `{path}`"),
            PatchError::NotAContainer { path, found } => {
                write!(f, "cannot address `{path}`: parent is a {found}")
            }
        }
    }
}

impl std::error::Error for PatchError {}

/// Splits a field path into segments. The empty path yields no segments.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, PatchError> {
    let malformed = || PatchError::MalformedPath {
        path: path.to_string(),
    };
    let mut segments = Vec::new();
    let mut rest = path;
    let mut expect_key = true;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']').ok_or_else(malformed)?;
            let index = after[..close].parse::<usize>().map_err(|_| malformed())?;
            segments.push(PathSegment::Index(index));
            rest = &after[close + 1..];
            expect_key = false;
            continue;
        }
        if !expect_key {
            rest = rest.strip_prefix('.').ok_or_else(malformed)?;
        }
        let end = rest.find(['.', '[']).unwrap_or(rest.len());
        if end == 0 {
            return Err(malformed());
        }
        segments.push(PathSegment::Key(rest[..end].to_string()));
        rest = &rest[end..];
        expect_key = false;
    }
    Ok(segments)
}

/// Applies every entry of `patch` to `target` in order ("set field at path").
///
/// Missing intermediate containers are created (an object, or an array when
/// the next segment is an index); arrays grow with `null` padding.
pub fn apply_patch(target: &mut Value, patch: &Patch) -> Result<(), PatchError> {
    for (path, value) in patch.iter() {
        let segments = parse_path(path)?;
        set_path(target, &segments, value.clone(), path)?;
    }
    Ok(())
}

fn set_path(
    root: &mut Value,
    segments: &[PathSegment],
    value: PatchValue,
    path: &str,
) -> Result<(), PatchError> {
    let Some((last, parents)) = segments.split_last() else {
        *root = value.as_value().cloned().unwrap_or_default();
        return Ok(());
    };

    let mut current = root;
    for (i, segment) in parents.iter().enumerate() {
        let next_is_index = matches!(segments[i + 1], PathSegment::Index(_));
        current = descend_or_create(current, segment, next_is_index, path)?;
    }

    match last {
        PathSegment::Key(key) => {
            let map = ensure_object(current, path)?;
            match value {
                PatchValue::Set(value) => {
                    map.insert(key.clone(), value);
                }
                PatchValue::Remove => {
                    map.shift_remove(key);
                }
            }
        }
        PathSegment::Index(index) => {
            let items = ensure_array(current, path)?;
            match value {
                PatchValue::Set(value) => {
                    if *index >= items.len() {
                        items.resize(*index + 1, Value::Null);
                    }
                    items[*index] = value;
                }
                PatchValue::Remove => {
                    if let Some(item) = items.get_mut(*index) {
                        *item = Value::Null;
                    }
                }
            }
        }
    }
    Ok(())
}

fn descend_or_create<'v>(
    current: &'v mut Value,
    segment: &PathSegment,
    next_is_index: bool,
    path: &str,
) -> Result<&'v mut Value, PatchError> {
    let fresh = || {
        if next_is_index {
            Value::array()
        } else {
            Value::object()
        }
    };
    match segment {
        PathSegment::Key(key) => {
            let map = ensure_object(current, path)?;
            let child = map.entry(key.clone()).or_insert_with(fresh);
            if child.is_null() {
                *child = fresh();
            }
            Ok(child)
        }
        PathSegment::Index(index) => {
            let items = ensure_array(current, path)?;
            if *index >= items.len() {
                items.resize(*index + 1, Value::Null);
            }
            let child = &mut items[*index];
            if child.is_null() {
                *child = fresh();
            }
            Ok(child)
        }
    }
}

fn ensure_object<'v>(
    current: &'v mut Value,
    path: &str,
) -> Result<&'v mut crate::value::Map, PatchError> {
    if current.is_null() {
        *current = Value::object();
    }
    let found = current.kind();
    current.object_mut().ok_or_else(|| PatchError::NotAContainer {
        path: path.to_string(),
        found,
    })
}

fn ensure_array<'v>(current: &'v mut Value, path: &str) -> Result<&'v mut Vec<Value>, PatchError> {
    if current.is_null() {
        *current = Value::array();
    }
    let found = current.kind();
    current.array_mut().ok_or_else(|| PatchError::NotAContainer {
        path: path.to_string(),
        found,
    })
}

#[cfg(test)]
#[path = "tests/patch_tests.rs"]
mod tests;
