//! What a render function returns: data for the host plus behavior.

use std::fmt;
use std::rc::Rc;

use crate::collections::OrderedMap;
use crate::value::{Map, Value};

/// Behavior exposed on an instance, called with the host event payload.
pub type Method = Rc<dyn Fn(&Value)>;

/// Result of one render: a data payload that is diffed and committed, and
/// named methods that are exposed on the instance as-is.
///
/// A name is either data or a method; inserting one kind removes the other.
#[derive(Clone, Default)]
pub struct Definition {
    data: Map,
    methods: OrderedMap<String, Method>,
}

impl Definition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equivalent to a render function returning nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn data(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert_data(name, value);
        self
    }

    pub fn method(mut self, name: impl Into<String>, method: impl Fn(&Value) + 'static) -> Self {
        self.insert_method(name, Rc::new(method));
        self
    }

    pub fn insert_data(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        self.methods.shift_remove(&name);
        self.data.insert(name, value.into());
    }

    pub fn insert_method(&mut self, name: impl Into<String>, method: Method) {
        let name = name.into();
        self.data.shift_remove(&name);
        self.methods.insert(name, method);
    }

    pub fn data_fields(&self) -> &Map {
        &self.data
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.methods.is_empty()
    }

    /// Splits into the data snapshot and the method table.
    pub fn into_parts(self) -> (Value, OrderedMap<String, Method>) {
        (Value::from(self.data), self.methods)
    }
}

impl From<()> for Definition {
    fn from(_: ()) -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("data", &Value::from(self.data.clone()))
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}
