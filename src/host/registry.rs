use crate::runtime::value::{FunctionRef, ObjectRef, Value};
use std::collections::BTreeMap;

/// Names the dispatcher looks for even when they are not bound to functions.
pub const RECOGNIZED_HANDLERS: [&str; 7] = [
    "bang",
    "msg_float",
    "msg_int",
    "list",
    "symbol",
    "anything",
    "loadbang",
];

pub const CATCH_ALL: &str = "anything";

#[derive(Debug, Clone)]
pub enum HandlerBinding {
    Dispatchable(FunctionRef),
    /// A name the dispatcher must never invoke: a recognized name bound to a
    /// plain value, or a function marked `private`.
    NonDispatchable {
        value: Value,
        metadata: BTreeMap<String, Value>,
    },
}

#[derive(Debug, Clone)]
pub struct HandlerEntry {
    pub name: String,
    pub arity: usize,
    pub variadic: bool,
    pub binding: HandlerBinding,
}

impl HandlerEntry {
    pub fn is_dispatchable(&self) -> bool {
        matches!(self.binding, HandlerBinding::Dispatchable(_))
    }

    /// A function that is callable from script code but hidden from
    /// inbound messages.
    pub fn is_private(&self) -> bool {
        matches!(
            &self.binding,
            HandlerBinding::NonDispatchable {
                value: Value::Function(_),
                ..
            }
        )
    }
}

/// Immutable snapshot of a node's handlers, rebuilt after every change to
/// its global object.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    entries: BTreeMap<String, HandlerEntry>,
}

impl HandlerRegistry {
    pub fn build(globals: &ObjectRef) -> Self {
        let entries = globals
            .borrow()
            .properties
            .iter()
            .filter_map(|(name, value)| scan_binding(name, value))
            .map(|entry| (entry.name.clone(), entry))
            .collect();
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&HandlerEntry> {
        self.entries.get(name)
    }

    pub fn dispatchable(&self, name: &str) -> Option<&FunctionRef> {
        match self.entries.get(name).map(|entry| &entry.binding) {
            Some(HandlerBinding::Dispatchable(function)) => Some(function),
            _ => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_private(function: &FunctionRef) -> bool {
    function
        .property("private")
        .is_some_and(|marker| marker.to_int32() == 1)
}

fn scan_binding(name: &str, value: &Value) -> Option<HandlerEntry> {
    let recognized = RECOGNIZED_HANDLERS.contains(&name);
    match value {
        Value::Function(function) if !is_private(function) => Some(HandlerEntry {
            name: name.to_string(),
            arity: function.arity(),
            variadic: function.is_variadic(),
            binding: HandlerBinding::Dispatchable(function.clone()),
        }),
        Value::Function(function) => Some(HandlerEntry {
            name: name.to_string(),
            arity: function.arity(),
            variadic: function.is_variadic(),
            binding: HandlerBinding::NonDispatchable {
                value: value.clone(),
                metadata: function.properties.borrow().clone(),
            },
        }),
        _ if recognized => Some(HandlerEntry {
            name: name.to_string(),
            arity: 0,
            variadic: false,
            binding: HandlerBinding::NonDispatchable {
                value: value.clone(),
                metadata: match value {
                    Value::Object(object) => object.borrow().properties.clone(),
                    _ => BTreeMap::new(),
                },
            },
        }),
        _ => None,
    }
}
