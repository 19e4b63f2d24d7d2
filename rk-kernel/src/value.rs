//! Export values
//!
//! Modules publish values through an `Exports` object. Objects are shared
//! handles: two requires of the same module observe the same object, and
//! equality between objects is identity.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A value a module can export.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Object(Exports),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Exports> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Field lookup on object values.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.as_object().and_then(|obj| obj.get(key))
    }

    /// Render as JSON. Objects already being rendered further up the
    /// current branch are printed as `"[Circular]"`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut stack = Vec::new();
        self.to_json_inner(&mut stack)
    }

    fn to_json_inner(&self, stack: &mut Vec<*const ()>) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.to_json_inner(stack)).collect())
            }
            Value::Object(obj) => {
                let ptr = obj.as_ptr();
                if stack.contains(&ptr) {
                    return serde_json::Value::String(String::from("[Circular]"));
                }
                stack.push(ptr);
                let map = obj
                    .entries()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_json_inner(stack)))
                    .collect();
                stack.pop();
                serde_json::Value::Object(map)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Exports> for Value {
    fn from(obj: Exports) -> Self {
        Value::Object(obj)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Option<Value>> for Value {
    fn from(value: Option<Value>) -> Self {
        value.unwrap_or_default()
    }
}

/// Every JSON conversion builds fresh objects.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                let obj = Exports::new();
                for (k, v) in map {
                    obj.set(k, Value::from(v));
                }
                Value::Object(obj)
            }
        }
    }
}

/// A shared, mutable object of named values.
#[derive(Clone, Default)]
pub struct Exports(Rc<RefCell<BTreeMap<String, Value>>>);

impl Exports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.borrow_mut().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    /// Field names in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Whether both handles point at the same object.
    pub fn ptr_eq(&self, other: &Exports) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for Exports {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

// Objects may reference themselves; only print the field names.
impl fmt::Debug for Exports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exports").field("keys", &self.keys()).finish()
    }
}
