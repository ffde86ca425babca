use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::proxy::Proxy;
use crate::ContainerError;

/// Runtime value produced by resolving a definition.
///
/// Scalars and strings are plain Rust values. [`Value::Array`] keeps element
/// order and optional string keys. [`Value::Object`] is a constructed class
/// instance, possibly hidden behind a lazy proxy.
///
/// Two notions of sameness exist:
///
/// - `PartialEq` is observational: objects compare by class and property
///   values (a lazy proxy is initialized first).
/// - [`Value::same_object`] is identity: it is `true` only for two handles to
///   the same instance, and is what singleton caching guarantees.
#[derive(Clone, Debug)]
pub enum Value {
    /// Absence of a value.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Floating point literal.
    Float(f64),
    /// String literal.
    Str(String),
    /// Ordered, optionally keyed collection.
    Array(Array),
    /// Constructed class instance.
    Object(Object),
}

impl Value {
    /// Builds a string value.
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// Builds an object value from a live instance.
    pub fn object(instance: Arc<Instance>) -> Self {
        Self::Object(Object::Real(instance))
    }

    /// Returns `true` if both values are handles to the same object instance.
    ///
    /// Always `false` for non-object values: scalars are copied on every
    /// retrieval and carry no identity.
    pub fn same_object(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => a.same_as(b),
            _ => false,
        }
    }

    /// Returns the object handle if this value is an object.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the array if this value is an array.
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the string slice if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the integer if this value is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean if this value is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.observably_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Ordered collection of values with optional string keys.
///
/// Positional elements have no key. Keyed elements keep their insertion
/// position; replacing a key keeps the original position, matching the
/// array-extension overlay rule where extension values win on key collision
/// without reordering the base.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Array {
    items: Vec<(Option<String>, Value)>,
}

impl Array {
    /// Creates an empty array.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional element.
    pub fn push(&mut self, value: Value) {
        self.items.push((None, value));
    }

    /// Inserts a keyed element, replacing an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        for item in &mut self.items {
            if item.0.as_deref() == Some(key.as_str()) {
                item.1 = value;
                return;
            }
        }
        self.items.push((Some(key), value));
    }

    /// Returns the value stored under a string key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.items
            .iter()
            .find(|(k, _)| k.as_deref() == Some(key))
            .map(|(_, v)| v)
    }

    /// Returns the element at a position, keyed or not.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.items.get(index).map(|(_, v)| v)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates elements in order.
    pub fn iter(&self) -> impl Iterator<Item = (Option<&str>, &Value)> {
        self.items.iter().map(|(k, v)| (k.as_deref(), v))
    }

    /// Overlays `other` on top of this array.
    ///
    /// Keyed elements of `other` replace same-keyed elements in place;
    /// everything else is appended in order.
    pub fn merge_from(&mut self, other: Array) {
        for (key, value) in other.items {
            match key {
                Some(key) => self.insert(key, value),
                None => self.push(value),
            }
        }
    }
}

impl FromIterator<Value> for Array {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().map(|v| (None, v)).collect(),
        }
    }
}

/// A constructed instance of a registered class.
///
/// Instances are dynamic records: a class id plus a property map. Method
/// bodies live in the class registry and are dispatched through
/// [`ClassRecord::call_method`](crate::ClassRecord::call_method).
pub struct Instance {
    class: String,
    properties: RwLock<BTreeMap<String, Value>>,
}

impl Instance {
    /// Creates an instance with no properties set.
    pub fn new(class: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            class: class.into(),
            properties: RwLock::new(BTreeMap::new()),
        })
    }

    /// Class id this instance was constructed from.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Reads a property value.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.properties.read().unwrap().get(name).cloned()
    }

    /// Writes a property value.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.properties.write().unwrap().insert(name.into(), value);
    }

    /// Snapshot of all properties, for diagnostics and equality checks.
    pub fn properties(&self) -> BTreeMap<String, Value> {
        self.properties.read().unwrap().clone()
    }

    /// Creates a detached copy with the same class and property values.
    pub fn clone_contents(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            class: self.class.clone(),
            properties: RwLock::new(self.properties()),
        })
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class)
            .field("properties", &self.properties())
            .finish()
    }
}

/// Handle to an object value: either a live instance or a lazy proxy.
#[derive(Clone, Debug)]
pub enum Object {
    /// Fully constructed instance.
    Real(Arc<Instance>),
    /// Deferred instance behind a proxy.
    Lazy(Arc<Proxy>),
}

impl Object {
    /// Class id, available without triggering proxy initialization.
    pub fn class(&self) -> &str {
        match self {
            Object::Real(v) => v.class(),
            Object::Lazy(v) => v.class(),
        }
    }

    /// Returns the underlying instance, initializing a lazy proxy first.
    pub fn instance(&self) -> Result<Arc<Instance>, ContainerError> {
        match self {
            Object::Real(v) => Ok(v.clone()),
            Object::Lazy(v) => v.instance(),
        }
    }

    /// Reads a property, initializing a lazy proxy first.
    pub fn get(&self, name: &str) -> Result<Option<Value>, ContainerError> {
        Ok(self.instance()?.get(name))
    }

    /// Writes a property, initializing a lazy proxy first.
    pub fn set(&self, name: impl Into<String>, value: Value) -> Result<(), ContainerError> {
        self.instance()?.set(name, value);
        Ok(())
    }

    /// Creates a detached copy of the underlying instance.
    ///
    /// Cloning is never identity preserving for proxies: the proxy is
    /// initialized first and the real instance is copied, matching value
    /// semantics rather than proxy semantics.
    pub fn clone_contents(&self) -> Result<Object, ContainerError> {
        Ok(Object::Real(self.instance()?.clone_contents()))
    }

    /// Returns `true` if both handles point at the same instance or proxy.
    pub fn same_as(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Real(a), Object::Real(b)) => Arc::ptr_eq(a, b),
            (Object::Lazy(a), Object::Lazy(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn observably_eq(&self, other: &Object) -> bool {
        if self.same_as(other) {
            return true;
        }
        let (a, b) = match (self.instance(), other.instance()) {
            (Ok(a), Ok(b)) => (a, b),
            _ => return false,
        };
        a.class() == b.class() && a.properties() == b.properties()
    }
}
