//! Value representation
//!
//! Scalars are immutable and may be shared freely. Arrays, dicts, objects
//! and resources are reference-counted nodes with identity: cloning a
//! [`Value`] aliases them, which is exactly the shallow behaviour the copy
//! engine exists to undo.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::object::ObjectRef;

/// Dynamically typed value
#[derive(Clone, Default)]
pub enum Value {
    /// Absence of a value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Immutable text
    Str(Rc<str>),
    /// Ordered list container
    Array(ArrayRef),
    /// Insertion-ordered keyed container
    Dict(DictRef),
    /// Object instance
    Object(ObjectRef),
    /// Opaque host resource
    Resource(ResourceRef),
}

impl Value {
    /// Text value
    pub fn str(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }

    /// Fresh array holding `items`
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(ArrayRef::new(items))
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if the value is a scalar (no identity, never duplicated)
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Str(_)
        )
    }

    /// Get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    /// Get as array
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get as dict
    pub fn as_dict(&self) -> Option<&DictRef> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Get as object
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get as resource
    pub fn as_resource(&self) -> Option<&ResourceRef> {
        match self {
            Value::Resource(r) => Some(r),
            _ => None,
        }
    }

    /// Type description string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Dict(_) => "dict",
            Value::Object(_) => "object",
            Value::Resource(_) => "resource",
        }
    }

    /// Identity of the referenced node, if the value has one
    pub fn node_id(&self) -> Option<usize> {
        match self {
            Value::Array(a) => Some(a.node_id()),
            Value::Dict(d) => Some(d.node_id()),
            Value::Object(o) => Some(o.node_id()),
            Value::Resource(r) => Some(r.node_id()),
            _ => None,
        }
    }

    /// Check if both values reference the same node
    pub fn same_node(&self, other: &Value) -> bool {
        match (self.node_id(), other.node_id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Structural equality: scalars by value, containers element-wise,
    /// objects by class and slot/dynamic values, resources by identity.
    ///
    /// Recurses without a visited set, so it must not be used on cyclic
    /// graphs.
    pub fn deep_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                let (a, b) = (a.to_vec(), b.to_vec());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                let (a, b) = (a.entries(), b.entries());
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.deep_eq(vb))
            }
            (Value::Object(a), Value::Object(b)) => a.deep_eq(b),
            _ => self == other,
        }
    }
}

/// Scalars compare by value; arrays, dicts, objects and resources compare by
/// identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => self.same_node(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Array(a) => write!(f, "{:?}", a),
            Value::Dict(d) => write!(f, "{:?}", d),
            Value::Object(o) => write!(f, "{:?}", o),
            Value::Resource(r) => write!(f, "{:?}", r),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<ArrayRef> for Value {
    fn from(a: ArrayRef) -> Self {
        Value::Array(a)
    }
}

impl From<DictRef> for Value {
    fn from(d: DictRef) -> Self {
        Value::Dict(d)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl From<ResourceRef> for Value {
    fn from(r: ResourceRef) -> Self {
        Value::Resource(r)
    }
}

// ============================================================================
// Array
// ============================================================================

/// Shared handle to an ordered list
#[derive(Clone, Default)]
pub struct ArrayRef(Rc<RefCell<Vec<Value>>>);

impl ArrayRef {
    /// Create a new array holding `items`
    pub fn new(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    /// Get array length
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Check if array is empty
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Get element at index
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    /// Set element at index, returning false when out of bounds
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.0.borrow_mut().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Push element to end, returning the new length
    pub fn push(&self, value: Value) -> usize {
        let mut items = self.0.borrow_mut();
        items.push(value);
        items.len()
    }

    /// Shallow copy of the elements
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    /// Borrow the elements
    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    /// Borrow the elements mutably
    pub fn borrow_mut(&self) -> RefMut<'_, Vec<Value>> {
        self.0.borrow_mut()
    }

    /// Check if both handles reference the same array
    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Node identity
    pub fn node_id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(items) => write!(f, "Array(len={})", items.len()),
            Err(_) => write!(f, "Array(<borrowed>)"),
        }
    }
}

// ============================================================================
// Dict
// ============================================================================

/// Dict key (integer or text)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DictKey {
    /// Integer key
    Int(i64),
    /// Text key
    Str(Rc<str>),
}

impl From<i64> for DictKey {
    fn from(i: i64) -> Self {
        DictKey::Int(i)
    }
}

impl From<&str> for DictKey {
    fn from(s: &str) -> Self {
        DictKey::Str(Rc::from(s))
    }
}

impl fmt::Display for DictKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DictKey::Int(i) => write!(f, "{}", i),
            DictKey::Str(s) => write!(f, "{}", s),
        }
    }
}

/// Insertion-ordered map storage
#[derive(Clone, Default)]
pub struct Dict {
    entries: Vec<(DictKey, Value)>,
    index: FxHashMap<DictKey, usize>,
}

impl Dict {
    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (key, _))| (key.clone(), i))
            .collect();
    }
}

/// Shared handle to an insertion-ordered keyed map
#[derive(Clone, Default)]
pub struct DictRef(Rc<RefCell<Dict>>);

impl DictRef {
    /// Create a new empty dict
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dict from entries (later duplicates overwrite earlier ones)
    pub fn from_entries(entries: impl IntoIterator<Item = (DictKey, Value)>) -> Self {
        let dict = Self::new();
        for (key, value) in entries {
            dict.insert(key, value);
        }
        dict
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.borrow().entries.len()
    }

    /// Check if the dict is empty
    pub fn is_empty(&self) -> bool {
        self.0.borrow().entries.is_empty()
    }

    /// Get value by key
    pub fn get(&self, key: &DictKey) -> Option<Value> {
        let dict = self.0.borrow();
        dict.index.get(key).map(|&i| dict.entries[i].1.clone())
    }

    /// Check if key exists
    pub fn contains_key(&self, key: &DictKey) -> bool {
        self.0.borrow().index.contains_key(key)
    }

    /// Insert or overwrite; overwriting keeps the original position
    pub fn insert(&self, key: DictKey, value: Value) -> Option<Value> {
        let mut dict = self.0.borrow_mut();
        if let Some(&i) = dict.index.get(&key) {
            return Some(std::mem::replace(&mut dict.entries[i].1, value));
        }
        let position = dict.entries.len();
        dict.index.insert(key.clone(), position);
        dict.entries.push((key, value));
        None
    }

    /// Remove by key
    pub fn remove(&self, key: &DictKey) -> Option<Value> {
        let mut dict = self.0.borrow_mut();
        let i = dict.index.remove(key)?;
        let (_, value) = dict.entries.remove(i);
        dict.reindex();
        Some(value)
    }

    /// Shallow copy of the entries in insertion order
    pub fn entries(&self) -> Vec<(DictKey, Value)> {
        self.0.borrow().entries.clone()
    }

    /// Keys in insertion order
    pub fn keys(&self) -> Vec<DictKey> {
        self.0.borrow().entries.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Check if both handles reference the same dict
    pub fn ptr_eq(&self, other: &DictRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Node identity
    pub fn node_id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for DictRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(dict) => write!(f, "Dict(len={})", dict.entries.len()),
            Err(_) => write!(f, "Dict(<borrowed>)"),
        }
    }
}

// ============================================================================
// Resource
// ============================================================================

/// Opaque host resource (file, socket, stream)
pub struct Resource {
    kind: String,
    handle: RefCell<Box<dyn Any>>,
}

/// Shared handle to an opaque host resource
///
/// Resources can be passed around and aliased but never duplicated.
#[derive(Clone)]
pub struct ResourceRef(Rc<Resource>);

impl ResourceRef {
    /// Wrap a host handle under a kind label
    pub fn new<T: Any>(kind: impl Into<String>, handle: T) -> Self {
        Self(Rc::new(Resource {
            kind: kind.into(),
            handle: RefCell::new(Box::new(handle)),
        }))
    }

    /// Kind label
    pub fn kind(&self) -> &str {
        &self.0.kind
    }

    /// Run `f` on the handle if it is a `T`
    pub fn with_handle<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut handle = self.0.handle.borrow_mut();
        handle.downcast_mut::<T>().map(f)
    }

    /// Check if both handles reference the same resource
    pub fn ptr_eq(&self, other: &ResourceRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Node identity
    pub fn node_id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resource({})", self.0.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_equality_by_value() {
        assert_eq!(Value::Int(3), Value::Int(3));
        assert_eq!(Value::str("a"), Value::str("a"));
        assert_ne!(Value::Int(3), Value::Float(3.0));
        assert!(Value::Null.is_scalar());
        assert!(!Value::array(vec![]).is_scalar());
    }

    #[test]
    fn test_container_equality_by_identity() {
        let a = Value::array(vec![Value::Int(1)]);
        let b = Value::array(vec![Value::Int(1)]);
        assert_ne!(a, b);
        assert!(a.deep_eq(&b));
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_array_operations() {
        let arr = ArrayRef::new(vec![]);
        assert!(arr.is_empty());
        assert_eq!(arr.push(Value::Int(1)), 1);
        assert_eq!(arr.push(Value::Int(2)), 2);
        assert!(arr.set(0, Value::Int(10)));
        assert!(!arr.set(5, Value::Int(0)));
        assert_eq!(arr.get(0), Some(Value::Int(10)));
        assert_eq!(arr.get(9), None);
    }

    #[test]
    fn test_dict_keeps_insertion_order() {
        let dict = DictRef::new();
        dict.insert("b".into(), Value::Int(1));
        dict.insert(DictKey::Int(7), Value::Int(2));
        dict.insert("a".into(), Value::Int(3));
        assert_eq!(dict.insert("b".into(), Value::Int(9)), Some(Value::Int(1)));

        let keys: Vec<String> = dict.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["b", "7", "a"]);

        assert_eq!(dict.remove(&DictKey::Int(7)), Some(Value::Int(2)));
        assert_eq!(dict.get(&"a".into()), Some(Value::Int(3)));
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn test_resource_handle_access() {
        let res = ResourceRef::new("counter", 5u32);
        assert_eq!(res.kind(), "counter");
        assert_eq!(res.with_handle(|n: &mut u32| { *n += 1; *n }), Some(6));
        assert_eq!(res.with_handle(|_: &mut String| ()), None);
    }
}
