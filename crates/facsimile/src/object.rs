//! Object instances
//!
//! An object stores one slot per declared instance field of its whole class
//! chain (shadowed fields keep separate slots) plus the dynamic properties
//! assigned to it without a declaration. Member access goes through the
//! guarded accessors below, which are the only place the undefined-member
//! and undefined-method guards can fire.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::class::{ClassDescriptor, FieldDescriptor, MethodBody};
use crate::duplicate::Duplicator;
use crate::error::FacsimileResult;
use crate::shim;
use crate::value::Value;

/// Global counter for generating unique object IDs
static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a new unique object ID
fn generate_object_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Object instance
#[derive(Debug)]
pub struct Object {
    /// Unique object ID (assigned on creation and on every copy)
    pub object_id: u64,
    /// Runtime class
    pub class: Arc<ClassDescriptor>,
    /// Declared instance field values, indexed by slot
    pub slots: Vec<Value>,
    /// Dynamic properties in insertion order
    pub dynamic: Vec<(String, Value)>,
}

impl Object {
    fn dynamic_index(&self, name: &str) -> Option<usize> {
        self.dynamic.iter().position(|(n, _)| n == name)
    }
}

/// Shared, reference-counted handle to an object instance
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<Object>>);

impl ObjectRef {
    fn from_object(object: Object) -> Self {
        Self(Rc::new(RefCell::new(object)))
    }

    /// Allocate an instance with field defaults, without running a
    /// constructor and without the construction guard
    pub fn instantiate(class: &Arc<ClassDescriptor>) -> Self {
        let slots = class
            .instance_layout()
            .into_iter()
            .map(|field| field.default.to_value())
            .collect();
        Self::from_object(Object {
            object_id: generate_object_id(),
            class: Arc::clone(class),
            slots,
            dynamic: Vec::new(),
        })
    }

    /// Construct an instance: construction guard, allocation, then the
    /// nearest constructor in the chain
    pub fn construct(class: &Arc<ClassDescriptor>, args: &[Value]) -> FacsimileResult<Self> {
        shim::guard_construct(class)?;
        let object = Self::instantiate(class);
        if let Some(constructor) = class.constructor() {
            constructor(&object, args)?;
        }
        Ok(object)
    }

    /// Rebuild an instance from exported properties without running the
    /// constructor; every property goes through the guarded [`set`](Self::set)
    pub fn set_state<K: AsRef<str>>(
        class: &Arc<ClassDescriptor>,
        props: impl IntoIterator<Item = (K, Value)>,
    ) -> FacsimileResult<Self> {
        let object = Self::instantiate(class);
        for (name, value) in props {
            object.set(name.as_ref(), value)?;
        }
        Ok(object)
    }

    /// Runtime class
    pub fn class(&self) -> Arc<ClassDescriptor> {
        Arc::clone(&self.0.borrow().class)
    }

    /// Runtime class name
    pub fn class_name(&self) -> String {
        self.0.borrow().class.name().to_string()
    }

    /// Unique object ID
    pub fn object_id(&self) -> u64 {
        self.0.borrow().object_id
    }

    /// Check if both handles reference the same instance
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Node identity
    pub fn node_id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    // ========================================================================
    // Guarded member access
    // ========================================================================

    /// Read a property (most-derived declaration, then dynamic properties)
    ///
    /// Unknown names read as `null` unless the undefined-member guard is in
    /// effect.
    pub fn get(&self, name: &str) -> FacsimileResult<Value> {
        let object = self.0.borrow();
        if let Some(slot) = object.class.find_field(name).and_then(|f| f.slot) {
            return Ok(object.slots[slot].clone());
        }
        if let Some(i) = object.dynamic_index(name) {
            return Ok(object.dynamic[i].1.clone());
        }
        shim::guard_property(&object.class, name)?;
        Ok(Value::Null)
    }

    /// Write a property
    ///
    /// Unknown names create a dynamic property unless the undefined-member
    /// guard is in effect.
    pub fn set(&self, name: &str, value: Value) -> FacsimileResult<()> {
        let mut object = self.0.borrow_mut();
        if let Some(slot) = object.class.find_field(name).and_then(|f| f.slot) {
            object.slots[slot] = value;
            return Ok(());
        }
        if let Some(i) = object.dynamic_index(name) {
            object.dynamic[i].1 = value;
            return Ok(());
        }
        shim::guard_property(&object.class, name)?;
        object.dynamic.push((name.to_string(), value));
        Ok(())
    }

    /// Check if a property exists and is not `null`
    pub fn isset(&self, name: &str) -> FacsimileResult<bool> {
        let object = self.0.borrow();
        if let Some(slot) = object.class.find_field(name).and_then(|f| f.slot) {
            return Ok(!object.slots[slot].is_null());
        }
        if let Some(i) = object.dynamic_index(name) {
            return Ok(!object.dynamic[i].1.is_null());
        }
        shim::guard_property(&object.class, name)?;
        Ok(false)
    }

    /// Remove a property: declared fields reset to `null`, dynamic
    /// properties are dropped
    pub fn unset(&self, name: &str) -> FacsimileResult<()> {
        let mut object = self.0.borrow_mut();
        if let Some(slot) = object.class.find_field(name).and_then(|f| f.slot) {
            object.slots[slot] = Value::Null;
            return Ok(());
        }
        if let Some(i) = object.dynamic_index(name) {
            object.dynamic.remove(i);
            return Ok(());
        }
        shim::guard_property(&object.class, name)
    }

    /// Read the field `name` declared exactly on class `owner`
    pub fn get_declared(&self, owner: &str, name: &str) -> Option<Value> {
        let object = self.0.borrow();
        let slot = object.class.find_declared(owner, name)?.slot?;
        object.slots.get(slot).cloned()
    }

    /// Write the field `name` declared exactly on class `owner`
    pub fn set_declared(&self, owner: &str, name: &str, value: Value) -> bool {
        let mut object = self.0.borrow_mut();
        let slot = match object.class.find_declared(owner, name).and_then(|f| f.slot) {
            Some(slot) => slot,
            None => return false,
        };
        object.slots[slot] = value;
        true
    }

    /// Read the value a field descriptor points at
    pub fn read_field(&self, field: &FieldDescriptor) -> Option<Value> {
        let object = self.0.borrow();
        match field.slot {
            Some(slot) => object.slots.get(slot).cloned(),
            None if field.dynamic => object
                .dynamic_index(&field.name)
                .map(|i| object.dynamic[i].1.clone()),
            None => None,
        }
    }

    /// Overwrite the value a field descriptor points at
    pub fn write_field(&self, field: &FieldDescriptor, value: Value) -> bool {
        let mut object = self.0.borrow_mut();
        let target = match field.slot {
            Some(slot) => object.slots.get_mut(slot),
            None if field.dynamic => match object.dynamic_index(&field.name) {
                Some(i) => Some(&mut object.dynamic[i].1),
                None => None,
            },
            None => None,
        };
        match target {
            Some(target) => {
                *target = value;
                true
            }
            None => false,
        }
    }

    /// Dynamic properties in insertion order
    pub fn dynamic_properties(&self) -> Vec<(String, Value)> {
        self.0.borrow().dynamic.clone()
    }

    /// Slot values in layout order
    pub fn slot_values(&self) -> Vec<Value> {
        self.0.borrow().slots.clone()
    }

    // ========================================================================
    // Invocation
    // ========================================================================

    /// Invoke a method by name
    ///
    /// Unknown names return `null` unless the undefined-method guard is in
    /// effect.
    pub fn call(&self, name: &str, args: &[Value]) -> FacsimileResult<Value> {
        let class = self.class();
        match class.find_method(name).map(|m| &m.body) {
            Some(MethodBody::Instance(body)) => body(self, args),
            Some(MethodBody::Static(body)) => body(args),
            None => {
                shim::guard_method(&class, name)?;
                Ok(Value::Null)
            }
        }
    }

    // ========================================================================
    // Copy
    // ========================================================================

    /// The runtime copy primitive with default [`CopyOptions`](crate::CopyOptions):
    /// shallow copy, then the class's clone-hook chain
    pub fn copy(&self) -> FacsimileResult<ObjectRef> {
        Duplicator::default().copy_object(self)
    }

    /// Field-for-field reference copy under a fresh object ID
    pub(crate) fn shallow_copy(&self) -> ObjectRef {
        let object = self.0.borrow();
        Self::from_object(Object {
            object_id: generate_object_id(),
            class: Arc::clone(&object.class),
            slots: object.slots.clone(),
            dynamic: object.dynamic.clone(),
        })
    }

    /// Structural equality (see [`Value::deep_eq`])
    pub fn deep_eq(&self, other: &ObjectRef) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let (a, b) = (self.0.borrow(), other.0.borrow());
        a.class.id() == b.class.id()
            && a.slots.len() == b.slots.len()
            && a.slots.iter().zip(b.slots.iter()).all(|(x, y)| x.deep_eq(y))
            && a.dynamic.len() == b.dynamic.len()
            && a
                .dynamic
                .iter()
                .zip(b.dynamic.iter())
                .all(|((na, va), (nb, vb))| na == nb && va.deep_eq(vb))
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(object) => write!(f, "Object({}#{})", object.class.name(), object.object_id),
            Err(_) => write!(f, "Object(<borrowed>)"),
        }
    }
}
