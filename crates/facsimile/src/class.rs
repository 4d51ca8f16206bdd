//! Class model
//!
//! A [`ClassDescriptor`] is built once through [`ClassBuilder`] and shared
//! read-only behind an `Arc` for the rest of the process. Each descriptor
//! declares only its own fields and methods and links to its parent, so field
//! ownership is always attributable to exactly one level of the chain.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{FacsimileError, FacsimileResult};
use crate::object::ObjectRef;
use crate::shim::{self, Shims};
use crate::value::{ArrayRef, DictRef, Value};

/// Global counter for generating unique class IDs
static NEXT_CLASS_ID: AtomicU64 = AtomicU64::new(1);

fn generate_class_id() -> ClassId {
    ClassId(NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed))
}

/// Process-unique class identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u64);

impl ClassId {
    /// Raw identifier
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a field's value lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// One value per instance
    Instance,
    /// One value per class
    Static,
}

/// Declared visibility of a member (metadata only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Visible everywhere
    #[default]
    Public,
    /// Visible to the class and its subclasses
    Protected,
    /// Visible to the declaring class only
    Private,
}

/// Initial value of a field on a fresh instance
///
/// Defaults live in the shared class descriptor, so they are restricted to
/// thread-safe constants. Container defaults allocate a new container per
/// instance.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldDefault {
    /// `null`
    #[default]
    Null,
    /// Boolean constant
    Bool(bool),
    /// Integer constant
    Int(i64),
    /// Float constant
    Float(f64),
    /// Text constant
    Str(Arc<str>),
    /// A fresh empty array
    EmptyArray,
    /// A fresh empty dict
    EmptyDict,
}

impl FieldDefault {
    /// Materialize the default as a value for a new instance
    pub fn to_value(&self) -> Value {
        match self {
            FieldDefault::Null => Value::Null,
            FieldDefault::Bool(b) => Value::Bool(*b),
            FieldDefault::Int(i) => Value::Int(*i),
            FieldDefault::Float(f) => Value::Float(*f),
            FieldDefault::Str(s) => Value::str(s),
            FieldDefault::EmptyArray => Value::Array(ArrayRef::new(Vec::new())),
            FieldDefault::EmptyDict => Value::Dict(DictRef::new()),
        }
    }
}

/// Field metadata, attributed to exactly one class level
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Declaring class ID
    pub declaring_class: ClassId,
    /// Declaring class name
    pub declaring_class_name: Arc<str>,
    /// Instance or static storage
    pub storage: StorageKind,
    /// Declared visibility
    pub visibility: Visibility,
    /// Slot index in the instance layout (instance fields only)
    pub slot: Option<usize>,
    /// Initial value
    pub default: FieldDefault,
    /// Whether this is a dynamic property of one instance rather than a
    /// declared field
    pub dynamic: bool,
}

impl FieldDescriptor {
    /// Check if the field is stored per instance
    pub fn is_instance(&self) -> bool {
        self.storage == StorageKind::Instance
    }

    /// Check if the field is stored per class
    pub fn is_static(&self) -> bool {
        self.storage == StorageKind::Static
    }

    /// Descriptor for a dynamic property attributed to `class`
    pub(crate) fn dynamic(name: &str, class: &ClassDescriptor) -> Self {
        Self {
            name: name.to_string(),
            declaring_class: class.id,
            declaring_class_name: class.name.clone(),
            storage: StorageKind::Instance,
            visibility: Visibility::Public,
            slot: None,
            default: FieldDefault::Null,
            dynamic: true,
        }
    }
}

/// Instance method body: receives `this` and the call arguments
pub type InstanceMethodFn = dyn Fn(&ObjectRef, &[Value]) -> FacsimileResult<Value> + Send + Sync;

/// Static method body: receives the call arguments
pub type StaticMethodFn = dyn Fn(&[Value]) -> FacsimileResult<Value> + Send + Sync;

/// Callable body of a declared method
#[derive(Clone)]
pub enum MethodBody {
    /// Called on an instance
    Instance(Arc<InstanceMethodFn>),
    /// Called on the class
    Static(Arc<StaticMethodFn>),
}

impl fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodBody::Instance(_) => write!(f, "MethodBody::Instance(..)"),
            MethodBody::Static(_) => write!(f, "MethodBody::Static(..)"),
        }
    }
}

/// Declared method
#[derive(Debug, Clone)]
pub struct Method {
    /// Method name
    pub name: String,
    /// Declaring class ID
    pub declaring_class: ClassId,
    /// Callable body
    pub body: MethodBody,
}

impl Method {
    /// Check if the method is static
    pub fn is_static(&self) -> bool {
        matches!(self.body, MethodBody::Static(_))
    }
}

/// Copy behaviour installed on one class level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyHook {
    /// Deep-copy hook: duplicates the fields this level owns after the
    /// shallow copy
    Deep,
    /// Copy guard: every copy fails with `CloneNotSupported`
    Forbidden,
}

/// Class definition metadata
pub struct ClassDescriptor {
    id: ClassId,
    name: Arc<str>,
    parent: Option<Arc<ClassDescriptor>>,
    /// Own declared fields (instance and static), in declaration order
    fields: Vec<FieldDescriptor>,
    /// Number of instance slots including inherited ones
    slot_count: usize,
    methods: FxHashMap<String, Method>,
    constructor: Option<Arc<InstanceMethodFn>>,
    deep_copy: bool,
    shims: Shims,
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("fields", &self.fields)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("deep_copy", &self.deep_copy)
            .field("shims", &self.shims)
            .finish()
    }
}

impl ClassDescriptor {
    /// Class ID
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent class (None for root classes)
    pub fn parent(&self) -> Option<&Arc<ClassDescriptor>> {
        self.parent.as_ref()
    }

    /// Iterate over this class, then its parent, up to the root
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors { next: Some(self) }
    }

    /// Check if `self` is `other` or inherits from it
    pub fn is_subclass_of(&self, other: &ClassDescriptor) -> bool {
        self.ancestors().any(|level| level.id == other.id)
    }

    /// Own declared fields (instance and static)
    pub fn own_fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Own declared instance fields, in slot order
    pub fn own_instance_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_instance())
    }

    /// Own declared static fields
    pub fn own_static_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_static())
    }

    /// Number of instance slots, inherited ones included
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Instance fields of the whole chain in slot order (root level first)
    pub fn instance_layout(&self) -> Vec<&FieldDescriptor> {
        let mut levels: Vec<&ClassDescriptor> = self.ancestors().collect();
        levels.reverse();
        levels
            .into_iter()
            .flat_map(|level| level.own_instance_fields())
            .collect()
    }

    /// Resolve an instance field by name, most-derived declaration first
    pub fn find_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.ancestors()
            .find_map(|level| level.own_instance_fields().find(|f| f.name == name))
    }

    /// Resolve the instance field `name` declared exactly on the class named
    /// `owner` (reaches shadowed fields)
    pub fn find_declared(&self, owner: &str, name: &str) -> Option<&FieldDescriptor> {
        self.ancestors()
            .find(|level| level.name() == owner)
            .and_then(|level| level.own_instance_fields().find(|f| f.name == name))
    }

    /// Check if any level declares an instance field `name`
    pub fn has_field(&self, name: &str) -> bool {
        self.find_field(name).is_some()
    }

    /// Resolve a method by name, most-derived declaration first
    pub fn find_method(&self, name: &str) -> Option<&Method> {
        self.ancestors().find_map(|level| level.methods.get(name))
    }

    /// Check if any level declares a method `name`
    pub fn has_method(&self, name: &str) -> bool {
        self.find_method(name).is_some()
    }

    /// Nearest constructor in the chain
    pub fn constructor(&self) -> Option<&Arc<InstanceMethodFn>> {
        self.ancestors().find_map(|level| level.constructor.as_ref())
    }

    /// Shims installed on this level only
    pub fn own_shims(&self) -> Shims {
        self.shims
    }

    /// Shims in effect for instances of this class (inherited ones included)
    pub fn shims(&self) -> Shims {
        self.ancestors()
            .fold(Shims::NONE, |acc, level| acc.union(level.shims))
    }

    /// Check if a shim is in effect
    pub fn has_shim(&self, shim: Shims) -> bool {
        self.shims().contains(shim)
    }

    /// Copy hook installed on this level only
    pub fn copy_hook(&self) -> Option<CopyHook> {
        if self.shims.contains(Shims::CLONE) {
            Some(CopyHook::Forbidden)
        } else if self.deep_copy {
            Some(CopyHook::Deep)
        } else {
            None
        }
    }

    /// Nearest level, starting at this class, that installed a copy hook
    pub fn effective_copy_hook(&self) -> Option<(&ClassDescriptor, CopyHook)> {
        self.ancestors()
            .find_map(|level| level.copy_hook().map(|hook| (level, hook)))
    }

    /// Invoke a static method
    ///
    /// Unknown names fall back to `null` unless the undefined-method guard
    /// is in effect. Declared instance methods need a receiver and fail with
    /// `NonStaticCall`.
    pub fn call_static(&self, name: &str, args: &[Value]) -> FacsimileResult<Value> {
        match self.find_method(name).map(|m| &m.body) {
            Some(MethodBody::Static(body)) => body(args),
            Some(MethodBody::Instance(_)) => Err(FacsimileError::NonStaticCall {
                class: self.name().to_string(),
                name: name.to_string(),
            }),
            None => {
                shim::guard_method(self, name)?;
                Ok(Value::Null)
            }
        }
    }
}

/// Iterator over a class and its ancestors
pub struct Ancestors<'a> {
    next: Option<&'a ClassDescriptor>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a ClassDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent.as_deref();
        Some(current)
    }
}

// ============================================================================
// Builder
// ============================================================================

struct FieldSpec {
    name: String,
    storage: StorageKind,
    visibility: Visibility,
    default: FieldDefault,
}

/// Declarative class definition
///
/// ```rust,ignore
/// let base = ClassBuilder::new("Base")
///     .field("items")
///     .install_deep_copy()
///     .build()?;
/// let derived = ClassBuilder::new("Derived")
///     .extends(&base)
///     .field("owner")
///     .install_capability_shim(Shims::NO_MAGIC)
///     .build()?;
/// ```
pub struct ClassBuilder {
    name: String,
    parent: Option<Arc<ClassDescriptor>>,
    fields: Vec<FieldSpec>,
    methods: Vec<(String, MethodBody)>,
    constructor: Option<Arc<InstanceMethodFn>>,
    deep_copy: bool,
    shims: Shims,
}

impl ClassBuilder {
    /// Start a root class definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
            methods: Vec::new(),
            constructor: None,
            deep_copy: false,
            shims: Shims::NONE,
        }
    }

    /// Inherit from `parent`
    pub fn extends(mut self, parent: &Arc<ClassDescriptor>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// Declare a public instance field defaulting to `null`
    pub fn field(self, name: impl Into<String>) -> Self {
        self.field_with(name, Visibility::Public, FieldDefault::Null)
    }

    /// Declare an instance field with visibility and default
    ///
    /// Redeclaring a name already declared on this level replaces the earlier
    /// declaration; a name declared on an ancestor is shadowed, not replaced.
    pub fn field_with(
        mut self,
        name: impl Into<String>,
        visibility: Visibility,
        default: FieldDefault,
    ) -> Self {
        self.push_field(FieldSpec {
            name: name.into(),
            storage: StorageKind::Instance,
            visibility,
            default,
        });
        self
    }

    /// Declare a static field
    pub fn static_field(mut self, name: impl Into<String>, default: FieldDefault) -> Self {
        self.push_field(FieldSpec {
            name: name.into(),
            storage: StorageKind::Static,
            visibility: Visibility::Public,
            default,
        });
        self
    }

    fn push_field(&mut self, spec: FieldSpec) {
        self.fields.retain(|f| f.name != spec.name);
        self.fields.push(spec);
    }

    /// Declare an instance method
    pub fn method<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&ObjectRef, &[Value]) -> FacsimileResult<Value> + Send + Sync + 'static,
    {
        self.methods.push((name.into(), MethodBody::Instance(Arc::new(body))));
        self
    }

    /// Declare a static method
    pub fn static_method<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Value]) -> FacsimileResult<Value> + Send + Sync + 'static,
    {
        self.methods.push((name.into(), MethodBody::Static(Arc::new(body))));
        self
    }

    /// Declare the constructor, run by [`ObjectRef::construct`]
    pub fn constructor<F>(mut self, body: F) -> Self
    where
        F: Fn(&ObjectRef, &[Value]) -> FacsimileResult<Value> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(body));
        self
    }

    /// Install the deep-copy hook on this level
    pub fn install_deep_copy(mut self) -> Self {
        self.deep_copy = true;
        self
    }

    /// Install one or more capability shims on this level
    pub fn install_capability_shim(mut self, shims: Shims) -> Self {
        self.shims |= shims;
        self
    }

    /// Finish the definition
    pub fn build(self) -> FacsimileResult<Arc<ClassDescriptor>> {
        if self.deep_copy && self.shims.contains(Shims::CLONE) {
            return Err(FacsimileError::ConflictingCopyPolicy { class: self.name });
        }

        let id = generate_class_id();
        let name: Arc<str> = Arc::from(self.name.as_str());
        let mut slot = self.parent.as_ref().map_or(0, |p| p.slot_count);

        let fields = self
            .fields
            .into_iter()
            .map(|spec| {
                let field_slot = match spec.storage {
                    StorageKind::Instance => {
                        slot += 1;
                        Some(slot - 1)
                    }
                    StorageKind::Static => None,
                };
                FieldDescriptor {
                    name: spec.name,
                    declaring_class: id,
                    declaring_class_name: name.clone(),
                    storage: spec.storage,
                    visibility: spec.visibility,
                    slot: field_slot,
                    default: spec.default,
                    dynamic: false,
                }
            })
            .collect();

        let methods = self
            .methods
            .into_iter()
            .map(|(method_name, body)| {
                let method = Method {
                    name: method_name.clone(),
                    declaring_class: id,
                    body,
                };
                (method_name, method)
            })
            .collect();

        tracing::trace!(class = %name, id = id.as_u64(), slots = slot, "class defined");

        Ok(Arc::new(ClassDescriptor {
            id,
            name,
            parent: self.parent,
            fields,
            slot_count: slot,
            methods,
            constructor: self.constructor,
            deep_copy: self.deep_copy,
            shims: self.shims,
        }))
    }
}
