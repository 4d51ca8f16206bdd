//! Facsimile: deep copies and capability guards for a reference-counted
//! object model
//!
//! This crate provides:
//! - **Object model**: classes with single inheritance, per-level field
//!   ownership and dynamic properties (`class`, `object`, `value` modules)
//! - **Copy engine**: value-graph duplication and the per-class deep-copy
//!   hook (`duplicate` module), driven by exact field ownership (`reflect`)
//! - **Capability shims**: opt-in guards that turn permissive fallbacks
//!   into errors (`shim` module)
//! - **Serialization**: JSON encoding guarded by the serialization shim
//!   (`serialize`, `registry` modules)
//! - **Static deep clone**: the `DeepClone` and `DeclaredFields` traits and
//!   derives for plain Rust types (`typed` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use facsimile::{ClassBuilder, ObjectRef, Value};
//!
//! let bag = ClassBuilder::new("Bag")
//!     .field("items")
//!     .install_deep_copy()
//!     .build()?;
//!
//! let original = ObjectRef::instantiate(&bag);
//! original.set("items", Value::array(vec![Value::Int(1)]))?;
//!
//! let copy = original.copy()?;
//! copy.get("items")?.as_array().unwrap().push(Value::Int(2));
//! assert_eq!(original.get("items")?.as_array().unwrap().len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod class;
pub mod defaults;
pub mod duplicate;
pub mod error;
pub mod object;
pub mod reflect;
pub mod registry;
pub mod serialize;
pub mod shim;
pub mod typed;
pub mod value;

pub use class::{
    Ancestors, ClassBuilder, ClassDescriptor, ClassId, CopyHook, FieldDefault, FieldDescriptor,
    Method, MethodBody, StorageKind, Visibility,
};
pub use duplicate::{duplicate, CopyOptions, DuplicationStats, Duplicator};
pub use error::{FacsimileError, FacsimileResult};
pub use object::ObjectRef;
pub use reflect::fields_of;
pub use registry::{global_registry, ClassRegistry};
pub use serialize::{serialize, unserialize};
pub use shim::{installing_class, Shims};
pub use typed::{DeclaredFields, DeepClone, StaticField};
pub use value::{ArrayRef, DictKey, DictRef, ResourceRef, Value};

#[cfg(feature = "derive")]
pub use facsimile_derive::{DeclaredFields, DeepClone};
