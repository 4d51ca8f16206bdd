//! Field Enumerator
//!
//! Answers "which instance fields does this class level own?" for an object.
//! Ownership is exact: a field belongs to the level that declared it, static
//! fields are never reported, and dynamic properties belong to the
//! instance's runtime class.

use crate::class::{ClassDescriptor, FieldDescriptor};
use crate::object::ObjectRef;

/// Enumerate the instance fields of `object` owned by `owning_level`
///
/// - `Some(level)`: the non-static fields declared on exactly `level`, in slot
///   order, followed by the dynamic properties when `level` is the object's
///   runtime class. A level outside the object's chain yields nothing.
/// - `None`: every level of the chain, starting at the runtime class and
///   climbing to the root.
pub fn fields_of(object: &ObjectRef, owning_level: Option<&ClassDescriptor>) -> Vec<FieldDescriptor> {
    let class = object.class();
    match owning_level {
        Some(level) => {
            if !class.is_subclass_of(level) {
                return Vec::new();
            }
            level_fields(object, &class, level)
        }
        None => class
            .ancestors()
            .flat_map(|level| level_fields(object, &class, level))
            .collect(),
    }
}

fn level_fields(
    object: &ObjectRef,
    runtime_class: &ClassDescriptor,
    level: &ClassDescriptor,
) -> Vec<FieldDescriptor> {
    let mut fields: Vec<FieldDescriptor> = level
        .own_instance_fields()
        .filter(|field| field.declaring_class == level.id())
        .cloned()
        .collect();

    if level.id() == runtime_class.id() {
        fields.extend(
            object
                .dynamic_properties()
                .iter()
                .map(|(name, _)| FieldDescriptor::dynamic(name, runtime_class)),
        );
    }

    fields
}
