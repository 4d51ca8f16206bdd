//! Value Duplicator and Per-Class Clone Hook
//!
//! [`Duplicator::copy_object`] is the runtime copy primitive: a shallow,
//! field-for-field copy followed by the clone-hook chain of the object's
//! class. A deep-copy hook delegates to the nearest hooked ancestor first,
//! then duplicates the fields of the levels it owns: its own level plus
//! every hookless ancestor level below that next hooked ancestor. Each field
//! of a chain is therefore duplicated by exactly one hook.
//!
//! ## Duplication rules (in priority order)
//!
//! | Value    | Result                                          |
//! |----------|-------------------------------------------------|
//! | object   | `copy_object` (runs that object's hooks)        |
//! | array    | fresh array, every element duplicated           |
//! | dict     | fresh dict, same keys, every value duplicated   |
//! | resource | `ResourceNotDuplicable`                         |
//! | scalar   | returned unchanged                              |
//!
//! Failures abort the whole operation; the partially built copy is dropped.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::class::{ClassDescriptor, CopyHook, FieldDescriptor};
use crate::defaults::{DEFAULT_MAX_DEPTH, DEFAULT_PRESERVE_IDENTITY};
use crate::error::{FacsimileError, FacsimileResult};
use crate::object::ObjectRef;
use crate::reflect::fields_of;
use crate::value::{ArrayRef, DictRef, Value};

/// Configuration for one duplication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyOptions {
    /// Maximum nesting of objects and containers (default: 256)
    pub max_depth: usize,
    /// Map every original node to a single duplicate, preserving sharing
    /// and cycles inside the copy (default: false)
    pub preserve_identity: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        CopyOptions {
            max_depth: DEFAULT_MAX_DEPTH,
            preserve_identity: DEFAULT_PRESERVE_IDENTITY,
        }
    }
}

/// Counters accumulated over a duplicator's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicationStats {
    /// Objects copied
    pub objects: usize,
    /// Arrays and dicts rebuilt
    pub containers: usize,
    /// Deep-copy hooks run
    pub hooks: usize,
}

/// Duplication context: traversal depth, visited map and counters
#[derive(Debug, Default)]
pub struct Duplicator {
    options: CopyOptions,
    depth: usize,
    /// Original node identity -> (original, duplicate). The original is kept
    /// so its address cannot be reused while the map is alive.
    visited: FxHashMap<usize, (Value, Value)>,
    stats: DuplicationStats,
}

impl Duplicator {
    /// Create a duplicator with the given options
    pub fn new(options: CopyOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Active options
    pub fn options(&self) -> &CopyOptions {
        &self.options
    }

    /// Counters so far
    pub fn stats(&self) -> DuplicationStats {
        self.stats
    }

    /// Duplicate a value graph
    pub fn duplicate(&mut self, value: &Value) -> FacsimileResult<Value> {
        self.begin();
        self.duplicate_value(value)
    }

    /// The runtime copy primitive: copy guard, shallow copy, clone hooks
    pub fn copy_object(&mut self, object: &ObjectRef) -> FacsimileResult<ObjectRef> {
        self.begin();
        self.copy_object_inner(object)
    }

    /// Duplicate in place the fields `fields_of(object, owning_level)` reports
    pub fn duplicate_fields(
        &mut self,
        object: &ObjectRef,
        owning_level: Option<&ClassDescriptor>,
    ) -> FacsimileResult<()> {
        self.begin();
        for field in fields_of(object, owning_level) {
            self.duplicate_field(object, &field)?;
        }
        Ok(())
    }

    /// Reset the per-operation state at the start of a top-level call
    fn begin(&mut self) {
        if self.depth == 0 {
            self.visited.clear();
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> FacsimileResult<T>) -> FacsimileResult<T> {
        if self.depth >= self.options.max_depth {
            tracing::debug!(limit = self.options.max_depth, "duplication depth limit reached");
            return Err(FacsimileError::DepthLimitExceeded {
                limit: self.options.max_depth,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn lookup(&self, original: &Value) -> Option<Value> {
        if !self.options.preserve_identity {
            return None;
        }
        let id = original.node_id()?;
        self.visited.get(&id).map(|(_, duplicate)| duplicate.clone())
    }

    fn remember(&mut self, original: Value, duplicate: Value) {
        if !self.options.preserve_identity {
            return;
        }
        if let Some(id) = original.node_id() {
            self.visited.insert(id, (original, duplicate));
        }
    }

    fn duplicate_value(&mut self, value: &Value) -> FacsimileResult<Value> {
        match value {
            Value::Object(object) => Ok(Value::Object(self.copy_object_inner(object)?)),
            Value::Array(array) => self.duplicate_array(array),
            Value::Dict(dict) => self.duplicate_dict(dict),
            Value::Resource(resource) => {
                tracing::debug!(kind = resource.kind(), "resource reached during duplication");
                Err(FacsimileError::ResourceNotDuplicable {
                    kind: resource.kind().to_string(),
                })
            }
            scalar => Ok(scalar.clone()),
        }
    }

    fn duplicate_array(&mut self, array: &ArrayRef) -> FacsimileResult<Value> {
        let original = Value::Array(array.clone());
        if let Some(existing) = self.lookup(&original) {
            return Ok(existing);
        }
        self.nested(|this| {
            let items = array.to_vec();
            let fresh = ArrayRef::new(Vec::with_capacity(items.len()));
            this.remember(original, Value::Array(fresh.clone()));
            for item in &items {
                let duplicate = this.duplicate_value(item)?;
                fresh.push(duplicate);
            }
            this.stats.containers += 1;
            tracing::trace!(len = items.len(), "array duplicated");
            Ok(Value::Array(fresh))
        })
    }

    fn duplicate_dict(&mut self, dict: &DictRef) -> FacsimileResult<Value> {
        let original = Value::Dict(dict.clone());
        if let Some(existing) = self.lookup(&original) {
            return Ok(existing);
        }
        self.nested(|this| {
            let entries = dict.entries();
            let fresh = DictRef::new();
            this.remember(original, Value::Dict(fresh.clone()));
            for (key, value) in &entries {
                let duplicate = this.duplicate_value(value)?;
                fresh.insert(key.clone(), duplicate);
            }
            this.stats.containers += 1;
            tracing::trace!(len = entries.len(), "dict duplicated");
            Ok(Value::Dict(fresh))
        })
    }

    fn copy_object_inner(&mut self, original: &ObjectRef) -> FacsimileResult<ObjectRef> {
        if let Some(Value::Object(existing)) = self.lookup(&Value::Object(original.clone())) {
            return Ok(existing);
        }

        let class = original.class();
        let effective = class.effective_copy_hook();
        if let Some((level, CopyHook::Forbidden)) = effective {
            tracing::debug!(class = level.name(), "copy rejected");
            return Err(FacsimileError::CloneNotSupported {
                class: level.name().to_string(),
            });
        }

        self.nested(|this| {
            let copy = original.shallow_copy();
            this.remember(Value::Object(original.clone()), Value::Object(copy.clone()));
            this.stats.objects += 1;
            tracing::trace!(
                class = class.name(),
                from = original.object_id(),
                to = copy.object_id(),
                "object copied"
            );

            if let Some((level, CopyHook::Deep)) = effective {
                this.run_deep_hook(&copy, level)?;
            }
            Ok(copy)
        })
    }

    /// Run the deep-copy hook installed on `level` against `copy`
    fn run_deep_hook(&mut self, copy: &ObjectRef, level: &ClassDescriptor) -> FacsimileResult<()> {
        let ancestor_hook = level.parent().and_then(|parent| parent.effective_copy_hook());

        match ancestor_hook {
            Some((ancestor, CopyHook::Deep)) => self.run_deep_hook(copy, ancestor)?,
            Some((ancestor, CopyHook::Forbidden)) => {
                tracing::debug!(class = ancestor.name(), "copy rejected by ancestor");
                return Err(FacsimileError::CloneNotSupported {
                    class: ancestor.name().to_string(),
                });
            }
            None => {}
        }

        self.stats.hooks += 1;
        tracing::debug!(class = level.name(), object = copy.object_id(), "running deep-copy hook");

        let stop = ancestor_hook.map(|(ancestor, _)| ancestor.id());
        for owned in level.ancestors().take_while(|l| Some(l.id()) != stop) {
            for field in fields_of(copy, Some(owned)) {
                self.duplicate_field(copy, &field)?;
            }
        }
        Ok(())
    }

    fn duplicate_field(&mut self, object: &ObjectRef, field: &FieldDescriptor) -> FacsimileResult<()> {
        let value = match object.read_field(field) {
            Some(value) => value,
            None => return Ok(()),
        };
        if value.is_scalar() {
            return Ok(());
        }
        let duplicate = self.duplicate_value(&value)?;
        object.write_field(field, duplicate);
        Ok(())
    }
}

/// Duplicate a value graph with default [`CopyOptions`]
pub fn duplicate(value: &Value) -> FacsimileResult<Value> {
    Duplicator::default().duplicate(value)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::class::ClassBuilder;
    use crate::shim::Shims;
    use crate::value::{DictKey, ResourceRef};

    #[test]
    fn test_scalars_pass_through() {
        for value in [
            Value::Null,
            Value::Bool(true),
            Value::Int(-3),
            Value::Float(1.5),
            Value::str("text"),
        ] {
            assert_eq!(duplicate(&value).unwrap(), value);
        }
    }

    #[test]
    fn test_nested_containers_are_fresh() {
        let inner = Value::array(vec![Value::Int(1), Value::Int(2)]);
        let dict = DictRef::new();
        dict.insert("inner".into(), inner.clone());
        let outer = Value::array(vec![Value::Dict(dict.clone()), Value::str("s")]);

        let copy = duplicate(&outer).unwrap();
        assert!(copy.deep_eq(&outer));
        assert!(!copy.same_node(&outer));

        let copied_dict = copy.as_array().unwrap().get(0).unwrap();
        assert!(!copied_dict.same_node(&Value::Dict(dict)));
        let copied_inner = copied_dict.as_dict().unwrap().get(&"inner".into()).unwrap();
        assert!(!copied_inner.same_node(&inner));
    }

    #[test]
    fn test_resource_rejected() {
        let value = Value::array(vec![
            Value::Int(1),
            Value::Resource(ResourceRef::new("stream", ())),
        ]);
        let err = duplicate(&value).unwrap_err();
        assert_eq!(
            err,
            FacsimileError::ResourceNotDuplicable { kind: "stream".to_string() }
        );
    }

    #[test]
    fn test_object_without_hook_is_shallow() {
        let class = ClassBuilder::new("Plain").field("items").build().unwrap();
        let obj = ObjectRef::instantiate(&class);
        obj.set("items", Value::array(vec![])).unwrap();

        let copy = obj.copy().unwrap();
        assert!(!copy.ptr_eq(&obj));
        assert!(copy.get("items").unwrap().same_node(&obj.get("items").unwrap()));
    }

    #[test]
    fn test_copy_guard() {
        let class = ClassBuilder::new("NotCloneable")
            .install_capability_shim(Shims::CLONE)
            .build()
            .unwrap();
        let obj = ObjectRef::instantiate(&class);
        let err = obj.copy().unwrap_err();
        assert_eq!(err.to_string(), "Clone of class NotCloneable is not supported");

        let nested = Value::array(vec![Value::Object(obj)]);
        assert!(matches!(
            duplicate(&nested),
            Err(FacsimileError::CloneNotSupported { .. })
        ));
    }

    #[test]
    fn test_deep_hook_under_forbidding_ancestor() {
        let base = ClassBuilder::new("Sealed")
            .install_capability_shim(Shims::CLONE)
            .build()
            .unwrap();
        let child = ClassBuilder::new("Child").extends(&base).install_deep_copy().build().unwrap();
        let err = ObjectRef::instantiate(&child).copy().unwrap_err();
        assert_eq!(
            err,
            FacsimileError::CloneNotSupported { class: "Sealed".to_string() }
        );
    }

    #[test]
    fn test_depth_limit_on_cycle() {
        let arr = ArrayRef::new(vec![]);
        arr.push(Value::Array(arr.clone()));

        let mut dup = Duplicator::new(CopyOptions { max_depth: 16, preserve_identity: false });
        let err = dup.duplicate(&Value::Array(arr.clone())).unwrap_err();
        assert_eq!(err, FacsimileError::DepthLimitExceeded { limit: 16 });

        // Depth is restored after the failure, so the duplicator stays usable
        assert_eq!(dup.duplicate(&Value::Int(1)).unwrap(), Value::Int(1));

        // Break the cycle so the test does not leak
        arr.borrow_mut().clear();
    }

    #[test]
    fn test_preserve_identity_copies_cycle() {
        let arr = ArrayRef::new(vec![Value::Int(7)]);
        arr.push(Value::Array(arr.clone()));

        let mut dup = Duplicator::new(CopyOptions { preserve_identity: true, ..CopyOptions::default() });
        let copy = dup.duplicate(&Value::Array(arr.clone())).unwrap();
        let copy_arr = copy.as_array().unwrap().clone();

        assert!(!copy_arr.ptr_eq(&arr));
        let back = copy_arr.get(1).unwrap();
        assert!(back.as_array().unwrap().ptr_eq(&copy_arr));
        assert_eq!(copy_arr.get(0), Some(Value::Int(7)));

        arr.borrow_mut().clear();
        copy_arr.borrow_mut().clear();
    }

    #[test]
    fn test_shared_node_split_without_identity_tracking() {
        let shared = Value::array(vec![Value::Int(1)]);
        let root = Value::array(vec![shared.clone(), shared.clone()]);

        let plain = duplicate(&root).unwrap();
        let items = plain.as_array().unwrap().to_vec();
        assert!(!items[0].same_node(&items[1]));

        let mut tracking = Duplicator::new(CopyOptions { preserve_identity: true, ..CopyOptions::default() });
        let tracked = tracking.duplicate(&root).unwrap();
        let items = tracked.as_array().unwrap().to_vec();
        assert!(items[0].same_node(&items[1]));
        assert!(!items[0].same_node(&shared));
    }

    #[test]
    fn test_visited_map_reset_between_calls() {
        let value = Value::array(vec![Value::Int(1)]);
        let mut dup = Duplicator::new(CopyOptions { preserve_identity: true, ..CopyOptions::default() });
        let first = dup.duplicate(&value).unwrap();
        let second = dup.duplicate(&value).unwrap();
        assert!(!first.same_node(&second));
        assert_eq!(dup.stats().containers, 2);
    }

    #[test]
    fn test_dict_keys_kept() {
        let dict = DictRef::from_entries(vec![
            (DictKey::Int(3), Value::array(vec![])),
            (DictKey::from("k"), Value::Int(1)),
        ]);
        let copy = duplicate(&Value::Dict(dict.clone())).unwrap();
        assert_eq!(copy.as_dict().unwrap().keys(), dict.keys());
    }

    /// `Base { a }` <- `Child { b }`, plus a dynamic `extra`, every slot holding an array
    fn two_level_object() -> (Arc<ClassDescriptor>, ObjectRef) {
        let base = ClassBuilder::new("Base").field("a").build().unwrap();
        let child = ClassBuilder::new("Child").extends(&base).field("b").build().unwrap();
        let obj = ObjectRef::instantiate(&child);
        obj.set("a", Value::array(vec![Value::Int(1)])).unwrap();
        obj.set("b", Value::array(vec![Value::Int(2)])).unwrap();
        obj.set("extra", Value::array(vec![Value::Int(3)])).unwrap();
        (base, obj)
    }

    fn snapshot(obj: &ObjectRef) -> Vec<Value> {
        ["a", "b", "extra"].iter().map(|name| obj.get(name).unwrap()).collect()
    }

    #[test]
    fn test_duplicate_fields_of_one_level() {
        let (base, obj) = two_level_object();
        let before = snapshot(&obj);

        let mut dup = Duplicator::default();
        dup.duplicate_fields(&obj, Some(&*base)).unwrap();
        let after = snapshot(&obj);

        assert!(!after[0].same_node(&before[0]));
        assert!(after[0].deep_eq(&before[0]));
        assert!(after[1].same_node(&before[1]));
        assert!(after[2].same_node(&before[2]));
        assert_eq!(dup.stats().containers, 1);
    }

    #[test]
    fn test_duplicate_fields_of_runtime_level_includes_dynamic() {
        let (_, obj) = two_level_object();
        let before = snapshot(&obj);
        let runtime = obj.class();

        Duplicator::default().duplicate_fields(&obj, Some(&*runtime)).unwrap();
        let after = snapshot(&obj);

        assert!(after[0].same_node(&before[0]));
        assert!(!after[1].same_node(&before[1]));
        assert!(!after[2].same_node(&before[2]));
    }

    #[test]
    fn test_duplicate_fields_of_whole_chain() {
        let (_, obj) = two_level_object();
        obj.set("count", Value::Int(9)).unwrap();
        let before = snapshot(&obj);

        let mut dup = Duplicator::default();
        dup.duplicate_fields(&obj, None).unwrap();
        let after = snapshot(&obj);

        for (old, new) in before.iter().zip(&after) {
            assert!(!new.same_node(old));
            assert!(new.deep_eq(old));
        }
        assert_eq!(obj.get("count").unwrap(), Value::Int(9));
        assert_eq!(dup.stats().containers, 3);
        assert_eq!(dup.stats().hooks, 0);
    }

    #[test]
    fn test_duplicate_fields_outside_chain_is_noop() {
        let (_, obj) = two_level_object();
        let before = snapshot(&obj);
        let stranger = ClassBuilder::new("Stranger").field("a").build().unwrap();

        Duplicator::default().duplicate_fields(&obj, Some(&*stranger)).unwrap();
        for (old, new) in before.iter().zip(&snapshot(&obj)) {
            assert!(new.same_node(old));
        }
    }

    #[test]
    fn test_duplicate_fields_propagates_resource_error() {
        let (_, obj) = two_level_object();
        obj.set("b", Value::Resource(ResourceRef::new("stream", ()))).unwrap();
        assert!(matches!(
            Duplicator::default().duplicate_fields(&obj, None),
            Err(FacsimileError::ResourceNotDuplicable { .. })
        ));
    }

    #[test]
    fn test_options_from_json() {
        let options: CopyOptions = serde_json::from_str(r#"{"preserve_identity": true}"#).unwrap();
        assert!(options.preserve_identity);
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);

        let options: CopyOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, CopyOptions::default());
    }
}
