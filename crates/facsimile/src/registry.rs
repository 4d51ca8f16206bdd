//! Class registry for resolving class names during unserialization

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::class::{ClassDescriptor, ClassId};
use crate::error::{FacsimileError, FacsimileResult};

/// Name-indexed set of class descriptors
#[derive(Debug, Default)]
pub struct ClassRegistry {
    /// Classes in registration order
    classes: Vec<Arc<ClassDescriptor>>,
    /// Class name to index mapping
    name_to_index: FxHashMap<String, usize>,
}

impl ClassRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class; names are unique
    pub fn register(&mut self, class: Arc<ClassDescriptor>) -> FacsimileResult<ClassId> {
        if self.name_to_index.contains_key(class.name()) {
            return Err(FacsimileError::DuplicateClass(class.name().to_string()));
        }
        let id = class.id();
        tracing::trace!(class = class.name(), id = id.as_u64(), "class registered");
        self.name_to_index.insert(class.name().to_string(), self.classes.len());
        self.classes.push(class);
        Ok(id)
    }

    /// Register a class and every ancestor not yet known
    pub fn register_chain(&mut self, class: &Arc<ClassDescriptor>) -> FacsimileResult<ClassId> {
        if let Some(parent) = class.parent() {
            if !self.contains(parent.name()) {
                self.register_chain(parent)?;
            }
        }
        self.register(Arc::clone(class))
    }

    /// Get class by ID
    pub fn get(&self, id: ClassId) -> Option<&Arc<ClassDescriptor>> {
        self.classes.iter().find(|class| class.id() == id)
    }

    /// Get class by name
    pub fn get_by_name(&self, name: &str) -> Option<&Arc<ClassDescriptor>> {
        self.name_to_index
            .get(name)
            .and_then(|index| self.classes.get(*index))
    }

    /// Check if a class with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Iterate over all classes in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ClassDescriptor>> {
        self.classes.iter()
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if no class is registered
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

static GLOBAL_REGISTRY: Lazy<RwLock<ClassRegistry>> = Lazy::new(|| RwLock::new(ClassRegistry::new()));

/// Process-wide registry shared by hosts that do not keep their own
pub fn global_registry() -> &'static RwLock<ClassRegistry> {
    &GLOBAL_REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ClassRegistry::new();
        let point = ClassBuilder::new("Point").field("x").build().unwrap();

        let id = registry.register(Arc::clone(&point)).unwrap();
        assert_eq!(id, point.id());
        assert_eq!(registry.get_by_name("Point").unwrap().id(), id);
        assert_eq!(registry.get(id).unwrap().name(), "Point");
        assert_eq!(registry.len(), 1);
        assert!(registry.get_by_name("Circle").is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = ClassRegistry::new();
        registry
            .register(ClassBuilder::new("Point").build().unwrap())
            .unwrap();
        let err = registry
            .register(ClassBuilder::new("Point").build().unwrap())
            .unwrap_err();
        assert_eq!(err, FacsimileError::DuplicateClass("Point".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_chain() {
        let mut registry = ClassRegistry::new();
        let base = ClassBuilder::new("Base").build().unwrap();
        let mid = ClassBuilder::new("Mid").extends(&base).build().unwrap();
        let leaf = ClassBuilder::new("Leaf").extends(&mid).build().unwrap();

        registry.register(Arc::clone(&base)).unwrap();
        registry.register_chain(&leaf).unwrap();

        let names: Vec<_> = registry.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["Base", "Mid", "Leaf"]);
    }

    #[test]
    fn test_global_registry() {
        let class = ClassBuilder::new("GlobalRegistryProbe").build().unwrap();
        global_registry().write().register(class).unwrap();
        assert!(global_registry().read().contains("GlobalRegistryProbe"));
    }
}
