//! Integration tests for the DeepClone and DeclaredFields derives

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use facsimile::{DeclaredFields, DeepClone, FacsimileError, StaticField};

#[derive(Debug, DeepClone, DeclaredFields)]
struct Base {
    items: Rc<RefCell<Vec<u32>>>,
    name: String,
}

#[derive(Debug, DeepClone, DeclaredFields)]
struct Middle {
    #[deep_clone(parent)]
    base: Base,
    index: HashMap<String, Rc<RefCell<u32>>>,
}

#[derive(Debug, DeepClone, DeclaredFields)]
struct Leaf {
    #[deep_clone(shallow)]
    config: Arc<String>,
    #[deep_clone(parent)]
    middle: Middle,
    items: Rc<RefCell<Vec<u32>>>,
}

fn leaf() -> Leaf {
    let mut index = HashMap::new();
    index.insert("a".to_string(), Rc::new(RefCell::new(1)));
    Leaf {
        config: Arc::new("cfg".to_string()),
        middle: Middle {
            base: Base {
                items: Rc::new(RefCell::new(vec![1, 2])),
                name: "base".to_string(),
            },
            index,
        },
        items: Rc::new(RefCell::new(vec![3])),
    }
}

// ============================================================================
// DeepClone
// ============================================================================

mod deep_clone {
    use super::*;

    #[test]
    fn test_every_level_reallocated() {
        let original = leaf();
        let copy = original.deep_clone().unwrap();

        assert!(!Rc::ptr_eq(&original.items, &copy.items));
        assert!(!Rc::ptr_eq(&original.middle.base.items, &copy.middle.base.items));
        assert!(!Rc::ptr_eq(&original.middle.index["a"], &copy.middle.index["a"]));

        copy.middle.base.items.borrow_mut().push(9);
        *copy.middle.index["a"].borrow_mut() = 5;
        assert_eq!(*original.middle.base.items.borrow(), vec![1, 2]);
        assert_eq!(*original.middle.index["a"].borrow(), 1);
        assert_eq!(copy.middle.base.name, "base");
    }

    #[test]
    fn test_shallow_field_shared() {
        let original = leaf();
        let copy = original.deep_clone().unwrap();
        assert!(Arc::ptr_eq(&original.config, &copy.config));
    }

    #[derive(Debug, DeepClone)]
    struct Logger {
        name: String,
        sink: Option<std::fs::File>,
    }

    #[test]
    fn test_file_handle_rejected() {
        let logger = Logger {
            name: "audit".to_string(),
            sink: Some(tempfile::tempfile().unwrap()),
        };
        assert_eq!(
            logger.deep_clone().unwrap_err(),
            FacsimileError::ResourceNotDuplicable { kind: "file".to_string() }
        );

        let detached = Logger { name: "audit".to_string(), sink: None };
        assert_eq!(detached.deep_clone().unwrap().name, "audit");
    }

    #[derive(Debug, PartialEq, DeepClone)]
    enum Shape {
        Empty,
        Circle(f64),
        Poly { points: Vec<(i32, i32)>, closed: bool },
    }

    #[test]
    fn test_enum_variants() {
        for shape in [
            Shape::Empty,
            Shape::Circle(1.5),
            Shape::Poly { points: vec![(0, 0), (1, 1)], closed: true },
        ] {
            assert_eq!(shape.deep_clone().unwrap(), shape);
        }
    }

    #[derive(Debug, DeepClone)]
    struct Wrapper<T>(Rc<T>, #[deep_clone(shallow)] Rc<T>);

    #[test]
    fn test_generic_tuple_struct() {
        let shared = Rc::new(7u8);
        let wrapper = Wrapper(Rc::new(1u8), shared.clone());
        let copy = wrapper.deep_clone().unwrap();
        assert!(!Rc::ptr_eq(&wrapper.0, &copy.0));
        assert!(Rc::ptr_eq(&shared, &copy.1));
    }
}

// ============================================================================
// DeclaredFields
// ============================================================================

mod declared_fields {
    use super::*;

    fn field(owner: &'static str, name: &'static str) -> StaticField {
        StaticField { name, owner }
    }

    #[test]
    fn test_own_fields_exclude_parent_link() {
        assert_eq!(Leaf::CLASS_NAME, "Leaf");
        assert_eq!(Leaf::OWN_FIELDS, &["config", "items"]);
        assert_eq!(Middle::OWN_FIELDS, &["index"]);
    }

    #[test]
    fn test_fields_walk_parent_chain() {
        assert_eq!(
            Leaf::fields(),
            vec![
                field("Leaf", "config"),
                field("Leaf", "items"),
                field("Middle", "index"),
                field("Base", "items"),
                field("Base", "name"),
            ]
        );
    }

    #[test]
    fn test_same_name_distinct_owners() {
        assert_eq!(Leaf::fields_of_level("Leaf"), vec![field("Leaf", "config"), field("Leaf", "items")]);
        assert_eq!(Leaf::fields_of_level("Base"), vec![field("Base", "items"), field("Base", "name")]);
        assert!(Leaf::fields_of_level("Other").is_empty());
    }
}
