//! Static deep clone
//!
//! The compile-time counterpart of the runtime copy engine. `DeepClone`
//! produces a copy that shares no mutable state with the original: every
//! `Rc`/`Arc`/`RefCell` is reallocated, and OS handles refuse to be copied.
//! `DeclaredFields` exposes per-type field metadata tagged with the owning
//! type, with the embedded base (`#[deep_clone(parent)]`) playing the role of
//! the parent class.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::{BuildHasher, Hash};
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{FacsimileError, FacsimileResult};
use crate::object::ObjectRef;
use crate::value::Value;

/// Fallible deep copy
pub trait DeepClone: Sized {
    /// Copy `self` and everything it owns or shares
    fn deep_clone(&self) -> FacsimileResult<Self>;
}

macro_rules! impl_deep_clone_copy {
    ($($ty:ty),* $(,)?) => {
        $(
            impl DeepClone for $ty {
                #[inline]
                fn deep_clone(&self) -> FacsimileResult<Self> {
                    Ok(*self)
                }
            }
        )*
    };
}

impl_deep_clone_copy!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char, ()
);

impl DeepClone for String {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        Ok(self.clone())
    }
}

impl DeepClone for Rc<str> {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        Ok(Rc::from(&**self))
    }
}

impl DeepClone for Arc<str> {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        Ok(Arc::from(&**self))
    }
}

impl<T: DeepClone> DeepClone for Option<T> {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        self.as_ref().map(T::deep_clone).transpose()
    }
}

impl<T: DeepClone, E: DeepClone> DeepClone for Result<T, E> {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        Ok(match self {
            Ok(value) => Ok(value.deep_clone()?),
            Err(err) => Err(err.deep_clone()?),
        })
    }
}

impl<T: DeepClone> DeepClone for Vec<T> {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        self.iter().map(T::deep_clone).collect()
    }
}

impl<T: DeepClone> DeepClone for VecDeque<T> {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        self.iter().map(T::deep_clone).collect()
    }
}

impl<T: DeepClone, const N: usize> DeepClone for [T; N] {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        let items = self.iter().map(T::deep_clone).collect::<FacsimileResult<Vec<_>>>()?;
        match items.try_into() {
            Ok(array) => Ok(array),
            Err(_) => unreachable!("collected exactly N items"),
        }
    }
}

impl<K, V, S> DeepClone for HashMap<K, V, S>
where
    K: DeepClone + Eq + Hash,
    V: DeepClone,
    S: BuildHasher + Clone,
{
    fn deep_clone(&self) -> FacsimileResult<Self> {
        let mut map = HashMap::with_capacity_and_hasher(self.len(), self.hasher().clone());
        for (key, value) in self {
            map.insert(key.deep_clone()?, value.deep_clone()?);
        }
        Ok(map)
    }
}

impl<K: DeepClone + Ord, V: DeepClone> DeepClone for BTreeMap<K, V> {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        let mut map = BTreeMap::new();
        for (key, value) in self {
            map.insert(key.deep_clone()?, value.deep_clone()?);
        }
        Ok(map)
    }
}

impl<T: DeepClone> DeepClone for Box<T> {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        Ok(Box::new((**self).deep_clone()?))
    }
}

impl<T: DeepClone> DeepClone for Rc<T> {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        Ok(Rc::new((**self).deep_clone()?))
    }
}

impl<T: DeepClone> DeepClone for Arc<T> {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        Ok(Arc::new((**self).deep_clone()?))
    }
}

impl<T: DeepClone> DeepClone for RefCell<T> {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        Ok(RefCell::new(self.borrow().deep_clone()?))
    }
}

impl<T: Copy> DeepClone for Cell<T> {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        Ok(Cell::new(self.get()))
    }
}

impl<T: DeepClone> DeepClone for parking_lot::Mutex<T> {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        Ok(parking_lot::Mutex::new(self.lock().deep_clone()?))
    }
}

impl<T: DeepClone> DeepClone for parking_lot::RwLock<T> {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        Ok(parking_lot::RwLock::new(self.read().deep_clone()?))
    }
}

macro_rules! impl_deep_clone_tuple {
    ($($name:ident),+) => {
        impl<$($name: DeepClone),+> DeepClone for ($($name,)+) {
            #[allow(non_snake_case)]
            fn deep_clone(&self) -> FacsimileResult<Self> {
                let ($($name,)+) = self;
                Ok(($($name.deep_clone()?,)+))
            }
        }
    };
}

impl_deep_clone_tuple!(A);
impl_deep_clone_tuple!(A, B);
impl_deep_clone_tuple!(A, B, C);
impl_deep_clone_tuple!(A, B, C, D);

impl DeepClone for Value {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        crate::duplicate::duplicate(self)
    }
}

impl DeepClone for ObjectRef {
    fn deep_clone(&self) -> FacsimileResult<Self> {
        self.copy()
    }
}

macro_rules! impl_deep_clone_resource {
    ($($ty:ty => $kind:literal),* $(,)?) => {
        $(
            impl DeepClone for $ty {
                fn deep_clone(&self) -> FacsimileResult<Self> {
                    tracing::debug!(kind = $kind, "OS handle reached during deep clone");
                    Err(FacsimileError::ResourceNotDuplicable {
                        kind: $kind.to_string(),
                    })
                }
            }
        )*
    };
}

impl_deep_clone_resource!(
    std::fs::File => "file",
    std::net::TcpStream => "tcp-stream",
    std::net::TcpListener => "tcp-listener",
    std::net::UdpSocket => "udp-socket",
);

// ============================================================================
// Declared fields
// ============================================================================

/// A field known at compile time, tagged with the type that declares it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StaticField {
    /// Field name
    pub name: &'static str,
    /// Declaring type
    pub owner: &'static str,
}

/// Compile-time field metadata for a type and its embedded bases
pub trait DeclaredFields {
    /// Declaring type name
    const CLASS_NAME: &'static str;

    /// Fields declared on this type, in declaration order, excluding the
    /// embedded base
    const OWN_FIELDS: &'static [&'static str];

    /// Fields of this type followed by those of every embedded base
    fn fields() -> Vec<StaticField> {
        Self::own_fields()
    }

    /// Fields of this type only
    fn own_fields() -> Vec<StaticField> {
        Self::OWN_FIELDS
            .iter()
            .map(|&name| StaticField {
                name,
                owner: Self::CLASS_NAME,
            })
            .collect()
    }

    /// Fields declared by the level named `owner`
    fn fields_of_level(owner: &str) -> Vec<StaticField> {
        Self::fields()
            .into_iter()
            .filter(|field| field.owner == owner)
            .collect()
    }
}
