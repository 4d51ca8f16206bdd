//! Capability Shims
//!
//! Opt-in guards that turn the object model's permissive fallbacks into
//! explicit failures. A class installs any subset of them through
//! [`ClassBuilder::install_capability_shim`](crate::ClassBuilder::install_capability_shim);
//! subclasses inherit them.
//!
//! | Flag                 | Intercepts                                       |
//! |----------------------|--------------------------------------------------|
//! | `DYNAMIC_PROPERTIES` | get / set / isset / unset of undeclared names    |
//! | `DYNAMIC_METHODS`    | instance and static calls of undeclared methods  |
//! | `SERIALIZE`          | serialize (sleep) and unserialize (wakeup)       |
//! | `CLONE`              | the copy entry point                             |
//! | `CONSTRUCT`          | construction through the constructor             |

use std::fmt;

use crate::class::ClassDescriptor;
use crate::error::{FacsimileError, FacsimileResult};

/// Capability shim flags (bitflags)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Shims(u8);

impl Shims {
    /// No guards
    pub const NONE: Self = Self(0x00);
    /// Undefined-member guard
    pub const DYNAMIC_PROPERTIES: Self = Self(0x01);
    /// Undefined-method guard
    pub const DYNAMIC_METHODS: Self = Self(0x02);
    /// Serialization guard
    pub const SERIALIZE: Self = Self(0x04);
    /// Copy guard
    pub const CLONE: Self = Self(0x08);
    /// Construction guard
    pub const CONSTRUCT: Self = Self(0x10);

    // Common combinations
    /// DYNAMIC_PROPERTIES | DYNAMIC_METHODS | SERIALIZE
    pub const NO_MAGIC: Self = Self(0x07);
    /// Every guard
    pub const ALL: Self = Self(0x1F);

    /// Create from raw bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Get raw bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Check if every flag of `other` is set
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of flags
    pub const fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Intersection of flags
    pub const fn intersection(&self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Check if no flag is set
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Parse a single name or a `|`-separated list of names
    pub fn from_str(s: &str) -> Option<Self> {
        let mut shims = Self::NONE;
        for part in s.split('|') {
            let flag = match part.trim().to_uppercase().as_str() {
                "NONE" => Self::NONE,
                "DYNAMIC_PROPERTIES" => Self::DYNAMIC_PROPERTIES,
                "DYNAMIC_METHODS" => Self::DYNAMIC_METHODS,
                "SERIALIZE" => Self::SERIALIZE,
                "CLONE" => Self::CLONE,
                "CONSTRUCT" => Self::CONSTRUCT,
                "NO_MAGIC" => Self::NO_MAGIC,
                "ALL" => Self::ALL,
                _ => return None,
            };
            shims = shims.union(flag);
        }
        Some(shims)
    }

    /// Names of the individual flags that are set
    pub fn names(&self) -> Vec<&'static str> {
        [
            (Self::DYNAMIC_PROPERTIES, "DYNAMIC_PROPERTIES"),
            (Self::DYNAMIC_METHODS, "DYNAMIC_METHODS"),
            (Self::SERIALIZE, "SERIALIZE"),
            (Self::CLONE, "CLONE"),
            (Self::CONSTRUCT, "CONSTRUCT"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect()
    }
}

impl std::ops::BitOr for Shims {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for Shims {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for Shims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "Shims(NONE)");
        }
        write!(f, "Shims({})", self.names().join(" | "))
    }
}

// ============================================================================
// Guard checks
// ============================================================================

/// Find the nearest class in `class`'s chain (itself first) that installed
/// `shim`. Errors name this class, not the runtime class.
pub fn installing_class(class: &ClassDescriptor, shim: Shims) -> Option<&ClassDescriptor> {
    class.ancestors().find(|level| level.own_shims().contains(shim))
}

/// Fail with `UndefinedProperty` if the undefined-member guard is active
pub(crate) fn guard_property(class: &ClassDescriptor, name: &str) -> FacsimileResult<()> {
    match installing_class(class, Shims::DYNAMIC_PROPERTIES) {
        Some(guard) => {
            tracing::debug!(class = guard.name(), property = name, "undefined property rejected");
            Err(FacsimileError::UndefinedProperty {
                class: guard.name().to_string(),
                name: name.to_string(),
            })
        }
        None => Ok(()),
    }
}

/// Fail with `UndefinedMethod` if the undefined-method guard is active
pub(crate) fn guard_method(class: &ClassDescriptor, name: &str) -> FacsimileResult<()> {
    match installing_class(class, Shims::DYNAMIC_METHODS) {
        Some(guard) => {
            tracing::debug!(class = guard.name(), method = name, "undefined method rejected");
            Err(FacsimileError::UndefinedMethod {
                class: guard.name().to_string(),
                name: name.to_string(),
            })
        }
        None => Ok(()),
    }
}

/// Fail with `SerializeNotSupported` if the serialization guard is active
pub(crate) fn guard_serialize(class: &ClassDescriptor) -> FacsimileResult<()> {
    match installing_class(class, Shims::SERIALIZE) {
        Some(guard) => {
            tracing::debug!(class = guard.name(), "serialization rejected");
            Err(FacsimileError::SerializeNotSupported {
                class: guard.name().to_string(),
            })
        }
        None => Ok(()),
    }
}

/// Fail with `ConstructNotSupported` if the construction guard is active
pub(crate) fn guard_construct(class: &ClassDescriptor) -> FacsimileResult<()> {
    match installing_class(class, Shims::CONSTRUCT) {
        Some(guard) => {
            tracing::debug!(class = guard.name(), "construction rejected");
            Err(FacsimileError::ConstructNotSupported {
                class: guard.name().to_string(),
            })
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_operations() {
        let shims = Shims::DYNAMIC_PROPERTIES | Shims::CLONE;
        assert!(shims.contains(Shims::DYNAMIC_PROPERTIES));
        assert!(shims.contains(Shims::CLONE));
        assert!(!shims.contains(Shims::SERIALIZE));
        assert_eq!(shims.intersection(Shims::NO_MAGIC), Shims::DYNAMIC_PROPERTIES);
        assert!(Shims::NONE.is_empty());
    }

    #[test]
    fn test_no_magic_composition() {
        assert!(Shims::NO_MAGIC.contains(Shims::DYNAMIC_PROPERTIES));
        assert!(Shims::NO_MAGIC.contains(Shims::DYNAMIC_METHODS));
        assert!(Shims::NO_MAGIC.contains(Shims::SERIALIZE));
        assert!(!Shims::NO_MAGIC.contains(Shims::CLONE));
        assert!(!Shims::NO_MAGIC.contains(Shims::CONSTRUCT));
    }

    #[test]
    fn test_from_str() {
        assert_eq!(Shims::from_str("no_magic"), Some(Shims::NO_MAGIC));
        assert_eq!(
            Shims::from_str("CLONE | SERIALIZE"),
            Some(Shims::CLONE | Shims::SERIALIZE)
        );
        assert_eq!(Shims::from_str("NONE"), Some(Shims::NONE));
        assert_eq!(Shims::from_str("EVERYTHING"), None);
    }

    #[test]
    fn test_from_bits_masks_unknown() {
        assert_eq!(Shims::from_bits(0xFF), Shims::ALL);
    }

    #[test]
    fn test_debug_lists_names() {
        let shims = Shims::SERIALIZE | Shims::CLONE;
        assert_eq!(format!("{:?}", shims), "Shims(SERIALIZE | CLONE)");
        assert_eq!(format!("{:?}", Shims::NONE), "Shims(NONE)");
    }
}
