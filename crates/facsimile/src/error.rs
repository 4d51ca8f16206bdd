//! Error taxonomy
//!
//! Every variant is a contract violation detected at the call site. Nothing
//! in this crate catches or retries them.

use thiserror::Error;

/// Errors raised by the copy engine, the capability guards and the
/// serialization lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FacsimileError {
    /// An opaque host handle was reached while duplicating a value graph
    #[error("Resources cannot be cloned ({kind})")]
    ResourceNotDuplicable {
        /// Resource kind label (e.g. "file", "socket")
        kind: String,
    },

    /// Access to an undeclared property on a guarded class
    #[error("Undefined property: {class}::{name}")]
    UndefinedProperty {
        /// Class that installed the guard
        class: String,
        /// Property name
        name: String,
    },

    /// Invocation of an undeclared method on a guarded class
    #[error("Call to undefined method {class}::{name}()")]
    UndefinedMethod {
        /// Class that installed the guard
        class: String,
        /// Method name
        name: String,
    },

    /// A declared instance method invoked without an instance
    #[error("Non-static method {class}::{name}() cannot be called statically")]
    NonStaticCall {
        /// Class the call was made on
        class: String,
        /// Method name
        name: String,
    },

    /// Serialization (sleep or wakeup) of a guarded class
    #[error("Serialization of class {class} is not supported")]
    SerializeNotSupported {
        /// Class that installed the guard
        class: String,
    },

    /// Copy of a guarded class
    #[error("Clone of class {class} is not supported")]
    CloneNotSupported {
        /// Class that installed the guard
        class: String,
    },

    /// Construction of a guarded class
    #[error("Construction of {class} is not supported")]
    ConstructNotSupported {
        /// Class that installed the guard
        class: String,
    },

    /// A single duplication or encoding nested deeper than allowed
    #[error("Maximum traversal depth of {limit} exceeded (cyclic or unbounded graph?)")]
    DepthLimitExceeded {
        /// Configured limit
        limit: usize,
    },

    /// A class asked for both a deep-copy hook and the copy guard
    #[error("Class {class} cannot install both a deep-copy hook and the clone guard")]
    ConflictingCopyPolicy {
        /// Offending class
        class: String,
    },

    /// A class with this name is already registered
    #[error("Class already registered: {0}")]
    DuplicateClass(String),

    /// No class with this name is registered
    #[error("Unknown class: {0}")]
    UnknownClass(String),

    /// An opaque host handle was reached while serializing
    #[error("Resources cannot be serialized ({kind})")]
    ResourceNotSerializable {
        /// Resource kind label
        kind: String,
    },

    /// Encoded input does not describe a value
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),
}

/// Result alias used throughout the crate
pub type FacsimileResult<T> = Result<T, FacsimileError>;
