//! Error types for the field type system
//!
//! This module defines the errors raised while building or mutating typed
//! field values. We use `thiserror` for automatic `Display` and `Error`
//! trait implementations.

use crate::field::ScalarType;
use thiserror::Error;

/// Result type alias for field operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the field type system
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No field with the given dotted path exists
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// Scalar written with the wrong type
    #[error("Type mismatch on field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        /// Name of the field being written
        field: String,
        /// Declared scalar type of the field
        expected: ScalarType,
        /// Type of the value that was offered
        actual: ScalarType,
    },

    /// Operation needs a structure but the field is a scalar or array
    #[error("Field '{0}' is not a structure")]
    NotAStructure(String),

    /// Operation needs a scalar or array but the field is a structure
    #[error("Field '{0}' is a structure and cannot hold a value")]
    IsAStructure(String),

    /// Two members of one structure share a name
    #[error("Duplicate field name '{0}'")]
    DuplicateField(String),

    /// A field does not have the shape of a time stamp
    #[error("Invalid time stamp: {0}")]
    InvalidTimeStamp(String),
}
