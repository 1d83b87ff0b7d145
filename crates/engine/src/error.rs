//! Error types for the record engine
//!
//! Contract violations (a field or node that is not part of the record,
//! use of a torn-down record, an unbalanced group put, locking a record
//! against itself) are reported as distinct variants so callers can tell them apart
//! from recoverable failures. A subscriber that has gone away is never an
//! error: it is skipped.

use crate::record::NodeId;
use thiserror::Error;

/// Result type alias for record operations
pub type RecordResult<T> = std::result::Result<T, RecordError>;

/// Errors raised by records and the database registry
#[derive(Debug, Error)]
pub enum RecordError {
    /// A field offset does not belong to this record's field tree
    #[error("record {record}: field at offset {offset} not in record")]
    FieldNotInRecord {
        /// Record that was searched
        record: String,
        /// Offset that could not be located
        offset: usize,
    },

    /// A node id was minted by a different record
    #[error("record {record}: {node} not in record")]
    NodeNotInRecord {
        /// Record the id was used with
        record: String,
        /// The foreign id
        node: NodeId,
    },

    /// The record has already been torn down
    #[error("record {0} has been torn down")]
    TornDown(String),

    /// `end_group_put` without a matching `begin_group_put`
    #[error("record {0}: end_group_put without matching begin_group_put")]
    GroupPutUnderflow(String),

    /// A record was asked to lock itself as the "other" record
    #[error("record {0}: cannot lock a record against itself")]
    SameRecord(String),

    /// Record construction failed; no record was created
    #[error("record {record}: initialization failed: {reason}")]
    Initialization {
        /// Name of the record being created
        record: String,
        /// What went wrong
        reason: String,
    },

    /// A record with this name is already registered
    #[error("record {0} already exists")]
    DuplicateRecord(String),

    /// A dotted field name does not exist in the record
    #[error("record {record}: unknown field '{field}'")]
    UnknownField {
        /// Record that was searched
        record: String,
        /// Dotted name that was not found
        field: String,
    },

    /// Configuration could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// Error from the field type system
    #[error(transparent)]
    Field(#[from] pvdatabase_core::Error),
}

impl RecordError {
    /// Whether this error signals a programming error by the caller
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            RecordError::FieldNotInRecord { .. }
                | RecordError::NodeNotInRecord { .. }
                | RecordError::TornDown(_)
                | RecordError::GroupPutUnderflow(_)
                | RecordError::SameRecord(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_not_in_record_display() {
        let err = RecordError::FieldNotInRecord {
            record: "rec".to_string(),
            offset: 42,
        };
        let msg = err.to_string();
        assert!(msg.contains("rec"));
        assert!(msg.contains("42"));
        assert!(msg.contains("not in record"));
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_from_field_error() {
        let err: RecordError = pvdatabase_core::Error::FieldNotFound("x".to_string()).into();
        assert!(matches!(err, RecordError::Field(_)));
        assert!(!err.is_contract_violation());
    }

    #[test]
    fn test_initialization_not_contract_violation() {
        let err = RecordError::Initialization {
            record: String::new(),
            reason: "empty name".to_string(),
        };
        assert!(!err.is_contract_violation());
        assert!(err.to_string().contains("empty name"));
    }
}
