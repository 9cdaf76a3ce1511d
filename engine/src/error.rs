//! Error types for the Vista engine.

use crate::{ColKey, DataType, ObjKey, TableKey};
use thiserror::Error;

/// All possible errors from the Vista engine.
///
/// Precondition violations (caller errors) come first. A detached row is an
/// observable state, not an error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    // Precondition violations
    #[error("view is not attached to a table (table {0} is gone)")]
    ViewDetached(TableKey),

    #[error("row {index} is detached (object {key} was deleted)")]
    RowDetached { index: usize, key: ObjKey },

    #[error("row index {index} out of range (size {size})")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("table not found: {0}")]
    TableNotFound(TableKey),

    #[error("table name not found: {0}")]
    TableNameNotFound(String),

    #[error("table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("table {0} is the target of links from other tables")]
    TableIsLinkTarget(TableKey),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("object not found: {key} in table {table}")]
    ObjectNotFound { table: TableKey, key: ObjKey },

    #[error("type mismatch for column '{column}': expected {expected}, got {got}")]
    TypeMismatch {
        column: String,
        expected: String,
        got: String,
    },

    #[error("null is not allowed in column '{0}'")]
    NullNotAllowed(String),

    #[error("column {0} has no search index")]
    MissingSearchIndex(ColKey),

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("link to missing object {key} in table {table}")]
    DanglingLink { table: TableKey, key: ObjKey },

    #[error("query over table {query} cannot be restricted by rows of table {restriction}")]
    RestrictionMismatch {
        query: TableKey,
        restriction: TableKey,
    },

    // Provenance errors
    #[error("operation '{operation}' is not supported by {provenance} views")]
    UnsupportedProvenance {
        operation: &'static str,
        provenance: &'static str,
    },

    // Handover errors
    #[error("handover resolution failed: {0}")]
    HandoverResolution(String),

    #[error("handover patch was already consumed")]
    PatchConsumed,

    #[error("invalid handover patch: {0}")]
    InvalidPatch(String),
}

impl Error {
    pub(crate) fn type_mismatch(column: &str, expected: DataType, got: impl ToString) -> Self {
        Error::TypeMismatch {
            column: column.to_string(),
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    /// Whether this error signals a caller error (bad index, wrong column type,
    /// unattached view and so on) rather than a handover failure.
    pub fn is_precondition_violation(&self) -> bool {
        !matches!(
            self,
            Error::HandoverResolution(_)
                | Error::PatchConsumed
                | Error::InvalidPatch(_)
                | Error::UnsupportedProvenance { .. }
        )
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::IndexOutOfRange { index: 4, size: 2 };
        assert_eq!(err.to_string(), "row index 4 out of range (size 2)");

        let err = Error::TypeMismatch {
            column: "age".into(),
            expected: "Int".into(),
            got: "String".into(),
        };
        assert_eq!(
            err.to_string(),
            "type mismatch for column 'age': expected Int, got String"
        );

        let err = Error::UnsupportedProvenance {
            operation: "query",
            provenance: "backlink",
        };
        assert_eq!(
            err.to_string(),
            "operation 'query' is not supported by backlink views"
        );
    }

    #[test]
    fn precondition_classification() {
        assert!(Error::ViewDetached(TableKey(1)).is_precondition_violation());
        assert!(Error::MissingSearchIndex(ColKey(0)).is_precondition_violation());
        assert!(!Error::PatchConsumed.is_precondition_violation());
        assert!(!Error::HandoverResolution("table 3".into()).is_precondition_violation());
    }
}
