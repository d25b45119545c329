//! Error types for docstate operations

use thiserror::Error;

/// Operation log and keyframe store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Database error: {reason}")]
    Database { reason: String },

    #[error("Invalid cursor: {cursor}")]
    InvalidCursor { cursor: String },

    #[error("Revision conflict on {stream}: expected index after {expected_after}, got {found}")]
    RevisionConflict {
        stream: String,
        expected_after: u64,
        found: u64,
    },

    #[error("Operations out of order: expected index after {expected_after}, got {found}")]
    OutOfOrder { expected_after: u64, found: u64 },

    #[error("Operation aborted")]
    Aborted,

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Failure raised by a document model's reducer.
///
/// Displayed verbatim so callers see exactly what the document model reported.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ReducerError {
    pub action_type: String,
    pub message: String,
}

impl ReducerError {
    pub fn new(action_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            message: message.into(),
        }
    }
}

/// Document model registry errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Module not found for document type {document_type}")]
    ModuleNotFound { document_type: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all docstate errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocStateError {
    #[error("Module not found for document type {document_type}")]
    ModuleNotFound { document_type: String },

    #[error(transparent)]
    Reducer(#[from] ReducerError),

    #[error("Failed to rebuild document {document_id} ({scope}/{branch}): {source}")]
    Rebuild {
        document_id: String,
        scope: String,
        branch: String,
        #[source]
        source: StoreError,
    },

    #[error("Failed to rebuild document {document_id}: no operations found in {scope}/{branch}")]
    NoOperations {
        document_id: String,
        scope: String,
        branch: String,
    },

    #[error("Failed to rebuild document {document_id}: {reason}")]
    InvalidHistory { document_id: String, reason: String },

    #[error("Operation aborted")]
    Aborted,

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl From<RegistryError> for DocStateError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::ModuleNotFound { document_type } => {
                DocStateError::ModuleNotFound { document_type }
            }
        }
    }
}

impl DocStateError {
    /// Whether this error is the cancellation error.
    pub fn is_aborted(&self) -> bool {
        matches!(self, DocStateError::Aborted)
    }

    /// Whether this error is the unknown-document-type error.
    pub fn is_module_not_found(&self) -> bool {
        matches!(self, DocStateError::ModuleNotFound { .. })
    }
}

/// Result type alias for docstate operations.
pub type DocStateResult<T> = Result<T, DocStateError>;

// =============================================================================
// TESTS
// =============================================================================
