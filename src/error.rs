// ⚠️ Error taxonomy for the item editor
//
// Every error is scoped to a single editing session; none is fatal to the
// process. Validation errors never reach the store, write errors are reported
// and the editor is left anyway.

use thiserror::Error;

// ============================================================================
// FUNCTION CODEC ERRORS
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FunctionError {
    #[error("unknown aggregation function: {0}")]
    UnknownKind(String),

    #[error("{kind} expects {expected} parameters, got {found}")]
    MissingParameters {
        kind: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid function parameter: {0:?}")]
    InvalidParameter(String),

    #[error("{kind} is not available for group type {group_type}")]
    NotAvailable { kind: String, group_type: String },
}

// ============================================================================
// VALIDATION ERRORS (field level, block submission)
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("item name is required")]
    EmptyName,

    #[error("item name {0:?} may only contain letters, digits and '_' and must not start with a digit")]
    InvalidName(String),

    #[error("an item named {0:?} already exists")]
    DuplicateName(String),

    #[error("item type is required")]
    MissingType,

    #[error("the name of an existing item cannot be changed")]
    NameLocked,

    #[error("{0:?} is not a group this item can belong to")]
    InvalidParent(String),

    #[error(transparent)]
    Function(#[from] FunctionError),
}

// ============================================================================
// STORE ERRORS (write/remove/list failures reported by the collaborator)
// ============================================================================

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("item not found: {0}")]
    NotFound(String),

    #[error("store rejected the write: {0}")]
    Rejected(String),
}

/// A store failure raised by a create/update/remove request.
pub type WriteError = StoreError;

// ============================================================================
// SESSION ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("no item named {0:?}")]
    NotFound(String),

    #[error("could not load items: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("write failed: {0}")]
    Write(#[from] WriteError),
}

impl SubmitError {
    /// Whether the editor should be closed after this failure.
    ///
    /// Validation keeps the form open for correction; a failed write is a
    /// notice only and the editor is left just like after a success.
    pub fn leaves_editor(&self) -> bool {
        matches!(self, SubmitError::Write(_))
    }
}
