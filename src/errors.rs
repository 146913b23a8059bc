//! Typed error hierarchy for the Kanban back-end.
//!
//! `KanbanError` is what the store trait, the move coordinator and the
//! card-creation helpers return. Store internals keep using `anyhow` with
//! context strings; [`KanbanError::from_db`] classifies those failures at the
//! trait boundary so a uniqueness conflict surfaces as `ConstraintViolation`
//! instead of an opaque database error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KanbanError {
    #[error("Board {id} not found")]
    BoardNotFound { id: i64 },

    #[error("Column {id} not found")]
    ColumnNotFound { id: i64 },

    #[error("Card {id} not found")]
    CardNotFound { id: i64 },

    /// A uniqueness or foreign-key constraint rejected the write. The whole
    /// transaction was rolled back; the caller may retry.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// An internal contract was broken (e.g. the reconciler was handed a
    /// source list that does not contain the moving card).
    #[error("Internal invariant violated: {0}")]
    Invariant(String),

    #[error("Database error: {0:#}")]
    Database(#[source] anyhow::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KanbanError {
    /// Classify a store failure. Constraint failures reported by SQLite become
    /// `ConstraintViolation`; everything else is wrapped as `Database`.
    pub fn from_db(err: anyhow::Error) -> Self {
        let is_constraint = err
            .chain()
            .filter_map(|e| e.downcast_ref::<rusqlite::Error>())
            .filter_map(|e| e.sqlite_error_code())
            .any(|code| code == rusqlite::ErrorCode::ConstraintViolation);
        if is_constraint {
            Self::ConstraintViolation(format!("{:#}", err))
        } else {
            Self::Database(err)
        }
    }

    /// True for the not-found family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::BoardNotFound { .. } | Self::ColumnNotFound { .. } | Self::CardNotFound { .. }
        )
    }
}
