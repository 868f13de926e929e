//! Store error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum StateError {
    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("database error: {message}")]
    DatabaseError { message: String },

    #[error("transaction failed: {message}")]
    TransactionFailed { message: String },

    #[error("invalid insert: {message}")]
    InsertInvalid { message: String },

    #[error("stored data corrupted: {message}")]
    StateCorrupted { message: String },

    #[error("migration failed: {message}")]
    MigrationFailed { message: String },
}

impl UserFacingError for StateError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::MigrationFailed { .. } => {
                Some("Remove or upgrade the database file and run the command again.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotFound { .. } => "state.not_found",
            Self::DatabaseError { .. } => "state.database",
            Self::TransactionFailed { .. } => "state.transaction_failed",
            Self::InsertInvalid { .. } => "state.insert_invalid",
            Self::StateCorrupted { .. } => "state.corrupted",
            Self::MigrationFailed { .. } => "state.migration_failed",
        };
        Some(code)
    }
}
