//! Module archive error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArchiveError {
    #[error("malformed zip: {message}")]
    Malformed { message: String },

    #[error("zip entry {name} is outside of {prefix}")]
    BadPrefix { name: String, prefix: String },

    #[error("zip entry not found: {name}")]
    EntryNotFound { name: String },

    #[error("zip entry {name} exceeds {limit} bytes")]
    EntryTooLarge { name: String, limit: u64 },

    #[error("zip write failed: {message}")]
    WriteFailed { message: String },
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::FileNotFound => Self::EntryNotFound {
                name: String::new(),
            },
            other => Self::Malformed {
                message: other.to_string(),
            },
        }
    }
}
