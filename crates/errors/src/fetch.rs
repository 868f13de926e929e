//! Fetch-pipeline error types
//!
//! Every variant corresponds to exactly one module-level status code in
//! [`crate::status`]. Per-package failures never surface here; they are
//! recorded as package states instead.

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum FetchError {
    #[error("{module_path}@{version}: not found")]
    NotFound { module_path: String, version: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("{path}: excluded")]
    Excluded { path: String },

    #[error("module path {module_path} does not match go.mod path {go_mod_path}")]
    AlternativeModule {
        module_path: String,
        go_mod_path: String,
    },

    #[error("bad module: {reason}")]
    BadModule { reason: String },

    #[error("module too large: size={size_mib}Mi, max={max_mib}Mi")]
    ModuleTooLarge { size_mib: u64, max_mib: u64 },

    #[error("shedding load: size={size_mib}Mi")]
    SheddingLoad { size_mib: u64 },

    #[error("deadline exceeded after {seconds}s")]
    DeadlineExceeded { seconds: u64 },

    #[error("internal fetch error: {message}")]
    Internal { message: String },
}

impl FetchError {
    pub fn not_found(module_path: impl Into<String>, version: impl Into<String>) -> Self {
        Self::NotFound {
            module_path: module_path.into(),
            version: version.into(),
        }
    }

    pub fn bad_module(reason: impl Into<String>) -> Self {
        Self::BadModule {
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Module-level status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        use crate::status;
        match self {
            Self::NotFound { .. } => status::NOT_FOUND,
            Self::InvalidArgument { .. } => status::BAD_REQUEST,
            Self::Excluded { .. } => status::FORBIDDEN,
            Self::AlternativeModule { .. } => status::ALTERNATIVE_MODULE,
            Self::BadModule { .. } => status::BAD_MODULE,
            Self::ModuleTooLarge { .. } => status::MODULE_TOO_LARGE,
            Self::SheddingLoad { .. } => status::SERVICE_UNAVAILABLE,
            Self::DeadlineExceeded { .. } => status::REQUEST_TIMEOUT,
            Self::Internal { .. } => status::INTERNAL,
        }
    }
}

impl UserFacingError for FetchError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => Some("Check the module path and version, then retry."),
            Self::AlternativeModule { .. } => {
                Some("Fetch the module using the path declared in its go.mod file.")
            }
            Self::SheddingLoad { .. } => Some("The service is busy. Retry the fetch later."),
            Self::DeadlineExceeded { .. } => Some("Increase the fetch timeout or retry later."),
            Self::Excluded { .. } => Some("This path has been excluded by an administrator."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SheddingLoad { .. } | Self::DeadlineExceeded { .. } | Self::Internal { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotFound { .. } => "fetch.not_found",
            Self::InvalidArgument { .. } => "fetch.invalid_argument",
            Self::Excluded { .. } => "fetch.excluded",
            Self::AlternativeModule { .. } => "fetch.alternative_module",
            Self::BadModule { .. } => "fetch.bad_module",
            Self::ModuleTooLarge { .. } => "fetch.module_too_large",
            Self::SheddingLoad { .. } => "fetch.shedding_load",
            Self::DeadlineExceeded { .. } => "fetch.deadline_exceeded",
            Self::Internal { .. } => "fetch.internal",
        };
        Some(code)
    }
}
