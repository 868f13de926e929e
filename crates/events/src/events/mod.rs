use serde::{Deserialize, Serialize};

use crate::EventSource;
use modsite_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod admission;
pub mod fetch;
pub mod general;
pub mod queue;

pub use admission::*;
pub use fetch::*;
pub use general::*;
pub use queue::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, operations)
    General(GeneralEvent),

    /// Fetch pipeline events (phases and outcomes)
    Fetch(FetchEvent),

    /// Work queue events (enqueue, coalescing, dispatch)
    Queue(QueueEvent),

    /// Admission control decisions
    Admission(AdmissionEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Fetch(_) => EventSource::FETCH,
            Self::Queue(_) => EventSource::QUEUE,
            Self::Admission(_) => EventSource::ADMISSION,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Fetch(FetchEvent::Failed { .. })
            | Self::Queue(QueueEvent::DispatchFailed { .. }) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Fetch(FetchEvent::PackageSkipped { .. })
            | Self::Admission(AdmissionEvent::Shed { .. }) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Fetch(FetchEvent::PhaseChanged { .. })
            | Self::Queue(QueueEvent::Coalesced { .. })
            | Self::Admission(AdmissionEvent::Admitted { .. }) => Level::DEBUG,

            _ => Level::INFO,
        }
    }

    /// Identifier tying this event to the fetch or task it belongs to.
    #[must_use]
    pub fn correlation_id(&self) -> Option<String> {
        match self {
            Self::Fetch(
                FetchEvent::PhaseChanged { fetch_id, .. }
                | FetchEvent::Completed { fetch_id, .. }
                | FetchEvent::Failed { fetch_id, .. },
            ) => Some(fetch_id.clone()),
            Self::Fetch(FetchEvent::PackageSkipped {
                module_path,
                version,
                ..
            })
            | Self::Admission(
                AdmissionEvent::Admitted {
                    module_path,
                    version,
                    ..
                }
                | AdmissionEvent::Shed {
                    module_path,
                    version,
                    ..
                },
            ) => Some(format!("{module_path}@{version}")),
            Self::Queue(
                QueueEvent::Enqueued { key, .. }
                | QueueEvent::Coalesced { key }
                | QueueEvent::Started { key, .. }
                | QueueEvent::Finished { key, .. }
                | QueueEvent::DispatchFailed { key, .. },
            ) => Some(key.clone()),
            Self::General(_) => None,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "modsite::events::general",
            Self::Fetch(_) => "modsite::events::fetch",
            Self::Queue(_) => "modsite::events::queue",
            Self::Admission(_) => "modsite::events::admission",
        }
    }
}
