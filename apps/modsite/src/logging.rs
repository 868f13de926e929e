//! Structured logging integration for events
//!
//! Every `AppEvent` drained from the channel becomes one tracing record with
//! its domain fields, the event id and the correlation id (fetch id or
//! `module@version`).

use modsite_events::{
    AdmissionEvent, AppEvent, EventMeta, FetchEvent, GeneralEvent, QueueEvent,
};
use tracing::{debug, error, info, warn};

/// Log an `AppEvent` with structured fields at the level its domain assigns.
#[allow(clippy::too_many_lines)]
pub fn log_event_with_tracing(event: &AppEvent) {
    let meta = EventMeta::for_event(event);
    let source = meta.source.as_str();
    let correlation = meta.correlation_id.as_deref().unwrap_or("");

    match event {
        AppEvent::General(general) => match general {
            GeneralEvent::Warning { message, context } => {
                warn!(source, event_id = %meta.event_id, context = ?context, "{message}");
            }
            GeneralEvent::Error { message, details } => {
                error!(source, event_id = %meta.event_id, details = ?details, "{message}");
            }
            GeneralEvent::DebugLog { message, context } => {
                debug!(source, event_id = %meta.event_id, context = ?context, "{message}");
            }
            GeneralEvent::OperationStarted { operation } => {
                info!(source, event_id = %meta.event_id, operation = %operation, "Operation started");
            }
            GeneralEvent::OperationCompleted { operation, success } => {
                info!(
                    source,
                    event_id = %meta.event_id,
                    operation = %operation,
                    success,
                    "Operation completed"
                );
            }
            GeneralEvent::OperationFailed { operation, error } => {
                error!(
                    source,
                    event_id = %meta.event_id,
                    operation = %operation,
                    error = %error,
                    "Operation failed"
                );
            }
        },

        AppEvent::Fetch(fetch) => match fetch {
            FetchEvent::PhaseChanged {
                module_path,
                version,
                phase,
                ..
            } => {
                debug!(
                    source,
                    event_id = %meta.event_id,
                    correlation,
                    module_path = %module_path,
                    version = %version,
                    phase = ?phase,
                    "Fetch phase changed"
                );
            }
            FetchEvent::PackageSkipped {
                module_path,
                version,
                package_path,
                status,
                reason,
            } => {
                warn!(
                    source,
                    event_id = %meta.event_id,
                    correlation,
                    module_path = %module_path,
                    version = %version,
                    package_path = %package_path,
                    status,
                    reason = %reason,
                    "Package skipped"
                );
            }
            FetchEvent::Completed {
                module_path,
                requested_version,
                resolved_version,
                status,
                size_bytes,
                duration_ms,
                packages,
                incomplete_packages,
                ..
            } => {
                info!(
                    source,
                    event_id = %meta.event_id,
                    correlation,
                    module_path = %module_path,
                    requested_version = %requested_version,
                    resolved_version = ?resolved_version,
                    status,
                    size_bytes = ?size_bytes,
                    duration_ms,
                    packages,
                    incomplete_packages,
                    "Fetch completed"
                );
            }
            FetchEvent::Failed {
                module_path,
                version,
                status,
                failure,
                ..
            } => {
                error!(
                    source,
                    event_id = %meta.event_id,
                    correlation,
                    module_path = %module_path,
                    version = %version,
                    status,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Fetch failed"
                );
            }
        },

        AppEvent::Queue(queue) => match queue {
            QueueEvent::Enqueued { pending, .. } => {
                info!(source, event_id = %meta.event_id, correlation, pending, "Task enqueued");
            }
            QueueEvent::Coalesced { .. } => {
                debug!(source, event_id = %meta.event_id, correlation, "Task joined in-flight run");
            }
            QueueEvent::Started { backend, .. } => {
                info!(
                    source,
                    event_id = %meta.event_id,
                    correlation,
                    backend = %backend,
                    "Task started"
                );
            }
            QueueEvent::Finished {
                status,
                duration_ms,
                ..
            } => {
                info!(
                    source,
                    event_id = %meta.event_id,
                    correlation,
                    status,
                    duration_ms,
                    "Task finished"
                );
            }
            QueueEvent::DispatchFailed { failure, .. } => {
                error!(
                    source,
                    event_id = %meta.event_id,
                    correlation,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    "Task dispatch failed"
                );
            }
        },

        AppEvent::Admission(admission) => match admission {
            AdmissionEvent::Admitted {
                size_bytes,
                size_in_flight,
                ..
            } => {
                debug!(
                    source,
                    event_id = %meta.event_id,
                    correlation,
                    size_bytes,
                    size_in_flight,
                    "Zip admitted"
                );
            }
            AdmissionEvent::Shed {
                size_bytes,
                size_in_flight,
                ..
            } => {
                warn!(
                    source,
                    event_id = %meta.event_id,
                    correlation,
                    size_bytes,
                    size_in_flight,
                    "Zip shed"
                );
            }
        },
    }
}
