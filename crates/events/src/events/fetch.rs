use serde::{Deserialize, Serialize};

use super::FailureContext;
use modsite_types::FetchPhase;

/// Events emitted by the fetch coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FetchEvent {
    /// The fetch moved to a new phase
    PhaseChanged {
        fetch_id: String,
        module_path: String,
        version: String,
        phase: FetchPhase,
    },

    /// A package inside the module could not be processed
    PackageSkipped {
        module_path: String,
        version: String,
        package_path: String,
        status: u16,
        reason: String,
    },

    /// The fetch produced an outcome (any status)
    Completed {
        fetch_id: String,
        module_path: String,
        requested_version: String,
        resolved_version: Option<String>,
        status: u16,
        size_bytes: Option<u64>,
        duration_ms: u64,
        packages: usize,
        incomplete_packages: usize,
    },

    /// The fetch ended with an error
    Failed {
        fetch_id: String,
        module_path: String,
        version: String,
        status: u16,
        failure: FailureContext,
    },
}
