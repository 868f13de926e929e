use serde::{Deserialize, Serialize};

/// Events emitted around size-based admission control
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AdmissionEvent {
    /// The zip bytes were reserved and the fetch may download
    Admitted {
        module_path: String,
        version: String,
        size_bytes: u64,
        size_in_flight: u64,
    },

    /// The request was refused because of in-flight load
    Shed {
        module_path: String,
        version: String,
        size_bytes: u64,
        size_in_flight: u64,
    },
}
