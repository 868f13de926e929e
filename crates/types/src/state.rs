//! Processing-state records written after every fetch attempt

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of processing one package directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersionState {
    pub package_path: String,
    pub module_path: String,
    pub version: String,
    pub status: u16,
    pub error: Option<String>,
}

impl PackageVersionState {
    pub fn new(
        package_path: impl Into<String>,
        module_path: impl Into<String>,
        version: impl Into<String>,
        status: u16,
    ) -> Self {
        Self {
            package_path: package_path.into(),
            module_path: module_path.into(),
            version: version.into(),
            status,
            error: None,
        }
    }

    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Outcome of the most recent fetch of a module version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleVersionState {
    pub module_path: String,
    pub version: String,
    pub status: u16,
    pub error: Option<String>,
    pub go_mod_path: Option<String>,
    pub has_go_mod: bool,
    pub app_version: String,
    pub try_count: u32,
    pub last_processed_at: DateTime<Utc>,
}

/// Maps a requested version (possibly symbolic) to what it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMapEntry {
    pub module_path: String,
    pub requested_version: String,
    pub resolved_version: Option<String>,
    pub go_mod_path: Option<String>,
    pub status: u16,
    pub error: Option<String>,
}

/// Phases of a single fetch attempt. The last four are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPhase {
    Start,
    Resolving,
    AdmissionCheck,
    Downloading,
    Extracting,
    Assembling,
    /// A complete outcome (full or degraded) is ready to hand to the store.
    Committed,
    /// The module itself was refused (not found, bad module, too large, mismatch).
    Rejected,
    Shed,
    /// Internal failure or deadline expiry.
    Failed,
}

impl FetchPhase {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Committed | Self::Rejected | Self::Shed | Self::Failed
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Resolving => "resolving",
            Self::AdmissionCheck => "admission_check",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::Assembling => "assembling",
            Self::Committed => "committed",
            Self::Rejected => "rejected",
            Self::Shed => "shed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
