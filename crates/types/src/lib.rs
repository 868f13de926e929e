#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the modsite ingestion pipeline
//!
//! This crate provides the data model shared by the fetcher, the store and
//! the work queue: module and unit records, license metadata, per-package
//! processing states and the version helpers used to classify and resolve
//! module versions.

pub mod build;
pub mod license;
pub mod module;
pub mod state;
pub mod version;

pub use build::BuildContext;
pub use chrono::{DateTime, Utc};
pub use license::{License, LicenseMetadata};
pub use module::{Documentation, Module, ModuleInfo, Package, Readme, Unit};
pub use state::{FetchPhase, ModuleVersionState, PackageVersionState, VersionMapEntry};
pub use uuid::Uuid;
pub use version::{VersionType, LATEST, MAIN, MASTER};

/// Module path of the Go standard library.
pub const STDLIB_MODULE_PATH: &str = "std";

/// Key identifying a single module version, used by the work queue and the
/// fetch-info registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ModuleKey {
    pub module_path: String,
    pub version: String,
}

impl ModuleKey {
    pub fn new(module_path: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            version: version.into(),
        }
    }

    /// Parse `path@version`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let (path, version) = s.rsplit_once('@')?;
        if path.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self::new(path, version))
    }
}

impl std::fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.module_path, self.version)
    }
}
