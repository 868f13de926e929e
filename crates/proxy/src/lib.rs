#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Module archive sources
//!
//! A [`ModuleSource`] resolves requested versions and serves module zips and
//! go.mod files. Three implementations are provided:
//!
//! - [`ProxyClient`] speaks the GOPROXY HTTP protocol
//! - [`StdlibSource`] serves the standard library from an embedded snapshot
//! - [`MemoryProxy`] serves modules registered in memory
//!
//! [`SourceRouter`] sends requests for `std` to the stdlib source and
//! everything else to a proxy.

mod memory;
mod proxy;
mod router;
pub mod stdlib;

pub use memory::MemoryProxy;
pub use proxy::{escape_path, ProxyClient};
pub use router::SourceRouter;
pub use stdlib::StdlibSource;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use modsite_archive::ModuleZip;
use modsite_errors::Error;
use serde::{Deserialize, Serialize};

/// Result of resolving a requested version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Time")]
    pub time: DateTime<Utc>,
}

/// Source of module versions, zips and go.mod files.
#[async_trait]
pub trait ModuleSource: Send + Sync {
    /// Resolve `requested` (a version, branch name or `latest`) to a concrete version.
    async fn resolve_version(&self, module_path: &str, requested: &str)
        -> Result<VersionInfo, Error>;

    /// Size in bytes of the zip for a resolved version, without downloading it.
    async fn zip_size(&self, module_path: &str, version: &str) -> Result<u64, Error>;

    /// Download the zip for a resolved version.
    async fn fetch_zip(&self, module_path: &str, version: &str) -> Result<ModuleZip, Error>;

    /// The go.mod file for a resolved version, if the module has one.
    async fn fetch_mod(&self, module_path: &str, version: &str) -> Result<Option<Bytes>, Error>;
}
