//! In-memory module proxy
//!
//! Serves modules registered at runtime. Used by tests and by small
//! deployments that ingest from a local mirror.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use modsite_archive::{build_module_zip, module_prefix, ModuleZip};
use modsite_errors::{Error, FetchError};
use modsite_types::version;

use crate::{ModuleSource, VersionInfo};

#[derive(Debug, Clone)]
struct StoredVersion {
    zip: Bytes,
    go_mod: Option<Bytes>,
    time: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    modules: HashMap<String, BTreeMap<String, StoredVersion>>,
    latency: Option<Duration>,
}

/// A module proxy backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MemoryProxy {
    inner: Arc<RwLock<Inner>>,
    zip_requests: Arc<AtomicUsize>,
}

impl MemoryProxy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a version from `(path, contents)` pairs relative to the module root.
    ///
    /// A file named `go.mod` at the root is also served as the version's go.mod.
    ///
    /// # Errors
    ///
    /// Returns an error if the zip cannot be built.
    pub fn add_module<C: AsRef<[u8]>>(
        &self,
        module_path: &str,
        version: &str,
        files: &[(&str, C)],
    ) -> Result<(), Error> {
        let zip = build_module_zip(module_path, version, files)?;
        let go_mod = files
            .iter()
            .find(|(path, _)| *path == "go.mod")
            .map(|(_, contents)| Bytes::copy_from_slice(contents.as_ref()));
        self.add_zip(module_path, version, zip, go_mod);
        Ok(())
    }

    /// Register a version from raw zip bytes.
    pub fn add_zip(&self, module_path: &str, version: &str, zip: Bytes, go_mod: Option<Bytes>) {
        let count = self.version_count(module_path);
        // Distinct, increasing commit times keep `latest` resolution stable.
        let time = Utc
            .timestamp_opt(1_546_300_800 + i64::try_from(count).unwrap_or(0) * 3600, 0)
            .single()
            .unwrap_or_default();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner
            .modules
            .entry(module_path.to_string())
            .or_default()
            .insert(version.to_string(), StoredVersion { zip, go_mod, time });
    }

    /// Forget a module version, as if the proxy no longer served it.
    pub fn remove_version(&self, module_path: &str, version: &str) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(versions) = inner.modules.get_mut(module_path) {
            versions.remove(version);
        }
    }

    /// Delay every zip download by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.latency = Some(latency);
    }

    /// Number of zip downloads served so far.
    #[must_use]
    pub fn zip_requests(&self) -> usize {
        self.zip_requests.load(Ordering::SeqCst)
    }

    fn version_count(&self, module_path: &str) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.modules.get(module_path).map_or(0, BTreeMap::len)
    }

    fn lookup(&self, module_path: &str, version: &str) -> Result<StoredVersion, Error> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .modules
            .get(module_path)
            .and_then(|versions| versions.get(version))
            .cloned()
            .ok_or_else(|| FetchError::not_found(module_path, version).into())
    }

    fn latest(&self, module_path: &str) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let versions = inner.modules.get(module_path)?;
        // Prefer releases, then prereleases, then pseudo-versions.
        let rank = |v: &str| match version::version_type(v) {
            Some(version::VersionType::Release) => 2,
            Some(version::VersionType::Prerelease) => 1,
            _ => 0,
        };
        versions
            .keys()
            .max_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| version::compare(a, b)))
            .cloned()
    }
}

#[async_trait]
impl ModuleSource for MemoryProxy {
    async fn resolve_version(
        &self,
        module_path: &str,
        requested: &str,
    ) -> Result<VersionInfo, Error> {
        let resolved = if matches!(requested, version::LATEST | version::MASTER | version::MAIN) {
            self.latest(module_path)
                .ok_or_else(|| FetchError::not_found(module_path, requested))?
        } else if version::is_valid(requested) {
            requested.to_string()
        } else {
            return Err(FetchError::InvalidArgument {
                message: format!("{module_path}@{requested}: invalid version"),
            }
            .into());
        };
        let stored = self.lookup(module_path, &resolved)?;
        Ok(VersionInfo {
            version: resolved,
            time: stored.time,
        })
    }

    async fn zip_size(&self, module_path: &str, version: &str) -> Result<u64, Error> {
        Ok(self.lookup(module_path, version)?.zip.len() as u64)
    }

    async fn fetch_zip(&self, module_path: &str, version: &str) -> Result<ModuleZip, Error> {
        let latency = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .latency;
        self.zip_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let stored = self.lookup(module_path, version)?;
        tracing::trace!(prefix = %module_prefix(module_path, version), "serving zip");
        Ok(ModuleZip::open(stored.zip)?)
    }

    async fn fetch_mod(&self, module_path: &str, version: &str) -> Result<Option<Bytes>, Error> {
        Ok(self.lookup(module_path, version)?.go_mod)
    }
}
