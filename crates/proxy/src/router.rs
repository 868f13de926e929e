use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use modsite_archive::ModuleZip;
use modsite_errors::Error;
use modsite_types::STDLIB_MODULE_PATH;

use crate::{ModuleSource, StdlibSource, VersionInfo};

/// Routes `std` to the stdlib snapshot and every other module to `proxy`.
#[derive(Clone)]
pub struct SourceRouter {
    proxy: Arc<dyn ModuleSource>,
    stdlib: StdlibSource,
}

impl SourceRouter {
    pub fn new(proxy: Arc<dyn ModuleSource>) -> Self {
        Self {
            proxy,
            stdlib: StdlibSource::new(),
        }
    }

    fn pick(&self, module_path: &str) -> &dyn ModuleSource {
        if module_path == STDLIB_MODULE_PATH {
            &self.stdlib
        } else {
            self.proxy.as_ref()
        }
    }
}

#[async_trait]
impl ModuleSource for SourceRouter {
    async fn resolve_version(
        &self,
        module_path: &str,
        requested: &str,
    ) -> Result<VersionInfo, Error> {
        self.pick(module_path)
            .resolve_version(module_path, requested)
            .await
    }

    async fn zip_size(&self, module_path: &str, version: &str) -> Result<u64, Error> {
        self.pick(module_path).zip_size(module_path, version).await
    }

    async fn fetch_zip(&self, module_path: &str, version: &str) -> Result<ModuleZip, Error> {
        self.pick(module_path).fetch_zip(module_path, version).await
    }

    async fn fetch_mod(&self, module_path: &str, version: &str) -> Result<Option<Bytes>, Error> {
        self.pick(module_path).fetch_mod(module_path, version).await
    }
}
