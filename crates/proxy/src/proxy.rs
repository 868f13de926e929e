//! GOPROXY protocol client

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use modsite_archive::ModuleZip;
use modsite_config::ProxyConfig;
use modsite_errors::{Error, FetchError, NetworkError};
use modsite_net::{NetClient, NetConfig};
use modsite_types::version;

use crate::{ModuleSource, VersionInfo};

/// Escape a module path or version for use in a proxy URL.
///
/// Uppercase letters are replaced by `!` followed by the lowercase letter so
/// that paths stay distinct on case-insensitive file systems.
#[must_use]
pub fn escape_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Client for a module proxy (`$GOPROXY`).
#[derive(Clone)]
pub struct ProxyClient {
    base_url: String,
    client: NetClient,
    max_zip_size: u64,
}

impl ProxyClient {
    /// Create a client for the proxy at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, net: NetConfig, max_zip_size: u64) -> Result<Self, Error> {
        modsite_net::parse_url(base_url)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: NetClient::new(net)?,
            max_zip_size,
        })
    }

    /// Create a client from the `[proxy]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL is invalid.
    pub fn from_config(config: &ProxyConfig, max_zip_size: u64) -> Result<Self, Error> {
        let net = NetConfig {
            timeout: Duration::from_secs(config.timeout),
            retry_count: config.retries,
            retry_delay: Duration::from_secs(config.retry_delay),
            ..NetConfig::default()
        };
        Self::new(&config.url, net, max_zip_size)
    }

    fn url(&self, module_path: &str, suffix: &str) -> String {
        format!("{}/{}/{suffix}", self.base_url, escape_path(module_path))
    }

    fn version_url(&self, module_path: &str, version: &str, ext: &str) -> String {
        self.url(module_path, &format!("@v/{}.{ext}", escape_path(version)))
    }
}

/// Translate proxy status codes into fetch errors.
fn map_proxy_error(err: Error, module_path: &str, version: &str) -> Error {
    match err {
        Error::Network(NetworkError::HttpError {
            status: 404 | 410, ..
        }) => FetchError::not_found(module_path, version).into(),
        Error::Network(NetworkError::HttpError {
            status: 400,
            message,
        }) => FetchError::InvalidArgument {
            message: format!("{module_path}@{version}: {message}"),
        }
        .into(),
        Error::Network(NetworkError::BodyTooLarge { limit, .. }) => FetchError::ModuleTooLarge {
            size_mib: (limit / (1024 * 1024)) + 1,
            max_mib: limit / (1024 * 1024),
        }
        .into(),
        other => other,
    }
}

#[async_trait]
impl ModuleSource for ProxyClient {
    async fn resolve_version(
        &self,
        module_path: &str,
        requested: &str,
    ) -> Result<VersionInfo, Error> {
        let url = if requested == version::LATEST {
            self.url(module_path, "@latest")
        } else {
            self.version_url(module_path, requested, "info")
        };
        let body = modsite_net::fetch_text(&self.client, &url, None)
            .await
            .map_err(|e| map_proxy_error(e, module_path, requested))?;
        let info: VersionInfo = serde_json::from_str(&body).map_err(|e| {
            FetchError::internal(format!("{module_path}@{requested}: bad .info response: {e}"))
        })?;
        tracing::debug!(module_path, requested, resolved = %info.version, "resolved version");
        Ok(info)
    }

    async fn zip_size(&self, module_path: &str, version: &str) -> Result<u64, Error> {
        let url = self.version_url(module_path, version, "zip");
        modsite_net::content_length(&self.client, &url)
            .await
            .map_err(|e| map_proxy_error(e, module_path, version))?
            .ok_or_else(|| {
                FetchError::internal(format!("{module_path}@{version}: proxy did not report zip size"))
                    .into()
            })
    }

    async fn fetch_zip(&self, module_path: &str, version: &str) -> Result<ModuleZip, Error> {
        let url = self.version_url(module_path, version, "zip");
        let data = modsite_net::fetch_bytes(&self.client, &url, self.max_zip_size, None)
            .await
            .map_err(|e| map_proxy_error(e, module_path, version))?;
        Ok(ModuleZip::open(data)?)
    }

    async fn fetch_mod(&self, module_path: &str, version: &str) -> Result<Option<Bytes>, Error> {
        let url = self.version_url(module_path, version, "mod");
        let body = modsite_net::fetch_text(&self.client, &url, None)
            .await
            .map_err(|e| map_proxy_error(e, module_path, version))?;
        Ok(Some(Bytes::from(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_uppercase() {
        assert_eq!(escape_path("github.com/Azure/go"), "github.com/!azure/go");
        assert_eq!(escape_path("v1.0.0-RC"), "v1.0.0-!r!c");
        assert_eq!(escape_path("plain"), "plain");
    }
}
