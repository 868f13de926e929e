#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Fetch-and-update-state for modsite
//!
//! The worker is where a fetch outcome meets the store. It checks the
//! excluded prefixes, runs the fetch, writes or deletes the module according
//! to the status, and records the processing state of the attempt. The
//! admission reservation of a successful fetch is held until the module has
//! been written.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use modsite_config::Config;
use modsite_errors::{status, Error, FetchError};
use modsite_events::{EventEmitter, EventSender};
use modsite_fetch::{FetchResult, Fetcher};
use modsite_queue::TaskProcessor;
use modsite_state::ModuleStore;
use modsite_types::{ModuleVersionState, VersionMapEntry};

/// Runs fetches and persists their outcomes.
pub struct Worker {
    fetcher: Arc<Fetcher>,
    store: Arc<dyn ModuleStore>,
    timeout: Duration,
    app_version: String,
    tx: Option<EventSender>,
}

impl EventEmitter for Worker {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl Worker {
    #[must_use]
    pub fn new(fetcher: Arc<Fetcher>, store: Arc<dyn ModuleStore>) -> Self {
        Self {
            fetcher,
            store,
            timeout: modsite_config::FetchConfig::default().timeout(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            tx: None,
        }
    }

    /// Worker using the configured fetch timeout.
    #[must_use]
    pub fn from_config(fetcher: Arc<Fetcher>, store: Arc<dyn ModuleStore>, config: &Config) -> Self {
        Self::new(fetcher, store).with_timeout(config.fetch.timeout())
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_app_version(mut self, app_version: impl Into<String>) -> Self {
        self.app_version = app_version.into();
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ModuleStore> {
        &self.store
    }

    /// Fetch `module_path@version` and bring the store up to date with the
    /// outcome. Returns the final status and the error behind it, if any.
    pub async fn fetch_and_update_state(
        &self,
        module_path: &str,
        version: &str,
    ) -> (u16, Option<Error>) {
        match self.store.is_excluded(module_path).await {
            Ok(false) => {}
            Ok(true) => return self.record_excluded(module_path, version).await,
            Err(err) => {
                tracing::error!(module_path, error = %err, "checking excluded prefixes");
                return (status::INTERNAL, Some(err));
            }
        }

        let mut fr = self
            .fetcher
            .fetch_module(module_path, version, self.timeout)
            .await;

        if status::deletes_module(fr.status) {
            match self.store.delete_module(module_path, fr.version()).await {
                Ok(true) => tracing::info!(
                    module_path,
                    version = fr.version(),
                    status = fr.status,
                    "deleted stored module"
                ),
                Ok(false) => {}
                Err(err) => {
                    tracing::error!(module_path, error = %err, "deleting module");
                    fr.status = status::INTERNAL;
                    fr.error = Some(err);
                }
            }
        }

        if let Some(module) = fr.module.as_ref() {
            if let Err(err) = self.store.upsert_module(module).await {
                tracing::error!(
                    module_path,
                    version = fr.version(),
                    error = %err,
                    "storing module"
                );
                self.emit_warning_with_context("failed to store module", err.to_string());
                fr.status = status::INTERNAL;
                fr.error = Some(err);
            }
        }
        fr.release_admission();

        if let Err(err) = self.record_state(&fr).await {
            tracing::error!(module_path, error = %err, "recording module version state");
            return (status::INTERNAL, Some(err));
        }

        let code = fr.status;
        tracing::info!(
            module_path,
            requested_version = %fr.requested_version,
            resolved_version = fr.resolved_version.as_deref().unwrap_or(""),
            status = code,
            duration_ms = u64::try_from(fr.duration.as_millis()).unwrap_or(u64::MAX),
            "fetch finished"
        );
        (code, fr.error)
    }

    async fn record_excluded(&self, module_path: &str, version: &str) -> (u16, Option<Error>) {
        tracing::info!(module_path, version, "module is excluded");
        let err = Error::from(FetchError::Excluded {
            path: module_path.to_string(),
        });
        let state = ModuleVersionState {
            module_path: module_path.to_string(),
            version: version.to_string(),
            status: status::FORBIDDEN,
            error: Some(err.to_string()),
            go_mod_path: None,
            has_go_mod: false,
            app_version: self.app_version.clone(),
            try_count: 1,
            last_processed_at: Utc::now(),
        };
        if let Err(store_err) = self.store.upsert_module_version_state(&state).await {
            return (status::INTERNAL, Some(store_err));
        }
        (status::FORBIDDEN, Some(err))
    }

    /// Module version state, package states and the version-map entry for
    /// the requested version.
    async fn record_state(&self, fr: &FetchResult) -> Result<(), Error> {
        let error = fr.error.as_ref().map(ToString::to_string);
        self.store
            .upsert_module_version_state(&ModuleVersionState {
                module_path: fr.module_path.clone(),
                version: fr.version().to_string(),
                status: fr.status,
                error: error.clone(),
                go_mod_path: fr.go_mod_path.clone(),
                has_go_mod: fr.has_go_mod,
                app_version: self.app_version.clone(),
                try_count: 1,
                last_processed_at: Utc::now(),
            })
            .await?;
        self.store
            .upsert_package_version_states(&fr.package_version_states)
            .await?;
        self.store
            .upsert_version_map(&VersionMapEntry {
                module_path: fr.module_path.clone(),
                requested_version: fr.requested_version.clone(),
                resolved_version: fr.resolved_version.clone(),
                go_mod_path: fr.go_mod_path.clone(),
                status: fr.status,
                error,
            })
            .await?;
        self.emit_operation_completed(
            format!("update state {}@{}", fr.module_path, fr.version()),
            status::is_success(fr.status),
        );
        Ok(())
    }
}

#[async_trait]
impl TaskProcessor for Worker {
    async fn process(&self, module_path: &str, version: &str) -> (u16, Option<Error>) {
        self.fetch_and_update_state(module_path, version).await
    }
}
