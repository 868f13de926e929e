//! Queue backends
//!
//! A backend runs one task to completion and reports the module status it
//! ended with. The in-process backend calls a [`TaskProcessor`] directly;
//! the HTTP backend hands the task to a remote worker.

use std::sync::Arc;

use async_trait::async_trait;
use modsite_errors::{Error, QueueError};
use modsite_net::NetClient;
use modsite_types::ModuleKey;
use serde::{Deserialize, Serialize};

/// Final result of one task, shared by every submitter of the same key.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub status: u16,
    pub error: Option<Error>,
}

impl TaskOutcome {
    #[must_use]
    pub fn new(status: u16, error: Option<Error>) -> Self {
        Self { status, error }
    }

    /// Outcome for a task whose backend failed before producing a status.
    #[must_use]
    pub fn from_error(error: Error) -> Self {
        Self {
            status: error.status_code(),
            error: Some(error),
        }
    }
}

/// Does the actual work for a task, usually fetch-and-update-state.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    async fn process(&self, module_path: &str, version: &str) -> (u16, Option<Error>);
}

/// Runs tasks on behalf of the [`crate::WorkQueue`].
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Short name used in events.
    fn name(&self) -> &'static str;

    /// Run one task to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the task could not be run at all. A task that ran
    /// and failed reports that through the outcome instead.
    async fn run(&self, key: &ModuleKey) -> Result<TaskOutcome, Error>;
}

/// Runs tasks in this process.
pub struct InProcessBackend {
    processor: Arc<dyn TaskProcessor>,
}

impl InProcessBackend {
    #[must_use]
    pub fn new(processor: Arc<dyn TaskProcessor>) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl QueueBackend for InProcessBackend {
    fn name(&self) -> &'static str {
        "in-process"
    }

    async fn run(&self, key: &ModuleKey) -> Result<TaskOutcome, Error> {
        let (status, error) = self.processor.process(&key.module_path, &key.version).await;
        Ok(TaskOutcome::new(status, error))
    }
}

/// Body sent to, and optionally returned by, a remote worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub module_path: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DispatchResponse {
    status: u16,
    #[serde(default)]
    error: Option<String>,
}

/// POSTs tasks to `<base>/fetch/<module>/@v/<version>` on a remote worker.
///
/// The worker answers with the module status as the HTTP status, and may
/// include a JSON body `{"status": .., "error": ..}` that takes precedence.
pub struct HttpDispatchBackend {
    client: NetClient,
    base: url::Url,
}

impl HttpDispatchBackend {
    /// # Errors
    ///
    /// Returns an error if `base` is not a valid URL.
    pub fn new(client: NetClient, base: &str) -> Result<Self, Error> {
        let mut base = modsite_net::parse_url(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { client, base })
    }

    fn task_url(&self, key: &ModuleKey) -> Result<url::Url, Error> {
        self.base
            .join(&format!("fetch/{}/@v/{}", key.module_path, key.version))
            .map_err(|e| {
                QueueError::InvalidTask {
                    message: format!("{key}: {e}"),
                }
                .into()
            })
    }
}

#[async_trait]
impl QueueBackend for HttpDispatchBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn run(&self, key: &ModuleKey) -> Result<TaskOutcome, Error> {
        let url = self.task_url(key)?;
        let body = DispatchRequest {
            module_path: key.module_path.clone(),
            version: key.version.clone(),
        };
        let response = self
            .client
            .post_json(url.as_str(), &body)
            .await
            .map_err(|e| QueueError::DispatchFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let http_status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();

        if let Ok(parsed) = serde_json::from_str::<DispatchResponse>(&text) {
            return Ok(TaskOutcome::new(parsed.status, parsed.error.map(Error::internal)));
        }
        let error = (!modsite_errors::status::is_success(http_status)).then(|| {
            let message = if text.trim().is_empty() {
                format!("worker returned {http_status}")
            } else {
                text.trim().to_string()
            };
            Error::internal(message)
        });
        Ok(TaskOutcome::new(http_status, error))
    }
}
