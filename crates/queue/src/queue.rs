//! Single-flight work queue

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use modsite_errors::{Error, QueueError};
use modsite_events::{AppEvent, EventEmitter, EventSender, FailureContext, QueueEvent};
use modsite_resources::{acquire_semaphore_permit, create_semaphore};
use modsite_types::ModuleKey;
use tokio::sync::{mpsc, oneshot, Semaphore};

use crate::backend::{QueueBackend, TaskOutcome};

type SharedOutcome = Shared<BoxFuture<'static, TaskOutcome>>;

struct InFlight {
    id: u64,
    outcome: SharedOutcome,
}

/// A task waiting for a worker slot.
struct Job {
    key: ModuleKey,
    id: u64,
    done: oneshot::Sender<TaskOutcome>,
}

struct Inner {
    backend: Arc<dyn QueueBackend>,
    permits: Arc<Semaphore>,
    in_flight: DashMap<ModuleKey, InFlight>,
    dispatch: OnceLock<mpsc::UnboundedSender<Job>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    tx: Option<EventSender>,
}

impl EventEmitter for Inner {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

/// Handle on a submitted task. Awaiting it yields the shared outcome; dropping
/// it does not cancel the task.
#[derive(Clone)]
pub struct TaskHandle {
    key: ModuleKey,
    outcome: SharedOutcome,
}

impl TaskHandle {
    #[must_use]
    pub fn key(&self) -> &ModuleKey {
        &self.key
    }

    pub async fn wait(self) -> TaskOutcome {
        self.outcome.await
    }
}

/// Runs at most one task per module version at a time.
///
/// Submitting a key that is already queued or running joins the existing
/// task instead of starting another. Tasks for distinct keys run on a pool of
/// `workers` slots and start in submission order as slots free up. Once a
/// task finishes, its key may be submitted again.
///
/// Submitting requires a Tokio runtime.
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<Inner>,
}

impl WorkQueue {
    #[must_use]
    pub fn new(backend: Arc<dyn QueueBackend>, workers: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                permits: create_semaphore(workers),
                in_flight: DashMap::new(),
                dispatch: OnceLock::new(),
                next_id: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                tx: None,
            }),
        }
    }

    /// Set the event sender. Has no effect once the queue has been cloned.
    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.tx = Some(tx);
        }
        self
    }

    /// Schedule `module_path@version`.
    ///
    /// Returns the task handle and whether the request joined a task that
    /// was already in flight.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue is shut down or the key is empty.
    pub fn submit(&self, module_path: &str, version: &str) -> Result<(TaskHandle, bool), Error> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed.into());
        }
        if module_path.is_empty() || version.is_empty() {
            return Err(QueueError::InvalidTask {
                message: format!("{module_path:?}@{version:?}: module path and version are required"),
            }
            .into());
        }
        let key = ModuleKey::new(module_path, version);

        let (outcome, coalesced) = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) => (existing.get().outcome.clone(), true),
            Entry::Vacant(slot) => {
                let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
                let (done, rx) = oneshot::channel();
                self.dispatcher()
                    .send(Job {
                        key: key.clone(),
                        id,
                        done,
                    })
                    .map_err(|_| Error::from(QueueError::Closed))?;
                let outcome = Self::outcome(key.clone(), rx);
                slot.insert(InFlight {
                    id,
                    outcome: outcome.clone(),
                });
                (outcome, false)
            }
        };

        if coalesced {
            tracing::debug!(%key, "joined in-flight task");
            self.inner.emit(AppEvent::Queue(QueueEvent::Coalesced {
                key: key.to_string(),
            }));
        } else {
            self.inner.emit(AppEvent::Queue(QueueEvent::Enqueued {
                key: key.to_string(),
                pending: self.inner.in_flight.len(),
            }));
        }
        Ok((TaskHandle { key, outcome }, coalesced))
    }

    /// Schedule `module_path@version` and wait for its outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the task could not be submitted.
    pub async fn submit_and_wait(&self, module_path: &str, version: &str) -> Result<TaskOutcome, Error> {
        let (handle, _) = self.submit(module_path, version)?;
        Ok(handle.wait().await)
    }

    /// Keys queued or running, sorted.
    #[must_use]
    pub fn in_flight(&self) -> Vec<ModuleKey> {
        let mut keys: Vec<ModuleKey> = self
            .inner
            .in_flight
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    #[must_use]
    pub fn is_in_flight(&self, module_path: &str, version: &str) -> bool {
        self.inner
            .in_flight
            .contains_key(&ModuleKey::new(module_path, version))
    }

    /// Refuse new submissions. Tasks already accepted still run.
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    fn outcome(key: ModuleKey, rx: oneshot::Receiver<TaskOutcome>) -> SharedOutcome {
        async move {
            rx.await.unwrap_or_else(|_| {
                tracing::error!(%key, "queue task dropped before completing");
                TaskOutcome::from_error(
                    QueueError::TaskDropped {
                        key: key.to_string(),
                    }
                    .into(),
                )
            })
        }
        .boxed()
        .shared()
    }

    fn dispatcher(&self) -> &mpsc::UnboundedSender<Job> {
        self.inner.dispatch.get_or_init(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(Self::dispatch(Arc::downgrade(&self.inner), rx));
            tx
        })
    }

    /// Hand jobs to worker slots in arrival order. Ends when the queue is dropped.
    async fn dispatch(queue: Weak<Inner>, mut rx: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = rx.recv().await {
            let Some(inner) = queue.upgrade() else {
                break;
            };
            let permit = match acquire_semaphore_permit(Arc::clone(&inner.permits), "queue task").await {
                Ok(permit) => permit,
                Err(err) => {
                    inner.in_flight.remove_if(&job.key, |_, entry| entry.id == job.id);
                    let _ = job.done.send(TaskOutcome::from_error(err));
                    continue;
                }
            };
            tokio::spawn(async move {
                let outcome = AssertUnwindSafe(Self::run(&inner, &job.key))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Self::panicked(&inner, &job.key));
                drop(permit);
                inner.in_flight.remove_if(&job.key, |_, entry| entry.id == job.id);
                let _ = job.done.send(outcome);
            });
        }
    }

    /// Outcome of a task whose backend panicked. The key is released like
    /// any other finished task so it can be submitted again.
    fn panicked(inner: &Inner, key: &ModuleKey) -> TaskOutcome {
        tracing::error!(%key, "queue task panicked");
        let err = Error::internal(format!("task {key} panicked"));
        inner.emit(AppEvent::Queue(QueueEvent::DispatchFailed {
            key: key.to_string(),
            failure: FailureContext::from_error(&err),
        }));
        TaskOutcome::from_error(err)
    }

    async fn run(inner: &Inner, key: &ModuleKey) -> TaskOutcome {
        let started = Instant::now();
        inner.emit(AppEvent::Queue(QueueEvent::Started {
            key: key.to_string(),
            backend: inner.backend.name().to_string(),
        }));

        let outcome = match inner.backend.run(key).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(%key, error = %err, "queue backend failed");
                inner.emit(AppEvent::Queue(QueueEvent::DispatchFailed {
                    key: key.to_string(),
                    failure: FailureContext::from_error(&err),
                }));
                TaskOutcome::from_error(err)
            }
        };
        inner.emit(AppEvent::Queue(QueueEvent::Finished {
            key: key.to_string(),
            status: outcome.status,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }));
        outcome
    }
}
