//! In-flight fetch registry
//!
//! Every fetch registers itself on start and is updated as it moves through
//! its phases. Finished entries linger for a while so operators can see
//! recent outcomes, then a sweeper removes them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use modsite_types::{FetchPhase, Uuid};
use serde::Serialize;
use tokio::task::JoinHandle;

/// Snapshot of one fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchInfo {
    pub id: Uuid,
    pub module_path: String,
    pub version: String,
    pub zip_size: Option<u64>,
    pub phase: FetchPhase,
    pub start: DateTime<Utc>,
    pub finish: Option<DateTime<Utc>>,
    pub status: Option<u16>,
    pub error: Option<String>,
    #[serde(skip)]
    seq: u64,
}

impl FetchInfo {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finish.is_some()
    }
}

/// Registry of fetches, shared by all fetchers of a process.
#[derive(Debug, Default)]
pub struct FetchInfoRegistry {
    entries: Mutex<HashMap<Uuid, FetchInfo>>,
    next_seq: AtomicU64,
}

impl FetchInfoRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    #[must_use]
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<FetchInfoRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, FetchInfo>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new fetch and return its id.
    pub fn start(&self, module_path: &str, version: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().insert(
            id,
            FetchInfo {
                id,
                module_path: module_path.to_string(),
                version: version.to_string(),
                zip_size: None,
                phase: FetchPhase::Start,
                start: Utc::now(),
                finish: None,
                status: None,
                error: None,
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            },
        );
        id
    }

    /// Apply `f` to the entry, if it is still registered.
    pub fn update(&self, id: Uuid, f: impl FnOnce(&mut FetchInfo)) {
        if let Some(info) = self.lock().get_mut(&id) {
            f(info);
        }
    }

    pub fn update_phase(&self, id: Uuid, phase: FetchPhase) {
        self.update(id, |info| info.phase = phase);
    }

    /// Record the outcome and start the linger period.
    pub fn finish(&self, id: Uuid, phase: FetchPhase, status: u16, error: Option<String>) {
        self.update(id, |info| {
            info.phase = phase;
            info.status = Some(status);
            info.error = error;
            info.finish = Some(Utc::now());
        });
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<FetchInfo> {
        self.lock().get(&id).cloned()
    }

    /// All entries: in-progress fetches first, each group oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<FetchInfo> {
        let mut infos: Vec<FetchInfo> = self.lock().values().cloned().collect();
        infos.sort_by(|a, b| {
            a.is_finished()
                .cmp(&b.is_finished())
                .then_with(|| a.start.cmp(&b.start))
                .then_with(|| a.seq.cmp(&b.seq))
        });
        infos
    }

    /// Remove entries that finished more than `linger` ago. Returns how many
    /// were removed.
    pub fn prune(&self, linger: Duration) -> usize {
        let linger = chrono::Duration::from_std(linger).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now().checked_sub_signed(linger);
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, info| match (info.finish, cutoff) {
            (Some(finish), Some(cutoff)) => finish > cutoff,
            (Some(_), None) | (None, _) => true,
        });
        before - entries.len()
    }

    /// Prune every `interval` until the registry is dropped.
    pub fn spawn_sweeper(registry: &Arc<Self>, linger: Duration, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(registry);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(registry) = weak.upgrade() else {
                    break;
                };
                let removed = registry.prune(linger);
                if removed > 0 {
                    tracing::debug!(removed, "pruned finished fetch infos");
                }
            }
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_and_ordering() {
        let registry = FetchInfoRegistry::new();
        let a = registry.start("example.com/a", "v1.0.0");
        let b = registry.start("example.com/b", "v1.0.0");
        let c = registry.start("example.com/c", "v1.0.0");
        registry.update(b, |info| info.zip_size = Some(42));
        registry.update_phase(c, FetchPhase::Downloading);
        registry.finish(a, FetchPhase::Committed, 200, None);

        let snapshot = registry.snapshot();
        let order: Vec<Uuid> = snapshot.iter().map(|i| i.id).collect();
        assert_eq!(order, vec![b, c, a]);
        assert_eq!(snapshot[0].zip_size, Some(42));
        assert_eq!(snapshot[1].phase, FetchPhase::Downloading);
        assert_eq!(snapshot[2].status, Some(200));
        assert!(snapshot[2].is_finished());
    }

    #[test]
    fn prune_keeps_running_and_recent() {
        let registry = FetchInfoRegistry::new();
        let running = registry.start("example.com/a", "v1.0.0");
        let done = registry.start("example.com/b", "v1.0.0");
        registry.finish(done, FetchPhase::Rejected, 404, Some("not found".into()));

        assert_eq!(registry.prune(Duration::from_secs(60)), 0);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.prune(Duration::ZERO), 1);
        assert!(registry.get(done).is_none());
        assert!(registry.get(running).is_some());
    }

    #[test]
    fn updates_to_unknown_ids_are_ignored() {
        let registry = FetchInfoRegistry::new();
        registry.update_phase(Uuid::new_v4(), FetchPhase::Failed);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_with_registry() {
        let registry = Arc::new(FetchInfoRegistry::new());
        let id = registry.start("example.com/a", "v1.0.0");
        registry.finish(id, FetchPhase::Committed, 200, None);
        let handle =
            FetchInfoRegistry::spawn_sweeper(&registry, Duration::ZERO, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(registry.is_empty());
        drop(registry);
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(handle.is_finished());
    }
}
