//! Size-based admission control
//!
//! Before a module zip is downloaded its size is looked up and offered to a
//! [`LoadShedder`]. The shedder either refuses the request or reserves the
//! bytes until the returned [`ReleaseGuard`] is dropped. Holding the guard for
//! the whole lifetime of a fetch bounds the zip bytes resident in memory
//! across all concurrent fetches.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::ShedderStats;

/// Returns reserved capacity exactly once, on drop or on [`ReleaseGuard::release`].
#[must_use = "dropping the guard releases the reservation immediately"]
pub struct ReleaseGuard {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ReleaseGuard {
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A guard that holds nothing.
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// Release now instead of at drop.
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for ReleaseGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseGuard")
            .field("armed", &self.release.is_some())
            .finish()
    }
}

/// Result of an admission check.
#[derive(Debug)]
pub struct Admission {
    pub shed: bool,
    pub guard: ReleaseGuard,
}

impl Admission {
    pub fn admitted(guard: ReleaseGuard) -> Self {
        Self { shed: false, guard }
    }

    pub fn shed(guard: ReleaseGuard) -> Self {
        Self { shed: true, guard }
    }
}

/// Decides whether a fetch of a given size may proceed.
pub trait LoadShedder: Send + Sync {
    /// Offer `bytes` of estimated zip size. The returned guard must be held
    /// until the fetch finishes, whether or not the request was shed.
    fn should_shed(&self, bytes: u64) -> Admission;

    fn stats(&self) -> ShedderStats;
}

#[derive(Debug, Default)]
struct ShedderState {
    size_in_flight: u64,
    requests_in_flight: u64,
    requests_shed: u64,
}

/// Sheds when admitting a request would push the reserved zip bytes past a
/// fixed budget. One request is always admitted so a module larger than the
/// whole budget can still be processed when nothing else is running.
#[derive(Debug, Clone)]
pub struct ZipLoadShedder {
    max_size_in_flight: u64,
    state: Arc<Mutex<ShedderState>>,
}

impl ZipLoadShedder {
    #[must_use]
    pub fn new(max_size_in_flight: u64) -> Self {
        Self {
            max_size_in_flight,
            state: Arc::new(Mutex::new(ShedderState::default())),
        }
    }
}

impl LoadShedder for ZipLoadShedder {
    fn should_shed(&self, bytes: u64) -> Admission {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.requests_in_flight += 1;
        if state.requests_in_flight > 1
            && state.size_in_flight.saturating_add(bytes) > self.max_size_in_flight
        {
            state.requests_in_flight -= 1;
            state.requests_shed += 1;
            tracing::debug!(
                bytes,
                size_in_flight = state.size_in_flight,
                max = self.max_size_in_flight,
                "shedding request"
            );
            return Admission::shed(ReleaseGuard::noop());
        }
        state.size_in_flight += bytes;
        drop(state);

        let shared = Arc::clone(&self.state);
        Admission::admitted(ReleaseGuard::new(move || {
            let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
            state.size_in_flight = state.size_in_flight.saturating_sub(bytes);
            state.requests_in_flight = state.requests_in_flight.saturating_sub(1);
        }))
    }

    fn stats(&self) -> ShedderStats {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        ShedderStats {
            size_in_flight: state.size_in_flight,
            requests_in_flight: state.requests_in_flight,
            requests_shed: state.requests_shed,
            max_size_in_flight: self.max_size_in_flight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn guard_releases_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let guard = ReleaseGuard::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        guard.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let c = Arc::clone(&count);
        {
            let _guard = ReleaseGuard::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn first_request_always_admitted() {
        let shedder = ZipLoadShedder::new(10);
        let big = shedder.should_shed(1_000);
        assert!(!big.shed);
        assert_eq!(shedder.stats().size_in_flight, 1_000);

        let second = shedder.should_shed(1);
        assert!(second.shed);
        assert_eq!(shedder.stats().requests_shed, 1);
        assert_eq!(shedder.stats().requests_in_flight, 1);

        drop(second);
        drop(big);
        assert!(shedder.stats().is_idle());
    }

    #[test]
    fn admits_within_budget() {
        let shedder = ZipLoadShedder::new(100);
        let a = shedder.should_shed(40);
        let b = shedder.should_shed(60);
        assert!(!a.shed && !b.shed);
        assert_eq!(shedder.stats().headroom(), 0);
        assert!(shedder.should_shed(1).shed);
        drop(a);
        let c = shedder.should_shed(40);
        assert!(!c.shed);
        assert_eq!(shedder.stats().size_in_flight, 100);
    }

    #[test]
    fn concurrent_reservations_balance() {
        let shedder = ZipLoadShedder::new(1_000);
        std::thread::scope(|s| {
            for _ in 0..8 {
                let shedder = shedder.clone();
                s.spawn(move || {
                    for _ in 0..200 {
                        let admission = shedder.should_shed(7);
                        let stats = shedder.stats();
                        assert!(stats.size_in_flight <= 1_000 || stats.requests_in_flight <= 1);
                        drop(admission);
                    }
                });
            }
        });
        assert!(shedder.stats().is_idle());
    }

    proptest::proptest! {
        #[test]
        fn reserved_never_exceeds_budget_with_two_or_more(sizes in proptest::collection::vec(1u64..500, 1..30)) {
            let shedder = ZipLoadShedder::new(1_000);
            let mut held = Vec::new();
            for size in sizes {
                let admission = shedder.should_shed(size);
                if !admission.shed {
                    held.push(admission);
                }
                let stats = shedder.stats();
                if stats.requests_in_flight > 1 {
                    proptest::prop_assert!(stats.size_in_flight <= 1_000);
                }
            }
            drop(held);
            proptest::prop_assert!(shedder.stats().is_idle());
        }
    }
}
