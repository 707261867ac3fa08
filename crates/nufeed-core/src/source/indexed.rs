//! Index-accelerated source decorator.
//!
//! Wraps any [`PackageSource`] with an in-memory [`Index`] rebuilt by a
//! background task. Readers block only until the first rebuild publishes;
//! after that every read is served from the last published snapshot while
//! rebuilds prepare the next one. Pushes update the snapshot synchronously
//! inside the same critical section that guards rebuild publication, so a
//! caller who saw a push succeed will find the package in the index.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, error, warn};

use crate::error::{ErrorContext, NufeedError};
use crate::index::Index;
use crate::package::Package;
use crate::source::push::PushStrategy;
use crate::source::PackageSource;
use crate::version::Version;

struct Shared {
    underlying: Arc<dyn PackageSource>,
    /// The published snapshot. `None` until the first rebuild completes;
    /// readers wait on `published` for that one transition.
    slot: Mutex<Option<Arc<Index>>>,
    published: Condvar,
    /// Serializes rebuilds against pushes. One scope per instance; sharing a
    /// process-wide lock would serialize unrelated sources for no reason.
    mutation: Mutex<()>,
    stopped: Mutex<bool>,
    stop_signal: Condvar,
    refresh: Option<Duration>,
}

impl Shared {
    /// Scans the underlying source into a fresh index and swaps it in. Runs
    /// entirely inside the mutation section so a concurrent push cannot land
    /// between the scan and the publish and get overwritten.
    fn rebuild(&self) -> Result<(), NufeedError> {
        let _guard = self.mutation.lock()?;
        let packages = self.underlying.list_all()?;

        let loaded: Vec<Package> = packages
            .into_par_iter()
            .filter(|package| match package.load() {
                Ok(()) => true,
                Err(err) => {
                    warn!("Excluding {package} from the index: {err}");
                    false
                }
            })
            .collect();

        let mut index = Index::new();
        let count = loaded.len();
        for package in loaded {
            index.put(package);
        }

        let mut slot = self.slot.lock()?;
        *slot = Some(Arc::new(index));
        self.published.notify_all();
        debug!("Published index with {count} packages");
        Ok(())
    }

    /// Sleeps until the refresh interval elapses or `stop` fires. Returns
    /// true when the loop should end.
    fn wait_for_stop(&self, interval: Duration) -> bool {
        let Ok(stopped) = self.stopped.lock() else {
            return true;
        };
        match self
            .stop_signal
            .wait_timeout_while(stopped, interval, |stopped| !*stopped)
        {
            Ok((stopped, _)) => *stopped,
            Err(_) => true,
        }
    }
}

/// Decorates a base source with a background-refreshed index.
pub struct IndexedSource {
    shared: Arc<Shared>,
}

impl IndexedSource {
    /// Wraps a source. No rebuild runs until [`start`](Self::start) is
    /// called; reads before the first publish block on the startup barrier.
    pub fn new(underlying: Arc<dyn PackageSource>) -> Self {
        Self::with_options(underlying, None)
    }

    /// Wraps a source with a periodic rebuild, so the index follows
    /// out-of-band changes to the underlying store.
    pub fn with_refresh(underlying: Arc<dyn PackageSource>, interval: Duration) -> Self {
        Self::with_options(underlying, Some(interval))
    }

    fn with_options(underlying: Arc<dyn PackageSource>, refresh: Option<Duration>) -> Self {
        Self {
            shared: Arc::new(Shared {
                underlying,
                slot: Mutex::new(None),
                published: Condvar::new(),
                mutation: Mutex::new(()),
                stopped: Mutex::new(false),
                stop_signal: Condvar::new(),
                refresh,
            }),
        }
    }

    /// Starts the rebuild task. With a refresh interval the task loops until
    /// the handle stops it; without one it builds once and exits.
    pub fn start(&self) -> Result<RebuildHandle, NufeedError> {
        let shared = self.shared.clone();
        let thread = thread::Builder::new()
            .name("nufeed-index".to_string())
            .spawn(move || loop {
                if let Err(err) = shared.rebuild() {
                    error!("Index rebuild failed: {err}");
                }
                let Some(interval) = shared.refresh else {
                    break;
                };
                if shared.wait_for_stop(interval) {
                    break;
                }
            })
            .with_context(|| "spawning the index rebuild thread".to_string())?;
        Ok(RebuildHandle {
            shared: self.shared.clone(),
            thread: Some(thread),
        })
    }

    /// The current snapshot, waiting on the startup barrier if nothing has
    /// been published yet.
    fn snapshot(&self) -> Result<Arc<Index>, NufeedError> {
        let mut slot = self.shared.slot.lock()?;
        loop {
            if let Some(index) = slot.as_ref() {
                return Ok(index.clone());
            }
            slot = self.shared.published.wait(slot)?;
        }
    }
}

impl PackageSource for IndexedSource {
    fn list_all(&self) -> Result<Vec<Package>, NufeedError> {
        Ok(self.snapshot()?.all_packages().cloned().collect())
    }

    fn list_by_id(&self, id: &str) -> Result<Vec<Package>, NufeedError> {
        Ok(self
            .snapshot()?
            .packages_by_id_ignore_case(id)
            .into_iter()
            .cloned()
            .collect())
    }

    fn list_latest_all(&self) -> Result<Vec<Package>, NufeedError> {
        let index = self.snapshot()?;
        let mut result = Vec::new();
        for entry in index.last_versions() {
            match entry {
                Some(package) => result.push(package.clone()),
                // Should not happen given the index invariants; filter with
                // a warning rather than dropping silently.
                None => warn!("Index entry without versions while listing latest packages"),
            }
        }
        Ok(result)
    }

    fn get_latest(&self, id: &str) -> Result<Option<Package>, NufeedError> {
        Ok(self.snapshot()?.last_version(id).cloned())
    }

    fn get_exact(&self, id: &str, version: &Version) -> Result<Option<Package>, NufeedError> {
        Ok(self.snapshot()?.package(id, version).cloned())
    }

    /// Pushes through to the underlying source, then folds the stored copy
    /// into the published snapshot before returning. The re-read picks up
    /// canonical on-disk state instead of trusting the uploaded object.
    fn push(&self, package: &Package, api_key: Option<&str>) -> Result<bool, NufeedError> {
        let _guard = self.shared.mutation.lock()?;
        if !self.shared.underlying.push(package, api_key)? {
            return Ok(false);
        }

        let stored = self
            .shared
            .underlying
            .get_exact(package.id(), package.version())?
            .ok_or_else(|| {
                NufeedError::PackageNotFound(format!(
                    "{package} vanished from the underlying source after push"
                ))
            })?;
        stored.load()?;

        // When nothing has been published yet the pending first rebuild
        // scans the underlying source and picks the package up itself.
        let mut slot = self.shared.slot.lock()?;
        if let Some(current) = slot.as_ref() {
            // Copy-on-write: readers keep the old snapshot until the
            // replacement is in place.
            let mut next = (**current).clone();
            next.put(stored);
            *slot = Some(Arc::new(next));
        }
        Ok(true)
    }

    fn remove(&self, _id: &str, _version: &Version) -> Result<(), NufeedError> {
        Err(NufeedError::UnsupportedOperation(
            "remove on an indexed source",
        ))
    }

    fn push_strategy(&self) -> Result<Arc<dyn PushStrategy>, NufeedError> {
        self.shared.underlying.push_strategy()
    }

    fn set_push_strategy(&self, strategy: Arc<dyn PushStrategy>) -> Result<(), NufeedError> {
        self.shared.underlying.set_push_strategy(strategy)
    }
}

impl std::fmt::Debug for IndexedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedSource")
            .field("underlying", &self.shared.underlying)
            .field("refresh", &self.shared.refresh)
            .finish()
    }
}

/// Handle of a running rebuild task. Stopping (or dropping) cancels the
/// refresh loop and joins the thread.
pub struct RebuildHandle {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl RebuildHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Ok(mut stopped) = self.shared.stopped.lock() {
            *stopped = true;
        }
        self.shared.stop_signal.notify_all();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for RebuildHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RebuildHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebuildHandle").finish_non_exhaustive()
    }
}
