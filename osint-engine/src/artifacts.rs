//! Ephemeral artifact lifecycle
//!
//! Files left behind by tool runs (CSV reports, JSON dumps) are registered
//! here with a time-to-live. Each registered path has at most one pending
//! expiry timer; registering a path again replaces the registration, deleting
//! the stale file and starting a fresh countdown.
//!
//! In-memory timers do not survive a restart. The persisted `expires_at` rows
//! in storage are authoritative, and [`ArtifactLifecycle::sweep_expired`]
//! recovers anything the timers missed.
//!
//! Time comes from an injected [`Clock`]; [`TokioClock`] follows tokio's
//! (pausable) timer so expiry can be tested without real waiting.

use chrono::{DateTime, Utc};
use osint_common::time::add_ttl;
use osint_common::StorageGateway;
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Source of wall-clock time for expiry decisions
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock anchored at creation and advanced by tokio's timer
///
/// Under a paused runtime it only moves when tokio time is advanced.
#[derive(Debug, Clone)]
pub struct TokioClock {
    anchor: DateTime<Utc>,
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::anchored_at(Utc::now())
    }

    pub fn anchored_at(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        add_ttl(self.anchor, self.started.elapsed())
    }
}

struct Registration {
    expires_at: DateTime<Utc>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl Registration {
    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Default)]
struct Registry {
    entries: HashMap<PathBuf, Registration>,
    next_generation: u64,
}

struct Inner {
    clock: Arc<dyn Clock>,
    storage: StorageGateway,
    /// Root of per-run directories; emptied run dirs below it are removed
    work_dir: Option<PathBuf>,
    registry: Mutex<Registry>,
}

/// Registry of ephemeral files and their expiry timers
///
/// Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct ArtifactLifecycle {
    inner: Arc<Inner>,
}

impl fmt::Debug for ArtifactLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactLifecycle")
            .field("clock", &self.inner.clock)
            .field("work_dir", &self.inner.work_dir)
            .field("registered", &self.len())
            .finish()
    }
}

impl ArtifactLifecycle {
    pub fn new(clock: Arc<dyn Clock>, storage: StorageGateway) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock,
                storage,
                work_dir: None,
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    /// Lifecycle that also removes emptied run directories under `work_dir`
    pub fn with_work_dir(
        clock: Arc<dyn Clock>,
        storage: StorageGateway,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock,
                storage,
                work_dir: Some(work_dir.into()),
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    /// Schedule `path` for deletion after `ttl`
    ///
    /// An existing registration for the same path is cancelled and its file
    /// deleted before the new countdown starts. Returns the expiry time.
    pub async fn register(&self, path: impl Into<PathBuf>, ttl: Duration) -> DateTime<Utc> {
        let path = path.into();

        let stale = self.inner.lock().entries.remove(&path);
        if let Some(mut stale) = stale {
            stale.stop_timer();
            debug!(path = %path.display(), "Replacing artifact registration");
            remove_file(&path).await;
        }

        let expires_at = add_ttl(self.inner.clock.now(), ttl);
        let mut registry = self.inner.lock();
        registry.next_generation += 1;
        let generation = registry.next_generation;

        let timer = tokio::spawn(Inner::run_timer(
            Arc::clone(&self.inner),
            path.clone(),
            expires_at,
            generation,
        ));

        let registration = Registration {
            expires_at,
            generation,
            timer: Some(timer),
        };
        // A concurrent register may have slipped in while the stale file was deleted
        if let Some(mut raced) = registry.entries.insert(path.clone(), registration) {
            raced.stop_timer();
        }

        debug!(path = %path.display(), expires_at = %expires_at, "Registered artifact");
        expires_at
    }

    /// Drop the registration for `path` without touching the file
    pub fn cancel(&self, path: &Path) -> bool {
        match self.inner.lock().entries.remove(path) {
            Some(mut registration) => {
                registration.stop_timer();
                true
            }
            None => false,
        }
    }

    /// Expiry time of a registered path
    pub fn expires_at(&self, path: &Path) -> Option<DateTime<Utc>> {
        self.inner.lock().entries.get(path).map(|r| r.expires_at)
    }

    /// Most recently registered path accepted by `filter`
    pub fn latest_registered(&self, filter: impl Fn(&Path) -> bool) -> Option<PathBuf> {
        self.inner
            .lock()
            .entries
            .iter()
            .filter(|(path, _)| filter(path))
            .max_by_key(|(_, r)| r.generation)
            .map(|(path, _)| path.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete every due artifact, in memory and in storage
    ///
    /// Returns the paths processed, in-memory ones first.
    pub async fn sweep_expired(&self) -> Vec<PathBuf> {
        let now = self.inner.clock.now();
        let mut expired: Vec<PathBuf> = {
            let mut registry = self.inner.lock();
            let due: Vec<PathBuf> = registry
                .entries
                .iter()
                .filter(|(_, r)| r.expires_at <= now)
                .map(|(p, _)| p.clone())
                .collect();
            for path in &due {
                if let Some(mut registration) = registry.entries.remove(path) {
                    registration.stop_timer();
                }
            }
            due
        };
        expired.sort();

        for persisted in self.inner.storage.expire_artifacts().await {
            let path = PathBuf::from(persisted);
            if expired.contains(&path) {
                continue;
            }
            // The row is authoritative even if a timer is still pending
            let pending = self.inner.lock().entries.remove(&path);
            if let Some(mut registration) = pending {
                registration.stop_timer();
            }
            expired.push(path);
        }

        for path in &expired {
            self.inner.delete_artifact(path).await;
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "Swept expired artifacts");
        }
        expired
    }

    /// Delete every registered file now, regardless of expiry
    pub async fn purge_all(&self) -> usize {
        let drained: Vec<(PathBuf, Registration)> = self.inner.lock().entries.drain().collect();
        let count = drained.len();
        for (path, mut registration) in drained {
            registration.stop_timer();
            self.inner.delete_artifact(&path).await;
        }
        if count > 0 {
            info!(count, "Purged registered artifacts");
        }
        count
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn run_timer(
        inner: Arc<Inner>,
        path: PathBuf,
        expires_at: DateTime<Utc>,
        generation: u64,
    ) {
        // Never fire before expires_at, whatever the clock does in between
        loop {
            let remaining = (expires_at - inner.clock.now()).to_std().unwrap_or_default();
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(remaining).await;
        }

        let current = {
            let mut registry = inner.lock();
            let current = registry
                .entries
                .get(&path)
                .map_or(false, |r| r.generation == generation);
            if current {
                registry.entries.remove(&path);
            }
            current
        };
        if current {
            debug!(path = %path.display(), "Artifact expired");
            inner.delete_artifact(&path).await;
        }
    }

    async fn delete_artifact(&self, path: &Path) {
        remove_file(path).await;

        let (Some(work_dir), Some(parent)) = (self.work_dir.as_deref(), path.parent()) else {
            return;
        };
        if parent != work_dir && parent.starts_with(work_dir) {
            // Fails while the run dir still holds other files
            let _ = tokio::fs::remove_dir(parent).await;
        }
    }
}

async fn remove_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Deleted artifact"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete artifact"),
    }
}
