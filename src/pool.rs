//! Bounded pool of rendering-engine instances.
//!
//! [`EnginePool`] is the only state shared between concurrent conversions.
//! It is constructed once (usually per process), wrapped in an [`Arc`], and
//! injected into every [`crate::convert::Converter`]. Instances are created
//! lazily up to [`PoolConfig::max_instances`]; [`EnginePool::acquire`] blocks
//! for at most the given timeout when all of them are checked out.
//!
//! A checked-out instance is a [`PooledEngine`] lease. Dropping the lease
//! returns the instance to the pool on every exit path, including panics
//! unwinding through the orchestrator.
//!
//! ## Refresh
//!
//! Long conversions on a single instance let the engine's internal caches
//! grow without bound. [`PooledEngine::refresh_if_due`] swaps the held
//! instance for a fresh one every `refresh_every` rendered pages. The method
//! takes `&mut self`, so it cannot be called while a document borrowed from
//! the lease is still open; the caller closes the document, refreshes, and
//! re-opens the document on the replacement.

use crate::engine::{EngineBackend, EngineDocument, EngineError, EngineInstance};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default upper bound on live engine instances.
pub const DEFAULT_MAX_INSTANCES: usize = 2;

/// Default bound on how long [`EnginePool::acquire`] waits.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of pages rendered on one instance before it is replaced.
pub const DEFAULT_REFRESH_EVERY: usize = 50;

/// Upper bound on a single condvar wait while a cancel token is watched.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Pool sizing and refresh policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of instances alive at once. Default: 2.
    pub max_instances: usize,
    /// Default wait bound for [`EnginePool::acquire`]. Default: 30 s.
    pub acquire_timeout: Duration,
    /// Pages rendered per instance before refresh; 0 disables. Default: 50.
    pub refresh_every: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_instances: DEFAULT_MAX_INSTANCES,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            refresh_every: DEFAULT_REFRESH_EVERY,
        }
    }
}

impl PoolConfig {
    pub fn max_instances(mut self, n: usize) -> Self {
        self.max_instances = n.max(1);
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn refresh_every(mut self, pages: usize) -> Self {
        self.refresh_every = pages;
        self
    }
}

/// Errors raised by the pool itself.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Every instance stayed checked out for the whole wait.
    #[error("No rendering engine instance became available within {}s", .waited.as_secs())]
    Timeout { waited: Duration },

    /// [`EnginePool::shutdown`] has been called.
    #[error("The rendering engine pool has been shut down")]
    ShutDown,

    /// The caller's [`CancelToken`] fired while waiting.
    #[error("Waiting for a rendering engine instance was cancelled")]
    Cancelled,

    /// The backend failed to create an instance.
    #[error("Failed to start a rendering engine instance: {0}")]
    Spawn(#[source] EngineError),
}

/// Cooperative cancellation flag shared between a caller and a conversion.
///
/// Cancellation is observed between pages and while waiting in
/// [`EnginePool::acquire_cancellable`]; a page already being rendered
/// always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Point-in-time counters, mostly for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub max_instances: usize,
    /// Instances alive (idle + checked out).
    pub live: usize,
    pub idle: usize,
    /// Instances created over the pool's lifetime, refreshes included.
    pub spawned: u64,
    /// Instances discarded by refresh.
    pub retired: u64,
    pub shut_down: bool,
}

struct PoolState<I> {
    idle: Vec<I>,
    live: usize,
    spawned: u64,
    retired: u64,
    shut_down: bool,
}

/// Bounded, thread-safe pool of engine instances.
pub struct EnginePool<B: EngineBackend> {
    backend: B,
    config: PoolConfig,
    state: Mutex<PoolState<B::Instance>>,
    available: Condvar,
}

impl<B: EngineBackend> EnginePool<B> {
    /// Create an empty pool. No instance is spawned until the first acquire.
    pub fn new(backend: B, config: PoolConfig) -> Arc<Self> {
        let config = PoolConfig {
            max_instances: config.max_instances.max(1),
            ..config
        };
        Arc::new(Self {
            backend,
            config,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                live: 0,
                spawned: 0,
                retired: 0,
                shut_down: false,
            }),
            available: Condvar::new(),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Check out an instance, waiting up to `timeout` for one to free up.
    pub fn acquire(self: &Arc<Self>, timeout: Duration) -> Result<PooledEngine<B>, PoolError> {
        self.acquire_cancellable(timeout, None)
    }

    /// Like [`acquire`](Self::acquire), but gives up early when `cancel` fires.
    pub fn acquire_cancellable(
        self: &Arc<Self>,
        timeout: Duration,
        cancel: Option<&CancelToken>,
    ) -> Result<PooledEngine<B>, PoolError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();

        loop {
            if state.shut_down {
                return Err(PoolError::ShutDown);
            }

            if let Some(instance) = state.idle.pop() {
                debug!("Engine instance reused ({} idle left)", state.idle.len());
                return Ok(self.lease(instance));
            }

            if state.live < self.config.max_instances {
                // Reserve the slot, then spawn outside the lock.
                state.live += 1;
                drop(state);
                return match self.backend.spawn() {
                    Ok(instance) => {
                        let spawned = {
                            let mut state = self.lock();
                            state.spawned += 1;
                            state.spawned
                        };
                        debug!("Engine instance spawned (#{spawned})");
                        Ok(self.lease(instance))
                    }
                    Err(e) => {
                        self.lock().live -= 1;
                        self.available.notify_one();
                        Err(PoolError::Spawn(e))
                    }
                };
            }

            if cancel.is_some_and(CancelToken::is_cancelled) {
                return Err(PoolError::Cancelled);
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "Engine pool exhausted: {} instance(s) busy for {:?}",
                    state.live, timeout
                );
                return Err(PoolError::Timeout { waited: timeout });
            }

            let mut wait = deadline - now;
            if cancel.is_some() {
                wait = wait.min(CANCEL_POLL_INTERVAL);
            }
            state = self
                .available
                .wait_timeout(state, wait)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Release every idle instance and refuse further acquisitions.
    ///
    /// Leases still checked out are dropped when they are returned.
    /// Calling this more than once is a no-op.
    pub fn shutdown(&self) {
        let drained = {
            let mut state = self.lock();
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            let drained = std::mem::take(&mut state.idle);
            state.live -= drained.len();
            drained
        };
        let released = drained.len();
        drop(drained);
        self.available.notify_all();
        info!("Engine pool shut down ({released} idle instance(s) released)");
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.lock();
        PoolStatus {
            max_instances: self.config.max_instances,
            live: state.live,
            idle: state.idle.len(),
            spawned: state.spawned,
            retired: state.retired,
            shut_down: state.shut_down,
        }
    }

    fn lease(self: &Arc<Self>, instance: B::Instance) -> PooledEngine<B> {
        PooledEngine {
            pool: Arc::clone(self),
            instance: Some(instance),
            refresh_every: self.config.refresh_every,
            refreshes: 0,
        }
    }

    fn release(&self, instance: B::Instance) {
        let mut state = self.lock();
        if state.shut_down {
            state.live -= 1;
            drop(state);
            drop(instance);
        } else {
            state.idle.push(instance);
            drop(state);
        }
        self.available.notify_one();
    }

    /// Swap `current` for a freshly spawned instance.
    ///
    /// The replacement is created first; on failure `current` is untouched.
    fn replace(&self, current: &mut B::Instance) -> Result<(), PoolError> {
        if self.is_shut_down() {
            return Err(PoolError::ShutDown);
        }
        let fresh = self.backend.spawn().map_err(PoolError::Spawn)?;
        let retired = std::mem::replace(current, fresh);
        drop(retired);

        let mut state = self.lock();
        state.spawned += 1;
        state.retired += 1;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, PoolState<B::Instance>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An engine instance checked out of an [`EnginePool`].
///
/// Returned to the pool when dropped.
pub struct PooledEngine<B: EngineBackend> {
    pool: Arc<EnginePool<B>>,
    instance: Option<B::Instance>,
    refresh_every: usize,
    refreshes: usize,
}

impl<B: EngineBackend> PooledEngine<B> {
    /// Open a document on the held instance.
    ///
    /// The returned handle borrows the lease; drop it before calling
    /// [`refresh`](Self::refresh).
    pub fn open_document(
        &self,
        bytes: &[u8],
    ) -> Result<Box<dyn EngineDocument + '_>, EngineError> {
        match &self.instance {
            Some(instance) => instance.open_document(bytes),
            None => Err(EngineError::fatal("engine instance already released")),
        }
    }

    /// Override the pool's refresh interval for this lease. 0 disables refresh.
    pub fn set_refresh_interval(&mut self, pages: usize) {
        self.refresh_every = pages;
    }

    pub fn refresh_interval(&self) -> usize {
        self.refresh_every
    }

    pub fn is_refresh_due(&self, rendered_since_refresh: usize) -> bool {
        self.refresh_every > 0 && rendered_since_refresh >= self.refresh_every
    }

    /// Replace the held instance if `rendered_since_refresh` reached the interval.
    ///
    /// Returns whether a refresh took place.
    pub fn refresh_if_due(&mut self, rendered_since_refresh: usize) -> Result<bool, PoolError> {
        if !self.is_refresh_due(rendered_since_refresh) {
            return Ok(false);
        }
        self.refresh()?;
        Ok(true)
    }

    /// Unconditionally replace the held instance with a fresh one.
    pub fn refresh(&mut self) -> Result<(), PoolError> {
        let instance = self.instance.as_mut().ok_or(PoolError::ShutDown)?;
        self.pool.replace(instance)?;
        self.refreshes += 1;
        debug!("Engine instance refreshed (refresh #{})", self.refreshes);
        Ok(())
    }

    /// Number of refreshes performed on this lease.
    pub fn refreshes(&self) -> usize {
        self.refreshes
    }

    /// Return the instance to the pool now.
    pub fn release(self) {}
}

impl<B: EngineBackend> Drop for PooledEngine<B> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            self.pool.release(instance);
        }
    }
}
