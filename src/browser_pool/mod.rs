//! Bounded pool of browser sessions
//!
//! At most `capacity` sessions are checked out at once; `acquire` waits on a
//! semaphore instead of polling. A session comes back to the idle set only
//! through [`PooledSession::release`]; a guard dropped any other way (error,
//! timeout, panic) discards its session so a broken browser is never reused.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::session::{BrowserSession, SessionError, SessionFactory};

/// Pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub idle: usize,
    pub checked_out: usize,
    pub peak_checked_out: usize,
    pub created: usize,
    pub discarded: usize,
}

pub struct SessionPool<F: SessionFactory> {
    factory: F,
    capacity: usize,
    idle: Mutex<VecDeque<F::Session>>,
    permits: Arc<Semaphore>,
    checked_out: AtomicUsize,
    peak_checked_out: AtomicUsize,
    created: AtomicUsize,
    discarded: AtomicUsize,
    shut_down: AtomicBool,
}

impl<F: SessionFactory> std::fmt::Debug for SessionPool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl<F: SessionFactory> SessionPool<F> {
    /// Create an empty pool; sessions are launched lazily on demand.
    pub fn new(factory: F, capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        Arc::new(Self {
            factory,
            capacity,
            idle: Mutex::new(VecDeque::with_capacity(capacity)),
            permits: Arc::new(Semaphore::new(capacity)),
            checked_out: AtomicUsize::new(0),
            peak_checked_out: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
            discarded: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Check out a session, waiting while `capacity` are already in use.
    ///
    /// Idle sessions that fail a liveness probe are discarded and replaced.
    /// A creation failure frees the slot and is returned to the caller.
    pub async fn acquire(self: &Arc<Self>) -> Result<PooledSession<F>, SessionError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(SessionError::Closed);
        }

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| SessionError::Closed)?;

        let session = loop {
            let candidate = self.idle.lock().pop_front();
            match candidate {
                Some(session) => {
                    if session.is_alive().await {
                        break session;
                    }
                    warn!("Session {} failed liveness check, replacing it", session.id());
                    self.discard(session);
                }
                None => {
                    let session = self.factory.create().await?;
                    self.created.fetch_add(1, Ordering::Relaxed);
                    debug!("Created session {}", session.id());
                    break session;
                }
            }
        };

        let now = self.checked_out.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_checked_out.fetch_max(now, Ordering::AcqRel);

        Ok(PooledSession {
            session: Some(session),
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    /// Return a healthy session to the idle set
    pub fn release(&self, guard: PooledSession<F>) {
        guard.release();
    }

    /// Report a broken session; it is closed and never handed out again
    pub fn on_error(&self, guard: PooledSession<F>) {
        guard.invalidate();
    }

    fn give_back(&self, session: F::Session) {
        self.checked_out.fetch_sub(1, Ordering::AcqRel);
        if self.shut_down.load(Ordering::Acquire) {
            self.discard(session);
            return;
        }
        debug!("Session {} returned to pool", session.id());
        self.idle.lock().push_back(session);
    }

    fn discard(&self, session: F::Session) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
        let id = session.id();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        warn!("Failed to close discarded session {id}: {e}");
                    }
                });
            }
            // No runtime left: Drop of the session releases it
            Err(_) => drop(session),
        }
    }

    /// Close every idle session and refuse further acquisitions.
    ///
    /// Sessions still checked out are closed when their guards are dropped.
    /// Close failures are logged and skipped.
    pub async fn shutdown(&self) -> usize {
        self.shut_down.store(true, Ordering::Release);
        self.permits.close();

        let sessions: Vec<_> = self.idle.lock().drain(..).collect();
        let mut closed = 0;
        for session in sessions {
            match session.close().await {
                Ok(()) => closed += 1,
                Err(e) => warn!("Failed to close session {}: {}", session.id(), e),
            }
        }
        info!("Session pool shut down, closed {closed} idle sessions");
        closed
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity,
            idle: self.idle.lock().len(),
            checked_out: self.checked_out.load(Ordering::Acquire),
            peak_checked_out: self.peak_checked_out.load(Ordering::Acquire),
            created: self.created.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

/// Exclusive handle on a pooled session
///
/// Holds one pool permit until dropped.
pub struct PooledSession<F: SessionFactory> {
    session: Option<F::Session>,
    pool: Arc<SessionPool<F>>,
    _permit: OwnedSemaphorePermit,
}

impl<F: SessionFactory> PooledSession<F> {
    /// Get reference to the underlying session
    pub fn session(&self) -> &F::Session {
        self.session.as_ref().expect("session present until released")
    }

    /// Hand the session back for reuse
    pub fn release(mut self) {
        if let Some(session) = self.session.take() {
            self.pool.give_back(session);
        }
    }

    /// Discard the session (crash, disconnect or unknown state)
    pub fn invalidate(mut self) {
        if let Some(session) = self.session.take() {
            self.pool.checked_out.fetch_sub(1, Ordering::AcqRel);
            self.pool.discard(session);
        }
    }
}

impl<F: SessionFactory> Drop for PooledSession<F> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("Session {} dropped without release, discarding", session.id());
            self.pool.checked_out.fetch_sub(1, Ordering::AcqRel);
            self.pool.discard(session);
        }
    }
}
