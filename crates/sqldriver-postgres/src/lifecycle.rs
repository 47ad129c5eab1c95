//! Ownership of native libpq handles.
//!
//! Every connection, prepared statement and result set owns exactly one
//! native pointer through [`Owned`]. `close` releases it and disarms the slot;
//! `Drop` releases whatever is still armed. A handle is therefore released
//! exactly once, whichever path gets there first.
//!
//! Process-wide counters record how each handle was released. Handles that
//! reach `Drop` without an explicit close are reported through `tracing`, and
//! a [`LeakCheck`] guard reports handles still live when it goes out of scope.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ffi::{PGconn, PGresult};

/// The kind of entity a native handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// A `PGconn` session
    Connection,
    /// The describe result cached by a prepared statement
    Statement,
    /// A command or query result
    Result,
}

impl HandleKind {
    const ALL: [HandleKind; 3] = [
        HandleKind::Connection,
        HandleKind::Statement,
        HandleKind::Result,
    ];

    const fn index(self) -> usize {
        match self {
            HandleKind::Connection => 0,
            HandleKind::Statement => 1,
            HandleKind::Result => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            HandleKind::Connection => "connection",
            HandleKind::Statement => "statement",
            HandleKind::Result => "result",
        }
    }
}

/// A libpq object that has a release function.
pub(crate) trait NativeResource {
    /// Release the object.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live handle that is never used again.
    unsafe fn release(ptr: *mut Self);
}

impl NativeResource for PGconn {
    unsafe fn release(ptr: *mut Self) {
        // SAFETY: caller hands over a live connection exactly once
        unsafe { pq_sys::PQfinish(ptr) }
    }
}

impl NativeResource for PGresult {
    unsafe fn release(ptr: *mut Self) {
        // SAFETY: caller hands over a live result exactly once
        unsafe { pq_sys::PQclear(ptr) }
    }
}

struct Counters {
    acquired: AtomicU64,
    closed: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    const fn new() -> Self {
        Self {
            acquired: AtomicU64::new(0),
            closed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }
}

static COUNTERS: [Counters; 3] = [Counters::new(), Counters::new(), Counters::new()];

fn counters(kind: HandleKind) -> &'static Counters {
    &COUNTERS[kind.index()]
}

/// Release counts for one handle kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleStats {
    /// Handles taken over from libpq
    pub acquired: u64,
    /// Handles released by an explicit close
    pub closed: u64,
    /// Handles released by `Drop` without a close
    pub dropped: u64,
}

impl HandleStats {
    /// Handles neither closed nor dropped yet.
    pub fn live(&self) -> u64 {
        self.acquired.saturating_sub(self.closed + self.dropped)
    }
}

/// Snapshot of the process-wide handle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleStats {
    pub connection: HandleStats,
    pub statement: HandleStats,
    pub result: HandleStats,
}

impl LifecycleStats {
    pub fn get(&self, kind: HandleKind) -> HandleStats {
        match kind {
            HandleKind::Connection => self.connection,
            HandleKind::Statement => self.statement,
            HandleKind::Result => self.result,
        }
    }
}

/// Read the current handle counters.
pub fn stats() -> LifecycleStats {
    let read = |kind| {
        let c = counters(kind);
        HandleStats {
            acquired: c.acquired.load(Ordering::Relaxed),
            closed: c.closed.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
        }
    };
    LifecycleStats {
        connection: read(HandleKind::Connection),
        statement: read(HandleKind::Statement),
        result: read(HandleKind::Result),
    }
}

/// Reports live and drop-released handles when it goes out of scope.
///
/// Create one at the top of `main` (or a test) to get a leak report at exit:
///
/// ```rust,ignore
/// let _leaks = sqldriver_postgres::lifecycle::LeakCheck::new();
/// ```
#[derive(Debug)]
pub struct LeakCheck {
    baseline: LifecycleStats,
}

impl LeakCheck {
    pub fn new() -> Self {
        Self { baseline: stats() }
    }

    /// Handle kinds with handles acquired since the guard was created that
    /// are still live, with their counts.
    pub fn live_since_start(&self) -> Vec<(HandleKind, u64)> {
        let now = stats();
        HandleKind::ALL
            .into_iter()
            .filter_map(|kind| {
                let before = self.baseline.get(kind);
                let after = now.get(kind);
                let live = after.live().saturating_sub(before.live());
                (live > 0).then_some((kind, live))
            })
            .collect()
    }

    /// Handles released by `Drop` instead of `close` since the guard was created.
    pub fn dropped_since_start(&self) -> u64 {
        let now = stats();
        HandleKind::ALL
            .into_iter()
            .map(|kind| now.get(kind).dropped - self.baseline.get(kind).dropped)
            .sum()
    }
}

impl Default for LeakCheck {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LeakCheck {
    fn drop(&mut self) {
        for (kind, live) in self.live_since_start() {
            tracing::warn!(handle = kind.as_str(), live, "native handles still open");
        }
        let dropped = self.dropped_since_start();
        if dropped > 0 {
            tracing::warn!(dropped, "native handles released without close");
        }
    }
}

/// Sole owner of one native handle.
pub(crate) struct Owned<T: NativeResource> {
    ptr: Option<NonNull<T>>,
    kind: HandleKind,
}

impl<T: NativeResource> Owned<T> {
    /// Take ownership of `ptr`. Returns `None` for a null pointer.
    pub(crate) fn new(ptr: *mut T, kind: HandleKind) -> Option<Self> {
        let ptr = NonNull::new(ptr)?;
        counters(kind).acquired.fetch_add(1, Ordering::Relaxed);
        Some(Self {
            ptr: Some(ptr),
            kind,
        })
    }

    /// The raw handle, or `None` once released.
    pub(crate) fn as_ptr(&self) -> Option<*mut T> {
        self.ptr.map(NonNull::as_ptr)
    }

    pub(crate) fn is_open(&self) -> bool {
        self.ptr.is_some()
    }

    /// Release the handle now. Later calls do nothing.
    pub(crate) fn close(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // SAFETY: ptr was live and the slot is now empty, so it is never used again
            unsafe { T::release(ptr.as_ptr()) };
            counters(self.kind).closed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl<T: NativeResource> Drop for Owned<T> {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            let handle = self.kind.as_str();
            if cfg!(debug_assertions) {
                tracing::warn!(handle, "releasing handle that was never closed");
            } else {
                tracing::debug!(handle, "releasing handle that was never closed");
            }
            // SAFETY: ptr was live and is dropped with its owner
            unsafe { T::release(ptr.as_ptr()) };
            counters(self.kind).dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}
