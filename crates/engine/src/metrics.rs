use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-local counters of engine activity.
///
/// Observability only: delivery logic never reads these. All counters use
/// relaxed ordering; call [`snapshot`](Self::snapshot) for a point-in-time
/// view.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Events dispatched with at least one matching endpoint.
    pub events_dispatched: AtomicU64,
    /// Delivery rows created by dispatch.
    pub deliveries_created: AtomicU64,
    /// Deliveries moved to QUEUED by this process.
    pub claimed: AtomicU64,
    pub delivered: AtomicU64,
    pub retried: AtomicU64,
    /// Deliveries that reached the attempt ceiling.
    pub failed: AtomicU64,
    pub cancelled: AtomicU64,
    /// Claims skipped because another worker held the row.
    pub contended: AtomicU64,
    /// Orphaned claims resolved as failed attempts.
    pub stale_recovered: AtomicU64,
    /// Per-row errors during claim, send, or outcome recording.
    pub errors: AtomicU64,
}

impl EngineMetrics {
    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        Self::add(counter, 1);
    }

    /// Load every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            deliveries_created: self.deliveries_created.load(Ordering::Relaxed),
            claimed: self.claimed.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
            stale_recovered: self.stale_recovered.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// A plain data snapshot of [`EngineMetrics`] at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub events_dispatched: u64,
    pub deliveries_created: u64,
    pub claimed: u64,
    pub delivered: u64,
    pub retried: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub contended: u64,
    pub stale_recovered: u64,
    pub errors: u64,
}
