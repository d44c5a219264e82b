//! Job counters, reported on `/health`

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_accepted: AtomicU64,
    jobs_rejected: AtomicU64,
    jobs_succeeded: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_killed: AtomicU64,
    spawn_failures: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_accepted(&self) {
        self.jobs_accepted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_accepted", "Metric incremented");
    }

    pub fn job_rejected(&self) {
        self.jobs_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_rejected", "Metric incremented");
    }

    pub fn job_succeeded(&self) {
        self.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_succeeded", "Metric incremented");
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_failed", "Metric incremented");
    }

    /// Killed by the stuck-job heuristic; also counted as failed on completion
    pub fn job_killed(&self) {
        self.jobs_killed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_killed", "Metric incremented");
    }

    pub fn spawn_failed(&self) {
        self.spawn_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "spawn_failures", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_accepted: self.jobs_accepted.load(Ordering::Relaxed),
            jobs_rejected: self.jobs_rejected.load(Ordering::Relaxed),
            jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_killed: self.jobs_killed.load(Ordering::Relaxed),
            spawn_failures: self.spawn_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_accepted: u64,
    pub jobs_rejected: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub jobs_killed: u64,
    pub spawn_failures: u64,
}
