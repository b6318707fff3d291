//! Job registry (C7): process-wide map of in-flight and recently-completed
//! scans, the sole synchronization point between the HTTP surface / CLI and
//! the scan orchestrator (§4.7).

use bazbom_core::{DepscanError, JobStatus, Report, ScanProgress};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const DEFAULT_MAX_CONCURRENT: usize = 4;
const RETENTION: Duration = Duration::from_secs(3600);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct JobEntry {
    progress: ScanProgress,
    report: Option<Report>,
    cancel: CancellationToken,
    terminal_at: Option<Instant>,
}

/// Outcome of a [`JobRegistry::report`] lookup.
pub enum ReportOutcome {
    Ready(Report),
    Pending(JobStatus),
}

pub struct JobRegistry {
    jobs: Mutex<HashMap<String, JobEntry>>,
    max_concurrent: usize,
}

impl JobRegistry {
    pub fn new() -> Arc<Self> {
        Self::with_max_concurrent(DEFAULT_MAX_CONCURRENT)
    }

    pub fn with_max_concurrent(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            jobs: Mutex::new(HashMap::new()),
            max_concurrent,
        })
    }

    /// Allocate a new job id, rejecting with `busy` once `max_concurrent`
    /// non-terminal scans are already tracked (§4.7) — requests are
    /// rejected outright, never queued.
    pub async fn allocate(&self) -> Result<(String, CancellationToken), DepscanError> {
        let mut jobs = self.jobs.lock().await;
        let active = jobs.values().filter(|e| !e.progress.status.is_terminal()).count();
        if active >= self.max_concurrent {
            return Err(DepscanError::Busy(self.max_concurrent));
        }
        let job_id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        jobs.insert(
            job_id.clone(),
            JobEntry {
                progress: ScanProgress::new(job_id.clone()),
                report: None,
                cancel: cancel.clone(),
                terminal_at: None,
            },
        );
        Ok((job_id, cancel))
    }

    pub async fn start(&self, job_id: &str) {
        let mut jobs = self.jobs.lock().await;
        if let Some(entry) = jobs.get_mut(job_id) {
            if entry.progress.status.can_transition_to(JobStatus::Running) {
                entry.progress.status = JobStatus::Running;
            }
        }
    }

    /// Apply `f` to the job's progress snapshot. `progress_percent` is
    /// clamped to never move backwards, preserving the monotonicity
    /// invariant of §8.
    pub async fn update<F>(&self, job_id: &str, f: F)
    where
        F: FnOnce(&mut ScanProgress),
    {
        let mut jobs = self.jobs.lock().await;
        if let Some(entry) = jobs.get_mut(job_id) {
            let prev = entry.progress.progress_percent;
            f(&mut entry.progress);
            if entry.progress.progress_percent < prev {
                entry.progress.progress_percent = prev;
            }
        }
    }

    pub async fn complete(&self, job_id: &str, report: Report) {
        let mut jobs = self.jobs.lock().await;
        if let Some(entry) = jobs.get_mut(job_id) {
            if entry.progress.status.can_transition_to(JobStatus::Completed) {
                entry.progress.status = JobStatus::Completed;
                entry.progress.progress_percent = 100;
                entry.progress.current_step = "done".to_string();
                entry.progress.completed_at = Some(chrono::Utc::now());
                entry.report = Some(report);
                entry.terminal_at = Some(Instant::now());
            }
        }
    }

    pub async fn fail(&self, job_id: &str, message: impl Into<String>) {
        let mut jobs = self.jobs.lock().await;
        if let Some(entry) = jobs.get_mut(job_id) {
            if entry.progress.status.can_transition_to(JobStatus::Failed) {
                entry.progress.status = JobStatus::Failed;
                entry.progress.completed_at = Some(chrono::Utc::now());
                entry.progress.error_message = Some(message.into());
                entry.terminal_at = Some(Instant::now());
            }
        }
    }

    pub async fn progress(&self, job_id: &str) -> Result<ScanProgress, DepscanError> {
        let jobs = self.jobs.lock().await;
        jobs.get(job_id)
            .map(|e| e.progress.clone())
            .ok_or_else(|| DepscanError::NotFound(job_id.to_string()))
    }

    pub async fn report(&self, job_id: &str) -> Result<ReportOutcome, DepscanError> {
        let jobs = self.jobs.lock().await;
        let entry = jobs
            .get(job_id)
            .ok_or_else(|| DepscanError::NotFound(job_id.to_string()))?;
        match &entry.report {
            Some(report) => Ok(ReportOutcome::Ready(report.clone())),
            None => Ok(ReportOutcome::Pending(entry.progress.status)),
        }
    }

    /// Idempotent: cancelling an already-cancelled or terminal job is a
    /// no-op from the caller's perspective (§5).
    pub async fn cancel(&self, job_id: &str) -> Result<(), DepscanError> {
        let jobs = self.jobs.lock().await;
        let entry = jobs
            .get(job_id)
            .ok_or_else(|| DepscanError::NotFound(job_id.to_string()))?;
        entry.cancel.cancel();
        Ok(())
    }

    async fn evict_expired(&self) {
        let mut jobs = self.jobs.lock().await;
        let before = jobs.len();
        jobs.retain(|_, entry| match entry.terminal_at {
            Some(t) => t.elapsed() < RETENTION,
            None => true,
        });
        let evicted = before - jobs.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted expired scan jobs");
        }
    }

    /// Spawn the background sweep that evicts jobs past their retention
    /// window. Runs for the lifetime of the process; callers keep the
    /// returned handle only to shut it down in tests.
    pub fn spawn_eviction_sweep(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                registry.evict_expired().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allocate_rejects_past_max_concurrent() {
        let registry = JobRegistry::with_max_concurrent(1);
        let (_id, _cancel) = registry.allocate().await.unwrap();
        let second = registry.allocate().await;
        assert!(matches!(second, Err(DepscanError::Busy(1))));
    }

    #[tokio::test]
    async fn allocate_admits_new_job_after_completion() {
        let registry = JobRegistry::with_max_concurrent(1);
        let (id, _cancel) = registry.allocate().await.unwrap();
        registry.start(&id).await;
        registry.fail(&id, "boom").await;
        let second = registry.allocate().await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn unknown_job_id_is_not_found() {
        let registry = JobRegistry::new();
        assert!(matches!(
            registry.progress("nonexistent").await,
            Err(DepscanError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn progress_never_moves_backwards() {
        let registry = JobRegistry::with_max_concurrent(4);
        let (id, _cancel) = registry.allocate().await.unwrap();
        registry.update(&id, |p| p.progress_percent = 50).await;
        registry.update(&id, |p| p.progress_percent = 10).await;
        let progress = registry.progress(&id).await.unwrap();
        assert_eq!(progress.progress_percent, 50);
    }

    #[tokio::test]
    async fn report_is_pending_until_terminal() {
        let registry = JobRegistry::with_max_concurrent(4);
        let (id, _cancel) = registry.allocate().await.unwrap();
        registry.start(&id).await;
        match registry.report(&id).await.unwrap() {
            ReportOutcome::Pending(JobStatus::Running) => {}
            _ => panic!("expected pending report"),
        }
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let registry = JobRegistry::with_max_concurrent(4);
        let (id, _cancel) = registry.allocate().await.unwrap();
        registry.cancel(&id).await.unwrap();
        registry.cancel(&id).await.unwrap();
    }
}
