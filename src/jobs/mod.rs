//! Job Scheduler.
//!
//! Owns the periodic timers that drive the reconciliation engine and any
//! other registered recurring job. One logical timer task per job; a job
//! never overlaps itself: a tick that fires while the previous run still
//! holds the run gate is skipped and logged, not queued. Runs started by
//! `trigger_now` are detached so the triggering call can be cancelled
//! without aborting the run.

pub mod history;
pub mod reminder;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use ulid::Ulid;
use utoipa::ToSchema;

pub use history::{JobCounts, JobRunRecord, JobStatsSnapshot, RunHistory, RunOutcome};

#[derive(Error, Debug)]
pub enum JobError {
    #[error("job failed: {0}")]
    Failed(String),

    #[error("unknown job: {0}")]
    UnknownJob(String),
}

#[async_trait]
pub trait RecurringJob: Send + Sync {
    fn name(&self) -> &'static str;

    fn interval(&self) -> Duration;

    /// One execution. Item-level failures are accumulated in the counts,
    /// not thrown; an `Err` means the run as a whole could not proceed.
    async fn run(&self) -> Result<JobCounts, JobError>;
}

/// Outcome of a trigger-now request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    Triggered,
    /// A run is already in progress; not an error state of the job
    Busy,
}

/// Per-job armed/running view for the admin surface
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobStatusSnapshot {
    pub name: String,
    pub armed: bool,
    pub running: bool,
    pub interval_secs: u64,
    pub skipped_ticks: u64,
}

/// Aggregate stats over every job's retained history
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SchedulerStatsSnapshot {
    pub total_runs: u64,
    pub success: u64,
    pub partial: u64,
    pub failed: u64,
    pub jobs: Vec<JobStatsSnapshot>,
}

struct RegisteredJob {
    job: Arc<dyn RecurringJob>,
    /// Non-overlap gate; whoever holds it owns the one allowed run
    run_gate: Arc<tokio::sync::Mutex<()>>,
    running: AtomicBool,
    skipped_ticks: AtomicU64,
    history: Mutex<RunHistory>,
}

impl RegisteredJob {
    fn new(job: Arc<dyn RecurringJob>, history_limit: usize) -> Self {
        Self {
            job,
            run_gate: Arc::new(tokio::sync::Mutex::new(())),
            running: AtomicBool::new(false),
            skipped_ticks: AtomicU64::new(0),
            history: Mutex::new(RunHistory::new(history_limit)),
        }
    }

    /// Execute one run and finalize exactly one run record.
    ///
    /// The caller must hold the run gate. Panics and job errors are
    /// contained here; the timer keeps firing either way.
    async fn execute(entry: Arc<Self>) {
        let started_at = chrono::Utc::now();
        let run_id = Ulid::new();
        entry.running.store(true, Ordering::SeqCst);

        let result = std::panic::AssertUnwindSafe(entry.job.run())
            .catch_unwind()
            .await;

        entry.running.store(false, Ordering::SeqCst);
        let finished_at = chrono::Utc::now();

        let (outcome, counts) = match result {
            Ok(Ok(counts)) => (RunOutcome::from_counts(counts), counts),
            Ok(Err(e)) => {
                error!(job = entry.job.name(), error = %e, "Job run failed");
                (RunOutcome::Failed, JobCounts::default())
            }
            Err(_panic) => {
                error!(job = entry.job.name(), "Job run panicked");
                (RunOutcome::Failed, JobCounts::default())
            }
        };

        info!(
            job = entry.job.name(),
            run_id = %run_id,
            outcome = outcome.as_str(),
            reconciled = counts.reconciled,
            failed = counts.failed,
            "Job run finished"
        );

        let record = JobRunRecord {
            job: entry.job.name().to_string(),
            run_id: run_id.to_string(),
            started_at,
            finished_at,
            outcome,
            items_reconciled: counts.reconciled,
            items_failed: counts.failed,
        };
        entry
            .history
            .lock()
            .expect("run history lock poisoned")
            .push(record);
    }

    /// Try to start a detached run; false if one is already in progress
    fn spawn_run(entry: &Arc<Self>) -> bool {
        match entry.run_gate.clone().try_lock_owned() {
            Ok(guard) => {
                let entry = entry.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    RegisteredJob::execute(entry).await;
                });
                true
            }
            Err(_) => false,
        }
    }
}

struct SchedulerInner {
    shutdown_tx: Option<watch::Sender<bool>>,
    timer_handles: Vec<JoinHandle<()>>,
}

pub struct JobScheduler {
    jobs: Vec<Arc<RegisteredJob>>,
    history_limit: usize,
    armed: AtomicBool,
    inner: tokio::sync::Mutex<SchedulerInner>,
}

impl JobScheduler {
    pub fn new(history_limit: usize) -> Self {
        Self {
            jobs: Vec::new(),
            history_limit,
            armed: AtomicBool::new(false),
            inner: tokio::sync::Mutex::new(SchedulerInner {
                shutdown_tx: None,
                timer_handles: Vec::new(),
            }),
        }
    }

    /// Register a recurring job. Must happen before `start`.
    pub fn register(&mut self, job: Arc<dyn RecurringJob>) {
        info!(
            job = job.name(),
            interval_secs = job.interval().as_secs(),
            "Registering recurring job"
        );
        self.jobs
            .push(Arc::new(RegisteredJob::new(job, self.history_limit)));
    }

    /// Arm one periodic timer per registered job. Returns false if the
    /// scheduler is already running.
    pub async fn start(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if self.armed.load(Ordering::SeqCst) {
            return false;
        }

        let (shutdown_tx, _) = watch::channel(false);

        for entry in &self.jobs {
            let entry = entry.clone();
            let mut shutdown_rx = shutdown_tx.subscribe();

            inner.timer_handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(entry.job.interval());
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                // The first tick of a tokio interval fires immediately;
                // consume it so the cadence starts one interval from now
                ticker.tick().await;

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if !RegisteredJob::spawn_run(&entry) {
                                entry.skipped_ticks.fetch_add(1, Ordering::SeqCst);
                                warn!(
                                    job = entry.job.name(),
                                    "Tick skipped, previous run still in progress"
                                );
                            }
                        }
                        _ = shutdown_rx.changed() => break,
                    }
                }
            }));
        }

        inner.shutdown_tx = Some(shutdown_tx);
        self.armed.store(true, Ordering::SeqCst);
        info!(jobs = self.jobs.len(), "Job scheduler started");
        true
    }

    /// Disarm the timers. An in-progress run completes before this
    /// returns, so its run record is accurate.
    pub async fn stop(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if !self.armed.load(Ordering::SeqCst) {
            return false;
        }

        if let Some(tx) = inner.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        for handle in inner.timer_handles.drain(..) {
            let _ = handle.await;
        }

        // Wait for detached runs to release their gates
        for entry in &self.jobs {
            let _ = entry.run_gate.lock().await;
        }

        self.armed.store(false, Ordering::SeqCst);
        info!("Job scheduler stopped");
        true
    }

    /// Run a job immediately, outside the regular cadence. The run is
    /// detached: dropping the caller does not abort it.
    pub fn trigger_now(&self, name: &str) -> Result<TriggerOutcome, JobError> {
        let entry = self
            .find(name)
            .ok_or_else(|| JobError::UnknownJob(name.to_string()))?;

        if RegisteredJob::spawn_run(entry) {
            info!(job = name, "Job triggered manually");
            Ok(TriggerOutcome::Triggered)
        } else {
            Ok(TriggerOutcome::Busy)
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    pub fn jobs_status(&self) -> Vec<JobStatusSnapshot> {
        let armed = self.is_armed();
        self.jobs
            .iter()
            .map(|entry| JobStatusSnapshot {
                name: entry.job.name().to_string(),
                armed,
                running: entry.running.load(Ordering::SeqCst),
                interval_secs: entry.job.interval().as_secs(),
                skipped_ticks: entry.skipped_ticks.load(Ordering::SeqCst),
            })
            .collect()
    }

    pub fn stats(&self) -> SchedulerStatsSnapshot {
        let jobs: Vec<JobStatsSnapshot> = self
            .jobs
            .iter()
            .map(|entry| {
                let history = entry.history.lock().expect("run history lock poisoned");
                JobStatsSnapshot::from_history(entry.job.name(), &history)
            })
            .collect();

        SchedulerStatsSnapshot {
            total_runs: jobs.iter().map(|j| j.total_runs).sum(),
            success: jobs.iter().map(|j| j.success).sum(),
            partial: jobs.iter().map(|j| j.partial).sum(),
            failed: jobs.iter().map(|j| j.failed).sum(),
            jobs,
        }
    }

    /// Retained run records for one job, newest first
    pub fn history(&self, name: &str) -> Result<Vec<JobRunRecord>, JobError> {
        let entry = self
            .find(name)
            .ok_or_else(|| JobError::UnknownJob(name.to_string()))?;
        Ok(entry
            .history
            .lock()
            .expect("run history lock poisoned")
            .snapshot())
    }

    fn find(&self, name: &str) -> Option<&Arc<RegisteredJob>> {
        self.jobs.iter().find(|entry| entry.job.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    /// Job with a controllable duration and failure mode
    struct StubJob {
        name: &'static str,
        interval: Duration,
        run_duration: Duration,
        runs: AtomicU32,
        panic_on_run: bool,
    }

    impl StubJob {
        fn new(name: &'static str, interval_ms: u64, run_ms: u64) -> Self {
            Self {
                name,
                interval: Duration::from_millis(interval_ms),
                run_duration: Duration::from_millis(run_ms),
                runs: AtomicU32::new(0),
                panic_on_run: false,
            }
        }
    }

    #[async_trait]
    impl RecurringJob for StubJob {
        fn name(&self) -> &'static str {
            self.name
        }

        fn interval(&self) -> Duration {
            self.interval
        }

        async fn run(&self) -> Result<JobCounts, JobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_run {
                panic!("stub job panic");
            }
            tokio::time::sleep(self.run_duration).await;
            Ok(JobCounts {
                reconciled: 1,
                failed: 0,
            })
        }
    }

    fn scheduler_with(job: Arc<dyn RecurringJob>) -> JobScheduler {
        let mut scheduler = JobScheduler::new(10);
        scheduler.register(job);
        scheduler
    }

    #[tokio::test]
    async fn test_trigger_now_records_exactly_one_run() {
        let job = Arc::new(StubJob::new("stub", 60_000, 5));
        let scheduler = scheduler_with(job.clone());

        assert_eq!(
            scheduler.trigger_now("stub").unwrap(),
            TriggerOutcome::Triggered
        );
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        let history = scheduler.history("stub").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome, RunOutcome::Success);
        assert_eq!(history[0].items_reconciled, 1);
    }

    #[tokio::test]
    async fn test_trigger_now_busy_while_running() {
        let job = Arc::new(StubJob::new("stub", 60_000, 200));
        let scheduler = scheduler_with(job.clone());

        assert_eq!(
            scheduler.trigger_now("stub").unwrap(),
            TriggerOutcome::Triggered
        );
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Second trigger while the first still holds the gate
        assert_eq!(scheduler.trigger_now("stub").unwrap(), TriggerOutcome::Busy);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_job_rejected() {
        let scheduler = scheduler_with(Arc::new(StubJob::new("stub", 60_000, 1)));

        assert!(matches!(
            scheduler.trigger_now("nope"),
            Err(JobError::UnknownJob(_))
        ));
        assert!(matches!(
            scheduler.history("nope"),
            Err(JobError::UnknownJob(_))
        ));
    }

    #[tokio::test]
    async fn test_scheduled_runs_never_overlap() {
        // Runs take ~3 tick intervals; ticks during a run must be
        // skipped, not queued
        let job = Arc::new(StubJob::new("slow", 50, 160));
        let scheduler = scheduler_with(job.clone());

        assert!(scheduler.start().await);
        tokio::time::sleep(Duration::from_millis(450)).await;
        scheduler.stop().await;

        let history = scheduler.history("slow").unwrap();
        assert!(!history.is_empty());

        // No two run records may overlap in time
        let mut intervals: Vec<(chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>)> =
            history.iter().map(|r| (r.started_at, r.finished_at)).collect();
        intervals.sort_by_key(|(start, _)| *start);
        for window in intervals.windows(2) {
            assert!(
                window[0].1 <= window[1].0,
                "run records overlap: {:?}",
                window
            );
        }

        let status = &scheduler.jobs_status()[0];
        assert!(status.skipped_ticks >= 1, "expected at least one skipped tick");
    }

    #[tokio::test]
    async fn test_start_stop_state_machine() {
        let scheduler = scheduler_with(Arc::new(StubJob::new("stub", 60_000, 1)));

        assert!(!scheduler.is_armed());
        assert!(scheduler.start().await);
        assert!(scheduler.is_armed());
        // Double start is refused
        assert!(!scheduler.start().await);

        assert!(scheduler.stop().await);
        assert!(!scheduler.is_armed());
        // Double stop is refused
        assert!(!scheduler.stop().await);

        // Restart works
        assert!(scheduler.start().await);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn test_panicking_job_records_failed_run_and_timer_survives() {
        let mut job = StubJob::new("flaky", 40, 1);
        job.panic_on_run = true;
        let job = Arc::new(job);
        let scheduler = scheduler_with(job.clone());

        assert!(scheduler.start().await);
        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.stop().await;

        // The timer kept firing across panics
        assert!(job.runs.load(Ordering::SeqCst) >= 2);
        let history = scheduler.history("flaky").unwrap();
        assert!(history.iter().all(|r| r.outcome == RunOutcome::Failed));
    }

    #[tokio::test]
    async fn test_stats_aggregate_across_jobs() {
        let job_a: Arc<dyn RecurringJob> = Arc::new(StubJob::new("a", 60_000, 1));
        let job_b: Arc<dyn RecurringJob> = Arc::new(StubJob::new("b", 60_000, 1));
        let mut scheduler = JobScheduler::new(10);
        scheduler.register(job_a);
        scheduler.register(job_b);

        scheduler.trigger_now("a").unwrap();
        scheduler.trigger_now("b").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stats = scheduler.stats();
        assert_eq!(stats.total_runs, 2);
        assert_eq!(stats.success, 2);
        assert_eq!(stats.jobs.len(), 2);
    }
}
