//! Job run records and bounded history.
//!
//! One record per execution, created when the run starts and finalized
//! when it ends; never mutated afterwards. History is bounded to the
//! most-recent N runs per job.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Per-run item counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct JobCounts {
    /// Items brought into agreement (or dispatched, for delivery jobs)
    pub reconciled: u64,
    /// Items that errored and will be retried on the next run
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Partial,
    Failed,
}

impl RunOutcome {
    /// Classify a completed run from its counters
    pub fn from_counts(counts: JobCounts) -> Self {
        match (counts.reconciled, counts.failed) {
            (_, 0) => RunOutcome::Success,
            (0, _) => RunOutcome::Failed,
            _ => RunOutcome::Partial,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::Partial => "partial",
            RunOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobRunRecord {
    pub job: String,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub items_reconciled: u64,
    pub items_failed: u64,
}

/// Most-recent-N ring of finalized run records
#[derive(Debug)]
pub struct RunHistory {
    records: VecDeque<JobRunRecord>,
    limit: usize,
}

impl RunHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(limit.min(64)),
            limit: limit.max(1),
        }
    }

    pub fn push(&mut self, record: JobRunRecord) {
        if self.records.len() == self.limit {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Newest first
    pub fn snapshot(&self) -> Vec<JobRunRecord> {
        self.records.iter().rev().cloned().collect()
    }

    pub fn last(&self) -> Option<&JobRunRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Aggregate counters over one job's retained history
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobStatsSnapshot {
    pub job: String,
    pub total_runs: u64,
    pub success: u64,
    pub partial: u64,
    pub failed: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<RunOutcome>,
}

impl JobStatsSnapshot {
    pub fn from_history(job: &str, history: &RunHistory) -> Self {
        let mut snapshot = Self {
            job: job.to_string(),
            total_runs: history.len() as u64,
            success: 0,
            partial: 0,
            failed: 0,
            last_run_at: history.last().map(|r| r.started_at),
            last_outcome: history.last().map(|r| r.outcome),
        };

        for record in &history.records {
            match record.outcome {
                RunOutcome::Success => snapshot.success += 1,
                RunOutcome::Partial => snapshot.partial += 1,
                RunOutcome::Failed => snapshot.failed += 1,
            }
        }

        snapshot
    }
}
