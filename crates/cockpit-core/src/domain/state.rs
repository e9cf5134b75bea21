//! Status enums for jobs and batch processes.
//!
//! Job transitions:
//! - Idle -> Queued -> Running -> Complete
//! - Idle -> Queued -> Running -> Failed
//! - Queued -> Failed (cancelled before a worker picked it up)
//! - Complete | Failed -> Queued (resubmission, progress reset)
//!
//! Batch transitions:
//! - Scheduled | Ready -> Running -> Complete
//! - Running -> Scheduled (failed or cancelled run)
//! - Complete -> Ready (resubmission)

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Queued,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    /// Finished runs; progress may be 100 only here.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Idle => "idle",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Scheduled,
    Ready,
    Running,
    Complete,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Complete)
    }

    /// `Running` is entered only from `Ready` or `Scheduled`, `Complete` only from `Running`.
    pub fn can_transition_to(self, next: BatchStatus) -> bool {
        match next {
            BatchStatus::Running => matches!(self, BatchStatus::Ready | BatchStatus::Scheduled),
            BatchStatus::Complete => matches!(self, BatchStatus::Running),
            BatchStatus::Ready | BatchStatus::Scheduled => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchStatus::Scheduled => "scheduled",
            BatchStatus::Ready => "ready",
            BatchStatus::Running => "running",
            BatchStatus::Complete => "complete",
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which catalog an entity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Job,
    Batch,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Job => f.write_str("job"),
            EntityKind::Batch => f.write_str("batch"),
        }
    }
}

/// Status of either entity kind, as shown in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum EntityStatus {
    Job(JobStatus),
    Batch(BatchStatus),
}

impl EntityStatus {
    pub fn kind(self) -> EntityKind {
        match self {
            EntityStatus::Job(_) => EntityKind::Job,
            EntityStatus::Batch(_) => EntityKind::Batch,
        }
    }

    pub fn is_running(self) -> bool {
        matches!(
            self,
            EntityStatus::Job(JobStatus::Running) | EntityStatus::Batch(BatchStatus::Running)
        )
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityStatus::Job(s) => s.fmt(f),
            EntityStatus::Batch(s) => s.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::idle(JobStatus::Idle, false)]
    #[case::queued(JobStatus::Queued, false)]
    #[case::running(JobStatus::Running, false)]
    #[case::complete(JobStatus::Complete, true)]
    #[case::failed(JobStatus::Failed, true)]
    fn job_terminal_states(#[case] status: JobStatus, #[case] terminal: bool) {
        assert_eq!(status.is_terminal(), terminal);
    }

    #[rstest]
    #[case::from_scheduled(BatchStatus::Scheduled, BatchStatus::Running, true)]
    #[case::from_ready(BatchStatus::Ready, BatchStatus::Running, true)]
    #[case::from_complete(BatchStatus::Complete, BatchStatus::Running, false)]
    #[case::complete_from_running(BatchStatus::Running, BatchStatus::Complete, true)]
    #[case::complete_from_ready(BatchStatus::Ready, BatchStatus::Complete, false)]
    #[case::complete_from_scheduled(BatchStatus::Scheduled, BatchStatus::Complete, false)]
    fn batch_transition_rules(
        #[case] from: BatchStatus,
        #[case] to: BatchStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn entity_status_serializes_as_plain_string() {
        let json = serde_json::to_string(&EntityStatus::Batch(BatchStatus::Ready)).unwrap();
        assert_eq!(json, "\"ready\"");
    }
}
