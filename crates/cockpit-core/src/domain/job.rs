//! Job record.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::CockpitError;
use super::ids::RunId;
use super::state::JobStatus;

/// Execution strategy label. Metadata only: both modes go through the same
/// worker pool and state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    #[serde(alias = "asyncio")]
    Sequential,
    #[serde(alias = "multithread")]
    Pooled,
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobMode::Sequential => f.write_str("sequential"),
            JobMode::Pooled => f.write_str("pooled"),
        }
    }
}

/// A named, independently schedulable unit of work.
///
/// Design:
/// - `name` is immutable after construction.
/// - State transitions go through methods; only the registry calls them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    name: String,
    pub mode: JobMode,
    pub status: JobStatus,
    pub progress: u8,

    /// Reason of the last failed run (`"cancelled"` for cancellations).
    pub last_error: Option<String>,

    /// Run id of the most recent run, if any.
    pub last_run: Option<RunId>,
}

impl Job {
    /// Build a job, checking the progress/status invariants.
    pub fn new(
        name: impl Into<String>,
        mode: JobMode,
        status: JobStatus,
        progress: u8,
    ) -> Result<Self, CockpitError> {
        let job = Self {
            name: name.into(),
            mode,
            status,
            progress,
            last_error: None,
            last_run: None,
        };
        job.validate()?;
        Ok(job)
    }

    /// Check the progress/status invariants. The registry re-checks on
    /// insert since `status` and `progress` are public.
    pub fn validate(&self) -> Result<(), CockpitError> {
        let invalid = |reason: &str| CockpitError::InvalidEntity {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.progress > 100 {
            return Err(invalid("progress must be within 0..=100"));
        }
        if self.progress == 100 && !self.status.is_terminal() {
            return Err(invalid("progress 100 requires status complete or failed"));
        }
        if self.status == JobStatus::Idle && self.progress != 0 {
            return Err(invalid("idle job must have progress 0"));
        }
        Ok(())
    }

    /// An idle job with no progress.
    pub fn idle(name: impl Into<String>, mode: JobMode) -> Result<Self, CockpitError> {
        Self::new(name, mode, JobStatus::Idle, 0)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reset for a new run: queued, progress 0.
    pub(crate) fn requeue(&mut self, run_id: RunId) {
        self.status = JobStatus::Queued;
        self.progress = 0;
        self.last_run = Some(run_id);
    }

    pub(crate) fn mark_complete(&mut self) {
        self.status = JobStatus::Complete;
        self.progress = 100;
        self.last_error = None;
    }

    pub(crate) fn mark_failed(&mut self, reason: String) {
        self.status = JobStatus::Failed;
        self.last_error = Some(reason);
    }
}
