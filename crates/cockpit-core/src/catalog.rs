//! Seed catalog: the static list of jobs and batches the registry starts with.
//!
//! The presentation layer owns where this comes from. The engine only needs
//! the records, either the built-in demo set or a JSON document:
//!
//! ```json
//! {
//!   "jobs": [{ "name": "Secrets Sync", "mode": "asyncio" }],
//!   "batches": [{ "name": "Bulk Repo Audit", "items": 24, "status": "scheduled" }]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{BatchProcess, BatchStatus, CockpitError, Job, JobMode, JobStatus};
use crate::registry::Entity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSeed {
    pub name: String,
    pub mode: JobMode,
    #[serde(default = "default_job_status")]
    pub status: JobStatus,
    #[serde(default)]
    pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSeed {
    pub name: String,
    pub items: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_batch_status")]
    pub status: BatchStatus,
}

fn default_job_status() -> JobStatus {
    JobStatus::Idle
}

fn default_batch_status() -> BatchStatus {
    BatchStatus::Scheduled
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub jobs: Vec<JobSeed>,
    #[serde(default)]
    pub batches: Vec<BatchSeed>,
}

impl Catalog {
    /// The cockpit's demo state.
    pub fn demo() -> Self {
        let job = |name: &str, mode, status| JobSeed {
            name: name.to_string(),
            mode,
            status,
            progress: 0,
        };
        let batch = |name: &str, items, description: &str, status| BatchSeed {
            name: name.to_string(),
            items,
            description: description.to_string(),
            status,
        };
        Self {
            jobs: vec![
                job("Secrets Sync", JobMode::Sequential, JobStatus::Idle),
                job("Drift Detector", JobMode::Pooled, JobStatus::Queued),
                job("Metrics Fanout", JobMode::Sequential, JobStatus::Idle),
            ],
            batches: vec![
                batch(
                    "Bulk Repo Audit",
                    24,
                    "Scans repos for policy compliance",
                    BatchStatus::Scheduled,
                ),
                batch(
                    "Image Retag",
                    160,
                    "Retags container images across registries",
                    BatchStatus::Ready,
                ),
                batch(
                    "Access Review",
                    48,
                    "Bulk entitlement review and approvals",
                    BatchStatus::Running,
                ),
            ],
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, CockpitError> {
        serde_json::from_str(json).map_err(|e| CockpitError::Catalog(format!("json decode: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CockpitError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CockpitError::Catalog(format!("read {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Validate every seed into an entity. Jobs first, then batches.
    pub fn to_entities(&self) -> Result<Vec<Entity>, CockpitError> {
        let jobs = self.jobs.iter().map(|seed| {
            Job::new(seed.name.clone(), seed.mode, seed.status, seed.progress).map(Entity::Job)
        });
        let batches = self.batches.iter().map(|seed| {
            BatchProcess::new(
                seed.name.clone(),
                seed.items,
                seed.description.clone(),
                seed.status,
            )
            .map(Entity::Batch)
        });
        jobs.chain(batches).collect()
    }
}
