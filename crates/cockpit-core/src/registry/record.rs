//! Registry record: entity + run ownership.

use serde::Serialize;

use crate::domain::{BatchProcess, CockpitError, EntityKind, EntityStatus, Job, RunId};

/// A job or a batch process, as returned by [`Registry::get`](super::Registry::get).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Job(Job),
    Batch(BatchProcess),
}

impl Entity {
    pub fn name(&self) -> &str {
        match self {
            Entity::Job(job) => job.name(),
            Entity::Batch(batch) => batch.name(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Job(_) => EntityKind::Job,
            Entity::Batch(_) => EntityKind::Batch,
        }
    }

    pub fn status(&self) -> EntityStatus {
        match self {
            Entity::Job(job) => EntityStatus::Job(job.status),
            Entity::Batch(batch) => EntityStatus::Batch(batch.status),
        }
    }

    pub fn validate(&self) -> Result<(), CockpitError> {
        match self {
            Entity::Job(job) => job.validate(),
            Entity::Batch(batch) => batch.validate(),
        }
    }

    pub fn progress(&self) -> u8 {
        match self {
            Entity::Job(job) => job.progress,
            Entity::Batch(batch) => batch.progress(),
        }
    }

    pub fn as_job(&self) -> Option<&Job> {
        match self {
            Entity::Job(job) => Some(job),
            Entity::Batch(_) => None,
        }
    }

    pub fn as_batch(&self) -> Option<&BatchProcess> {
        match self {
            Entity::Batch(batch) => Some(batch),
            Entity::Job(_) => None,
        }
    }
}

/// Single source of truth for one entity.
///
/// `active_run` is set from claim (submit) until finish, which covers both
/// queued and running. Its presence is what rejects a second submission.
#[derive(Debug, Clone)]
pub(crate) struct EntityRecord {
    pub entity: Entity,
    pub active_run: Option<RunId>,
}

impl EntityRecord {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            active_run: None,
        }
    }

    pub fn is_owned_by(&self, run_id: RunId) -> bool {
        self.active_run == Some(run_id)
    }
}
