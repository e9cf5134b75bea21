//! In-memory registry implementation.

use std::collections::HashMap;

use tokio::sync::Mutex;

use super::record::{Entity, EntityRecord};
use super::{SnapshotEntry, StatusCounts};
use crate::catalog::Catalog;
use crate::domain::{BatchProcess, BatchStatus, CockpitError, EntityKind, Job, JobStatus, RunId};

/// Outcome of a submit-side claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Claim {
    Claimed(EntityKind),
    InFlight,
}

/// Registry state. Every field is only touched under the registry lock.
struct RegistryState {
    /// Registration order, used by snapshots.
    order: Vec<String>,

    records: HashMap<String, EntityRecord>,
}

impl RegistryState {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            records: HashMap::new(),
        }
    }

    fn insert(&mut self, entity: Entity) -> Result<(), CockpitError> {
        let name = entity.name().to_string();
        if self.records.contains_key(&name) {
            return Err(CockpitError::DuplicateEntity(name));
        }
        entity.validate()?;
        let entity = demote_orphaned_run(entity);
        self.order.push(name.clone());
        self.records.insert(name, EntityRecord::new(entity));
        Ok(())
    }

    fn record(&self, name: &str) -> Result<&EntityRecord, CockpitError> {
        self.records
            .get(name)
            .ok_or_else(|| CockpitError::NotFound(name.to_string()))
    }

    fn record_mut(&mut self, name: &str) -> Result<&mut EntityRecord, CockpitError> {
        self.records
            .get_mut(name)
            .ok_or_else(|| CockpitError::NotFound(name.to_string()))
    }

    fn job_mut(&mut self, name: &str) -> Result<&mut Job, CockpitError> {
        match &mut self.record_mut(name)?.entity {
            Entity::Job(job) => Ok(job),
            Entity::Batch(_) => Err(CockpitError::KindMismatch {
                name: name.to_string(),
                expected: EntityKind::Job,
            }),
        }
    }

    fn batch_mut(&mut self, name: &str) -> Result<&mut BatchProcess, CockpitError> {
        match &mut self.record_mut(name)?.entity {
            Entity::Batch(batch) => Ok(batch),
            Entity::Job(_) => Err(CockpitError::KindMismatch {
                name: name.to_string(),
                expected: EntityKind::Batch,
            }),
        }
    }

    fn snapshot(&self) -> Vec<SnapshotEntry> {
        self.order
            .iter()
            .filter_map(|name| self.records.get(name))
            .map(|record| SnapshotEntry::from(&record.entity))
            .collect()
    }

    fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for record in self.records.values() {
            match &record.entity {
                Entity::Job(job) => match job.status {
                    JobStatus::Idle => counts.idle += 1,
                    JobStatus::Queued => counts.queued += 1,
                    JobStatus::Running => counts.running += 1,
                    JobStatus::Complete => counts.complete += 1,
                    JobStatus::Failed => counts.failed += 1,
                },
                Entity::Batch(batch) => match batch.status {
                    BatchStatus::Scheduled => counts.idle += 1,
                    BatchStatus::Ready => counts.queued += 1,
                    BatchStatus::Running => counts.running += 1,
                    BatchStatus::Complete => counts.complete += 1,
                },
            }
        }
        counts
    }
}

/// A seeded entity cannot really be running: nothing owns a run yet.
fn demote_orphaned_run(mut entity: Entity) -> Entity {
    match &mut entity {
        Entity::Job(job) if job.status == JobStatus::Running => {
            tracing::warn!(job = %job.name(), "registered as running with no run in flight, demoted to queued");
            job.status = JobStatus::Queued;
        }
        Entity::Batch(batch) if batch.status == BatchStatus::Running => {
            tracing::warn!(batch = %batch.name(), "registered as running with no run in flight, demoted to ready");
            batch.status = BatchStatus::Ready;
        }
        _ => {}
    }
    entity
}

/// Thread-safe catalog of jobs and batch processes, keyed by name.
///
/// Every read and write goes through one mutex. Reads return owned copies,
/// so callers never observe a partial update.
pub struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::new()),
        }
    }

    /// Build a registry from pre-constructed entities (registration order kept).
    pub fn from_entities(entities: impl IntoIterator<Item = Entity>) -> Result<Self, CockpitError> {
        let mut state = RegistryState::new();
        for entity in entities {
            state.insert(entity)?;
        }
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    /// Seed from a catalog: jobs first, then batches, each in catalog order.
    pub fn from_catalog(catalog: &Catalog) -> Result<Self, CockpitError> {
        let registry = Self::from_entities(catalog.to_entities()?)?;
        tracing::debug!(
            jobs = catalog.jobs.len(),
            batches = catalog.batches.len(),
            "registry seeded"
        );
        Ok(registry)
    }

    pub async fn register_job(&self, job: Job) -> Result<(), CockpitError> {
        self.state.lock().await.insert(Entity::Job(job))
    }

    pub async fn register_batch(&self, batch: BatchProcess) -> Result<(), CockpitError> {
        self.state.lock().await.insert(Entity::Batch(batch))
    }

    pub async fn get(&self, name: &str) -> Result<Entity, CockpitError> {
        let state = self.state.lock().await;
        Ok(state.record(name)?.entity.clone())
    }

    pub async fn job(&self, name: &str) -> Result<Job, CockpitError> {
        let mut state = self.state.lock().await;
        state.job_mut(name).map(|job| job.clone())
    }

    pub async fn batch(&self, name: &str) -> Result<BatchProcess, CockpitError> {
        let mut state = self.state.lock().await;
        state.batch_mut(name).map(|batch| batch.clone())
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.state.lock().await.records.contains_key(name)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.records.is_empty()
    }

    /// Atomically move a job from `expected` to `next`.
    ///
    /// Returns `Ok(false)` without touching anything when the current status
    /// is not `expected`. Leaving a finished state, or entering `Idle`, resets
    /// progress to 0 so a non-terminal job never shows 100.
    pub async fn compare_and_set_status(
        &self,
        name: &str,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<bool, CockpitError> {
        let mut state = self.state.lock().await;
        let job = state.job_mut(name)?;
        if job.status != expected {
            return Ok(false);
        }
        if next == JobStatus::Idle || (!next.is_terminal() && job.status.is_terminal()) {
            job.progress = 0;
        }
        job.status = next;
        Ok(true)
    }

    /// Batch counterpart of [`compare_and_set_status`](Self::compare_and_set_status).
    ///
    /// Also refuses transitions the batch state machine forbids
    /// (`Running` only from `Ready`/`Scheduled`, `Complete` only from `Running`).
    pub async fn compare_and_set_batch_status(
        &self,
        name: &str,
        expected: BatchStatus,
        next: BatchStatus,
    ) -> Result<bool, CockpitError> {
        let mut state = self.state.lock().await;
        let batch = state.batch_mut(name)?;
        if batch.status != expected || !expected.can_transition_to(next) {
            return Ok(false);
        }
        match next {
            BatchStatus::Complete => batch.completed_items = batch.items(),
            BatchStatus::Ready | BatchStatus::Scheduled if expected.is_terminal() => {
                batch.completed_items = 0
            }
            _ => {}
        }
        batch.status = next;
        Ok(true)
    }

    /// Record job progress, clamped to `0..=99`. Only [`finish`](Self::finish)
    /// stores 100, together with the `complete` transition.
    ///
    /// No-op (`Ok(false)`) unless the job is running.
    pub async fn set_progress(&self, name: &str, value: i32) -> Result<bool, CockpitError> {
        let mut state = self.state.lock().await;
        let job = state.job_mut(name)?;
        if job.status != JobStatus::Running {
            return Ok(false);
        }
        job.progress = value.clamp(0, 99) as u8;
        Ok(true)
    }

    /// Record batch progress as a completed item count, clamped to
    /// `0..items`. The last item is counted by [`finish`](Self::finish).
    ///
    /// No-op (`Ok(false)`) unless the batch is running.
    pub async fn set_completed_items(&self, name: &str, completed: u32) -> Result<bool, CockpitError> {
        let mut state = self.state.lock().await;
        let batch = state.batch_mut(name)?;
        if batch.status != BatchStatus::Running {
            return Ok(false);
        }
        batch.completed_items = completed.min(batch.items().saturating_sub(1));
        Ok(true)
    }

    /// Point-in-time listing in registration order.
    pub async fn snapshot(&self) -> Vec<SnapshotEntry> {
        self.state.lock().await.snapshot()
    }

    pub async fn counts(&self) -> StatusCounts {
        self.state.lock().await.counts()
    }

    // ---- run ownership (executor only) ----

    /// Submit-side compare-and-set: any status except running, with no run in
    /// flight, moves to the queued role and becomes owned by `run_id`.
    pub(crate) async fn claim(&self, name: &str, run_id: RunId) -> Result<Claim, CockpitError> {
        let mut state = self.state.lock().await;
        let record = state.record_mut(name)?;
        if record.active_run.is_some() || record.entity.status().is_running() {
            return Ok(Claim::InFlight);
        }
        match &mut record.entity {
            Entity::Job(job) => job.requeue(run_id),
            Entity::Batch(batch) => batch.requeue(run_id),
        }
        record.active_run = Some(run_id);
        Ok(Claim::Claimed(record.entity.kind()))
    }

    /// `Queued -> Running` (jobs) or `Ready -> Running` (batches) for the owning run.
    pub(crate) async fn start(&self, name: &str, run_id: RunId) -> bool {
        let mut state = self.state.lock().await;
        let Ok(record) = state.record_mut(name) else {
            return false;
        };
        if !record.is_owned_by(run_id) {
            return false;
        }
        match &mut record.entity {
            Entity::Job(job) if job.status == JobStatus::Queued => {
                job.status = JobStatus::Running;
                true
            }
            Entity::Batch(batch) if batch.status.can_transition_to(BatchStatus::Running) => {
                batch.status = BatchStatus::Running;
                true
            }
            _ => false,
        }
    }

    /// End the owning run and release ownership.
    ///
    /// `failure == None` completes (progress 100 / all items) in the same
    /// critical section. `Some(reason)` fails the run; this is also accepted
    /// from the queued role for runs cancelled before they started.
    /// Returns false if `run_id` no longer owns the entity or the status does
    /// not admit the transition (ownership is released either way).
    pub(crate) async fn finish(&self, name: &str, run_id: RunId, failure: Option<String>) -> bool {
        let mut state = self.state.lock().await;
        let Ok(record) = state.record_mut(name) else {
            return false;
        };
        if !record.is_owned_by(run_id) {
            return false;
        }
        record.active_run = None;
        match (&mut record.entity, failure) {
            (Entity::Job(job), None) if job.status == JobStatus::Running => job.mark_complete(),
            (Entity::Job(job), Some(reason))
                if matches!(job.status, JobStatus::Running | JobStatus::Queued) =>
            {
                job.mark_failed(reason)
            }
            (Entity::Batch(batch), None) if batch.status == BatchStatus::Running => {
                batch.mark_complete()
            }
            (Entity::Batch(batch), Some(reason))
                if matches!(batch.status, BatchStatus::Running | BatchStatus::Ready) =>
            {
                batch.mark_failed(reason)
            }
            _ => return false,
        }
        true
    }

    /// Drop ownership without changing status (executor shutdown).
    pub(crate) async fn release(&self, name: &str, run_id: RunId) {
        let mut state = self.state.lock().await;
        if let Ok(record) = state.record_mut(name)
            && record.is_owned_by(run_id)
        {
            record.active_run = None;
        }
    }

    /// Whether a run currently owns `name`.
    pub async fn is_in_flight(&self, name: &str) -> Result<bool, CockpitError> {
        let state = self.state.lock().await;
        Ok(state.record(name)?.active_run.is_some())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
