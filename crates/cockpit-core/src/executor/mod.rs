//! Task executor: a fixed pool of workers draining a FIFO run queue.
//!
//! `submit` never blocks on the work itself. It claims the entity in the
//! registry, queues a ticket and returns. Workers move the entity through
//! `running` to `complete`/`failed` and publish the run's events on the bus.

mod builder;
mod context;
mod run_queue;
mod worker;
mod workloads;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

pub use self::builder::{BuildError, ExecutorBuilder};
pub use self::context::WorkContext;

use self::run_queue::{RunQueue, RunTicket};
use self::worker::WorkerGroup;
use self::workloads::WorkloadRegistry;
use crate::config::ExecutorConfig;
use crate::domain::{
    CockpitError, CompletionEvent, CompletionStatus, EntityKind, ExecutorEvent, ProgressEvent,
    RunId, WorkloadError,
};
use crate::events::EventBus;
use crate::ports::{Clock, IdGenerator};
use crate::registry::{Claim, Registry};

/// Result of [`TaskExecutor::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SubmissionResult {
    /// Queued; events for this run carry `run_id`.
    Accepted { run_id: RunId },
    /// A run for this name is already queued or running. Nothing changed.
    AlreadyRunning,
}

impl SubmissionResult {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmissionResult::Accepted { .. })
    }

    pub fn run_id(&self) -> Option<RunId> {
        match self {
            SubmissionResult::Accepted { run_id } => Some(*run_id),
            SubmissionResult::AlreadyRunning => None,
        }
    }
}

struct ActiveRun {
    run_id: RunId,
    cancel: CancellationToken,
}

/// State shared by the executor handle and its workers.
pub(crate) struct Shared {
    registry: Arc<Registry>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    queue: RunQueue,
    workloads: WorkloadRegistry,
    /// Cancellation handles of runs in flight, by entity name.
    active: Mutex<HashMap<String, ActiveRun>>,
    config: ExecutorConfig,
}

impl Shared {
    /// Finish a run in the registry, then publish its completion event.
    ///
    /// Every accepted ticket ends here exactly once.
    async fn complete_run(
        &self,
        name: &str,
        kind: EntityKind,
        run_id: RunId,
        result: Result<(), WorkloadError>,
        last_progress: u8,
    ) {
        let failure = result.err().map(|e| e.to_string());
        let applied = {
            // cancel() sees the run until the registry has finished it
            let mut active = self.active.lock().await;
            let applied = self.registry.finish(name, run_id, failure.clone()).await;
            forget(&mut active, name, run_id);
            applied
        };

        let (status, reason) = match (failure, applied) {
            (None, true) => (CompletionStatus::Complete, None),
            (None, false) => (
                CompletionStatus::Failed,
                Some("status changed during run".to_string()),
            ),
            (Some(reason), _) => (CompletionStatus::Failed, Some(reason)),
        };

        match &reason {
            None => tracing::info!(entity = %name, %run_id, "run complete"),
            Some(reason) => tracing::warn!(entity = %name, %run_id, %reason, "run failed"),
        }

        if status == CompletionStatus::Complete && last_progress < 100 {
            self.bus.publish(ExecutorEvent::Progress(ProgressEvent {
                name: name.to_string(),
                kind,
                run_id,
                value: 100,
                timestamp: self.clock.now(),
            }));
        }
        self.bus.publish(ExecutorEvent::Completion(CompletionEvent {
            name: name.to_string(),
            kind,
            run_id,
            status,
            reason,
            timestamp: self.clock.now(),
        }));
    }

    /// Close the queue and release every ticket still waiting in it.
    async fn drop_queued(&self) -> usize {
        // submit() holds this lock from its closed check to its push
        let mut active = self.active.lock().await;
        let drained = self.queue.close().await;
        for ticket in &drained {
            self.registry.release(&ticket.name, ticket.run_id).await;
            forget(&mut active, &ticket.name, ticket.run_id);
            tracing::info!(entity = %ticket.name, run_id = %ticket.run_id, "queued run dropped");
        }
        drained.len()
    }
}

/// Drop the cancellation handle of `run_id`, leaving a newer run's alone.
fn forget(active: &mut HashMap<String, ActiveRun>, name: &str, run_id: RunId) {
    if active.get(name).is_some_and(|run| run.run_id == run_id) {
        active.remove(name);
    }
}

/// Handle to a running executor.
///
/// Dropping it closes the queue: waiting tickets are released and the
/// workers stop once their current run ends. Call
/// [`shutdown_and_join`](Self::shutdown_and_join) to wait for that.
pub struct TaskExecutor {
    shared: Arc<Shared>,
    workers: WorkerGroup,
}

impl TaskExecutor {
    pub fn builder(registry: Arc<Registry>) -> ExecutorBuilder {
        ExecutorBuilder::new(registry)
    }

    /// Queue a run for `name`.
    ///
    /// Returns `AlreadyRunning` when a run for `name` is queued or running.
    /// Of any number of concurrent calls for an idle entity, exactly one is
    /// accepted.
    pub async fn submit(&self, name: &str) -> Result<SubmissionResult, CockpitError> {
        let run_id = self.shared.ids.generate_run_id();
        let cancel = CancellationToken::new();

        // Held until the push: cancel() never sees a claimed run without its
        // token, and close() cannot land between the closed check and the push.
        let mut active = self.shared.active.lock().await;
        if self.shared.queue.is_closed().await {
            return Err(CockpitError::ExecutorClosed);
        }
        let kind = match self.shared.registry.claim(name, run_id).await? {
            Claim::Claimed(kind) => kind,
            Claim::InFlight => {
                tracing::info!(entity = %name, "submit ignored, run already in flight");
                return Ok(SubmissionResult::AlreadyRunning);
            }
        };

        let ticket = RunTicket {
            name: name.to_string(),
            kind,
            run_id,
            cancel: cancel.clone(),
        };
        if let Err(ticket) = self.shared.queue.push(ticket).await {
            self.shared.registry.release(&ticket.name, ticket.run_id).await;
            return Err(CockpitError::ExecutorClosed);
        }
        active.insert(name.to_string(), ActiveRun { run_id, cancel });
        drop(active);

        tracing::info!(entity = %name, %kind, %run_id, "run queued");
        Ok(SubmissionResult::Accepted { run_id })
    }

    /// Request cooperative cancellation of the run in flight for `name`.
    ///
    /// The run ends `failed` with reason `cancelled` once the workload
    /// reaches a checkpoint, or as soon as a worker dequeues it if it has
    /// not started. Returns `false` when nothing is in flight. `true` means
    /// the registry still had the run in flight when the request landed; a
    /// workload that already returned may still complete.
    pub async fn cancel(&self, name: &str) -> Result<bool, CockpitError> {
        if !self.shared.registry.contains(name).await {
            return Err(CockpitError::NotFound(name.to_string()));
        }
        let active = self.shared.active.lock().await;
        match active.get(name) {
            Some(run) => {
                run.cancel.cancel();
                tracing::info!(entity = %name, run_id = %run.run_id, "cancellation requested");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ExecutorEvent> {
        self.shared.bus.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.bus
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.shared.registry
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.shared.config
    }

    pub fn pool_size(&self) -> usize {
        self.workers.len()
    }

    /// Tickets accepted but not yet picked up by a worker.
    pub async fn queued_len(&self) -> usize {
        self.shared.queue.len().await
    }

    /// Stop accepting submissions. Later `submit` calls fail with
    /// [`CockpitError::ExecutorClosed`].
    ///
    /// Tickets still waiting are dropped: their entities keep the queued
    /// status with no run in flight, so they can be submitted again to a
    /// later executor. Returns how many were dropped.
    pub async fn close(&self) -> usize {
        self.shared.drop_queued().await
    }

    /// [`close`](Self::close), then wait for the workers. Runs already
    /// executing are finished first.
    pub async fn shutdown_and_join(self) {
        let dropped = self.close().await;
        self.workers.shutdown_and_join().await;
        tracing::info!(dropped, "executor stopped");
    }
}
