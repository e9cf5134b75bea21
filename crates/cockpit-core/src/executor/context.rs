//! WorkContext - what a workload sees of its run.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::{
    EntityKind, ExecutorEvent, ProgressEvent, RunId, WorkloadError, progress_for,
};
use crate::events::EventBus;
use crate::ports::Clock;
use crate::registry::Registry;

/// Progress reporting and cancellation checkpoints for one run.
///
/// Reports are made monotonic: a value below the last reported one is
/// raised to it, and only increases are recorded and published. The final
/// 100% is written by the executor together with the `complete` transition,
/// so the registry never shows a running entity at 100.
pub struct WorkContext {
    name: String,
    kind: EntityKind,
    run_id: RunId,
    items: Option<u32>,
    registry: Arc<Registry>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    progress: u8,
    completed_items: u32,
}

impl WorkContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        kind: EntityKind,
        run_id: RunId,
        items: Option<u32>,
        registry: Arc<Registry>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            name,
            kind,
            run_id,
            items,
            registry,
            bus,
            clock,
            cancel,
            progress: 0,
            completed_items: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Item count for batch runs, `None` for jobs.
    pub fn items(&self) -> Option<u32> {
        self.items
    }

    /// Last reported percentage in this run.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn completed_items(&self) -> u32 {
        self.completed_items
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancellation checkpoint.
    pub fn checkpoint(&self) -> Result<(), WorkloadError> {
        if self.cancel.is_cancelled() {
            Err(WorkloadError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `interval`, waking early with `Cancelled` if the run is cancelled.
    pub async fn pause(&self, interval: Duration) -> Result<(), WorkloadError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(WorkloadError::Cancelled),
            _ = tokio::time::sleep(interval) => self.checkpoint(),
        }
    }

    /// Report progress as a percentage. For batch runs it is converted to a
    /// completed item count (rounded down).
    pub async fn report(&mut self, percent: u8) {
        match self.items {
            Some(items) => {
                let completed = u64::from(percent.min(100)) * u64::from(items) / 100;
                // at most `items`, so it fits
                let completed = u32::try_from(completed).unwrap_or(items);
                self.report_items(completed).await;
            }
            None => {
                let value = percent.min(100).max(self.progress);
                if value == self.progress {
                    return;
                }
                self.progress = value;
                if value < 100 {
                    self.record(|registry, name| async move {
                        registry.set_progress(&name, i32::from(value)).await
                    })
                    .await;
                }
                self.publish(value);
            }
        }
    }

    /// Report the number of items finished so far. Ignored for job runs.
    pub async fn report_items(&mut self, completed: u32) {
        let Some(items) = self.items else {
            tracing::debug!(entity = %self.name, "item report ignored for a job run");
            return;
        };
        let completed = completed.min(items).max(self.completed_items);
        if completed == self.completed_items {
            return;
        }
        self.completed_items = completed;
        if completed < items {
            self.record(|registry, name| async move {
                registry.set_completed_items(&name, completed).await
            })
            .await;
        }
        let value = progress_for(completed, items);
        if value > self.progress {
            self.progress = value;
            self.publish(value);
        }
    }

    async fn record<F, Fut>(&self, write: F)
    where
        F: FnOnce(Arc<Registry>, String) -> Fut,
        Fut: std::future::Future<Output = Result<bool, crate::domain::CockpitError>>,
    {
        match write(Arc::clone(&self.registry), self.name.clone()).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(entity = %self.name, run_id = %self.run_id, "progress not recorded, entity is not running")
            }
            Err(e) => tracing::warn!(entity = %self.name, error = %e, "progress write failed"),
        }
    }

    fn publish(&self, value: u8) {
        self.bus.publish(ExecutorEvent::Progress(ProgressEvent {
            name: self.name.clone(),
            kind: self.kind,
            run_id: self.run_id,
            value,
            timestamp: self.clock.now(),
        }));
    }
}
