use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::context::WorkContext;
use super::run_queue::RunTicket;
use super::Shared;
use crate::domain::{EntityKind, ExecutorEvent, StartedEvent, WorkloadError};
use crate::ports::Clock;

/// Worker group handle.
/// - dropping `shutdown_tx` stops every worker and releases queued tickets
/// - `shutdown_and_join()` waits for all of them
pub(crate) struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers.
    pub fn spawn(n: usize, shared: Arc<Shared>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let shared = Arc::clone(&shared);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, shared, &mut rx).await;
            });
            joins.push(join);
        }

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    /// Stop taking new tickets. A run already executing is finished first.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for (worker_id, join) in self.joins.into_iter().enumerate() {
            if let Err(e) = join.await {
                tracing::error!(worker_id, error = %e, "worker task ended abnormally");
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    shared: Arc<Shared>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    tracing::debug!(worker_id, "worker started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // lease may wait, so race it against shutdown
        let ticket = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    // executor dropped without close()
                    let released = shared.drop_queued().await;
                    if released > 0 {
                        tracing::info!(worker_id, released, "executor dropped, queued runs released");
                    }
                    break;
                }
                continue;
            }
            ticket = shared.queue.lease() => ticket,
        };

        let Some(ticket) = ticket else {
            // queue closed
            break;
        };

        let span = tracing::info_span!(
            "run",
            worker_id,
            entity = %ticket.name,
            run_id = %ticket.run_id,
        );
        execute_run(&shared, ticket).instrument(span).await;
    }
    tracing::debug!(worker_id, "worker stopped");
}

/// Drive one ticket to its completion event.
async fn execute_run(shared: &Arc<Shared>, ticket: RunTicket) {
    let RunTicket {
        name,
        kind,
        run_id,
        cancel,
    } = ticket;

    if cancel.is_cancelled() {
        tracing::info!("cancelled before start");
        shared
            .complete_run(&name, kind, run_id, Err(WorkloadError::Cancelled), 0)
            .await;
        return;
    }

    if !shared.registry.start(&name, run_id).await {
        shared
            .complete_run(
                &name,
                kind,
                run_id,
                Err(WorkloadError::failed("status changed while queued")),
                0,
            )
            .await;
        return;
    }

    let items = match kind {
        EntityKind::Job => None,
        EntityKind::Batch => match shared.registry.batch(&name).await {
            Ok(batch) => Some(batch.items()),
            Err(e) => {
                shared
                    .complete_run(&name, kind, run_id, Err(WorkloadError::failed(e.to_string())), 0)
                    .await;
                return;
            }
        },
    };

    shared.bus.publish(ExecutorEvent::Started(StartedEvent {
        name: name.clone(),
        kind,
        run_id,
        timestamp: shared.clock.now(),
    }));
    tracing::info!(%kind, "run started");

    let mut ctx = WorkContext::new(
        name.clone(),
        kind,
        run_id,
        items,
        Arc::clone(&shared.registry),
        shared.bus.clone(),
        Arc::clone(&shared.clock),
        cancel,
    );
    let workload = shared.workloads.resolve(&name, kind);

    // Own task so a panicking workload only takes down itself.
    let handle = tokio::spawn(
        async move {
            let result = workload.run(&mut ctx).await;
            (result, ctx.progress())
        }
        .in_current_span(),
    );

    let (result, last_progress) = match handle.await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => {
            tracing::error!("workload panicked");
            (Err(WorkloadError::failed("workload panicked")), 0)
        }
        Err(e) => (Err(WorkloadError::failed(e.to_string())), 0),
    };

    shared
        .complete_run(&name, kind, run_id, result, last_progress)
        .await;
}
