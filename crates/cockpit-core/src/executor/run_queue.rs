//! FIFO queue of accepted runs waiting for a worker.

use std::collections::VecDeque;

use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use crate::domain::{EntityKind, RunId};

/// One accepted submission. The entity name is passed explicitly so a worker
/// never reads it from shared state.
#[derive(Debug, Clone)]
pub(crate) struct RunTicket {
    pub name: String,
    pub kind: EntityKind,
    pub run_id: RunId,
    pub cancel: CancellationToken,
}

struct QueueState {
    pending: VecDeque<RunTicket>,
    closed: bool,
}

/// Tickets only; entity state stays in the registry.
pub(crate) struct RunQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl RunQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Append a ticket. Hands it back if the queue is closed.
    pub async fn push(&self, ticket: RunTicket) -> Result<(), RunTicket> {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(ticket);
            }
            state.pending.push_back(ticket);
        }
        // wake outside the lock
        self.notify.notify_one();
        Ok(())
    }

    /// Wait for the oldest ticket. `None` once the queue is closed.
    pub async fn lease(&self) -> Option<RunTicket> {
        loop {
            // Register interest before looking, so a push between the check
            // and the await still wakes this waiter.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if let Some(ticket) = state.pending.pop_front() {
                    return Some(ticket);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Stop accepting tickets and hand back everything still waiting.
    pub async fn close(&self) -> Vec<RunTicket> {
        let drained = {
            let mut state = self.state.lock().await;
            state.closed = true;
            state.pending.drain(..).collect()
        };
        self.notify.notify_waiters();
        drained
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}
