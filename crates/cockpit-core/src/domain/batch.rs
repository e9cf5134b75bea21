//! Batch process record: a job variant whose progress comes from an item count.

use serde::Serialize;

use super::errors::CockpitError;
use super::ids::RunId;
use super::state::BatchStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchProcess {
    name: String,
    pub description: String,
    items: u32,
    pub status: BatchStatus,

    /// Units of work finished by the current (or last) run.
    pub completed_items: u32,

    pub last_error: Option<String>,
    pub last_run: Option<RunId>,
}

impl BatchProcess {
    pub fn new(
        name: impl Into<String>,
        items: u32,
        description: impl Into<String>,
        status: BatchStatus,
    ) -> Result<Self, CockpitError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CockpitError::InvalidEntity {
                name,
                reason: "name must not be empty".into(),
            });
        }
        if items == 0 {
            return Err(CockpitError::InvalidEntity {
                name,
                reason: "items must be a positive count".into(),
            });
        }
        let completed_items = if status == BatchStatus::Complete { items } else { 0 };
        Ok(Self {
            name,
            description: description.into(),
            items,
            status,
            completed_items,
            last_error: None,
            last_run: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check the item-count invariants: at most `items` completed, and all
    /// of them only once complete.
    pub fn validate(&self) -> Result<(), CockpitError> {
        let invalid = |reason: &str| CockpitError::InvalidEntity {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.completed_items > self.items {
            return Err(invalid("completed items exceed the item count"));
        }
        if self.completed_items == self.items && self.status != BatchStatus::Complete {
            return Err(invalid("every item completed requires status complete"));
        }
        Ok(())
    }

    pub fn items(&self) -> u32 {
        self.items
    }

    /// `completed_items / items * 100`, rounded down.
    pub fn progress(&self) -> u8 {
        progress_for(self.completed_items, self.items)
    }

    pub(crate) fn requeue(&mut self, run_id: RunId) {
        self.status = BatchStatus::Ready;
        self.completed_items = 0;
        self.last_run = Some(run_id);
    }

    pub(crate) fn mark_complete(&mut self) {
        self.status = BatchStatus::Complete;
        self.completed_items = self.items;
        self.last_error = None;
    }

    /// A failed or cancelled run parks the batch back in `Scheduled`.
    pub(crate) fn mark_failed(&mut self, reason: String) {
        self.status = BatchStatus::Scheduled;
        self.last_error = Some(reason);
    }
}

/// Percentage of `completed` over `items`, rounded down and capped at 100.
pub fn progress_for(completed: u32, items: u32) -> u8 {
    if items == 0 {
        return 0;
    }
    let completed = u64::from(completed.min(items));
    (completed * 100 / u64::from(items)) as u8
}
