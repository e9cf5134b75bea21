//! Job Registry: the single source of truth for job and batch state.

mod memory;
mod record;

pub use memory::Registry;
pub use record::Entity;

pub(crate) use memory::Claim;

use serde::Serialize;

use crate::domain::{EntityKind, EntityStatus};

/// One row of [`Registry::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotEntry {
    pub name: String,
    pub kind: EntityKind,
    pub status: EntityStatus,
    pub progress: u8,
}

impl From<&Entity> for SnapshotEntry {
    fn from(entity: &Entity) -> Self {
        Self {
            name: entity.name().to_string(),
            kind: entity.kind(),
            status: entity.status(),
            progress: entity.progress(),
        }
    }
}

/// Entity counts by lifecycle role. Batches are folded in by role:
/// `scheduled` counts as idle, `ready` as queued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub idle: usize,
    pub queued: usize,
    pub running: usize,
    pub complete: usize,
    pub failed: usize,
}
