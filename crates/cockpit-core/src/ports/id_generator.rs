//! IdGenerator port.
//!
//! Run ids are ULIDs whose timestamp part comes from a [`Clock`], so a
//! [`FixedClock`](super::FixedClock) gives a deterministic time component.

use ulid::Ulid;

use crate::domain::RunId;
use crate::ports::Clock;

/// Generates run ids. `Send + Sync` so the executor can share one generator
/// across workers.
pub trait IdGenerator: Send + Sync {
    fn generate_run_id(&self) -> RunId;
}

/// ULID-based generator: clock time + random bits.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_run_id(&self) -> RunId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        RunId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}
