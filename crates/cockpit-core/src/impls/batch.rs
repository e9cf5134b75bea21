use std::time::Duration;

use async_trait::async_trait;

use crate::domain::WorkloadError;
use crate::executor::WorkContext;
use crate::ports::Workload;

/// Processes a batch in `waves` equal chunks of `ceil(items / waves)` items,
/// pausing `tick` before each chunk.
#[derive(Debug, Clone, Copy)]
pub struct BatchWorkload {
    tick: Duration,
    waves: u32,
}

impl BatchWorkload {
    pub fn new(tick: Duration, waves: u32) -> Self {
        Self {
            tick,
            waves: waves.max(1),
        }
    }
}

impl Default for BatchWorkload {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), 10)
    }
}

#[async_trait]
impl Workload for BatchWorkload {
    async fn run(&self, ctx: &mut WorkContext) -> Result<(), WorkloadError> {
        let items = ctx
            .items()
            .ok_or_else(|| WorkloadError::failed("batch workload needs an item count"))?;
        let per_wave = items.div_ceil(self.waves).max(1);

        let mut done = 0;
        while done < items {
            ctx.pause(self.tick).await?;
            done = (done + per_wave).min(items);
            ctx.report_items(done).await;
            tracing::trace!(done, items, "wave processed");
        }
        Ok(())
    }
}
