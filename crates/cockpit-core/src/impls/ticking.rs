use std::time::Duration;

use async_trait::async_trait;

use crate::domain::WorkloadError;
use crate::executor::WorkContext;
use crate::ports::Workload;

/// Advances by `step` percentage points, pausing `tick` before each step,
/// until 100.
#[derive(Debug, Clone, Copy)]
pub struct TickingWorkload {
    tick: Duration,
    step: u8,
}

impl TickingWorkload {
    /// A zero `step` is raised to 1 so the workload always terminates.
    pub fn new(tick: Duration, step: u8) -> Self {
        Self {
            tick,
            step: step.clamp(1, 100),
        }
    }
}

impl Default for TickingWorkload {
    fn default() -> Self {
        Self::new(Duration::from_millis(250), 20)
    }
}

#[async_trait]
impl Workload for TickingWorkload {
    async fn run(&self, ctx: &mut WorkContext) -> Result<(), WorkloadError> {
        let mut value: u8 = 0;
        while value < 100 {
            ctx.pause(self.tick).await?;
            value = value.saturating_add(self.step).min(100);
            ctx.report(value).await;
        }
        Ok(())
    }
}
