//! Workload port - the pluggable unit of work a run executes.

use async_trait::async_trait;

use crate::domain::WorkloadError;
use crate::executor::WorkContext;

/// A workload drives one run of a job or batch.
///
/// It reports progress through the context and calls
/// [`WorkContext::checkpoint`] (or [`WorkContext::pause`]) between steps, where
/// a pending cancellation surfaces as `Err(WorkloadError::Cancelled)`.
///
/// # Example
/// ```ignore
/// struct Sync;
///
/// #[async_trait]
/// impl Workload for Sync {
///     async fn run(&self, ctx: &mut WorkContext) -> Result<(), WorkloadError> {
///         for pct in [50, 100] {
///             ctx.pause(Duration::from_millis(100)).await?;
///             ctx.report(pct).await;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Workload: Send + Sync {
    async fn run(&self, ctx: &mut WorkContext) -> Result<(), WorkloadError>;
}
