//! Reference workloads used when no per-entity workload is registered.
//!
//! - **TickingWorkload**: fixed percentage steps with a pause before each
//! - **BatchWorkload**: items processed in a fixed number of waves

pub mod batch;
pub mod ticking;

pub use self::batch::BatchWorkload;
pub use self::ticking::TickingWorkload;
