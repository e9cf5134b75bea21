//! Domain model: entity records, statuses, ids, events, errors.

pub mod batch;
pub mod errors;
pub mod events;
pub mod ids;
pub mod job;
pub mod state;

pub use batch::{BatchProcess, progress_for};
pub use errors::{CockpitError, WorkloadError};
pub use events::{CompletionEvent, CompletionStatus, ExecutorEvent, ProgressEvent, StartedEvent};
pub use ids::{IdMarker, Run, RunId};
pub use job::{Job, JobMode};
pub use state::{BatchStatus, EntityKind, EntityStatus, JobStatus};
