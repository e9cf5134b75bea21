//! cockpit-core
//!
//! Job and batch execution engine for the automation cockpit.
//!
//! # Modules
//! - **domain**: entities, statuses, run ids, events, errors
//! - **ports**: seams the executor depends on (Clock, IdGenerator, Workload)
//! - **registry**: thread-safe entity store with compare-and-set transitions
//! - **executor**: bounded worker pool, FIFO run queue, cancellation
//! - **events**: broadcast bus carrying executor events
//! - **impls**: reference workloads
//! - **catalog**: seed data (demo set or JSON)
//! - **config**: executor tuning from defaults and environment

pub mod catalog;
pub mod config;
pub mod domain;
pub mod events;
pub mod executor;
pub mod impls;
pub mod ports;
pub mod registry;

pub use catalog::Catalog;
pub use config::ExecutorConfig;
pub use domain::{CockpitError, ExecutorEvent, RunId};
pub use events::EventBus;
pub use executor::{ExecutorBuilder, SubmissionResult, TaskExecutor, WorkContext};
pub use registry::{Entity, Registry, SnapshotEntry};
