//! Ports - seams the executor depends on.
//!
//! - `Clock`: time source for events and run ids
//! - `IdGenerator`: run id generation
//! - `Workload`: the work a run performs

pub mod clock;
pub mod id_generator;
pub mod workload;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::workload::Workload;
