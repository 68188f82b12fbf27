//! Runtime integration layer.
//!
//! Hosts the shared scheduled-task runtime so that retry delays, subscription expiry
//! tasks and missed-publication timers run independently of caller threads.

pub(crate) mod scheduler_runtime;
pub use scheduler_runtime::SchedulerRuntime;
