//! Subtrack worker
//!
//! The daily lifecycle job (renewals, then reminders) and the background
//! scheduler that fires it once a day with retry on transient failures.

pub mod error;
pub mod job;
pub mod scheduler;

pub use error::{JobError, JobResultExt};
pub use job::{JobReport, LifecycleJob, ScheduledJob};
pub use scheduler::{LifecycleScheduler, LifecycleSchedulerConfig};
