pub mod config;
pub mod core;
pub mod error;
pub mod policy;
pub mod process;
pub mod report;
pub mod service;
pub mod stats;

pub use config::SchedConfig;
pub use crate::core::{Engine, Job, JobId, Priority, SchedEvent};
pub use error::{SchedError, SchedResult};
pub use service::{Daemon, Scheduler};
