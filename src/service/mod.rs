pub mod daemon;
pub mod scheduler;

pub use daemon::Daemon;
pub use scheduler::Scheduler;
