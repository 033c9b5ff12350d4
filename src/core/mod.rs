pub mod driver;
pub mod event;
pub mod observer;
pub mod queue;
pub mod state;
pub mod timer;

pub use driver::{DrainSummary, Engine};
pub use event::SchedEvent;
pub use queue::{ReadyNode, ReadyQueue};
pub use state::{Census, Job, JobId, JobState, Priority, SchedState, SlotId, Timestamp};
pub use timer::QuantumTimer;
