use super::state::{JobId, Priority, SlotId, Timestamp};
use crate::process::{ExitState, Pid};

#[derive(Debug, Clone)]
pub enum SchedEvent {
    Created {
        job: JobId,
        pid: Pid,
        priority: Priority,
        at: Timestamp,
    },
    // Entered the ready queue, on admission or after preemption
    Waiting {
        job: JobId,
        at: Timestamp,
    },
    Running {
        job: JobId,
        slot: SlotId,
        waited_ms: f64,
        at: Timestamp,
    },
    Preempted {
        job: JobId,
        slot: SlotId,
        at: Timestamp,
    },
    Finished {
        job: JobId,
        slot: Option<SlotId>,
        exit: ExitState,
        at: Timestamp,
    },
}

impl SchedEvent {
    pub fn job(&self) -> JobId {
        match self {
            SchedEvent::Created { job, .. }
            | SchedEvent::Waiting { job, .. }
            | SchedEvent::Running { job, .. }
            | SchedEvent::Preempted { job, .. }
            | SchedEvent::Finished { job, .. } => *job,
        }
    }

    pub fn at(&self) -> Timestamp {
        match self {
            SchedEvent::Created { at, .. }
            | SchedEvent::Waiting { at, .. }
            | SchedEvent::Running { at, .. }
            | SchedEvent::Preempted { at, .. }
            | SchedEvent::Finished { at, .. } => *at,
        }
    }
}
