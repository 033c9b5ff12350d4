use super::state::{Census, JobState, SchedState};
use rustc_hash::FxHashSet;

#[derive(Debug, Default)]
pub struct Observer {
    step: u64,
}

impl Observer {
    pub fn new() -> Self {
        Self { step: 0 }
    }

    pub fn steps(&self) -> u64 {
        self.step
    }

    pub fn observe(&mut self, state: &SchedState) -> Census {
        self.step += 1;

        let mut slotted = FxHashSet::default();
        for (slot, job_id) in state.occupied() {
            let job = state.job(job_id);
            let first_slot = slotted.insert(job_id);
            debug_assert!(first_slot, "job {job_id:?} occupies more than one slot");
            debug_assert_eq!(
                job.state,
                JobState::Running,
                "slot {slot} holds job {job_id:?} that is not Running"
            );
            debug_assert_eq!(
                job.current_slot,
                Some(slot),
                "job {job_id:?} metadata current_slot mismatch"
            );
            debug_assert!(
                !state.ready.contains(job_id),
                "running job {job_id:?} must not be in the ready queue"
            );
        }

        for job_id in state.ready.jobs() {
            debug_assert_eq!(
                state.job(job_id).state,
                JobState::Ready,
                "queued job {job_id:?} must be Ready"
            );
        }

        let census = state.census();
        debug_assert_eq!(
            census.ready + census.running + census.terminated,
            census.admitted,
            "job conservation violated: {census:?}"
        );
        census
    }
}
