use crate::core::{Job, Priority};
use average::{Estimate, Mean};

#[derive(Debug, Clone, PartialEq)]
pub struct PriorityStats {
    pub priority: Priority,
    pub jobs: u64,
    pub mean_waiting_ms: f64,
    pub mean_duration_ms: f64,
}

/// Per-level means over terminated jobs. Levels without a terminated job
/// are left out rather than reported as zero.
pub fn aggregate<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Vec<PriorityStats> {
    let mut waiting: [Mean; 4] = Default::default();
    let mut duration: [Mean; 4] = Default::default();

    for job in jobs.into_iter().filter(|j| j.is_terminated()) {
        let level = (job.priority.get() - 1) as usize;
        waiting[level].add(job.waiting_time_ms);
        duration[level].add(job.duration_ms);
    }

    Priority::all()
        .zip(waiting.iter().zip(duration.iter()))
        .filter(|(_, (w, _))| !w.is_empty())
        .map(|(priority, (w, d))| PriorityStats {
            priority,
            jobs: w.len(),
            mean_waiting_ms: w.estimate(),
            mean_duration_ms: d.estimate(),
        })
        .collect()
}
