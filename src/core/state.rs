use super::queue::{ReadyNode, ReadyQueue};
use crate::error::SchedError;
use crate::process::{ExitState, Pid};
use chrono::{DateTime, Local};
use slotmap::{new_key_type, SlotMap};
use std::fmt;
use std::time::Instant;

pub type SlotId = usize;

new_key_type! {
    pub struct JobId;
}

/// Scheduling level. Numerically higher levels dispatch first and get
/// longer slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    pub const MIN: Priority = Priority(1);
    pub const MAX: Priority = Priority(4);

    pub fn new(level: i64) -> Result<Self, SchedError> {
        if (Self::MIN.0 as i64..=Self::MAX.0 as i64).contains(&level) {
            Ok(Self(level as u8))
        } else {
            Err(SchedError::InvalidPriority(level))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Priority> {
        (Self::MIN.0..=Self::MAX.0).map(Priority)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::MIN
    }
}

impl TryFrom<i64> for Priority {
    type Error = SchedError;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl std::str::FromStr for Priority {
    type Err = SchedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level: i64 = s
            .trim()
            .parse()
            .map_err(|_| SchedError::MalformedPriority(s.to_string()))?;
        Self::new(level)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A wall-clock reading for reports paired with a monotonic one for
/// interval arithmetic.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    pub wall: DateTime<Local>,
    mono: Instant,
}

impl Timestamp {
    pub fn now() -> Self {
        Self {
            wall: Local::now(),
            mono: Instant::now(),
        }
    }

    pub fn instant(&self) -> Instant {
        self.mono
    }

    /// Milliseconds elapsed from `earlier` to `self`, clamped at zero.
    pub fn ms_since(&self, earlier: &Timestamp) -> f64 {
        self.mono.saturating_duration_since(earlier.mono).as_secs_f64() * 1000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Ready,
    Running,
    Terminated,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub pid: Pid,
    pub priority: Priority,
    pub command: String,
    pub args: Vec<String>,
    pub state: JobState,
    pub current_slot: Option<SlotId>,
    pub submit_time: Timestamp,
    /// Start of the most recent running interval.
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub waiting_time_ms: f64,
    /// Length of the final running interval only.
    pub duration_ms: f64,
    /// Sum of every running interval.
    pub run_time_ms: f64,
    pub dispatches: u32,
    pub preemptions: u32,
    pub exit: Option<ExitState>,
}

impl Job {
    pub fn is_terminated(&self) -> bool {
        self.state == JobState::Terminated
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Census {
    pub ready: usize,
    pub running: usize,
    pub terminated: usize,
    pub admitted: usize,
}

#[derive(Debug)]
pub struct SchedState {
    pub jobs: SlotMap<JobId, Job>,
    /// Admission order, for history.
    pub order: Vec<JobId>,
    pub ready: ReadyQueue,
    pub slots: Vec<Option<JobId>>,
}

impl SchedState {
    pub fn new(num_slots: usize) -> Self {
        Self {
            jobs: SlotMap::with_key(),
            order: Vec::new(),
            ready: ReadyQueue::new(),
            slots: vec![None; num_slots],
        }
    }

    pub fn create_job(
        &mut self,
        pid: Pid,
        priority: Priority,
        command: String,
        args: Vec<String>,
        now: Timestamp,
    ) -> JobId {
        let id = self.jobs.insert_with_key(|id| Job {
            id,
            pid,
            priority,
            command,
            args,
            state: JobState::Ready,
            current_slot: None,
            submit_time: now,
            start_time: None,
            end_time: None,
            waiting_time_ms: 0.0,
            duration_ms: 0.0,
            run_time_ms: 0.0,
            dispatches: 0,
            preemptions: 0,
            exit: None,
        });
        self.order.push(id);
        id
    }

    pub fn job(&self, id: JobId) -> &Job {
        &self.jobs[id]
    }

    pub fn job_mut(&mut self, id: JobId) -> &mut Job {
        &mut self.jobs[id]
    }

    pub fn history(&self) -> impl Iterator<Item = &Job> + '_ {
        self.order.iter().map(move |&id| &self.jobs[id])
    }

    pub fn mark_ready(&mut self, id: JobId, now: Timestamp) {
        debug_assert!(
            self.jobs[id].current_slot.is_none(),
            "Job {id:?} must leave its slot before it is enqueued"
        );
        let job = self.job_mut(id);
        debug_assert!(
            job.state != JobState::Terminated,
            "Terminated job {:?} cannot become ready",
            job.id
        );
        job.state = JobState::Ready;
        let priority = job.priority;
        self.ready.enqueue(id, priority, now);
    }

    /// Puts a dequeued node into `slot`; returns the waiting interval it
    /// just ended, in milliseconds.
    pub fn set_running(&mut self, slot: SlotId, node: ReadyNode, now: Timestamp) -> f64 {
        debug_assert!(
            !self.ready.contains(node.job),
            "Running job {:?} must not be enqueued",
            node.job
        );
        debug_assert!(self.slots[slot].is_none(), "Slot {slot} already occupied");

        self.slots[slot] = Some(node.job);
        let waited = now.ms_since(&node.last_stopped_at);
        let job = self.job_mut(node.job);
        job.state = JobState::Running;
        job.current_slot = Some(slot);
        job.waiting_time_ms += waited;
        job.start_time = Some(now);
        job.dispatches += 1;
        waited
    }

    pub fn clear_slot(&mut self, slot: SlotId, now: Timestamp) -> Option<JobId> {
        let id = self.slots[slot].take()?;
        let job = self.job_mut(id);
        job.current_slot = None;
        if let Some(start) = job.start_time {
            job.run_time_ms += now.ms_since(&start);
        }
        Some(id)
    }

    pub fn preempt(&mut self, slot: SlotId, now: Timestamp) -> Option<JobId> {
        let id = self.clear_slot(slot, now)?;
        self.job_mut(id).preemptions += 1;
        self.mark_ready(id, now);
        Some(id)
    }

    pub fn retire(&mut self, slot: SlotId, now: Timestamp, exit: ExitState) -> Option<JobId> {
        let id = self.clear_slot(slot, now)?;
        self.mark_terminated(id, now, exit);
        Some(id)
    }

    pub fn mark_terminated(&mut self, id: JobId, now: Timestamp, exit: ExitState) {
        debug_assert!(
            !self.ready.contains(id),
            "Terminating job {id:?} that is still enqueued"
        );
        let job = self.job_mut(id);
        job.state = JobState::Terminated;
        job.current_slot = None;
        job.end_time = Some(now);
        job.duration_ms = job.start_time.map_or(0.0, |start| now.ms_since(&start));
        job.exit = Some(exit);
    }

    /// Terminates a job straight out of the queue; the time it spent
    /// queued still counts as waiting.
    pub fn abandon(&mut self, node: ReadyNode, now: Timestamp, exit: ExitState) {
        self.job_mut(node.job).waiting_time_ms += now.ms_since(&node.last_stopped_at);
        self.mark_terminated(node.job, now, exit);
    }

    pub fn idle_slot(&self) -> Option<SlotId> {
        self.slots.iter().position(Option::is_none)
    }

    pub fn occupied(&self) -> impl Iterator<Item = (SlotId, JobId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, job)| job.map(|id| (slot, id)))
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn census(&self) -> Census {
        Census {
            ready: self.ready.len(),
            running: self.occupied_count(),
            terminated: self.jobs.values().filter(|j| j.is_terminated()).count(),
            admitted: self.jobs.len(),
        }
    }
}
