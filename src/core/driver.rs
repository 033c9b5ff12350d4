use super::{
    event::SchedEvent,
    observer::Observer,
    queue::ReadyNode,
    state::{Census, JobId, Priority, SchedState, SlotId, Timestamp},
    timer::QuantumTimer,
};
use crate::{
    config::SchedConfig,
    error::SchedResult,
    policy::SlicePolicy,
    process::{ExitState, ProcStatus, ProcessControl},
};
use log::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainSummary {
    pub cycles: u32,
    pub dispatched: u32,
    pub finished: u32,
    pub preempted: u32,
}

impl DrainSummary {
    pub fn absorb(&mut self, other: DrainSummary) {
        self.cycles += other.cycles;
        self.dispatched += other.dispatched;
        self.finished += other.finished;
        self.preempted += other.preempted;
    }
}

/// The dispatch loop. Not synchronised: callers hold the scheduling gate.
pub struct Engine<P: ProcessControl, S: SlicePolicy> {
    pub state: SchedState,
    procs: P,
    policy: S,
    config: SchedConfig,
    observer: Observer,
    events: Vec<SchedEvent>,
}

impl<P: ProcessControl, S: SlicePolicy> Engine<P, S> {
    pub fn new(config: SchedConfig, procs: P) -> Self {
        let policy = S::init(&config);
        info!(
            "engine initialised: {} slot(s), base quantum {:?}, {} slices",
            config.ncpu,
            config.base_quantum(),
            policy.name()
        );
        Self {
            state: SchedState::new(config.ncpu),
            procs,
            policy,
            config,
            observer: Observer::new(),
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    pub fn policy(&self) -> &S {
        &self.policy
    }

    pub fn procs(&self) -> &P {
        &self.procs
    }

    pub fn procs_mut(&mut self) -> &mut P {
        &mut self.procs
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    pub fn census(&self) -> Census {
        self.state.census()
    }

    pub fn is_idle(&self) -> bool {
        self.state.ready.is_empty() && self.state.occupied_count() == 0
    }

    pub fn take_events(&mut self) -> Vec<SchedEvent> {
        std::mem::take(&mut self.events)
    }

    /// Creates the job's process (stopped) and queues it. Nothing is
    /// recorded if the process cannot be created.
    pub fn submit(
        &mut self,
        command: &str,
        args: &[String],
        priority: Priority,
    ) -> SchedResult<JobId> {
        let pid = self.procs.spawn(command, args)?;
        let now = Timestamp::now();
        let job = self
            .state
            .create_job(pid, priority, command.to_string(), args.to_vec(), now);
        self.record(SchedEvent::Created {
            job,
            pid,
            priority,
            at: now,
        });
        self.state.mark_ready(job, now);
        self.record(SchedEvent::Waiting { job, at: now });
        Ok(job)
    }

    /// Runs dispatch cycles until the ready queue is empty.
    pub fn run_to_exhaustion(&mut self) -> DrainSummary {
        self.run_until(|| true)
    }

    /// Like [`Engine::run_to_exhaustion`], but `keep_going` is consulted
    /// before every cycle. A cycle already running always completes.
    pub fn run_until(&mut self, mut keep_going: impl FnMut() -> bool) -> DrainSummary {
        let mut summary = DrainSummary::default();
        while !self.state.ready.is_empty() && keep_going() {
            summary.absorb(self.cycle());
        }
        summary
    }

    /// One cycle: fill slots from the queue head, run one quantum, then
    /// retire or preempt.
    pub fn cycle(&mut self) -> DrainSummary {
        let nodes: Vec<ReadyNode> = (0..self.state.slots.len())
            .map_while(|_| self.state.ready.dequeue())
            .collect();
        self.dispatch(nodes)
    }

    /// Runs `job` alone for one quantum of its own priority, ahead of
    /// whatever else is queued. A job that outlives the quantum goes back
    /// to the queue.
    pub fn run_first_quantum(&mut self, job: JobId) -> DrainSummary {
        match self.state.ready.remove(job) {
            Some(node) => self.dispatch(vec![node]),
            None => DrainSummary::default(),
        }
    }

    fn dispatch(&mut self, nodes: Vec<ReadyNode>) -> DrainSummary {
        let mut summary = DrainSummary::default();
        // The first slotted job decides the quantum for the whole cycle
        let Some(quantum) = nodes.first().map(|n| self.policy.quantum(n.priority)) else {
            return summary;
        };
        summary.cycles = 1;

        let timer = QuantumTimer::arm(quantum);
        let now = Timestamp::now();
        for node in nodes {
            let slot = self
                .state
                .idle_slot()
                .expect("cycle dequeued more jobs than there are slots");
            self.start(slot, node, now, &mut summary);
        }
        self.observer.observe(&self.state);
        debug!(
            "quantum of {quantum:?} armed for {} job(s)",
            self.state.occupied_count()
        );

        loop {
            self.reap(&mut summary);
            if self.state.occupied_count() == 0 || timer.wait(self.config.poll_interval()) {
                break;
            }
        }
        // Jobs that ended right at expiry are retired, not preempted
        self.reap(&mut summary);
        self.preempt_all(&mut summary);
        self.observer.observe(&self.state);
        summary
    }

    fn start(&mut self, slot: SlotId, node: ReadyNode, now: Timestamp, summary: &mut DrainSummary) {
        let job = node.job;
        let waited_ms = self.state.set_running(slot, node, now);
        let pid = self.state.job(job).pid;
        self.record(SchedEvent::Running {
            job,
            slot,
            waited_ms,
            at: now,
        });
        summary.dispatched += 1;

        if let Err(err) = self.procs.resume(pid) {
            warn!("{err}; retiring the job");
            let exit = match self.procs.poll(pid) {
                ProcStatus::Done(exit) => exit,
                ProcStatus::Alive => ExitState::Vanished,
            };
            self.retire(slot, exit, summary);
        }
    }

    fn reap(&mut self, summary: &mut DrainSummary) {
        let occupied: Vec<(SlotId, JobId)> = self.state.occupied().collect();
        for (slot, job) in occupied {
            let pid = self.state.job(job).pid;
            if let ProcStatus::Done(exit) = self.procs.poll(pid) {
                self.retire(slot, exit, summary);
            }
        }
    }

    fn retire(&mut self, slot: SlotId, exit: ExitState, summary: &mut DrainSummary) {
        let now = Timestamp::now();
        if let Some(job) = self.state.retire(slot, now, exit) {
            summary.finished += 1;
            self.record(SchedEvent::Finished {
                job,
                slot: Some(slot),
                exit,
                at: now,
            });
        }
    }

    fn preempt_all(&mut self, summary: &mut DrainSummary) {
        let occupied: Vec<(SlotId, JobId)> = self.state.occupied().collect();
        for (slot, job) in occupied {
            let pid = self.state.job(job).pid;
            if let Err(err) = self.procs.suspend(pid) {
                warn!("{err}");
            }
            // A stop that raced the job's own exit is a termination
            if let ProcStatus::Done(exit) = self.procs.poll(pid) {
                self.retire(slot, exit, summary);
                continue;
            }

            let now = Timestamp::now();
            self.state.preempt(slot, now);
            summary.preempted += 1;
            self.record(SchedEvent::Preempted { job, slot, at: now });
            self.record(SchedEvent::Waiting { job, at: now });
        }
    }

    /// Kills every job that has not terminated yet.
    pub fn shutdown(&mut self) {
        let mut summary = DrainSummary::default();
        let occupied: Vec<(SlotId, JobId)> = self.state.occupied().collect();
        for (slot, job) in occupied {
            let exit = self.kill(job);
            self.retire(slot, exit, &mut summary);
        }
        while let Some(node) = self.state.ready.dequeue() {
            let exit = self.kill(node.job);
            let now = Timestamp::now();
            self.state.abandon(node, now, exit);
            self.record(SchedEvent::Finished {
                job: node.job,
                slot: None,
                exit,
                at: now,
            });
        }
        self.observer.observe(&self.state);
    }

    fn kill(&mut self, job: JobId) -> ExitState {
        let pid = self.state.job(job).pid;
        self.procs.terminate(pid).unwrap_or_else(|err| {
            warn!("{err}");
            ExitState::Vanished
        })
    }

    fn record(&mut self, event: SchedEvent) {
        let job = self.state.job(event.job());
        match &event {
            SchedEvent::Created { pid, priority, .. } => info!(
                "created pid {pid} priority {priority}: {}",
                job.command_line()
            ),
            SchedEvent::Waiting { .. } => debug!("pid {} waiting", job.pid),
            SchedEvent::Running {
                slot, waited_ms, ..
            } => debug!(
                "pid {} running in slot {slot} after waiting {waited_ms:.3} ms",
                job.pid
            ),
            SchedEvent::Preempted { slot, .. } => {
                info!("pid {} preempted from slot {slot} and re-enqueued", job.pid)
            }
            SchedEvent::Finished { exit, .. } => info!(
                "pid {} finished ({exit}) after {:.3} ms",
                job.pid, job.duration_ms
            ),
        }
        self.events.push(event);
    }
}
