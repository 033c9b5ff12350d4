use super::daemon::Daemon;
use crate::{
    config::SchedConfig,
    core::{Census, DrainSummary, Engine, Job, JobId, Priority, SchedEvent},
    error::SchedResult,
    policy::{SlicePolicy, WeightedSlice},
    process::{ProcessControl, UnixProcessControl},
    stats::{self, PriorityStats},
};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared handle to an engine. Every queue mutation and every dispatch
/// cycle, whoever asks for it, runs under the one gate.
pub struct Scheduler<P: ProcessControl = UnixProcessControl, S: SlicePolicy = WeightedSlice> {
    gate: Arc<Mutex<Engine<P, S>>>,
    halted: Arc<AtomicBool>,
}

impl<P: ProcessControl, S: SlicePolicy> Clone for Scheduler<P, S> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            halted: Arc::clone(&self.halted),
        }
    }
}

impl<S: SlicePolicy + 'static> Scheduler<UnixProcessControl, S> {
    pub fn new(config: SchedConfig) -> SchedResult<Self> {
        Self::with_process_control(config, UnixProcessControl::new())
    }
}

impl<P: ProcessControl + 'static, S: SlicePolicy + 'static> Scheduler<P, S> {
    pub fn with_process_control(config: SchedConfig, procs: P) -> SchedResult<Self> {
        let config = config.validate()?;
        Ok(Self {
            gate: Arc::new(Mutex::new(Engine::new(config, procs))),
            halted: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn submit(&self, command: &str, args: &[String], priority: Priority) -> SchedResult<JobId> {
        self.gate.lock().submit(command, args, priority)
    }

    /// Submits at the default priority and gives the new job its first
    /// quantum right away, before returning.
    pub fn launch(&self, command: &str, args: &[String]) -> SchedResult<JobId> {
        let mut engine = self.gate.lock();
        let job = engine.submit(command, args, Priority::default())?;
        engine.run_first_quantum(job);
        Ok(job)
    }

    /// Dispatches until the ready queue is empty, or until [`Scheduler::halt`]
    /// is called.
    pub fn run_scheduler(&self) -> DrainSummary {
        let halted = &self.halted;
        self.gate
            .lock()
            .run_until(|| !halted.load(Ordering::Acquire))
    }

    /// Stops further dispatch cycles from starting. The cycle in flight, if
    /// any, still runs to the end of its quantum.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::Release);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    pub fn history(&self) -> Vec<Job> {
        self.gate.lock().state.history().cloned().collect()
    }

    pub fn job(&self, id: JobId) -> Option<Job> {
        self.gate.lock().state.jobs.get(id).cloned()
    }

    pub fn statistics(&self) -> Vec<PriorityStats> {
        let engine = self.gate.lock();
        stats::aggregate(engine.state.history())
    }

    pub fn take_events(&self) -> Vec<SchedEvent> {
        self.gate.lock().take_events()
    }

    pub fn census(&self) -> Census {
        self.gate.lock().census()
    }

    pub fn is_idle(&self) -> bool {
        self.gate.lock().is_idle()
    }

    /// Starts the background drain loop.
    pub fn spawn_daemon(&self) -> std::io::Result<Daemon> {
        let backoff = self.gate.lock().config().daemon_backoff();
        Daemon::spawn(Arc::clone(&self.gate), Arc::clone(&self.halted), backoff)
    }

    /// Halts dispatching, kills whatever has not terminated and returns the
    /// full history.
    pub fn shutdown(&self) -> Vec<Job> {
        self.halt();
        let mut engine = self.gate.lock();
        engine.shutdown();
        engine.state.history().cloned().collect()
    }

    pub fn with_engine<R>(&self, f: impl FnOnce(&mut Engine<P, S>) -> R) -> R {
        f(&mut self.gate.lock())
    }
}
