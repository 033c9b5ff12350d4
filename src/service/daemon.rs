use crate::{
    core::{DrainSummary, Engine},
    policy::SlicePolicy,
    process::ProcessControl,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

/// Background drain loop: take the gate, dispatch until the queue is
/// empty, release, back off, repeat. Stops when the handle is stopped or
/// dropped, or when the scheduler is halted.
pub struct Daemon {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<DrainSummary>>,
}

impl Daemon {
    pub(super) fn spawn<P, S>(
        gate: Arc<Mutex<Engine<P, S>>>,
        halted: Arc<AtomicBool>,
        backoff: Duration,
    ) -> std::io::Result<Self>
    where
        P: ProcessControl + 'static,
        S: SlicePolicy + 'static,
    {
        let (stop_tx, stop_rx) = bounded(1);
        let thread = thread::Builder::new()
            .name("sigsched-daemon".to_string())
            .spawn(move || drain_loop(gate, halted, stop_rx, backoff))?;
        info!("scheduling daemon started");
        Ok(Self {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Waits for the current drain to finish and returns the totals of
    /// everything the daemon dispatched.
    pub fn stop(mut self) -> DrainSummary {
        self.join_thread()
    }

    fn join_thread(&mut self) -> DrainSummary {
        drop(self.stop.take());
        let Some(thread) = self.thread.take() else {
            return DrainSummary::default();
        };
        let summary = thread.join().unwrap_or_else(|_| {
            warn!("scheduling daemon panicked");
            DrainSummary::default()
        });
        info!("scheduling daemon stopped after {} cycle(s)", summary.cycles);
        summary
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.join_thread();
    }
}

fn drain_loop<P, S>(
    gate: Arc<Mutex<Engine<P, S>>>,
    halted: Arc<AtomicBool>,
    stop: Receiver<()>,
    backoff: Duration,
) -> DrainSummary
where
    P: ProcessControl,
    S: SlicePolicy,
{
    let mut total = DrainSummary::default();
    let running = || !halted.load(Ordering::Acquire);
    while running() {
        let drained = gate.lock().run_until(running);
        if drained.cycles > 0 {
            debug!("daemon drain: {drained:?}");
        }
        total.absorb(drained);

        match stop.recv_timeout(backoff) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    total
}
