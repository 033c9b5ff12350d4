#![allow(dead_code)]

use nix::errno::Errno;
use sigsched::{
    config::SchedConfig,
    error::{SchedError, SchedResult},
    process::{ExitState, Pid, ProcStatus, ProcessControl},
};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Spawn,
    Resume,
    Suspend,
    Terminate,
}

#[derive(Debug)]
struct Scripted {
    work: Duration,
    done: Duration,
    running_since: Option<Instant>,
    finish_on_stop: bool,
    vanished: bool,
    exit: Option<ExitState>,
    reaped: bool,
}

impl Scripted {
    fn consumed(&self) -> Duration {
        self.done + self.running_since.map_or(Duration::ZERO, |t| t.elapsed())
    }
}

/// In-memory process backend. Commands:
/// - `work <ms>`: needs `ms` of running time, then exits 0
/// - `stop-exit <ms>`: like `work`, but also exits when it is suspended
/// - `ghost`: disappears as soon as it is resumed
/// - `fail`: cannot be spawned
#[derive(Debug, Default)]
pub struct ScriptedProcesses {
    next_pid: i32,
    procs: HashMap<Pid, Scripted>,
    pub log: Vec<(Op, Pid)>,
}

impl ScriptedProcesses {
    pub fn new() -> Self {
        Self {
            next_pid: 1000,
            ..Default::default()
        }
    }

    pub fn resumed(&self) -> Vec<Pid> {
        self.log
            .iter()
            .filter(|(op, _)| *op == Op::Resume)
            .map(|(_, pid)| *pid)
            .collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.log.iter().filter(|(o, _)| *o == op).count()
    }
}

impl ProcessControl for ScriptedProcesses {
    fn spawn(&mut self, command: &str, args: &[String]) -> SchedResult<Pid> {
        let ms = || -> u64 { args.first().and_then(|a| a.parse().ok()).unwrap_or(0) };
        let (work, finish_on_stop, vanished) = match command {
            "work" => (Duration::from_millis(ms()), false, false),
            "stop-exit" => (Duration::from_millis(ms()), true, false),
            "ghost" => (Duration::ZERO, false, true),
            "fail" => {
                return Err(SchedError::Spawn {
                    command: command.to_string(),
                    source: Errno::EAGAIN,
                })
            }
            other => panic!("unscripted command {other}"),
        };
        let pid = Pid::from_raw(self.next_pid);
        self.next_pid += 1;
        self.procs.insert(
            pid,
            Scripted {
                work,
                done: Duration::ZERO,
                running_since: None,
                finish_on_stop,
                vanished,
                exit: None,
                reaped: false,
            },
        );
        self.log.push((Op::Spawn, pid));
        Ok(pid)
    }

    fn suspend(&mut self, pid: Pid) -> SchedResult<()> {
        self.log.push((Op::Suspend, pid));
        let proc = self.procs.get_mut(&pid).expect("unknown pid");
        if let Some(since) = proc.running_since.take() {
            proc.done += since.elapsed();
        }
        if proc.finish_on_stop {
            proc.exit = Some(ExitState::Exited(0));
        }
        Ok(())
    }

    fn resume(&mut self, pid: Pid) -> SchedResult<()> {
        self.log.push((Op::Resume, pid));
        let proc = self.procs.get_mut(&pid).expect("unknown pid");
        if proc.vanished {
            proc.reaped = true;
            return Err(SchedError::Signal {
                op: "resume",
                pid,
                source: Errno::ESRCH,
            });
        }
        proc.running_since = Some(Instant::now());
        Ok(())
    }

    fn poll(&mut self, pid: Pid) -> ProcStatus {
        let proc = self.procs.get_mut(&pid).expect("unknown pid");
        if proc.reaped {
            return ProcStatus::Done(ExitState::Vanished);
        }
        if proc.exit.is_none() && proc.running_since.is_some() && proc.consumed() >= proc.work {
            proc.exit = Some(ExitState::Exited(0));
        }
        match proc.exit {
            Some(exit) => {
                proc.reaped = true;
                ProcStatus::Done(exit)
            }
            None => ProcStatus::Alive,
        }
    }

    fn terminate(&mut self, pid: Pid) -> SchedResult<ExitState> {
        self.log.push((Op::Terminate, pid));
        let proc = self.procs.get_mut(&pid).expect("unknown pid");
        if proc.reaped {
            return Ok(ExitState::Vanished);
        }
        proc.reaped = true;
        Ok(ExitState::Signaled(9))
    }
}

pub fn config(ncpu: usize, base_quantum_ms: u64) -> SchedConfig {
    SchedConfig {
        ncpu,
        base_quantum_ms,
        ..SchedConfig::default()
    }
}

pub fn ms(n: u64) -> Vec<String> {
    vec![n.to_string()]
}
