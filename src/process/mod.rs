//! Process lifecycle capability used by the engine.
//!
//! The engine only ever creates, suspends, resumes, polls and kills
//! processes through [`ProcessControl`]; how that maps onto the host's
//! process facilities is the backend's business.

pub mod unix;

use crate::error::SchedResult;
use std::fmt;

pub use nix::unistd::Pid;
pub use unix::UnixProcessControl;

/// How a job's process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    Exited(i32),
    /// Terminated by the given signal number.
    Signaled(i32),
    /// The process could no longer be observed (already reaped or never
    /// existed); treated as terminated.
    Vanished,
}

impl fmt::Display for ExitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitState::Exited(code) => write!(f, "exit {code}"),
            ExitState::Signaled(sig) => write!(f, "signal {sig}"),
            ExitState::Vanished => write!(f, "vanished"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcStatus {
    /// Running or stopped.
    Alive,
    Done(ExitState),
}

pub trait ProcessControl: Send {
    /// Creates a process for `command` and returns once it is stopped,
    /// before it has executed any of the program.
    fn spawn(&mut self, command: &str, args: &[String]) -> SchedResult<Pid>;

    fn suspend(&mut self, pid: Pid) -> SchedResult<()>;

    fn resume(&mut self, pid: Pid) -> SchedResult<()>;

    /// Non-blocking. A terminal status is reported exactly once; afterwards
    /// the process is gone and polls report [`ExitState::Vanished`].
    fn poll(&mut self, pid: Pid) -> ProcStatus;

    /// Kills and reaps a process that never finished on its own.
    fn terminate(&mut self, pid: Pid) -> SchedResult<ExitState>;
}
