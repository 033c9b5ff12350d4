use super::{ExitState, Pid, ProcStatus, ProcessControl};
use crate::error::{SchedError, SchedResult};
use log::{debug, warn};
use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{kill, raise, sigprocmask, SigSet, SigmaskHow, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult};
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

/// Status a child reports when `execvp` fails, as shells do for "not found".
pub const EXEC_FAILED: i32 = 127;

/// Signal based backend: fork + self-stop + exec to create, SIGSTOP/SIGCONT
/// to preempt, `waitpid(WNOHANG)` to poll.
#[derive(Debug, Default)]
pub struct UnixProcessControl {
    spawned: u64,
}

impl UnixProcessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawned(&self) -> u64 {
        self.spawned
    }

    fn signal(&self, op: &'static str, pid: Pid, sig: Signal) -> SchedResult<()> {
        kill(pid, sig).map_err(|source| SchedError::Signal { op, pid, source })
    }

    fn await_initial_stop(&self, command: &str, child: Pid) -> SchedResult<()> {
        loop {
            match waitpid(child, Some(WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::Stopped(..)) => return Ok(()),
                Ok(status @ (WaitStatus::Exited(..) | WaitStatus::Signaled(..))) => {
                    return Err(SchedError::EarlyExit {
                        command: command.to_string(),
                        status: format!("{status:?}"),
                    });
                }
                Ok(_) | Err(Errno::EINTR) => continue,
                Err(source) => {
                    return Err(SchedError::Spawn {
                        command: command.to_string(),
                        source,
                    });
                }
            }
        }
    }
}

fn c_string(s: &str) -> SchedResult<CString> {
    CString::new(s).map_err(|_| SchedError::InvalidCommand(s.to_string()))
}

fn reap_status(status: WaitStatus) -> Option<ExitState> {
    match status {
        WaitStatus::Exited(_, code) => Some(ExitState::Exited(code)),
        WaitStatus::Signaled(_, sig, _) => Some(ExitState::Signaled(sig as i32)),
        _ => None,
    }
}

impl ProcessControl for UnixProcessControl {
    fn spawn(&mut self, command: &str, args: &[String]) -> SchedResult<Pid> {
        if command.is_empty() {
            return Err(SchedError::EmptyCommand);
        }
        let program = c_string(command)?;
        let owned = args
            .iter()
            .map(|arg| c_string(arg))
            .collect::<SchedResult<Vec<_>>>()?;

        // Everything the child touches is built here: after fork it may
        // only make async-signal-safe calls.
        let mut argv: Vec<*const c_char> = Vec::with_capacity(owned.len() + 2);
        argv.push(program.as_ptr());
        argv.extend(owned.iter().map(|arg| arg.as_ptr()));
        argv.push(ptr::null());
        let unblocked = SigSet::empty();

        // SAFETY: the child branch calls sigprocmask, raise, execvp and
        // _exit only, all of which are async-signal-safe.
        let fork_result = unsafe { fork() }.map_err(|source| SchedError::Spawn {
            command: command.to_string(),
            source,
        })?;

        match fork_result {
            ForkResult::Child => {
                let _ = sigprocmask(SigmaskHow::SIG_SETMASK, Some(&unblocked), None);
                let _ = raise(Signal::SIGSTOP);
                unsafe {
                    libc::execvp(program.as_ptr(), argv.as_ptr());
                    libc::_exit(EXEC_FAILED)
                }
            }
            ForkResult::Parent { child } => {
                self.await_initial_stop(command, child)?;
                self.spawned += 1;
                debug!("spawned {command} as pid {child} (stopped)");
                Ok(child)
            }
        }
    }

    fn suspend(&mut self, pid: Pid) -> SchedResult<()> {
        self.signal("suspend", pid, Signal::SIGSTOP)
    }

    fn resume(&mut self, pid: Pid) -> SchedResult<()> {
        self.signal("resume", pid, Signal::SIGCONT)
    }

    fn poll(&mut self, pid: Pid) -> ProcStatus {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(status) => reap_status(status).map_or(ProcStatus::Alive, ProcStatus::Done),
            Err(Errno::EINTR) => ProcStatus::Alive,
            Err(err) => {
                warn!("poll of pid {pid} failed ({err}); treating it as terminated");
                ProcStatus::Done(ExitState::Vanished)
            }
        }
    }

    fn terminate(&mut self, pid: Pid) -> SchedResult<ExitState> {
        match kill(pid, Signal::SIGKILL) {
            Ok(()) => {}
            Err(Errno::ESRCH) => return Ok(ExitState::Vanished),
            Err(source) => {
                return Err(SchedError::Signal {
                    op: "terminate",
                    pid,
                    source,
                })
            }
        }
        loop {
            match waitpid(pid, None) {
                Ok(status) => {
                    if let Some(exit) = reap_status(status) {
                        return Ok(exit);
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => return Ok(ExitState::Vanished),
                Err(source) => {
                    return Err(SchedError::Signal {
                        op: "reap",
                        pid,
                        source,
                    })
                }
            }
        }
    }
}
