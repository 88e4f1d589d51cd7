//! Ptrace I/O layer (component C5).
//!
//! The kernel requires the thread that attached via `ptrace(2)` to be the
//! one that issues every subsequent ptrace call for that tracee. Rather
//! than pin the caller's thread (which might be a request-handling thread
//! pulled from anywhere), a single dedicated thread owns the syscalls and
//! every wrapper here submits a closure to it and blocks on the result,
//! exactly as spec §4.4 describes.

use crate::error::Error;
use nix::sys::{ptrace, signal::Signal, wait};
use nix::unistd::Pid;

type Job = Box<dyn FnOnce() + Send>;

/// Outcome of one non-blocking `waitpid(pid, WNOHANG)` poll, used by the
/// wait loop (C7) to drive its busy-poll without blocking the ptrace
/// executor thread for the duration of a `cont()`.
#[derive(Debug, Clone, Copy)]
pub enum WaitPoll {
    /// No status change yet.
    NotReady,
    Exited(i32),
    Signaled(Signal),
    /// Stopped by `signal`; `event` is the `PTRACE_EVENT_*` code if the stop
    /// was due to a ptrace event (clone, exec, ...), else 0.
    Stopped { pid: Pid, signal: Signal, event: i32 },
}

/// Owns the dedicated ptrace thread. Cloning is cheap (just the sender);
/// every clone talks to the same thread.
#[derive(Clone)]
pub struct PtraceExecutor {
    tx: crossbeam::channel::Sender<Job>,
}

impl PtraceExecutor {
    pub fn spawn() -> Self {
        let (tx, rx) = crossbeam::channel::unbounded::<Job>();
        std::thread::Builder::new()
            .name("rdbg-ptrace".into())
            .spawn(move || {
                for job in rx {
                    job();
                }
            })
            .expect("failed to spawn dedicated ptrace thread");
        Self { tx }
    }

    fn submit<T: Send + 'static>(&self, f: impl FnOnce() -> T + Send + 'static) -> Result<T, Error> {
        let (result_tx, result_rx) = crossbeam::channel::bounded(1);
        self.tx
            .send(Box::new(move || {
                let _ = result_tx.send(f());
            }))
            .map_err(|_| Error::ExecutorShutdown)?;
        result_rx.recv().map_err(|_| Error::ExecutorShutdown)
    }

    pub fn peek_word(&self, pid: Pid, addr: u64) -> Result<i64, Error> {
        self.submit(move || ptrace::read(pid, addr as ptrace::AddressType))?
            .map_err(|e| Error::ptrace("PTRACE_PEEKTEXT", e))
    }

    pub fn poke_word(&self, pid: Pid, addr: u64, word: i64) -> Result<(), Error> {
        self.submit(move || unsafe {
            ptrace::write(pid, addr as ptrace::AddressType, word as *mut libc::c_void)
        })?
        .map_err(|e| Error::ptrace("PTRACE_POKETEXT", e))
    }

    /// Reads `buf.len()` bytes starting at `addr`, one word at a time.
    pub fn peek(&self, pid: Pid, addr: u64, buf: &mut [u8]) -> Result<(), Error> {
        let word_size = std::mem::size_of::<i64>();
        let mut offset = 0usize;
        while offset < buf.len() {
            let word = self.peek_word(pid, addr + offset as u64)?;
            let bytes = word.to_ne_bytes();
            let n = (buf.len() - offset).min(word_size);
            buf[offset..offset + n].copy_from_slice(&bytes[..n]);
            offset += n;
        }
        Ok(())
    }

    /// Writes `bytes` starting at `addr`. Partial trailing words are
    /// read-modify-written so a write that doesn't end on a word boundary
    /// doesn't clobber neighboring bytes.
    pub fn poke(&self, pid: Pid, addr: u64, bytes: &[u8]) -> Result<(), Error> {
        let word_size = std::mem::size_of::<i64>();
        let mut offset = 0usize;
        while offset < bytes.len() {
            let n = (bytes.len() - offset).min(word_size);
            let word_addr = addr + offset as u64;
            let mut word_bytes = if n < word_size {
                self.peek_word(pid, word_addr)?.to_ne_bytes()
            } else {
                [0u8; 8]
            };
            word_bytes[..n].copy_from_slice(&bytes[offset..offset + n]);
            self.poke_word(pid, word_addr, i64::from_ne_bytes(word_bytes))?;
            offset += n;
        }
        Ok(())
    }

    /// Uses raw `libc::ptrace` rather than `nix`'s `getregs` wrapper: the
    /// register struct layout is architecture-specific the same way the
    /// teacher's `thread_info.rs` reads `libc::user_regs_struct` directly.
    pub fn get_regs(&self, pid: Pid) -> Result<crate::arch::Registers, Error> {
        self.submit(move || unsafe {
            let mut regs: crate::arch::Registers = std::mem::zeroed();
            let ret = libc::ptrace(
                libc::PTRACE_GETREGS,
                pid.as_raw(),
                std::ptr::null_mut::<libc::c_void>(),
                &mut regs as *mut _,
            );
            if ret == -1 {
                Err(nix::Error::last())
            } else {
                Ok(regs)
            }
        })?
        .map_err(|e| Error::ptrace("PTRACE_GETREGS", e))
    }

    pub fn set_regs(&self, pid: Pid, regs: crate::arch::Registers) -> Result<(), Error> {
        self.submit(move || unsafe {
            let ret = libc::ptrace(
                libc::PTRACE_SETREGS,
                pid.as_raw(),
                std::ptr::null_mut::<libc::c_void>(),
                &regs as *const _,
            );
            if ret == -1 {
                Err(nix::Error::last())
            } else {
                Ok(())
            }
        })?
        .map_err(|e| Error::ptrace("PTRACE_SETREGS", e))
    }

    pub fn cont(&self, pid: Pid, signal: Option<Signal>) -> Result<(), Error> {
        self.submit(move || ptrace::cont(pid, signal))?
            .map_err(|e| Error::ptrace("PTRACE_CONT", e))
    }

    pub fn single_step(&self, pid: Pid) -> Result<(), Error> {
        self.submit(move || ptrace::step(pid, None))?
            .map_err(|e| Error::ptrace("PTRACE_SINGLESTEP", e))
    }

    pub fn set_options(&self, pid: Pid, options: ptrace::Options) -> Result<(), Error> {
        self.submit(move || ptrace::setoptions(pid, options))?
            .map_err(|e| Error::ptrace("PTRACE_SETOPTIONS", e))
    }

    pub fn kill(&self, pid: Pid) -> Result<(), Error> {
        self.submit(move || nix::sys::signal::kill(pid, Signal::SIGKILL))?
            .map_err(|e| Error::ptrace("kill", e))
    }

    /// One non-blocking `waitpid`; never parks the executor thread.
    pub fn wait_nohang(&self, pid: Pid) -> Result<WaitPoll, Error> {
        let status = self
            .submit(move || wait::waitpid(pid, Some(wait::WaitPidFlag::WNOHANG)))?
            .map_err(|e| Error::ptrace("waitpid", e))?;

        Ok(match status {
            wait::WaitStatus::StillAlive => WaitPoll::NotReady,
            wait::WaitStatus::Exited(_, code) => WaitPoll::Exited(code),
            wait::WaitStatus::Signaled(_, sig, _) => WaitPoll::Signaled(sig),
            wait::WaitStatus::Stopped(wpid, sig) => WaitPoll::Stopped {
                pid: wpid,
                signal: sig,
                event: 0,
            },
            wait::WaitStatus::PtraceEvent(wpid, sig, event) => WaitPoll::Stopped {
                pid: wpid,
                signal: sig,
                event,
            },
            wait::WaitStatus::PtraceSyscall(wpid) => WaitPoll::Stopped {
                pid: wpid,
                signal: Signal::SIGTRAP,
                event: 0,
            },
            wait::WaitStatus::Continued(_) => WaitPoll::NotReady,
        })
    }

    /// Blocks until `pid` reports `SIGSTOP`, used by the mid-run
    /// reconfiguration subprotocol (spec §4.7) after sending it directly.
    ///
    /// Breakpoints are still armed at this point, so the child can hit one
    /// and land in a SIGTRAP stop before the queued SIGSTOP is delivered.
    /// Such a stop is re-continued rather than waited on, otherwise the
    /// child never progresses far enough to deliver the SIGSTOP and this
    /// loop spins forever.
    pub fn wait_for_stop_signal(&self, pid: Pid, expected: Signal) -> Result<(), Error> {
        loop {
            match self.wait_nohang(pid)? {
                WaitPoll::Stopped { signal, .. } if signal == expected => return Ok(()),
                WaitPoll::Stopped { pid: wpid, .. } => self.cont(wpid, None)?,
                WaitPoll::NotReady => std::thread::yield_now(),
                WaitPoll::Exited(_) | WaitPoll::Signaled(_) => return Ok(()),
            }
        }
    }

    pub fn send_signal(&self, pid: Pid, signal: Signal) -> Result<(), Error> {
        self.submit(move || nix::sys::signal::kill(pid, signal))?
            .map_err(|e| Error::ptrace("kill", e))
    }
}

/// Arranges for the spawned child to become traceable and die with the
/// tracer, per spec §6's process-start flags: trace enabled, parent-death
/// signal KILL, stdin null, stdout/stderr forwarded.
pub fn prepare_traced_command(cmd: &mut std::process::Command) {
    use std::os::unix::process::CommandExt;

    cmd.stdin(std::process::Stdio::null());
    cmd.stdout(std::process::Stdio::inherit());
    cmd.stderr(std::process::Stdio::inherit());

    unsafe {
        cmd.pre_exec(|| {
            ptrace::traceme().map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
            if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}
