//! Wait/trap loop (component C7).
//!
//! `waitpid` itself is polled non-blocking (`WNOHANG`) on the ptrace
//! executor thread (C5) in a short loop; the caller driving [`wait_for_trap`]
//! (the dispatcher thread, inside the Resume handler) interleaves a
//! non-blocking check of its own breakpoint lane between polls. That's how
//! spec §9's "wait() polls the breakpoint channel" is realized without a
//! third thread: the channel poll and the `waitpid` poll are both
//! non-blocking calls made back to back by the same caller.

use crate::error::Error;
use crate::ptrace_io::{PtraceExecutor, WaitPoll};
use nix::sys::signal::Signal;
use nix::unistd::Pid;

/// `PTRACE_EVENT_CLONE`, checked against the event code carried by a
/// ptrace-event stop.
const PTRACE_EVENT_CLONE: i32 = 3;

/// Outcome of [`wait_for_trap`]. Generic over `P`, the caller's
/// breakpoint-lane item type, this crate never needs to know its shape,
/// only that the caller can hand one back to retry against once it has
/// been serviced.
pub enum WaitOutcome<P> {
    /// A clean `SIGTRAP` stop, not due to `PTRACE_EVENT_CLONE`.
    Trapped(Pid),
    /// The child exited normally (spec §5 "supplemented features": this is
    /// a normal outcome of continuing, not an error).
    Exited(i32),
    /// Carries the pending breakpoint-lane item that interrupted the wait,
    /// per spec §4.7's mid-run reconfiguration subprotocol.
    BreakpointsChanged(P),
}

/// `waitForTrap` from spec §4.6. Loops on non-blocking status polls; clone
/// events and other signals are re-continued transparently. When
/// `allow_breakpoints_change` is true and `poll_lane` yields an item, the
/// wait returns immediately with [`WaitOutcome::BreakpointsChanged`];
/// otherwise such an item is treated as an error (spec: "wrap as generic
/// error"), since the caller asserted it wouldn't be preempted here.
pub fn wait_for_trap<P>(
    io: &PtraceExecutor,
    pid: Pid,
    allow_breakpoints_change: bool,
    mut poll_lane: impl FnMut() -> Option<P>,
) -> Result<WaitOutcome<P>, Error> {
    loop {
        if let Some(item) = poll_lane() {
            if allow_breakpoints_change {
                return Ok(WaitOutcome::BreakpointsChanged(item));
            }
            return Err(Error::UnexpectedBreakpointsChanged);
        }

        match io.wait_nohang(pid)? {
            WaitPoll::NotReady => {
                std::thread::yield_now();
            }
            WaitPoll::Exited(code) => return Ok(WaitOutcome::Exited(code)),
            WaitPoll::Signaled(sig) => {
                log::debug!("target {pid} killed by signal {sig}");
                return Ok(WaitOutcome::Exited(128 + sig as i32));
            }
            WaitPoll::Stopped { pid: wpid, signal, event } => {
                if signal == Signal::SIGTRAP && event != PTRACE_EVENT_CLONE {
                    return Ok(WaitOutcome::Trapped(wpid));
                }
                log::trace!("re-continuing {wpid} past signal {signal} (event {event})");
                io.cont(wpid, None)?;
            }
        }
    }
}
