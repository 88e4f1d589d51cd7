//! Glues C5 (ptrace I/O), C6 (breakpoints), C7 (wait loop), C9 (stack
//! walker) and C11 (runtime anchors) into the state a dispatcher drives
//! through `Run`/`Resume`/`Breakpoint`/`Frames` requests (spec §4.7–§4.8).
//! The dispatcher itself (C8), the request/response types and the file
//! table live in the root `rdbg` crate; this type is their collaborator.

use crate::anchors::{AnchorCache, RuntimeAnchors};
use crate::arch::Arch;
use crate::breakpoint::{Address, BreakpointTable};
use crate::error::Error;
use crate::ptrace_io::{prepare_traced_command, PtraceExecutor};
use crate::stack_walk::{self, Frame};
use crate::traits::{DwarfInfo, MemoryReader, SymbolResolver, ValuePrinter};
use crate::wait_loop::{wait_for_trap, WaitOutcome};
use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::path::PathBuf;

/// A breakpoint-lane item queued while a [`Tracer::resume`] call is
/// blocked in its run-to-next-stop loop. The dispatcher's request type
/// implements this so `rdbg-trace` never needs to know the request/reply
/// machinery, only an address and a way to report back.
pub trait PendingBreakpointRequest {
    /// One request may resolve to more than one PC (spec §6: "address may
    /// resolve to multiple PCs via regex"); all are installed before the
    /// single `ack` that reports success or the first failure.
    fn addresses(&self) -> &[Address];
    fn ack(self, result: Result<(), Error>);
}

/// `Resume{} -> {status: {PC, SP}}` from spec §6, with the exited-child
/// outcome from §5's supplemented features folded in.
#[derive(Debug, Clone, Copy)]
pub enum ResumeStatus {
    Stopped { pc: Address, sp: Address },
    Exited(i32),
}

/// `read(addr, len) -> bytes` backed by the ptrace executor, used
/// internally by the stack walker to read caller return addresses and
/// parameter values. Unlike the DWARF/symbol/printer collaborators this
/// one is not external: live-process memory reads are exactly what the
/// ptrace I/O layer (C5) already does.
struct PtraceMemoryReader<'a> {
    io: &'a PtraceExecutor,
    pid: Pid,
    ptr_size: u8,
}

impl MemoryReader for PtraceMemoryReader<'_> {
    fn read(&self, addr: Address, len: usize) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; len];
        self.io.peek(self.pid, addr, &mut buf)?;
        Ok(buf)
    }

    fn pointer_size(&self) -> u8 {
        self.ptr_size
    }
}

pub struct Tracer {
    io: PtraceExecutor,
    arch: Box<dyn Arch>,
    executable: PathBuf,
    breakpoints: BreakpointTable,
    anchors: AnchorCache,
    child: Option<std::process::Child>,
    stopped_pid: Option<Pid>,
    proc_is_up: bool,
    /// Set after `Run`; cleared once the first `Resume` has consumed the
    /// initial stop-on-exec and armed `PTRACE_O_TRACECLONE` (spec §4.7
    /// phase 1).
    awaiting_first_resume: bool,
}

impl Tracer {
    pub fn new(arch: Box<dyn Arch>, executable: PathBuf) -> Self {
        Self {
            io: PtraceExecutor::spawn(),
            arch,
            executable,
            breakpoints: BreakpointTable::new(),
            anchors: AnchorCache::default(),
            child: None,
            stopped_pid: None,
            proc_is_up: false,
            awaiting_first_resume: false,
        }
    }

    pub fn proc_is_up(&self) -> bool {
        self.proc_is_up
    }

    pub fn breakpoints(&self) -> &BreakpointTable {
        &self.breakpoints
    }

    /// `Run{} -> {}` from spec §6. If a child already exists, it is
    /// killed and the runtime-anchor cache is reset before the new one is
    /// spawned (spec §5: "a Run invocation while a child already exists
    /// cancels the previous child via KILL and resets state").
    pub fn run(&mut self) -> Result<(), Error> {
        if let Some(child) = self.child.take() {
            let pid = Pid::from_raw(child.id() as i32);
            let _ = self.io.kill(pid);
        }
        self.anchors.invalidate();

        let mut cmd = std::process::Command::new(&self.executable);
        prepare_traced_command(&mut cmd);
        let child = cmd.spawn().map_err(Error::Spawn)?;
        let pid = Pid::from_raw(child.id() as i32);

        self.child = Some(child);
        self.stopped_pid = Some(pid);
        self.proc_is_up = false;
        self.awaiting_first_resume = true;
        Ok(())
    }

    pub fn install_breakpoint(&mut self, pc: Address) -> Result<(), Error> {
        let pid = self.stopped_pid.ok_or(Error::NotStopped)?;
        self.breakpoints.install(&self.io, pid, self.arch.as_ref(), pc)
    }

    pub fn remove_breakpoint(&mut self, pc: Address) -> Result<(), Error> {
        let pid = self.stopped_pid.ok_or(Error::NotStopped)?;
        self.breakpoints.remove(&self.io, pid, true, pc)
    }

    /// `Resume{} -> {status: {PC, SP}}`: the four-phase protocol of spec
    /// §4.7. `poll_breakpoint_lane` is a non-blocking check of the
    /// dispatcher's breakpoint-request lane; when it yields an item while
    /// the run-to-next-stop loop (phase 3) is blocked in `cont`, the mid-
    /// run reconfiguration subprotocol runs before the loop resumes.
    pub fn resume<P: PendingBreakpointRequest>(
        &mut self,
        mut poll_breakpoint_lane: impl FnMut() -> Option<P>,
    ) -> Result<ResumeStatus, Error> {
        let pid = self.stopped_pid.ok_or(Error::NotStopped)?;

        if self.awaiting_first_resume {
            // Phase 1: consume the initial stop-on-exec.
            match wait_for_trap(&self.io, pid, false, || None::<P>)? {
                WaitOutcome::Trapped(wpid) => self.stopped_pid = Some(wpid),
                WaitOutcome::Exited(code) => return Ok(ResumeStatus::Exited(code)),
                WaitOutcome::BreakpointsChanged(_) => unreachable!("phase 1 disallows it"),
            }
            self.io.set_options(pid, ptrace::Options::PTRACE_O_TRACECLONE)?;
            self.proc_is_up = true;
            self.awaiting_first_resume = false;
        } else {
            // Phase 2: if stopped at a breakpoint, step past the real
            // instruction before it gets re-armed.
            let regs = self.io.get_regs(pid)?;
            let pc = self.arch.pc(&regs);
            if self.breakpoints.contains(pc) {
                self.io.single_step(pid)?;
                match wait_for_trap(&self.io, pid, false, || None::<P>)? {
                    WaitOutcome::Trapped(wpid) => self.stopped_pid = Some(wpid),
                    WaitOutcome::Exited(code) => return Ok(ResumeStatus::Exited(code)),
                    WaitOutcome::BreakpointsChanged(_) => unreachable!("phase 2 disallows it"),
                }
            }
        }

        // Phase 3: install breakpoints, continue, wait for the next stop.
        let stopped_pid = loop {
            self.breakpoints.set_all(&self.io, pid, self.arch.as_ref())?;
            self.io.cont(pid, None)?;

            match wait_for_trap(&self.io, Pid::from_raw(-1), true, &mut poll_breakpoint_lane)? {
                WaitOutcome::Trapped(wpid) => break wpid,
                WaitOutcome::Exited(code) => return Ok(ResumeStatus::Exited(code)),
                WaitOutcome::BreakpointsChanged(item) => {
                    self.handle_mid_run_breakpoint(pid, item, &mut poll_breakpoint_lane)?;
                    // loop back around to re-arm and continue
                }
            }
        };
        self.stopped_pid = Some(stopped_pid);

        // Phase 4: lift breakpoints, rewind PC past the trap byte.
        self.breakpoints.lift_all(&self.io, stopped_pid)?;
        let mut regs = self.io.get_regs(stopped_pid)?;
        let trapped_pc = self.arch.pc(&regs);
        let pc = trapped_pc - self.arch.breakpoint_size() as u64;
        self.arch.set_pc(&mut regs, pc);
        self.io.set_regs(stopped_pid, regs)?;

        Ok(ResumeStatus::Stopped { pc, sp: self.arch.sp(&regs) })
    }

    /// The mid-run reconfiguration subprotocol of spec §4.7: a pending
    /// `Breakpoint` request preempted the wait. Stop the target for real,
    /// lift every breakpoint so the fresh snapshot sees original
    /// instructions, then drain and install every queued request.
    fn handle_mid_run_breakpoint<P: PendingBreakpointRequest>(
        &mut self,
        pid: Pid,
        first: P,
        poll_breakpoint_lane: &mut impl FnMut() -> Option<P>,
    ) -> Result<(), Error> {
        self.io.send_signal(pid, Signal::SIGSTOP)?;
        self.io.wait_for_stop_signal(pid, Signal::SIGSTOP)?;
        self.breakpoints.lift_all(&self.io, pid)?;

        self.install_and_ack(pid, first);
        while let Some(item) = poll_breakpoint_lane() {
            self.install_and_ack(pid, item);
        }
        Ok(())
    }

    fn install_and_ack<P: PendingBreakpointRequest>(&mut self, pid: Pid, item: P) {
        let mut result = Ok(());
        for &address in item.addresses() {
            if let Err(e) = self.breakpoints.install(&self.io, pid, self.arch.as_ref(), address) {
                result = Err(e);
                break;
            }
        }
        item.ack(result);
    }

    /// `Frames{count} -> {frames: [{s: string}]}` (spec §4.8).
    pub fn frames(
        &mut self,
        dwarf: &dyn DwarfInfo,
        symbols: &dyn SymbolResolver,
        printer: &dyn ValuePrinter,
        count: usize,
    ) -> Result<Vec<Frame>, Error> {
        let pid = self.stopped_pid.ok_or(Error::NotStopped)?;
        let anchors: RuntimeAnchors = self.anchors.ensure(symbols)?;

        let regs = self.io.get_regs(pid)?;
        let pc = self.arch.pc(&regs);
        let sp = self.arch.sp(&regs);

        let memory = PtraceMemoryReader { io: &self.io, pid, ptr_size: self.arch.pointer_size() };
        stack_walk::handle_frames(
            self.arch.as_ref(),
            dwarf,
            symbols,
            printer,
            &memory,
            &anchors,
            pc,
            sp,
            count,
        )
    }
}
