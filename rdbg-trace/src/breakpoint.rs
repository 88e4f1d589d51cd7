//! Breakpoint table (component C6).

use crate::arch::Arch;
use crate::error::Error;
use crate::ptrace_io::PtraceExecutor;
use nix::unistd::Pid;
use std::collections::BTreeMap;

pub type Address = u64;

/// `Breakpoint` from spec §3: the PC it traps and the bytes that were
/// there before the trap instruction was poked in.
#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub pc: Address,
    pub orig_instr: Vec<u8>,
}

/// Mapping from PC to [`Breakpoint`], mutated only from the dispatcher
/// thread (spec §3 invariant). `set_all`/`lift_all` do the actual memory
/// pokes and must only be called while the target is stopped (spec §4.5).
#[derive(Default)]
pub struct BreakpointTable {
    entries: BTreeMap<Address, Breakpoint>,
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, pc: Address) -> bool {
        self.entries.contains_key(&pc)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads `arch.breakpoint_size()` bytes at `pc`, stashes them, and
    /// records the entry. Does not poke the trap instruction in yet, that
    /// happens in bulk via [`Self::set_all`]. Errors if `pc` is already
    /// installed (spec §4.5: duplicate installation is a logic error).
    pub fn install(
        &mut self,
        io: &PtraceExecutor,
        pid: Pid,
        arch: &dyn Arch,
        pc: Address,
    ) -> Result<(), Error> {
        if self.entries.contains_key(&pc) {
            return Err(Error::DuplicateBreakpoint(pc));
        }
        let mut orig_instr = vec![0u8; arch.breakpoint_size()];
        io.peek(pid, pc, &mut orig_instr)?;
        self.entries.insert(pc, Breakpoint { pc, orig_instr });
        Ok(())
    }

    /// Added per spec §9's open question: the source errors on a
    /// duplicate install but never exposes a remove, so implementers "may
    /// add a RemoveBreakpoint request but should not change install
    /// semantics". Lifts the trap instruction immediately if the process
    /// is currently stopped, since there is no later `set_all`/`lift_all`
    /// pass that would otherwise restore it.
    pub fn remove(
        &mut self,
        io: &PtraceExecutor,
        pid: Pid,
        currently_stopped: bool,
        pc: Address,
    ) -> Result<(), Error> {
        let bp = self.entries.remove(&pc).ok_or(Error::NoSuchBreakpoint(pc))?;
        if currently_stopped {
            io.poke(pid, pc, &bp.orig_instr)?;
        }
        Ok(())
    }

    pub fn set_all(&self, io: &PtraceExecutor, pid: Pid, arch: &dyn Arch) -> Result<(), Error> {
        for bp in self.entries.values() {
            io.poke(pid, bp.pc, &arch.breakpoint_instr()[..bp.orig_instr.len()])?;
        }
        Ok(())
    }

    pub fn lift_all(&self, io: &PtraceExecutor, pid: Pid) -> Result<(), Error> {
        for bp in self.entries.values() {
            io.poke(pid, bp.pc, &bp.orig_instr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_table_has_no_entries() {
        let table = BreakpointTable::new();
        assert!(table.is_empty());
        assert!(!table.contains(0x1000));
    }

    #[rstest::rstest]
    #[case(0x1000)]
    #[case(0x7fff_0000)]
    #[case(0)]
    fn contains_is_false_for_any_pc_before_install(#[case] pc: Address) {
        let table = BreakpointTable::new();
        assert!(!table.contains(pc));
    }
}
