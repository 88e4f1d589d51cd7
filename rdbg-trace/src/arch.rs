//! Architecture seam (not an explicit component in spec §2, but referenced
//! throughout §4 as `arch.*`): pointer width, the byte pattern a software
//! breakpoint patches in, and register access for PC/SP.
//!
//! Only the x86_64/Linux register layout is implemented, matching the
//! teacher's own `cfg_if`-gated `GPRegs = libc::user_regs_struct` shape in
//! `thread_info.rs`; other architectures are left as a `compile_error!` the
//! same way the teacher leaves unimplemented targets.

/// Maximum length of a software breakpoint's original-instruction backup,
/// per spec §3 (`Breakpoint.origInstr`, `length ≤ MaxBreakpointSize`).
pub const MAX_BREAKPOINT_SIZE: usize = 8;

pub type Registers = libc::user_regs_struct;

/// Everything the trace core needs from the target's instruction set: word
/// width, the breakpoint trap pattern, and PC/SP register access. A real
/// multi-arch build would have one impl per `target_arch`; this crate ships
/// the x86_64 one, the architecture the teacher's own Linux handler targets
/// first.
pub trait Arch: Send + Sync {
    fn pointer_size(&self) -> u8;
    fn breakpoint_size(&self) -> usize;
    /// The trap instruction bytes poked at a breakpoint PC; length equals
    /// `breakpoint_size()`.
    fn breakpoint_instr(&self) -> &'static [u8];
    fn pc(&self, regs: &Registers) -> u64;
    fn set_pc(&self, regs: &mut Registers, pc: u64);
    fn sp(&self, regs: &Registers) -> u64;
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        /// `int3` (`0xCC`), the x86 single-byte software breakpoint trap.
        const BREAKPOINT_INSTR: [u8; 1] = [0xCC];

        #[derive(Debug, Default, Clone, Copy)]
        pub struct X86_64;

        impl Arch for X86_64 {
            fn pointer_size(&self) -> u8 {
                8
            }

            fn breakpoint_size(&self) -> usize {
                BREAKPOINT_INSTR.len()
            }

            fn breakpoint_instr(&self) -> &'static [u8] {
                &BREAKPOINT_INSTR
            }

            fn pc(&self, regs: &Registers) -> u64 {
                regs.rip
            }

            fn set_pc(&self, regs: &mut Registers, pc: u64) {
                regs.rip = pc;
            }

            fn sp(&self, regs: &Registers) -> u64 {
                regs.rsp
            }
        }
    } else {
        compile_error!("rdbg-trace only implements register access for target_arch = \"x86_64\"");
    }
}
