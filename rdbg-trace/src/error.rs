use crate::breakpoint::Address;

/// Errors surfaced by the ptrace I/O layer, breakpoint table, wait loop,
/// resume protocol, stack walker and runtime-anchor resolver (spec §7).
///
/// `BreakpointsChanged` is the internal signal described in spec §4.7/§9;
/// it is only ever produced by [`crate::wait_loop::wait_for_trap`] when
/// `allow_breakpoints_change` is false and must never reach a client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ptrace {call} failed: {source}")]
    Ptrace {
        call: &'static str,
        #[source]
        source: nix::Error,
    },

    #[error("breakpoint already installed at {0:#x}")]
    DuplicateBreakpoint(Address),

    #[error("no breakpoint installed at {0:#x}")]
    NoSuchBreakpoint(Address),

    #[error("wait() returned a breakpoints-changed signal but the caller did not allow it")]
    UnexpectedBreakpointsChanged,

    #[error("runtime anchors could not be resolved: {0}")]
    RuntimeAnchorMissing(String),

    #[error("spawning the traced child failed: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("the traced process is not stopped")]
    NotStopped,

    #[error("no stack frame entry for pc {0:#x}")]
    NoFrameEntry(Address),

    #[error("unsupported DWARF child: FormalParameter with children at pc {0:#x}")]
    UnsupportedFormalParameterChildren(Address),

    #[error("ptrace executor thread is gone")]
    ExecutorShutdown,
}

impl Error {
    pub(crate) fn ptrace(call: &'static str, source: nix::Error) -> Self {
        Self::Ptrace { call, source }
    }
}
