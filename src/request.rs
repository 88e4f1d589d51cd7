//! Request/response shapes (spec §6), plus the `Call` envelope a client
//! submits to the dispatcher (C8) and blocks on for a reply.

use crate::error::Error;
use rdbg_trace::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

impl std::str::FromStr for OpenMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" => Ok(Self::Read),
            "w" => Ok(Self::Write),
            "rw" => Ok(Self::ReadWrite),
            other => Err(crate::error::invalid_request(format!(
                "unknown open mode {other:?}, expected one of \"r\", \"w\", \"rw\""
            ))),
        }
    }
}

/// A single frame's textual record, mirrored from [`rdbg_trace::Frame`] so
/// the wire type doesn't leak the trace crate's internals.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub s: String,
}

#[derive(Debug, Clone, Copy)]
pub enum ResumeStatus {
    Stopped { pc: Address, sp: Address },
    Exited(i32),
}

impl From<rdbg_trace::ResumeStatus> for ResumeStatus {
    fn from(s: rdbg_trace::ResumeStatus) -> Self {
        match s {
            rdbg_trace::ResumeStatus::Stopped { pc, sp } => Self::Stopped { pc, sp },
            rdbg_trace::ResumeStatus::Exited(code) => Self::Exited(code),
        }
    }
}

/// The dynamic request union of spec §9, modeled as a tagged variant
/// rather than a type-switch over interface values.
#[derive(Debug, Clone)]
pub enum Request {
    Open { name: String, mode: OpenMode },
    ReadAt { fd: u32, offset: u64, len: usize },
    Close { fd: u32 },
    Run,
    Resume,
    /// `address` may be a bare symbol name, a `re:`-prefixed pattern
    /// matching several symbols, or a numeric address expression; see
    /// `crate::evaluator::resolve_breakpoint_addresses`.
    Breakpoint { address: String },
    /// Not in spec.md's request table; added per spec §9's open question
    /// and §5's supplemented-features note.
    RemoveBreakpoint { address: u64 },
    Eval { expr: String },
    Frames { count: usize },
}

impl Request {
    /// Breakpoint installs get the priority lane (spec §4.7); every other
    /// request kind shares the other lane, including `RemoveBreakpoint`
    /// since spec's mid-run reconfiguration subprotocol is specifically
    /// about new installs, not removals.
    pub(crate) fn lane(&self) -> Lane {
        match self {
            Request::Breakpoint { .. } => Lane::Breakpoint,
            _ => Lane::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lane {
    Breakpoint,
    Other,
}

#[derive(Debug, Clone)]
pub enum Response {
    /// Spec §6 literally shows `Open{} -> {}`; a caller has no way to
    /// address subsequent `ReadAt`/`Close` calls without the assigned fd,
    /// so it's returned here (see DESIGN.md).
    Open { fd: u32 },
    ReadAt { data: Vec<u8> },
    Close,
    Run,
    Resume { status: ResumeStatus },
    Breakpoint,
    RemoveBreakpoint,
    Eval { result: Vec<String> },
    Frames { frames: Vec<FrameRecord> },
}

/// A request plus the one-shot channel its caller is blocked on.
pub(crate) struct Call {
    pub request: Request,
    pub reply: crossbeam::channel::Sender<Result<Response, Error>>,
}
