//! Ptrace-based debug server core: the ptrace I/O layer (C5), breakpoint
//! table (C6), wait/trap loop (C7), stack walker (C9) and runtime-anchor
//! resolver (C11). The request dispatcher (C8) and expression evaluator
//! (C10) live in the root `rdbg` crate, which drives a [`tracer::Tracer`]
//! through its `run`/`resume`/`frames` methods.

pub mod anchors;
pub mod arch;
pub mod breakpoint;
pub mod error;
pub mod ptrace_io;
pub mod stack_walk;
pub mod traits;
pub mod tracer;
pub mod wait_loop;

pub use anchors::{AnchorCache, RuntimeAnchors};
pub use arch::{Arch, X86_64};
pub use breakpoint::{Address, Breakpoint, BreakpointTable};
pub use error::Error;
pub use ptrace_io::PtraceExecutor;
pub use stack_walk::Frame;
pub use traits::{DieHandle, DwarfInfo, MemoryReader, SymbolResolver, ValuePrinter};
pub use tracer::{PendingBreakpointRequest, ResumeStatus, Tracer};
pub use wait_loop::{wait_for_trap, WaitOutcome};
