//! Out-of-process inspection and debugging core for a compiled program
//! running on a managed runtime with a tracing collector.
//!
//! Two independent entry points:
//!
//! - The ptrace-based debug server: build a [`ServerBuilder`], `submit`
//!   requests through the returned [`Client`] from any thread, and run
//!   the returned `Dispatcher` on one dedicated thread (spec §5).
//! - Heap object type inference: re-exported from [`rdbg_heap`], invoked
//!   directly by the printer/expression path with a raw address (spec
//!   §2: "C4 is invoked independently... it relies on C1–C3 plus a memory
//!   reader"), not through a request.
//!
//! The process/core-memory reader, DWARF parser, symbol table,
//! binary-format loader, RPC transport and CLI/printer are out of scope
//! (spec §1); this crate consumes them only through the collaborator
//! traits re-exported from [`rdbg_trace`] and [`rdbg_heap`].

mod dispatcher;
mod error;
mod evaluator;
mod file_table;
mod request;
mod server;

pub use error::Error;
pub use request::{FrameRecord, OpenMode, Request, Response, ResumeStatus};
pub use server::{Client, ServerBuilder};

pub use rdbg_heap::{
    a_type_match_by_bitmap, cal_size_class, cal_span_class, s_type_match_by_bitmap,
    type_match_check, Address, HeapImage, MatchResult, SizeClass, SpanInfo, TypeDescriptor,
    TypeIndex,
};
pub use rdbg_trace::{Arch, DieHandle, DwarfInfo, SymbolResolver, ValuePrinter, X86_64};
