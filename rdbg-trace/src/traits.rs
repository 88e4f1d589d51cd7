//! Collaborator traits (spec §1: "out of scope, specified only by the
//! interfaces the core consumes"). Nothing in this crate implements these;
//! they're provided by the DWARF parser, the symbol table and the printer
//! that live outside the specified core.

use crate::breakpoint::Address;

/// `pc -> (file, line)`, `pc -> sp-offset`, and frame/DIE-shaped queries.
/// Named after spec §4.8's `PCToSPOffset`/`entryForPC` and the DIE walk
/// over `FormalParameter` children.
pub trait DwarfInfo: Send + Sync {
    /// Frame-pointer offset from SP at `pc` (spec §4.8 step a).
    fn pc_to_sp_offset(&self, pc: Address) -> Option<i64>;

    /// The DIE entry for the function containing `pc`, plus that
    /// function's entry PC (used to compare against runtime anchors).
    fn entry_for_pc(&self, pc: Address) -> Option<(DieHandle, Address)>;

    /// Formal parameters declared directly under `entry`: `(name, fp_offset)`.
    /// A `FormalParameter` DIE with children of its own is unsupported
    /// (spec §4.8 step c) and reported via `Err`.
    fn formal_parameters(&self, entry: DieHandle) -> Result<Vec<(String, i64)>, crate::Error>;

    /// `src:` expression support (spec §4.9): `pc -> "file.go:line"`.
    fn pc_to_file_line(&self, pc: Address) -> Option<String>;
}

/// Opaque handle to a DWARF DIE, passed back into [`DwarfInfo`] without
/// this crate needing to know its representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DieHandle(pub u64);

/// `name -> pc`, `pc -> name`.
pub trait SymbolResolver: Send + Sync {
    fn pc_of(&self, name: &str) -> Option<Address>;
    fn name_at(&self, pc: Address) -> Option<String>;
    /// All symbol names matching `pattern`, for the evaluator's `re:`
    /// prefix and for `Breakpoint` address expressions that resolve to
    /// more than one PC (spec §6).
    fn names_matching(&self, pattern: &regex::Regex) -> Vec<String>;
}

/// Formats a value read from the target for display, per spec §4.8 step c
/// ("print the value at fp+offset using the printer") and §4.9's `val:`
/// expression.
pub trait ValuePrinter: Send + Sync {
    fn format_at(&self, addr: Address, type_hint: Option<&str>) -> String;
}

/// The process/core-memory reader (spec §1, out of scope): `read(addr,
/// len) -> bytes` plus the target's pointer width.
pub trait MemoryReader: Send + Sync {
    fn read(&self, addr: Address, len: usize) -> Result<Vec<u8>, crate::Error>;
    fn pointer_size(&self) -> u8;
}
