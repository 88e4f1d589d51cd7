//! Heap object type inference: given a raw address inside a live process,
//! identify the target-runtime type(s) whose pointer-bitmap layout is
//! compatible with the memory occupied by the object there.
//!
//! This crate reproduces the allocator's size-class model (`size_class`)
//! and runs the bitmap comparison (`match_engine`) against a type index
//! (`type_index`) built by the caller from whatever the binary-format
//! loader and symbol table (out of scope here) discovered. It never reads
//! process memory itself, that's [`heap_info::HeapImage`]'s job.

pub mod heap_info;
pub mod match_engine;
pub mod size_class;
pub mod type_index;

pub use heap_info::{Address, HeapImage, SpanInfo};
pub use match_engine::{a_type_match_by_bitmap, s_type_match_by_bitmap, type_match_check, MatchResult};
pub use size_class::{
    cal_size_class, cal_span_class, class_to_size, SizeClass, MAX_SMALL_SIZE, NUM_SIZE_CLASSES,
    RUNTIME_PAGE_SIZE, SMALL_SIZE_MAX, TINY_SIZE, TINY_SIZE_CLASS, TINY_SPAN_CLASS,
};
pub use type_index::{TypeDescriptor, TypeIndex};
