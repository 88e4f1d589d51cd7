//! Heap info oracle (component C2).
//!
//! The span/bitmap data itself lives outside this crate, the process or
//! core-memory reader (spec §1, out of scope) is the thing that actually
//! knows how to walk the runtime's span table and mark bitmap. [`HeapImage`]
//! is the seam: the match engine (C4) only ever talks to a `&dyn HeapImage`.

/// An address inside the inspected process (or core dump), at target
/// pointer width.
pub type Address = u64;

/// Span metadata for whatever span contains the address it was returned
/// for. `noscan` spans carry no bitmap; [`SpanInfo::is_ptr`] always answers
/// `false` for one without consulting the reader closure.
pub struct SpanInfo {
    pub size: i64,
    pub noscan: bool,
    bitmap_reader: Box<dyn Fn(Address, u8) -> bool + Send + Sync>,
}

impl SpanInfo {
    pub fn new(
        size: i64,
        noscan: bool,
        bitmap_reader: impl Fn(Address, u8) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            size,
            noscan,
            bitmap_reader: Box::new(bitmap_reader),
        }
    }

    /// Whether the target runtime's mark bitmap has the pointer bit set for
    /// the word at `addr`.
    pub fn is_ptr(&self, addr: Address, ptr_size: u8) -> bool {
        if self.noscan {
            return false;
        }
        (self.bitmap_reader)(addr, ptr_size)
    }
}

impl std::fmt::Debug for SpanInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpanInfo")
            .field("size", &self.size)
            .field("noscan", &self.noscan)
            .finish_non_exhaustive()
    }
}

/// The process/core-memory reader's heap-shaped view, consumed by the
/// match engine. Implementations are provided by the enclosing process
/// image, never by this crate.
pub trait HeapImage: Send + Sync {
    fn pointer_size(&self) -> u8;

    /// Span metadata for the span containing `addr`.
    fn find_heap_info(&self, addr: Address) -> SpanInfo;

    /// `(object_base, offset_within_object)` for the heap object enclosing
    /// `addr`, or `(0, 0)` if `addr` is not on the heap.
    fn find_object(&self, addr: Address) -> (Address, usize);
}

#[cfg(test)]
mod test {
    use super::*;

    struct FixedSpan {
        ptr_bit: bool,
    }

    impl HeapImage for FixedSpan {
        fn pointer_size(&self) -> u8 {
            8
        }
        fn find_heap_info(&self, _addr: Address) -> SpanInfo {
            let ptr_bit = self.ptr_bit;
            SpanInfo::new(32, false, move |_, _| ptr_bit)
        }
        fn find_object(&self, addr: Address) -> (Address, usize) {
            (addr, 0)
        }
    }

    #[test]
    fn noscan_span_short_circuits_is_ptr() {
        let span = SpanInfo::new(16, true, |_, _| true);
        assert!(!span.is_ptr(0, 8));
    }

    #[test]
    fn scannable_span_defers_to_reader() {
        let heap = FixedSpan { ptr_bit: true };
        let span = heap.find_heap_info(0);
        assert!(span.is_ptr(0, 8));
    }
}
