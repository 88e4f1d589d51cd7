//! Type-match engine (component C4).
//!
//! The size-class check in both predicates is deliberately the very first
//! thing each function does: it's O(1) and prunes almost everything before
//! a single bitmap byte is read, which matters because the bitmap compare
//! itself is O(spanSize/ptrSize).

use crate::heap_info::{Address, HeapImage};
use crate::size_class::{cal_size_class, cal_span_class, class_to_size, SizeClass};
use crate::type_index::{TypeDescriptor, TypeIndex};
use std::sync::Arc;

#[derive(Debug, Default, Clone)]
pub struct MatchResult {
    pub single: Vec<Arc<TypeDescriptor>>,
    pub array: Vec<Arc<TypeDescriptor>>,
}

/// `sTypeMatchByBitmap` from spec §4.3.
pub fn s_type_match_by_bitmap(heap: &dyn HeapImage, obj: Address, t: &TypeDescriptor) -> bool {
    let ptr_size = heap.pointer_size();
    let span = heap.find_heap_info(obj);
    let span_size = span.size;

    let expected_size = match cal_size_class(t.size.max(0) as u64) {
        SizeClass::Small(c) => class_to_size(c) as i64,
        SizeClass::Large { .. } => return false,
    };
    if span_size != expected_size {
        return false;
    }
    if span.noscan || t.ptr_bytes == 0 {
        return false;
    }

    let words = span_size / ptr_size as i64;
    for i in 0..words {
        let word_addr = obj.wrapping_add((i * ptr_size as i64) as u64);
        let is_ptr = heap.find_heap_info(word_addr).is_ptr(word_addr, ptr_size);
        if is_ptr != t.is_ptr(i as usize, ptr_size) {
            return false;
        }
    }
    true
}

/// `aTypeMatchByBitmap` from spec §4.3.
pub fn a_type_match_by_bitmap(heap: &dyn HeapImage, obj: Address, t: &TypeDescriptor) -> bool {
    let ptr_size = heap.pointer_size();
    let span = heap.find_heap_info(obj);
    let span_size = span.size;
    let type_size = t.size;

    if type_size <= 0 || span_size <= 2 * type_size {
        return false;
    }
    if span.noscan || t.ptr_bytes == 0 {
        return false;
    }

    let num = span_size / type_size;
    let tail = span_size % type_size;
    if tail != 0 && cal_size_class(span_size as u64) != cal_size_class((num * type_size) as u64) {
        return false;
    }

    let words_per_elem = type_size / ptr_size as i64;
    for k in 0..num {
        for i in 0..words_per_elem {
            let word_addr = obj.wrapping_add((k * type_size + i * ptr_size as i64) as u64);
            let is_ptr = heap.find_heap_info(word_addr).is_ptr(word_addr, ptr_size);
            if is_ptr != t.is_ptr(i as usize, ptr_size) {
                return false;
            }
        }
    }

    let tail_words = tail / ptr_size as i64;
    for i in 0..tail_words {
        let word_addr = obj.wrapping_add((num * type_size + i * ptr_size as i64) as u64);
        if heap.find_heap_info(word_addr).is_ptr(word_addr, ptr_size) {
            return false;
        }
    }

    true
}

/// `typeMatchCheck` from spec §4.3.
pub fn type_match_check(heap: &dyn HeapImage, index: &TypeIndex, addr: Address) -> MatchResult {
    let (obj, off0) = heap.find_object(addr);
    if obj == 0 && off0 == 0 {
        return MatchResult::default();
    }

    let span = heap.find_heap_info(obj);
    if span.noscan {
        return MatchResult::default();
    }

    let spanclass = match cal_span_class(cal_size_class(span.size.max(0) as u64), false) {
        Some(c) => c,
        None => return MatchResult::default(),
    };

    let mut result = MatchResult::default();
    for td in index.bucket(spanclass) {
        if s_type_match_by_bitmap(heap, obj, td) {
            result.single.push(td.clone());
        }
        if a_type_match_by_bitmap(heap, obj, td) {
            result.array.push(td.clone());
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::heap_info::SpanInfo;
    use crate::type_index::TypeIndex;

    /// A heap with one object per configured span, bitmap bits supplied as
    /// a simple per-word-index closure so tests can describe patterns
    /// directly instead of building byte buffers.
    struct FakeHeap {
        ptr_size: u8,
        span_size: i64,
        noscan: bool,
        is_ptr: Box<dyn Fn(Address) -> bool>,
    }

    impl HeapImage for FakeHeap {
        fn pointer_size(&self) -> u8 {
            self.ptr_size
        }
        fn find_heap_info(&self, _addr: Address) -> SpanInfo {
            let is_ptr = &self.is_ptr;
            let bit = is_ptr(_addr);
            SpanInfo::new(self.span_size, self.noscan, move |_, _| bit)
        }
        fn find_object(&self, addr: Address) -> (Address, usize) {
            (addr - (addr % self.span_size as u64), 0)
        }
    }

    #[test]
    fn single_match_rejects_wrong_class_before_reading_bitmap() {
        let heap = FakeHeap {
            ptr_size: 8,
            span_size: 48,
            noscan: false,
            is_ptr: Box::new(|_| panic!("bitmap should not be consulted")),
        };
        let t = TypeDescriptor::new("T", 32, 8, |_, _| true);
        assert!(!s_type_match_by_bitmap(&heap, 0, &t));
    }

    #[test]
    fn noscan_span_yields_empty_check() {
        let heap = FakeHeap {
            ptr_size: 8,
            span_size: 32,
            noscan: true,
            is_ptr: Box::new(|_| true),
        };
        let index = TypeIndex::build([TypeDescriptor::new("T", 32, 8, |_, _| true)]);
        assert!(type_match_check(&heap, &index, 0).single.is_empty());
        assert!(type_match_check(&heap, &index, 0).array.is_empty());
    }

    #[test]
    fn zero_ptr_bytes_rejects_regardless_of_span() {
        let heap = FakeHeap {
            ptr_size: 8,
            span_size: 32,
            noscan: false,
            is_ptr: Box::new(|_| false),
        };
        let t = TypeDescriptor::new("T", 32, 0, |_, _| false);
        assert!(!s_type_match_by_bitmap(&heap, 0, &t));
        assert!(!a_type_match_by_bitmap(&heap, 0, &t));
    }

    #[test]
    fn array_match_rejects_length_one() {
        let heap = FakeHeap {
            ptr_size: 8,
            span_size: 32,
            noscan: false,
            is_ptr: Box::new(|_| true),
        };
        let t = TypeDescriptor::new("T", 16, 8, |_, _| true);
        assert!(!a_type_match_by_bitmap(&heap, 0, &t));
    }

    #[test]
    fn array_match_accepts_repeated_pattern_with_no_tail() {
        // spanSize=48, typeSize=16, ptrSize=8: 3 elements of 2 words each,
        // pattern [ptr, non-ptr] repeated.
        let heap = FakeHeap {
            ptr_size: 8,
            span_size: 48,
            noscan: false,
            is_ptr: Box::new(|addr| (addr / 8) % 2 == 0),
        };
        let t = TypeDescriptor::new("T", 16, 8, |word, _| word % 2 == 0);
        assert!(a_type_match_by_bitmap(&heap, 0, &t));
    }

    #[test]
    fn array_match_rejects_pointer_in_tail() {
        // spanSize=80, typeSize=24, ptrSize=8: num=3 elements (3 words
        // each) plus an 8-byte tail at offset 72. cal_size_class(80) and
        // cal_size_class(72) both land in class 7, so the class-consistency
        // check passes and the rejection comes purely from the tail word
        // being pointer-free at offset 72.
        let heap = FakeHeap {
            ptr_size: 8,
            span_size: 80,
            noscan: false,
            is_ptr: Box::new(|addr| addr == 72),
        };
        let t = TypeDescriptor::new("T", 24, 8, |_, _| false);
        assert!(!a_type_match_by_bitmap(&heap, 0, &t));
    }

    #[test]
    fn type_match_check_not_on_heap() {
        struct NotOnHeap;
        impl HeapImage for NotOnHeap {
            fn pointer_size(&self) -> u8 {
                8
            }
            fn find_heap_info(&self, _addr: Address) -> SpanInfo {
                SpanInfo::new(0, true, |_, _| false)
            }
            fn find_object(&self, _addr: Address) -> (Address, usize) {
                (0, 0)
            }
        }
        let index = TypeIndex::build(std::iter::empty());
        assert!(type_match_check(&NotOnHeap, &index, 0x1000).single.is_empty());
    }
}
