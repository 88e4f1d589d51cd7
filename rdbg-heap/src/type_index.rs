//! Type-descriptor index (component C3).
//!
//! `TypeDescriptor` is a thin façade over whatever the binary-format loader
//! and symbol table (both out of scope, per spec §1) hand us per runtime
//! type: a size, a pointer-bytes count, and a per-word "is this a pointer"
//! predicate. Bucketing them by span class is the one piece of actual work
//! this crate does for C3, and it's what lets the match engine (C4) touch only
//! a handful of candidates per address instead of every type in the binary.

use crate::size_class::{cal_size_class, SizeClass};
use std::sync::Arc;

pub struct TypeDescriptor {
    pub name: String,
    pub size: i64,
    pub ptr_bytes: i64,
    is_ptr: Box<dyn Fn(usize, u8) -> bool + Send + Sync>,
}

impl TypeDescriptor {
    pub fn new(
        name: impl Into<String>,
        size: i64,
        ptr_bytes: i64,
        is_ptr: impl Fn(usize, u8) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            size,
            ptr_bytes,
            is_ptr: Box::new(is_ptr),
        }
    }

    pub fn is_ptr(&self, word_index: usize, ptr_size: u8) -> bool {
        (self.is_ptr)(word_index, ptr_size)
    }
}

impl std::fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("ptr_bytes", &self.ptr_bytes)
            .finish_non_exhaustive()
    }
}

/// Mapping from span class (an index in `[0, 2 * NUM_SIZE_CLASSES)`, low
/// bit = scannable) to the type descriptors whose natural size class is
/// that span class. Built once, read-shared afterward.
pub struct TypeIndex {
    buckets: Vec<Vec<Arc<TypeDescriptor>>>,
}

impl TypeIndex {
    pub fn build(descriptors: impl IntoIterator<Item = TypeDescriptor>) -> Self {
        let num_buckets = 2 * crate::size_class::NUM_SIZE_CLASSES;
        let mut buckets: Vec<Vec<Arc<TypeDescriptor>>> = (0..num_buckets).map(|_| Vec::new()).collect();

        for td in descriptors {
            // typeMatchCheck only ever looks types up via a span class
            // computed with noscan=false (§4.3 step 3), so that's the only
            // lane a descriptor needs to live in.
            if let SizeClass::Small(class) = cal_size_class(td.size.max(0) as u64) {
                let idx = ((class as usize) << 1) | 1;
                buckets[idx].push(Arc::new(td));
            }
            // A type whose own size classifies as "large" can never be the
            // contents of a small-class span and has no bucket to live in.
        }

        Self { buckets }
    }

    pub fn bucket(&self, spanclass: usize) -> &[Arc<TypeDescriptor>] {
        self.buckets.get(spanclass).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn descriptor_lands_in_its_scannable_bucket() {
        let td = TypeDescriptor::new("pkg.Thing", 32, 8, |_, _| true);
        let index = TypeIndex::build([td]);

        // size 32 -> class 4 -> scannable bucket (4<<1)|1 = 9
        assert_eq!(index.bucket(9).len(), 1);
        assert_eq!(index.bucket(9)[0].name, "pkg.Thing");
        assert!(index.bucket(8).is_empty());
    }

    #[test]
    fn out_of_range_bucket_is_empty_not_panicking() {
        let index = TypeIndex::build(std::iter::empty());
        assert!(index.bucket(10_000).is_empty());
    }
}
