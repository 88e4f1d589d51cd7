//! Size-class arithmetic (component C1).
//!
//! The three lookup tables below mirror the managed runtime's allocator
//! exactly: `CLASS_TO_SIZE` is the authoritative table, `SIZE_TO_CLASS8` and
//! `SIZE_TO_CLASS128` are its two inverses. Rather than transcribing the
//! ~380 inverse-table entries by hand (and risking a single mistyped digit
//! breaking every lookup above it), they're derived from `CLASS_TO_SIZE` by
//! the same rule the runtime's own table generator uses: the smallest class
//! whose size covers the bucket. `const fn` means this derivation happens at
//! compile time, so the tables are still plain immutable static data with no
//! runtime initialization cost.

/// Number of small-object size classes, including class 0 (the zero-size
/// class).
pub const NUM_SIZE_CLASSES: usize = 68;

/// Above this, small-object rounding switches from 8-byte to 128-byte steps.
pub const SMALL_SIZE_MAX: u32 = 1024;
const SMALL_SIZE_DIV: u32 = 8;

/// Above this, an allocation gets its own page-aligned span rather than a
/// size class.
pub const MAX_SMALL_SIZE: u32 = 32768;
const LARGE_SIZE_DIV: u32 = 128;

/// Conservative default; callers that know the target's actual runtime page
/// size should not rely on this for anything other than classifying an
/// allocation as "large" (see [`SizeClass::Large`]).
pub const RUNTIME_PAGE_SIZE: u64 = 8192;

pub const TINY_SIZE: u32 = 16;
pub const TINY_SIZE_CLASS: u8 = 2;
/// `tinySizeClass<<1 | 1`, matching the runtime convention for the
/// scannable lane of a span class.
pub const TINY_SPAN_CLASS: usize = ((TINY_SIZE_CLASS as usize) << 1) | 1;

#[rustfmt::skip]
pub const CLASS_TO_SIZE: [u16; NUM_SIZE_CLASSES] = [
    0, 8, 16, 24, 32, 48, 64, 80, 96, 112, 128, 144, 160, 176, 192, 208, 224,
    240, 256, 288, 320, 352, 384, 416, 448, 480, 512, 576, 640, 704, 768, 896,
    1024, 1152, 1280, 1408, 1536, 1792, 2048, 2304, 2688, 3072, 3200, 3456,
    4096, 4864, 5376, 6144, 6528, 6784, 6912, 8192, 9472, 9728, 10240, 10880,
    12288, 13568, 14336, 16384, 18432, 19072, 20480, 21760, 24576, 27264,
    28672, 32768,
];

const fn smallest_class_at_least(target: u32) -> u8 {
    let mut class = 0usize;
    while class < NUM_SIZE_CLASSES && (CLASS_TO_SIZE[class] as u32) < target {
        class += 1;
    }
    // Saturate rather than index out of bounds; nothing calls this above
    // SMALL_SIZE_MAX/MAX_SMALL_SIZE respectively, where the last class
    // (32768) always covers the request.
    if class >= NUM_SIZE_CLASSES {
        (NUM_SIZE_CLASSES - 1) as u8
    } else {
        class as u8
    }
}

const fn build_size_to_class8() -> [u8; 129] {
    let mut table = [0u8; 129];
    let mut i = 0usize;
    while i <= 128 {
        table[i] = smallest_class_at_least((i as u32) * SMALL_SIZE_DIV);
        i += 1;
    }
    table
}

const fn build_size_to_class128() -> [u8; 249] {
    let mut table = [0u8; 249];
    let mut i = 0usize;
    while i <= 248 {
        table[i] = smallest_class_at_least(SMALL_SIZE_MAX + (i as u32) * LARGE_SIZE_DIV);
        i += 1;
    }
    table
}

/// `size_to_class8[0..=128]`, indexing by `ceil(n/8)` for `n` in `0..=1024`.
pub const SIZE_TO_CLASS8: [u8; 129] = build_size_to_class8();
/// `size_to_class128[0..=248]`, indexing by `ceil((n - 1024)/128)` for `n`
/// in `1024..=32768`.
pub const SIZE_TO_CLASS128: [u8; 249] = build_size_to_class128();

/// The outcome of classifying a byte size: either one of the 68 fixed
/// size classes, or a dedicated "large" allocation whose span is its own
/// page-aligned region, not one of these tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    Small(u8),
    /// `pages` is the byte size rounded up to [`RUNTIME_PAGE_SIZE`]; two
    /// large allocations compare equal here iff they'd occupy the same
    /// number of pages, which is the only notion of "same class" a large
    /// allocation has.
    Large { pages: u64 },
}

pub fn class_to_size(class: u8) -> u16 {
    CLASS_TO_SIZE[class as usize]
}

/// `calSizeClass` from spec §4.1.
pub fn cal_size_class(nbytes: u64) -> SizeClass {
    if nbytes == 0 {
        return SizeClass::Small(0);
    }
    if nbytes <= SMALL_SIZE_MAX as u64 {
        let idx = ((nbytes + SMALL_SIZE_DIV as u64 - 1) / SMALL_SIZE_DIV as u64) as usize;
        return SizeClass::Small(SIZE_TO_CLASS8[idx]);
    }
    if nbytes <= MAX_SMALL_SIZE as u64 {
        let idx = ((nbytes - SMALL_SIZE_MAX as u64 + LARGE_SIZE_DIV as u64 - 1)
            / LARGE_SIZE_DIV as u64) as usize;
        return SizeClass::Small(SIZE_TO_CLASS128[idx]);
    }
    let pages = (nbytes + RUNTIME_PAGE_SIZE - 1) / RUNTIME_PAGE_SIZE;
    SizeClass::Large { pages }
}

/// `calSpanClass` from spec §4.1. Returns `None` for a large span, which
/// has no place in the fixed `[0, 2*NUM_SIZE_CLASSES)` span-class domain.
pub fn cal_span_class(size_class: SizeClass, noscan: bool) -> Option<usize> {
    match size_class {
        SizeClass::Small(c) => Some(((c as usize) << 1) | usize::from(!noscan)),
        SizeClass::Large { .. } => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 1)]
    #[case(8, 1)]
    #[case(9, 2)]
    #[case(1024, 32)]
    #[case(1025, 33)]
    #[case(32768, 67)]
    fn concrete_lookups(#[case] nbytes: u64, #[case] expected_class: u8) {
        assert_eq!(cal_size_class(nbytes), SizeClass::Small(expected_class));
    }

    #[test]
    fn zero_is_class_zero() {
        assert_eq!(cal_size_class(0), SizeClass::Small(0));
    }

    #[test]
    fn every_class_is_smallest_sufficient() {
        for n in 1u64..=MAX_SMALL_SIZE as u64 {
            let SizeClass::Small(class) = cal_size_class(n) else {
                panic!("{n} should classify as small")
            };
            let size = class_to_size(class) as u64;
            assert!(size >= n, "class_to_size[{class}] = {size} < {n}");
            if class > 0 {
                let smaller = class_to_size(class - 1) as u64;
                assert!(smaller < n, "class {class} for {n} is not smallest sufficient");
            }
        }
    }

    #[test]
    fn class_to_size_round_trips() {
        for class in 1u8..NUM_SIZE_CLASSES as u8 {
            let size = class_to_size(class);
            assert_eq!(cal_size_class(size as u64), SizeClass::Small(class));
        }
    }

    #[test]
    fn large_allocations_compare_by_page_count() {
        let a = cal_size_class(MAX_SMALL_SIZE as u64 + 1);
        let b = cal_size_class(MAX_SMALL_SIZE as u64 + 2);
        // Both round up into the same page, assuming a page well above 2 bytes.
        assert_eq!(a, b);

        let c = cal_size_class(MAX_SMALL_SIZE as u64 + RUNTIME_PAGE_SIZE + 1);
        assert_ne!(a, c);
    }

    #[test]
    fn tiny_constants() {
        assert_eq!(TINY_SIZE, 16);
        assert_eq!(TINY_SIZE_CLASS, 2);
        assert_eq!(TINY_SPAN_CLASS, 5);
    }

    #[test]
    fn span_class_encodes_noscan_in_low_bit() {
        let small = SizeClass::Small(4);
        assert_eq!(cal_span_class(small, false), Some(9));
        assert_eq!(cal_span_class(small, true), Some(8));
        assert_eq!(cal_span_class(SizeClass::Large { pages: 1 }, false), None);
    }
}
