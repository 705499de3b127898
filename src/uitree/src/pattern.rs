//! Fast byte and pointer searches over memory chunks

use byteorder::{ByteOrder, LE};
use std::collections::HashSet;

/// Alignment of pointer fields in target objects
pub const POINTER_ALIGNMENT: u64 = 8;

/// Every offset of `needle` in `data`, using memchr's SIMD-accelerated memmem finder.
pub fn find_all(data: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() {
        return vec![];
    }
    memchr::memmem::find_iter(data, needle).collect()
}

/// Offsets in `data` of every 8-byte-aligned little-endian value contained in `values`.
///
/// Alignment is judged on absolute addresses: `data[0]` lives at `base`.
pub fn find_aligned_values(data: &[u8], base: u64, values: &HashSet<u64>) -> Vec<usize> {
    let Some(&min) = values.iter().min() else {
        return vec![];
    };
    let Some(&max) = values.iter().max() else {
        return vec![];
    };

    let first = ((POINTER_ALIGNMENT - base % POINTER_ALIGNMENT) % POINTER_ALIGNMENT) as usize;
    let mut results = Vec::new();

    if first >= data.len() {
        return results;
    }

    for (i, chunk) in data[first..].chunks_exact(8).enumerate() {
        let value = LE::read_u64(chunk);
        if value < min || value > max {
            continue;
        }
        if min == max || values.contains(&value) {
            results.push(first + i * 8);
        }
    }

    results
}
