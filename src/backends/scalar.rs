//! Scalar (non-SIMD) backend implementation
//!
//! This is the reference implementation every vector backend is checked
//! against. It walks one element at a time, left to right.
//!
//! # Performance
//!
//! This backend provides the correctness oracle but no SIMD acceleration.

use super::{abs_diff_element, blend_element, is_outlier, sq_dev, KernelBackend};
use crate::rle::Run;

/// Scalar backend (portable, no SIMD)
pub struct ScalarBackend;

impl KernelBackend for ScalarBackend {
    // SAFETY: This function is safe because:
    // 1. All slice accesses are bounds-checked by Rust iterators
    // 2. No raw pointer arithmetic is performed
    // 3. Marked unsafe only to match KernelBackend trait interface
    unsafe fn blend(a: &[u8], b: &[u8], alpha: f32, out: &mut [u8]) {
        for ((o, &p1), &p2) in out.iter_mut().zip(a).zip(b) {
            *o = blend_element(p1, p2, alpha);
        }
    }

    // SAFETY: This function is safe because:
    // 1. All slice accesses are bounds-checked by Rust iterators
    // 2. No raw pointer arithmetic is performed
    // 3. Marked unsafe only to match KernelBackend trait interface
    unsafe fn abs_diff(a: &[u8], b: &[u8], alpha: f32, out: &mut [u8]) {
        for ((o, &p1), &p2) in out.iter_mut().zip(a).zip(b) {
            *o = abs_diff_element(p1, p2, alpha);
        }
    }

    // SAFETY: This function is safe because:
    // 1. All slice accesses are bounds-checked by Rust iterator
    // 2. No raw pointer arithmetic is performed
    // 3. Marked unsafe only to match KernelBackend trait interface
    unsafe fn sum(a: &[f32]) -> f64 {
        let mut total = 0.0;
        for &val in a {
            total += f64::from(val);
        }
        total
    }

    // SAFETY: This function is safe because:
    // 1. All slice accesses are bounds-checked by Rust iterator
    // 2. No raw pointer arithmetic is performed
    // 3. Marked unsafe only to match KernelBackend trait interface
    unsafe fn sum_sq_dev(a: &[f32], mean: f32) -> f64 {
        let mut total = 0.0;
        for &val in a {
            total += sq_dev(val, mean);
        }
        total
    }

    // SAFETY: This function is safe because:
    // 1. All slice accesses are bounds-checked by Rust iterator
    // 2. No raw pointer arithmetic is performed
    // 3. Marked unsafe only to match KernelBackend trait interface
    unsafe fn count_outliers(a: &[f32], mean: f32, std_dev: f32, threshold: f32) -> usize {
        a.iter()
            .filter(|&&x| is_outlier(x, mean, std_dev, threshold))
            .count()
    }

    // SAFETY: This function is safe because:
    // 1. All slice accesses are bounds-checked by Rust indexing
    // 2. No raw pointer arithmetic is performed
    // 3. Marked unsafe only to match KernelBackend trait interface
    unsafe fn encode_runs(input: &[u8], runs: &mut Vec<Run>) {
        let n = input.len();
        let mut i = 0;
        while i < n {
            let symbol = input[i];
            let mut count = 1;
            while i + 1 < n && input[i + 1] == symbol {
                count += 1;
                i += 1;
            }
            runs.push(Run { symbol, count });
            i += 1;
        }
    }
}
