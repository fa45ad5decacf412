//! Portable lane backend
//!
//! Fixed-size arrays stand in for vector registers: `[u8; 16]` for byte
//! kernels, 4 x f32 loads with `[f64; 4]` accumulators for reductions. Lane arithmetic is written so the
//! compiler can map each array op onto whatever vector unit the target has,
//! while keeping the exact lane widths and accumulation order of the SSE2
//! backend. Used as the vector path on targets without SSE2.

use super::scalar::ScalarBackend;
use super::{
    abs_diff_element, blend_element, fold_lanes, is_outlier, lane_prefix, sq_dev, KernelBackend,
    RunWalker,
};
use crate::config::{BYTE_LANES, FLOAT_LANES, RUN_WINDOW};
use crate::rle::Run;

/// Portable backend (array lanes, no intrinsics)
pub struct PortableBackend;

/// Same-as-next mask for one window, bit `j` set when `w[j] == w[j + 1]`
#[inline]
fn same_as_next_mask(w: &[u8]) -> u16 {
    let mut mask = 0u16;
    for j in 0..RUN_WINDOW - 1 {
        mask |= u16::from(w[j] == w[j + 1]) << j;
    }
    mask
}

#[inline]
fn map_lanes(a: &[u8], b: &[u8], out: &mut [u8], op: impl Fn(u8, u8) -> u8) {
    let body = lane_prefix(a.len(), BYTE_LANES);
    for ((oa, ca), cb) in out[..body]
        .chunks_exact_mut(BYTE_LANES)
        .zip(a[..body].chunks_exact(BYTE_LANES))
        .zip(b[..body].chunks_exact(BYTE_LANES))
    {
        let mut lanes = [0u8; BYTE_LANES];
        for k in 0..BYTE_LANES {
            lanes[k] = op(ca[k], cb[k]);
        }
        oa.copy_from_slice(&lanes);
    }
}

impl KernelBackend for PortableBackend {
    // SAFETY: This function is safe because:
    // 1. All slice accesses are bounds-checked by Rust slicing/iteration
    // 2. No raw pointer arithmetic is performed
    // 3. Marked unsafe only to match KernelBackend trait interface
    unsafe fn blend(a: &[u8], b: &[u8], alpha: f32, out: &mut [u8]) {
        let body = lane_prefix(a.len(), BYTE_LANES);
        map_lanes(a, b, out, |p1, p2| blend_element(p1, p2, alpha));
        ScalarBackend::blend(&a[body..], &b[body..], alpha, &mut out[body..a.len()]);
    }

    // SAFETY: See `blend`
    unsafe fn abs_diff(a: &[u8], b: &[u8], alpha: f32, out: &mut [u8]) {
        let body = lane_prefix(a.len(), BYTE_LANES);
        map_lanes(a, b, out, |p1, p2| abs_diff_element(p1, p2, alpha));
        ScalarBackend::abs_diff(&a[body..], &b[body..], alpha, &mut out[body..a.len()]);
    }

    // SAFETY: See `blend`
    unsafe fn sum(a: &[f32]) -> f64 {
        let body = lane_prefix(a.len(), FLOAT_LANES);
        let mut acc = [0.0f64; FLOAT_LANES];
        for chunk in a[..body].chunks_exact(FLOAT_LANES) {
            for k in 0..FLOAT_LANES {
                acc[k] += f64::from(chunk[k]);
            }
        }
        fold_lanes(acc) + ScalarBackend::sum(&a[body..])
    }

    // SAFETY: See `blend`
    unsafe fn sum_sq_dev(a: &[f32], mean: f32) -> f64 {
        let body = lane_prefix(a.len(), FLOAT_LANES);
        let mut acc = [0.0f64; FLOAT_LANES];
        for chunk in a[..body].chunks_exact(FLOAT_LANES) {
            for k in 0..FLOAT_LANES {
                acc[k] += sq_dev(chunk[k], mean);
            }
        }
        fold_lanes(acc) + ScalarBackend::sum_sq_dev(&a[body..], mean)
    }

    // SAFETY: See `blend`
    unsafe fn count_outliers(a: &[f32], mean: f32, std_dev: f32, threshold: f32) -> usize {
        let body = lane_prefix(a.len(), FLOAT_LANES);
        let mut count = 0;
        for chunk in a[..body].chunks_exact(FLOAT_LANES) {
            let mut mask = 0u8;
            for k in 0..FLOAT_LANES {
                mask |= u8::from(is_outlier(chunk[k], mean, std_dev, threshold)) << k;
            }
            count += mask.count_ones() as usize;
        }
        count + ScalarBackend::count_outliers(&a[body..], mean, std_dev, threshold)
    }

    // SAFETY: See `blend`
    unsafe fn encode_runs(input: &[u8], runs: &mut Vec<Run>) {
        let body = lane_prefix(input.len(), RUN_WINDOW);
        let mut walker = RunWalker::new(runs);
        for window in input[..body].chunks_exact(RUN_WINDOW) {
            walker.push_window(window, same_as_next_mask(window));
        }
        for &byte in &input[body..] {
            walker.push(byte);
        }
        walker.finish();
    }
}
