//! SSE2 backend implementation (x86_64 baseline SIMD)
//!
//! This backend uses SSE2 intrinsics for 128-bit SIMD operations.
//! SSE2 is available on all x86_64 CPUs as a baseline requirement.
//!
//! # Lanes
//!
//! - Byte kernels and the run encoder: 16 x u8 per register
//! - Outlier counting: 4 x f32 per register
//! - Reductions: 4 x f32 loads, widened into two 2 x f64 accumulators
//!
//! # Safety
//!
//! All SSE2 intrinsics are marked `unsafe` by Rust. This module carefully isolates
//! all unsafe code and verifies correctness against the scalar backend.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use super::scalar::ScalarBackend;
use super::{lane_prefix, KernelBackend, RunWalker};
use crate::config::{BYTE_LANES, FLOAT_LANES};
use crate::rle::Run;

/// SSE2 backend (128-bit SIMD for x86_64)
pub struct Sse2Backend;

/// Zero-extend 16 bytes into four vectors of 4 x i32
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn widen_u8x16(v: __m128i) -> [__m128i; 4] {
    let zero = _mm_setzero_si128();
    let lo = _mm_unpacklo_epi8(v, zero);
    let hi = _mm_unpackhi_epi8(v, zero);
    [
        _mm_unpacklo_epi16(lo, zero),
        _mm_unpackhi_epi16(lo, zero),
        _mm_unpacklo_epi16(hi, zero),
        _mm_unpackhi_epi16(hi, zero),
    ]
}

/// Saturate four vectors of i32 into 16 bytes clamped to [0, 255]
///
/// `packs_epi32` saturates to i16 first, which preserves the clamp result
/// because every input is already bounded by `255 * (1 + MAX_BLEND_WEIGHT)`.
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn narrow_i32x16(v: [__m128i; 4]) -> __m128i {
    let lo = _mm_packs_epi32(v[0], v[1]);
    let hi = _mm_packs_epi32(v[2], v[3]);
    _mm_packus_epi16(lo, hi)
}

/// `trunc(b * alpha)` per lane, matching the scalar `as i32` conversion
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn weighted_i32(b: __m128i, alpha: __m128) -> __m128i {
    _mm_cvttps_epi32(_mm_mul_ps(_mm_cvtepi32_ps(b), alpha))
}

/// Widen 4 x f32 into lanes `[0, 1]` and `[2, 3]` of 2 x f64
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn widen_ps(v: __m128) -> (__m128d, __m128d) {
    (_mm_cvtps_pd(v), _mm_cvtps_pd(_mm_movehl_ps(v, v)))
}

/// Horizontal sum of 4 f64 lanes as `(l0 + l2) + (l1 + l3)`
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn hsum_pd(lo: __m128d, hi: __m128d) -> f64 {
    let pairs = _mm_add_pd(lo, hi);
    _mm_cvtsd_f64(_mm_add_sd(pairs, _mm_unpackhi_pd(pairs, pairs)))
}

impl KernelBackend for Sse2Backend {
    #[target_feature(enable = "sse2")]
    unsafe fn blend(a: &[u8], b: &[u8], alpha: f32, out: &mut [u8]) {
        let len = a.len();
        let body = lane_prefix(len, BYTE_LANES);
        let valpha = _mm_set1_ps(alpha);
        let mut i = 0;

        // Process 16 bytes at a time, widened to 4 x i32 for the float weight
        while i < body {
            let va = _mm_loadu_si128(a.as_ptr().add(i).cast());
            let vb = _mm_loadu_si128(b.as_ptr().add(i).cast());

            let wa = widen_u8x16(va);
            let wb = widen_u8x16(vb);
            let mut sums = [_mm_setzero_si128(); 4];
            for k in 0..4 {
                sums[k] = _mm_add_epi32(wa[k], weighted_i32(wb[k], valpha));
            }

            _mm_storeu_si128(out.as_mut_ptr().add(i).cast(), narrow_i32x16(sums));
            i += BYTE_LANES;
        }

        // Handle remaining elements with scalar code
        ScalarBackend::blend(&a[body..], &b[body..], alpha, &mut out[body..len]);
    }

    #[target_feature(enable = "sse2")]
    unsafe fn abs_diff(a: &[u8], b: &[u8], alpha: f32, out: &mut [u8]) {
        let len = a.len();
        let body = lane_prefix(len, BYTE_LANES);
        let mut i = 0;

        if alpha == 1.0 {
            // |a - b| == (a -sat b) | (b -sat a) for unsigned bytes
            while i < body {
                let va = _mm_loadu_si128(a.as_ptr().add(i).cast());
                let vb = _mm_loadu_si128(b.as_ptr().add(i).cast());
                let diff = _mm_or_si128(_mm_subs_epu8(va, vb), _mm_subs_epu8(vb, va));
                _mm_storeu_si128(out.as_mut_ptr().add(i).cast(), diff);
                i += BYTE_LANES;
            }
        } else {
            let valpha = _mm_set1_ps(alpha);
            while i < body {
                let va = _mm_loadu_si128(a.as_ptr().add(i).cast());
                let vb = _mm_loadu_si128(b.as_ptr().add(i).cast());

                let wa = widen_u8x16(va);
                let wb = widen_u8x16(vb);
                let mut diffs = [_mm_setzero_si128(); 4];
                for k in 0..4 {
                    let d = _mm_sub_epi32(wa[k], weighted_i32(wb[k], valpha));
                    // SSE2 has no abs_epi32: (d ^ sign) - sign
                    let sign = _mm_srai_epi32(d, 31);
                    diffs[k] = _mm_sub_epi32(_mm_xor_si128(d, sign), sign);
                }

                _mm_storeu_si128(out.as_mut_ptr().add(i).cast(), narrow_i32x16(diffs));
                i += BYTE_LANES;
            }
        }

        // Handle remaining elements with scalar code
        ScalarBackend::abs_diff(&a[body..], &b[body..], alpha, &mut out[body..len]);
    }

    #[target_feature(enable = "sse2")]
    unsafe fn sum(a: &[f32]) -> f64 {
        let len = a.len();
        let body = lane_prefix(len, FLOAT_LANES);
        let mut acc_lo = _mm_setzero_pd();
        let mut acc_hi = _mm_setzero_pd();
        let mut i = 0;

        // Process 4 elements at a time, accumulated as 2 x f64 twice
        while i < body {
            let (lo, hi) = widen_ps(_mm_loadu_ps(a.as_ptr().add(i)));
            acc_lo = _mm_add_pd(acc_lo, lo);
            acc_hi = _mm_add_pd(acc_hi, hi);
            i += FLOAT_LANES;
        }

        hsum_pd(acc_lo, acc_hi) + ScalarBackend::sum(&a[body..])
    }

    #[target_feature(enable = "sse2")]
    unsafe fn sum_sq_dev(a: &[f32], mean: f32) -> f64 {
        let len = a.len();
        let body = lane_prefix(len, FLOAT_LANES);
        let vmean = _mm_set1_pd(f64::from(mean));
        let mut acc_lo = _mm_setzero_pd();
        let mut acc_hi = _mm_setzero_pd();
        let mut i = 0;

        while i < body {
            let (lo, hi) = widen_ps(_mm_loadu_ps(a.as_ptr().add(i)));
            let d_lo = _mm_sub_pd(lo, vmean);
            let d_hi = _mm_sub_pd(hi, vmean);
            acc_lo = _mm_add_pd(acc_lo, _mm_mul_pd(d_lo, d_lo));
            acc_hi = _mm_add_pd(acc_hi, _mm_mul_pd(d_hi, d_hi));
            i += FLOAT_LANES;
        }

        hsum_pd(acc_lo, acc_hi) + ScalarBackend::sum_sq_dev(&a[body..], mean)
    }

    #[target_feature(enable = "sse2")]
    unsafe fn count_outliers(a: &[f32], mean: f32, std_dev: f32, threshold: f32) -> usize {
        let len = a.len();
        let body = lane_prefix(len, FLOAT_LANES);
        let vmean = _mm_set1_ps(mean);
        let vstd = _mm_set1_ps(std_dev);
        let vthreshold = _mm_set1_ps(threshold);
        // -0.0 has only the sign bit set; andnot clears it
        let sign_mask = _mm_set1_ps(-0.0);
        let mut count = 0;
        let mut i = 0;

        while i < body {
            let x = _mm_loadu_ps(a.as_ptr().add(i));
            let z = _mm_div_ps(_mm_sub_ps(x, vmean), vstd);
            let abs_z = _mm_andnot_ps(sign_mask, z);
            let mask = _mm_movemask_ps(_mm_cmpgt_ps(abs_z, vthreshold));
            count += mask.count_ones() as usize;
            i += FLOAT_LANES;
        }

        count + ScalarBackend::count_outliers(&a[body..], mean, std_dev, threshold)
    }

    #[target_feature(enable = "sse2")]
    unsafe fn encode_runs(input: &[u8], runs: &mut Vec<Run>) {
        let body = lane_prefix(input.len(), BYTE_LANES);
        let mut walker = RunWalker::new(runs);
        let mut i = 0;

        while i < body {
            let chunk = _mm_loadu_si128(input.as_ptr().add(i).cast());
            // Lane j compares byte j with byte j + 1; lane 15 sees a shifted-in zero
            let next = _mm_srli_si128(chunk, 1);
            let eq = _mm_cmpeq_epi8(chunk, next);
            let mask = (_mm_movemask_epi8(eq) & 0x7FFF) as u16;
            walker.push_window(&input[i..i + BYTE_LANES], mask);
            i += BYTE_LANES;
        }

        // Fewer than 16 symbols left: scalar boundary detection, same carried run
        for &byte in &input[body..] {
            walker.push(byte);
        }
        walker.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse2_blend_with_tail() {
        let a: Vec<u8> = (0..17).map(|i| i * 15).collect();
        let b: Vec<u8> = (0..17).map(|i| 255 - i * 3).collect();
        let mut scalar_out = vec![0u8; 17];
        let mut sse2_out = vec![0u8; 17];

        unsafe {
            ScalarBackend::blend(&a, &b, 0.625, &mut scalar_out);
            Sse2Backend::blend(&a, &b, 0.625, &mut sse2_out);
        }

        assert_eq!(scalar_out, sse2_out);
    }

    #[test]
    fn test_sse2_blend_saturates() {
        let a = [255u8; 16];
        let b = [255u8; 16];
        let mut out = [0u8; 16];
        unsafe { Sse2Backend::blend(&a, &b, 1.0, &mut out) };
        assert_eq!(out, [255u8; 16]);

        let a = [254u8; 16];
        let b = [2u8; 16];
        unsafe { Sse2Backend::blend(&a, &b, 1.0, &mut out) };
        assert_eq!(out, [255u8; 16]);
    }

    #[test]
    fn test_sse2_blend_negative_weight_clamps_to_zero() {
        let a = [10u8; 16];
        let b = [200u8; 16];
        let mut out = [1u8; 16];
        unsafe { Sse2Backend::blend(&a, &b, -1.0, &mut out) };
        assert_eq!(out, [0u8; 16]);
    }

    #[test]
    fn test_sse2_abs_diff_fast_path() {
        let a: Vec<u8> = (0..32).map(|i| (i * 8) as u8).collect();
        let b: Vec<u8> = (0..32).map(|i| (255 - i * 7) as u8).collect();
        let mut scalar_out = vec![0u8; 32];
        let mut sse2_out = vec![0u8; 32];

        unsafe {
            ScalarBackend::abs_diff(&a, &b, 1.0, &mut scalar_out);
            Sse2Backend::abs_diff(&a, &b, 1.0, &mut sse2_out);
        }

        assert_eq!(scalar_out, sse2_out);
    }

    #[test]
    fn test_sse2_abs_diff_weighted() {
        let a: Vec<u8> = (0..35).map(|i| (i * 7) as u8).collect();
        let b: Vec<u8> = (0..35).map(|i| (250 - i * 5) as u8).collect();
        let mut scalar_out = vec![0u8; 35];
        let mut sse2_out = vec![0u8; 35];

        unsafe {
            ScalarBackend::abs_diff(&a, &b, 1.75, &mut scalar_out);
            Sse2Backend::abs_diff(&a, &b, 1.75, &mut sse2_out);
        }

        assert_eq!(scalar_out, sse2_out);
    }

    #[test]
    fn test_sse2_sum() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let result = unsafe { Sse2Backend::sum(&a) };
        assert_eq!(result, 15.0);
    }

    #[test]
    fn test_sse2_sum_constant_is_exact() {
        let a = vec![0.1f32; 1003];
        let result = unsafe { Sse2Backend::sum(&a) };
        assert_eq!(result, 1003.0 * f64::from(0.1f32));
        assert_eq!(unsafe { Sse2Backend::sum_sq_dev(&a, 0.1) }, 0.0);
    }

    #[test]
    fn test_sse2_sum_sq_dev() {
        let a = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let result = unsafe { Sse2Backend::sum_sq_dev(&a, 5.0) };
        assert_eq!(result, 32.0);
    }

    #[test]
    fn test_sse2_count_outliers_matches_scalar_in_body_and_tail() {
        // 2.6 sits in the lane body, -3.0 in the tail; 2.5 is never counted
        let a = [0.0, 2.6, 2.5, 0.0, -3.0, -2.5];
        let scalar = unsafe { ScalarBackend::count_outliers(&a, 0.0, 1.0, 2.5) };
        let sse2 = unsafe { Sse2Backend::count_outliers(&a, 0.0, 1.0, 2.5) };
        assert_eq!(scalar, 2);
        assert_eq!(sse2, scalar);
    }

    #[test]
    fn test_sse2_encode_runs_straddle() {
        let mut runs = Vec::new();
        unsafe { Sse2Backend::encode_runs(&[b'x'; 20], &mut runs) };
        assert_eq!(runs, vec![Run { symbol: b'x', count: 20 }]);
    }

    #[test]
    fn test_sse2_encode_runs_matches_scalar() {
        let input = b"aaaabbbbccccddddeeeeffffgghhhhhhhhhhhhhhiijjj";
        let mut scalar_runs = Vec::new();
        let mut sse2_runs = Vec::new();
        unsafe {
            ScalarBackend::encode_runs(input, &mut scalar_runs);
            Sse2Backend::encode_runs(input, &mut sse2_runs);
        }
        assert_eq!(scalar_runs, sse2_runs);
    }
}
