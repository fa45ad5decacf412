//! Backend implementations for the kernel families
//!
//! Every backend implements the same [`KernelBackend`] interface so the scalar
//! reference and each vector implementation can be swapped behind one call.
//!
//! # Safety
//!
//! All `unsafe` code is isolated within backend implementations. The public API
//! remains 100% safe.
//!
//! # Backends
//!
//! - `scalar`: Portable reference implementation, one element per step
//! - `sse2`: x86_64 baseline SIMD (16 x u8, 4 x f32)
//! - `portable`: Fixed-size array lanes with the same widths, for targets without SSE2
//!
//! # Tail policy
//!
//! A vector kernel processes the first `len - len % W` elements in lanes and
//! hands `[len - len % W, len)` to the scalar path unchanged.

use crate::config::{RUN_WINDOW, SATURATE_MAX, SATURATE_MIN};
use crate::rle::Run;

pub mod portable;
pub mod scalar;

#[cfg(target_arch = "x86_64")]
pub mod sse2;

/// Backend trait defining the kernel primitives
///
/// # Safety
///
/// Implementations may use unsafe SIMD intrinsics. Callers must ensure:
/// - Input slices `a` and `b` have the same length
/// - `out` has length >= `a.len()`
/// - The CPU supports the instruction set of the implementation
pub trait KernelBackend {
    /// Saturating weighted blend: `clamp(a[i] + trunc(b[i] * alpha), 0, 255)`
    ///
    /// # Safety
    ///
    /// - `a` and `b` must have the same length
    /// - `out` must have length >= `a.len()`
    unsafe fn blend(a: &[u8], b: &[u8], alpha: f32, out: &mut [u8]);

    /// Saturating weighted absolute difference: `clamp(|a[i] - trunc(b[i] * alpha)|, 0, 255)`
    ///
    /// # Safety
    ///
    /// - `a` and `b` must have the same length
    /// - `out` must have length >= `a.len()`
    unsafe fn abs_diff(a: &[u8], b: &[u8], alpha: f32, out: &mut [u8]);

    /// Sum reduction: `sum(a[i])`, accumulated in `f64`
    ///
    /// # Safety
    ///
    /// Only requires CPU support for the backend's instruction set.
    unsafe fn sum(a: &[f32]) -> f64;

    /// Sum of squared deviations: `sum((a[i] - mean)^2)`, accumulated in `f64`
    ///
    /// # Safety
    ///
    /// Only requires CPU support for the backend's instruction set.
    unsafe fn sum_sq_dev(a: &[f32], mean: f32) -> f64;

    /// Count of elements with `|(a[i] - mean) / std_dev| > threshold`
    ///
    /// # Safety
    ///
    /// Only requires CPU support for the backend's instruction set.
    /// `std_dev` is not checked here; the public API rejects zero.
    unsafe fn count_outliers(a: &[f32], mean: f32, std_dev: f32, threshold: f32) -> usize;

    /// Append the maximal runs of `input` to `runs`
    ///
    /// # Safety
    ///
    /// Only requires CPU support for the backend's instruction set.
    unsafe fn encode_runs(input: &[u8], runs: &mut Vec<Run>);
}

/// Number of leading elements a `lanes`-wide kernel processes in vector form
#[inline]
pub const fn lane_prefix(len: usize, lanes: usize) -> usize {
    len - len % lanes
}

/// `trunc(p * alpha)`, the weighted operand shared by both byte kernels
#[inline]
pub(crate) fn weighted(p: u8, alpha: f32) -> i32 {
    (f32::from(p) * alpha) as i32
}

#[inline]
pub(crate) fn saturate_u8(v: i32) -> u8 {
    v.clamp(SATURATE_MIN, SATURATE_MAX) as u8
}

#[inline]
pub(crate) fn blend_element(p1: u8, p2: u8, alpha: f32) -> u8 {
    saturate_u8(i32::from(p1) + weighted(p2, alpha))
}

#[inline]
pub(crate) fn abs_diff_element(p1: u8, p2: u8, alpha: f32) -> u8 {
    saturate_u8((i32::from(p1) - weighted(p2, alpha)).abs())
}

/// `(x - mean)^2` in `f64`
#[inline]
pub(crate) fn sq_dev(x: f32, mean: f32) -> f64 {
    let d = f64::from(x) - f64::from(mean);
    d * d
}

#[inline]
pub(crate) fn is_outlier(x: f32, mean: f32, std_dev: f32, threshold: f32) -> bool {
    ((x - mean) / std_dev).abs() > threshold
}

/// Fold 4 lane partial sums pairwise: `(l0 + l2) + (l1 + l3)`
#[inline]
pub(crate) fn fold_lanes(lanes: [f64; 4]) -> f64 {
    (lanes[0] + lanes[2]) + (lanes[1] + lanes[3])
}

/// Run state carried across encoder windows
///
/// Vector encoders feed whole windows with a precomputed same-as-next mask;
/// tails and scalar callers feed single bytes. A run that straddles a window
/// edge keeps growing instead of being split.
pub(crate) struct RunWalker<'a> {
    symbol: u8,
    count: usize,
    runs: &'a mut Vec<Run>,
}

impl<'a> RunWalker<'a> {
    pub(crate) fn new(runs: &'a mut Vec<Run>) -> Self {
        Self {
            symbol: 0,
            count: 0,
            runs,
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, byte: u8) {
        if self.count > 0 && byte == self.symbol {
            self.count += 1;
        } else {
            self.emit();
            self.symbol = byte;
            self.count = 1;
        }
    }

    /// Consume one full window.
    ///
    /// Bit `j` of `same_as_next` is set when `window[j] == window[j + 1]`;
    /// bit 15 is ignored. The mask is computed once by the caller and only
    /// consulted here.
    #[inline]
    pub(crate) fn push_window(&mut self, window: &[u8], same_as_next: u16) {
        debug_assert_eq!(window.len(), RUN_WINDOW);
        self.push(window[0]);

        let mut pos = 0;
        let mut breaks = u32::from(!same_as_next) & 0x7FFF;
        while breaks != 0 {
            let j = breaks.trailing_zeros() as usize;
            self.count += j - pos;
            self.emit();
            self.symbol = window[j + 1];
            self.count = 1;
            pos = j + 1;
            breaks &= breaks - 1;
        }
        self.count += RUN_WINDOW - 1 - pos;
    }

    fn emit(&mut self) {
        if self.count > 0 {
            self.runs.push(Run {
                symbol: self.symbol,
                count: self.count,
            });
            self.count = 0;
        }
    }

    pub(crate) fn finish(mut self) {
        self.emit();
    }
}

/// Route a kernel primitive to the resolved backend.
///
/// Expands to a `Result`, `Err` when the requested backend is unavailable.
macro_rules! dispatch {
    ($backend:expr, $method:ident($($arg:expr),* $(,)?)) => {{
        use $crate::backends::KernelBackend as _;
        match $crate::resolve_backend($backend) {
            Ok($crate::Backend::Scalar) => {
                // SAFETY: scalar backend performs only bounds-checked slice access
                Ok(unsafe { $crate::backends::scalar::ScalarBackend::$method($($arg),*) })
            }
            #[cfg(target_arch = "x86_64")]
            Ok($crate::Backend::SSE2) => {
                // SAFETY: resolve_backend verified SSE2 support at runtime,
                // callers validated slice lengths
                Ok(unsafe { $crate::backends::sse2::Sse2Backend::$method($($arg),*) })
            }
            Ok(_) => {
                // SAFETY: portable backend uses only safe array arithmetic
                Ok(unsafe { $crate::backends::portable::PortableBackend::$method($($arg),*) })
            }
            Err(e) => Err(e),
        }
    }};
}

pub(crate) use dispatch;
