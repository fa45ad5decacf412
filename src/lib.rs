//! Lanewise: scalar-reference vs SIMD-lane kernels
//!
//! Every kernel family in this crate is implemented twice: a scalar reference
//! that walks one element at a time, and a vector implementation that
//! processes fixed-width lanes and hands the tail to the scalar path. A
//! benchmark harness runs both on the same input, checks that they agree, and
//! reports the speedup.
//!
//! # Kernel families
//!
//! - [`elementwise`]: saturating weighted blend and absolute difference over bytes
//! - [`stats`]: two-pass mean / standard deviation and z-score outlier counting
//! - [`rle`]: run-boundary detection for run-length encoding
//! - [`fractal`]: point-wise Julia set generator, serial vs parallel-for
//!
//! # Design Principles
//!
//! - **Scalar is the oracle**: byte kernels and the run encoder are bit-exact
//!   with it; float reductions agree within a relative tolerance
//! - **Runtime dispatch**: auto-select SSE2 when the CPU supports it
//! - **Zero unsafe in public API**: `unsafe` isolated in backends
//!
//! # Quick Start
//!
//! ```rust
//! use lanewise::elementwise::blend;
//! use lanewise::image::{ByteImage, Channels};
//!
//! let a = ByteImage::from_vec(2, 1, Channels::Gray, vec![254, 100]).unwrap();
//! let b = ByteImage::from_vec(2, 1, Channels::Gray, vec![2, 100]).unwrap();
//!
//! let merged = blend(&a, &b, 1.0).unwrap();
//! assert_eq!(merged.as_slice(), &[255, 200]);
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod backends;
pub mod config;
pub mod elementwise;
pub mod error;
pub mod fractal;
pub mod harness;
pub mod image;
pub mod rle;
pub mod stats;

pub use error::{KernelError, Result};
pub use harness::{BenchmarkResult, Harness, PhaseTiming};
pub use image::{ByteImage, Channels};
pub use rle::{Run, RunEncoding};
pub use stats::Stats;

/// Backend execution target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Scalar reference (no SIMD)
    Scalar,
    /// SSE2 (x86_64 baseline, 128-bit)
    SSE2,
    /// Fixed-array lanes with SSE2 widths, any target
    Portable,
    /// Auto-select best available
    Auto,
}

impl Backend {
    /// Select the best available backend for the current platform
    ///
    /// This is a convenience wrapper around `select_best_available_backend()`
    pub fn select_best() -> Self {
        select_best_available_backend()
    }

    /// Lanes per vector for byte kernels (1 for the scalar reference)
    pub fn byte_lanes(self) -> usize {
        match self {
            Backend::Scalar => 1,
            _ => config::BYTE_LANES,
        }
    }

    /// Lanes per vector for `f32` kernels (1 for the scalar reference)
    pub fn float_lanes(self) -> usize {
        match self {
            Backend::Scalar => 1,
            _ => config::FLOAT_LANES,
        }
    }
}

/// Detect best SIMD backend for x86_64 platforms
#[cfg(target_arch = "x86_64")]
fn detect_x86_backend() -> Backend {
    if is_x86_feature_detected!("sse2") {
        return Backend::SSE2;
    }
    Backend::Portable
}

/// Select the best available backend for the current platform
///
/// **x86_64**: SSE2 if detected (always, in practice), else Portable
///
/// **Other platforms**: Portable
///
/// # Examples
///
/// ```
/// use lanewise::{select_best_available_backend, Backend};
///
/// let backend = select_best_available_backend();
/// assert_ne!(backend, Backend::Auto);
/// ```
pub fn select_best_available_backend() -> Backend {
    #[cfg(target_arch = "x86_64")]
    {
        detect_x86_backend()
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        Backend::Portable
    }
}

/// Resolve `Auto` and verify the requested backend can run here
///
/// # Examples
///
/// ```
/// use lanewise::{resolve_backend, Backend};
///
/// assert_eq!(resolve_backend(Backend::Scalar).unwrap(), Backend::Scalar);
/// assert_ne!(resolve_backend(Backend::Auto).unwrap(), Backend::Auto);
/// ```
pub fn resolve_backend(backend: Backend) -> Result<Backend> {
    match backend {
        Backend::Auto => Ok(select_best_available_backend()),
        Backend::Scalar | Backend::Portable => Ok(backend),
        Backend::SSE2 => {
            #[cfg(target_arch = "x86_64")]
            {
                if is_x86_feature_detected!("sse2") {
                    return Ok(Backend::SSE2);
                }
            }
            Err(KernelError::UnsupportedBackend(Backend::SSE2))
        }
    }
}
