//! Kernel and harness configuration
//!
//! Lane widths and saturation bounds are compile-time constants. Everything a
//! caller may reasonably tune per run (blend weight, outlier threshold, how
//! many timed iterations the harness performs) lives in [`KernelConfig`],
//! which is built once at run start and never mutated afterwards.
//!
//! # Examples
//!
//! ```
//! use lanewise::config::KernelConfig;
//! use lanewise::Backend;
//!
//! let config = KernelConfig::new()
//!     .with_blend_weight(0.5)
//!     .with_outlier_threshold(3.0)
//!     .with_iterations(10)
//!     .with_backend(Backend::Scalar)
//!     .build();
//!
//! assert!(config.validate().is_ok());
//! ```

use crate::{Backend, KernelError, Result};

/// Lanes per vector for byte kernels (128-bit register of `u8`)
pub const BYTE_LANES: usize = 16;

/// Lanes per vector for `f32` reductions (128-bit register of `f32`)
pub const FLOAT_LANES: usize = 4;

/// Window size of the vector run-boundary encoder
pub const RUN_WINDOW: usize = 16;

/// Lower saturation bound for 8-bit outputs
pub const SATURATE_MIN: i32 = 0;

/// Upper saturation bound for 8-bit outputs
pub const SATURATE_MAX: i32 = 255;

/// Weight applied to the second image when blending
pub const DEFAULT_BLEND_WEIGHT: f32 = 0.625;

/// Largest accepted blend weight magnitude.
///
/// Keeps `255 * alpha` well inside `i32`, so the truncating float-to-int
/// conversion behaves identically in every backend.
pub const MAX_BLEND_WEIGHT: f32 = 255.0;

/// Z-score magnitude above which a sample counts as an outlier
pub const DEFAULT_OUTLIER_THRESHOLD: f32 = 2.5;

/// Run-start configuration for kernels and the benchmark harness
#[derive(Debug, Clone, PartialEq)]
pub struct KernelConfig {
    /// Weight applied to the second operand of the elementwise kernels
    pub blend_weight: f32,
    /// Strict z-score threshold for outlier counting
    pub outlier_threshold: f32,
    /// Untimed runs of each phase before measuring
    pub warmup_iterations: usize,
    /// Timed runs of each phase
    pub iterations: usize,
    /// Backend used for the vector phase
    pub backend: Backend,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            blend_weight: DEFAULT_BLEND_WEIGHT,
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
            warmup_iterations: 1,
            iterations: 3,
            backend: Backend::Auto,
        }
    }
}

impl KernelConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Single timed run, no warm-up. Useful in tests.
    ///
    /// # Examples
    ///
    /// ```
    /// use lanewise::config::KernelConfig;
    ///
    /// let quick = KernelConfig::quick();
    /// assert_eq!(quick.warmup_iterations, 0);
    /// assert_eq!(quick.iterations, 1);
    /// ```
    pub fn quick() -> Self {
        Self {
            warmup_iterations: 0,
            iterations: 1,
            ..Self::default()
        }
    }

    /// More warm-up and timed runs for stable speedup numbers
    pub fn thorough() -> Self {
        Self {
            warmup_iterations: 3,
            iterations: 20,
            ..Self::default()
        }
    }

    /// Set the weight applied to the second operand
    pub fn with_blend_weight(mut self, alpha: f32) -> Self {
        self.blend_weight = alpha;
        self
    }

    /// Set the outlier threshold
    pub fn with_outlier_threshold(mut self, threshold: f32) -> Self {
        self.outlier_threshold = threshold;
        self
    }

    /// Set the number of untimed warm-up runs per phase
    pub fn with_warmup(mut self, iterations: usize) -> Self {
        self.warmup_iterations = iterations;
        self
    }

    /// Set the number of timed runs per phase (at least one)
    ///
    /// # Examples
    ///
    /// ```
    /// use lanewise::config::KernelConfig;
    ///
    /// let config = KernelConfig::new().with_iterations(0);
    /// assert_eq!(config.iterations, 1);
    /// ```
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    /// Set the backend for the vector phase
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Finalize configuration (builder pattern compatibility)
    pub fn build(self) -> Self {
        self
    }

    /// Check every tunable against the kernel domains
    pub fn validate(&self) -> Result<()> {
        validate_blend_weight(self.blend_weight)?;
        if !self.outlier_threshold.is_finite() || self.outlier_threshold < 0.0 {
            return Err(KernelError::InvalidInput(format!(
                "outlier threshold must be finite and non-negative, got {}",
                self.outlier_threshold
            )));
        }
        Ok(())
    }
}

/// Reject weights the truncating conversion cannot represent identically
pub(crate) fn validate_blend_weight(alpha: f32) -> Result<()> {
    if !alpha.is_finite() || alpha.abs() > MAX_BLEND_WEIGHT {
        return Err(KernelError::InvalidInput(format!(
            "blend weight must be finite with |alpha| <= {MAX_BLEND_WEIGHT}, got {alpha}"
        )));
    }
    Ok(())
}
