//! Error types for lanewise kernels

use thiserror::Error;

use crate::image::Channels;
use crate::Backend;

/// Result type for lanewise operations
pub type Result<T> = std::result::Result<T, KernelError>;

/// Errors that can occur while running a kernel or a benchmark
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KernelError {
    /// Backend not supported on this platform
    #[error("Backend not supported on this platform: {0:?}")]
    UnsupportedBackend(Backend),

    /// Image dimensions differ between operands
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected (width, height)
        expected: (usize, usize),
        /// Actual (width, height)
        actual: (usize, usize),
    },

    /// Channel layout differs between operands
    #[error("Layout mismatch: expected {expected:?}, got {actual:?}")]
    LayoutMismatch {
        /// Expected channel layout
        expected: Channels,
        /// Actual channel layout
        actual: Channels,
    },

    /// Buffer length does not match what the shape requires
    #[error("Size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Input outside the mathematical domain of the kernel
    /// (empty buffer for a mean, zero standard deviation for a z-score)
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    /// Invalid argument (non-finite weight, zero-sized image, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Scalar and vector outputs diverged beyond the allowed tolerance
    #[error("Tolerance violation in {kernel}: {detail}")]
    ToleranceViolation {
        /// Kernel family name
        kernel: String,
        /// First observed divergence
        detail: String,
    },
}
