//! Streaming statistics and z-score outlier counting over `f32` buffers
//!
//! Two passes: the first computes `mean = sum(x) / N`, the second
//! `std_dev = sqrt(sum((x - mean)^2) / N)` (population variance) from the
//! mean the caller passes in. Every backend accumulates in `f64` and rounds
//! to `f32` once at the end, so a constant buffer yields its value and a
//! zero deviation exactly. Vector backends keep 4 lane partial sums and fold
//! them pairwise, so their result differs from the scalar left-to-right sum
//! by rounding only; compare with [`approx_eq`].
//!
//! Outlier counting is exact across backends: each lane evaluates the same
//! IEEE operations as the scalar loop, with one strict threshold for lane
//! body and tail alike.

use tracing::trace;

use crate::backends::dispatch;
use crate::{Backend, KernelError, Result};

/// Mean and population standard deviation of one buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    /// Arithmetic mean
    pub mean: f32,
    /// Population standard deviation around `mean`
    pub std_dev: f32,
}

/// Statistics plus the outlier count derived from them
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierReport {
    /// Mean and standard deviation used for the z-scores
    pub stats: Stats,
    /// Samples with `|z| > threshold`
    pub outliers: usize,
}

fn ensure_non_empty(data: &[f32]) -> Result<()> {
    if data.is_empty() {
        return Err(KernelError::InvalidDomain(
            "mean and standard deviation of an empty buffer are undefined".to_string(),
        ));
    }
    Ok(())
}

/// Arithmetic mean (pass 1)
///
/// # Examples
///
/// ```
/// use lanewise::stats::mean;
/// use lanewise::Backend;
///
/// assert_eq!(mean(&[1.0, 2.0, 3.0, 4.0, 5.0], Backend::Auto).unwrap(), 3.0);
/// assert!(mean(&[], Backend::Auto).is_err());
/// ```
pub fn mean(data: &[f32], backend: Backend) -> Result<f32> {
    ensure_non_empty(data)?;
    let sum = dispatch!(backend, sum(data))?;
    Ok((sum / data.len() as f64) as f32)
}

/// Population standard deviation around a given `mean` (pass 2)
///
/// The mean is taken as given, never recomputed.
pub fn std_dev(data: &[f32], mean: f32, backend: Backend) -> Result<f32> {
    ensure_non_empty(data)?;
    let sum_sq = dispatch!(backend, sum_sq_dev(data, mean))?;
    Ok((sum_sq / data.len() as f64).sqrt() as f32)
}

/// Both passes
///
/// # Examples
///
/// ```
/// use lanewise::stats::mean_and_std_dev;
/// use lanewise::Backend;
///
/// let stats = mean_and_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], Backend::Auto).unwrap();
/// assert_eq!(stats.mean, 5.0);
/// assert_eq!(stats.std_dev, 2.0);
/// ```
pub fn mean_and_std_dev(data: &[f32], backend: Backend) -> Result<Stats> {
    let mean = mean(data, backend)?;
    let std_dev = std_dev(data, mean, backend)?;
    Ok(Stats { mean, std_dev })
}

/// Count samples whose z-score magnitude strictly exceeds `threshold`
///
/// A zero or non-finite `std_dev` (or non-finite `mean`) is rejected, so
/// `inf`/`NaN` z-scores never reach the count. An empty buffer has no
/// outliers.
pub fn count_outliers(
    data: &[f32],
    mean: f32,
    std_dev: f32,
    threshold: f32,
    backend: Backend,
) -> Result<usize> {
    if std_dev == 0.0 || !std_dev.is_finite() {
        return Err(KernelError::InvalidDomain(format!(
            "z-score undefined for standard deviation {std_dev}"
        )));
    }
    if !mean.is_finite() {
        return Err(KernelError::InvalidDomain(format!(
            "z-score undefined for mean {mean}"
        )));
    }
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(KernelError::InvalidInput(format!(
            "outlier threshold must be finite and non-negative, got {threshold}"
        )));
    }
    dispatch!(backend, count_outliers(data, mean, std_dev, threshold))
}

/// Mean, standard deviation and outlier count in one call
///
/// A buffer with zero spread has no outliers by definition; this returns a
/// count of 0 for it instead of the `InvalidDomain` that
/// [`count_outliers`] reports.
pub fn analyze(data: &[f32], threshold: f32, backend: Backend) -> Result<OutlierReport> {
    let stats = mean_and_std_dev(data, backend)?;
    let outliers = if stats.std_dev == 0.0 {
        0
    } else {
        count_outliers(data, stats.mean, stats.std_dev, threshold, backend)?
    };
    trace!(n = data.len(), mean = stats.mean, std_dev = stats.std_dev, outliers, "analyzed");
    Ok(OutlierReport { stats, outliers })
}

/// Relative closeness with an absolute floor of `rel_tol` near zero
///
/// # Examples
///
/// ```
/// use lanewise::stats::approx_eq;
///
/// assert!(approx_eq(1_000_000.0, 1_000_001.0, 1e-5));
/// assert!(!approx_eq(1.0, 1.1, 1e-5));
/// ```
pub fn approx_eq(a: f32, b: f32, rel_tol: f32) -> bool {
    if a.to_bits() == b.to_bits() {
        return true;
    }
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= rel_tol * scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve_backend;
    use proptest::prelude::*;

    fn backends() -> Vec<Backend> {
        let mut all = vec![Backend::Scalar, Backend::Portable];
        if resolve_backend(Backend::SSE2).is_ok() {
            all.push(Backend::SSE2);
        }
        all
    }

    #[test]
    fn test_constant_buffer() {
        for backend in backends() {
            for value in [42.5f32, 0.1, -3.3, 123_456.79] {
                for len in [1, 3, 4, 7, 64, 1000, 100_003] {
                    let stats = mean_and_std_dev(&vec![value; len], backend).unwrap();
                    assert_eq!(stats.mean, value, "backend {backend:?} value {value} len {len}");
                    assert_eq!(stats.std_dev, 0.0, "backend {backend:?} value {value} len {len}");
                }
            }
        }
    }

    #[test]
    fn test_constant_buffer_has_no_outliers_at_any_threshold() {
        for backend in backends() {
            for len in [1000, 100_003] {
                let report = analyze(&vec![0.1; len], 0.5, backend).unwrap();
                assert_eq!(report.outliers, 0, "backend {backend:?} len {len}");
            }
        }
    }

    #[test]
    fn test_empty_buffer_rejected() {
        assert!(matches!(
            mean(&[], Backend::Auto).unwrap_err(),
            KernelError::InvalidDomain(_)
        ));
        assert!(matches!(
            std_dev(&[], 0.0, Backend::Auto).unwrap_err(),
            KernelError::InvalidDomain(_)
        ));
    }

    #[test]
    fn test_std_dev_uses_given_mean() {
        // Around 0 instead of the true mean 2: sqrt((1 + 4 + 9) / 3)
        let result = std_dev(&[1.0, 2.0, 3.0], 0.0, Backend::Scalar).unwrap();
        assert!((result - (14.0f32 / 3.0).sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_edge_not_counted() {
        // |z| exactly 2.5 on both sides, in lane body and tail positions
        let data = [2.5, -2.5, 0.0, 1.0, 2.5, -2.5];
        for backend in backends() {
            assert_eq!(count_outliers(&data, 0.0, 1.0, 2.5, backend).unwrap(), 0);
        }
        let data = [2.5, -2.5, 0.0, 2.5000002, 2.5, -2.5000002];
        for backend in backends() {
            assert_eq!(count_outliers(&data, 0.0, 1.0, 2.5, backend).unwrap(), 2);
        }
    }

    #[test]
    fn test_lane_body_and_tail_agree() {
        // The same outlier counted once whether it sits in the body or the tail
        let body = [10.0, 0.0, 0.0, 0.0, 0.0];
        let tail = [0.0, 0.0, 0.0, 0.0, 10.0];
        for backend in backends() {
            let a = count_outliers(&body, 0.0, 1.0, 2.5, backend).unwrap();
            let b = count_outliers(&tail, 0.0, 1.0, 2.5, backend).unwrap();
            assert_eq!(a, 1, "backend {backend:?}");
            assert_eq!(a, b, "backend {backend:?}");
        }
    }

    #[test]
    fn test_zero_std_dev_rejected() {
        let err = count_outliers(&[1.0, 2.0], 1.5, 0.0, 2.5, Backend::Auto).unwrap_err();
        assert!(matches!(err, KernelError::InvalidDomain(_)));
        assert!(count_outliers(&[1.0], 1.0, f32::NAN, 2.5, Backend::Auto).is_err());
        assert!(count_outliers(&[1.0], f32::INFINITY, 1.0, 2.5, Backend::Auto).is_err());
    }

    #[test]
    fn test_count_outliers_empty() {
        assert_eq!(count_outliers(&[], 0.0, 1.0, 2.5, Backend::Auto).unwrap(), 0);
    }

    #[test]
    fn test_analyze_constant_buffer_has_no_outliers() {
        let report = analyze(&[3.0; 10], 2.5, Backend::Auto).unwrap();
        assert_eq!(report.stats.std_dev, 0.0);
        assert_eq!(report.outliers, 0);
    }

    #[test]
    fn test_analyze_finds_spike() {
        let mut data = vec![0.0f32; 99];
        data.push(1000.0);
        let report = analyze(&data, 2.5, Backend::Auto).unwrap();
        assert_eq!(report.outliers, 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_vector_stats_close_to_scalar(
            data in prop::collection::vec(-1000.0f32..1000.0, 1..2048)
        ) {
            let reference = mean_and_std_dev(&data, Backend::Scalar).unwrap();
            for backend in backends() {
                let stats = mean_and_std_dev(&data, backend).unwrap();
                prop_assert!(approx_eq(stats.mean, reference.mean, 1e-3));
                prop_assert!(approx_eq(stats.std_dev, reference.std_dev, 1e-3));
                prop_assert!(stats.std_dev >= 0.0);
            }
        }

        #[test]
        fn test_vector_outliers_match_scalar(
            data in prop::collection::vec(-1000.0f32..1000.0, 0..2048),
            mean in -10.0f32..10.0,
            std_dev in 1.0f32..500.0
        ) {
            let reference = count_outliers(&data, mean, std_dev, 2.5, Backend::Scalar).unwrap();
            for backend in backends() {
                prop_assert_eq!(
                    count_outliers(&data, mean, std_dev, 2.5, backend).unwrap(),
                    reference
                );
            }
        }
    }
}
