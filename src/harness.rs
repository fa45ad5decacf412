//! Scalar vs vector benchmark harness
//!
//! A [`Kernel`] bundles one input with a scalar reference run, a vector run
//! and an equivalence rule. [`Harness::run`] warms both paths up, times the
//! scalar phase to completion, then times the vector phase, and compares the
//! outputs. Phases never overlap, so one timer cannot see the other's work.
//!
//! # Example
//!
//! ```
//! use lanewise::config::KernelConfig;
//! use lanewise::harness::{Harness, RunEncodeKernel};
//!
//! let harness = Harness::new(KernelConfig::quick()).unwrap();
//! let result = harness.run(&RunEncodeKernel::new(b"aaabccccd".to_vec())).unwrap();
//! assert!(result.outputs_equal);
//! assert!(result.speedup_ratio > 0.0 && result.speedup_ratio.is_finite());
//! ```

use std::fmt;
use std::hint::black_box;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::config::{KernelConfig, DEFAULT_OUTLIER_THRESHOLD};
use crate::elementwise::{transform, ChannelWeights, Transform};
use crate::fractal::{render_parallel, render_serial, JuliaParams};
use crate::rle::{encode_with_backend, RunEncoding};
use crate::stats::{analyze, approx_eq, count_outliers, OutlierReport, Stats};
use crate::{resolve_backend, Backend, ByteImage, KernelError, Result};

/// Relative tolerance for float reductions
///
/// The mean is compared against the spread of the data rather than its own
/// magnitude, since a mean near zero carries the rounding error of sums
/// many times larger.
pub const STATS_TOLERANCE: f32 = 1e-3;

/// Wall-clock time of one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTiming {
    /// Total time across all iterations
    pub elapsed: Duration,
    /// Timed iterations
    pub iterations: usize,
}

impl PhaseTiming {
    /// Mean time of one iteration
    pub fn per_iteration(&self) -> Duration {
        let n = u32::try_from(self.iterations.max(1)).unwrap_or(u32::MAX);
        self.elapsed / n
    }

    /// Mean time of one iteration in microseconds
    pub fn micros(&self) -> f64 {
        self.per_iteration().as_secs_f64() * 1e6
    }

    fn nanos_floored(&self) -> f64 {
        (self.per_iteration().as_nanos() as f64).max(1.0)
    }
}

/// Outcome of one scalar vs vector comparison
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    /// Kernel name
    pub name: String,
    /// Backend used for the vector phase
    pub backend: Backend,
    /// Scalar phase
    pub scalar: PhaseTiming,
    /// Vector phase
    pub vector: PhaseTiming,
    /// `scalar / vector` per-iteration time, always finite and positive
    pub speedup_ratio: f64,
    /// Whether the outputs satisfied the kernel's equivalence rule
    pub outputs_equal: bool,
    /// First divergence found, when `outputs_equal` is false
    pub divergence: Option<String>,
}

impl BenchmarkResult {
    /// Mean scalar iteration in microseconds
    pub fn scalar_micros(&self) -> f64 {
        self.scalar.micros()
    }

    /// Mean vector iteration in microseconds
    pub fn vector_micros(&self) -> f64 {
        self.vector.micros()
    }

    /// Turn a failed comparison into [`KernelError::ToleranceViolation`]
    pub fn ensure_equivalent(&self) -> Result<()> {
        if self.outputs_equal {
            return Ok(());
        }
        Err(KernelError::ToleranceViolation {
            kernel: self.name.clone(),
            detail: self
                .divergence
                .clone()
                .unwrap_or_else(|| "outputs differ".to_string()),
        })
    }
}

impl fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<12} scalar {:>10.1} us  vector {:>10.1} us  speedup {:>6.2}x  [{:?}] {}",
            self.name,
            self.scalar_micros(),
            self.vector_micros(),
            self.speedup_ratio,
            self.backend,
            if self.outputs_equal { "equal" } else { "DIVERGED" }
        )
    }
}

/// Speedup of the vector phase over the scalar phase
///
/// Both per-iteration times are floored at 1 ns, so the ratio is finite and
/// positive even when a phase is too fast for the clock.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use lanewise::harness::{speedup_ratio, PhaseTiming};
///
/// let scalar = PhaseTiming { elapsed: Duration::from_micros(400), iterations: 4 };
/// let vector = PhaseTiming { elapsed: Duration::from_micros(100), iterations: 4 };
/// assert_eq!(speedup_ratio(&scalar, &vector), 4.0);
/// ```
pub fn speedup_ratio(scalar: &PhaseTiming, vector: &PhaseTiming) -> f64 {
    scalar.nanos_floored() / vector.nanos_floored()
}

/// One input plus its scalar and vector implementations
pub trait Kernel {
    /// What one run produces
    type Output;

    /// Name used in reports
    fn name(&self) -> String;

    /// Precondition check, run once before any timing
    fn check(&self) -> Result<()>;

    /// Scalar reference run
    fn run_scalar(&self) -> Result<Self::Output>;

    /// Vector run on `backend`
    fn run_vector(&self, backend: Backend) -> Result<Self::Output>;

    /// `None` when the outputs agree, otherwise the first divergence
    fn divergence(&self, scalar: &Self::Output, vector: &Self::Output) -> Option<String>;
}

/// Type-erased kernel for mixed suites
pub trait Benchmark {
    /// Name used in reports
    fn kernel_name(&self) -> String;

    /// Run through `harness`
    fn bench(&self, harness: &Harness) -> Result<BenchmarkResult>;
}

impl<K: Kernel> Benchmark for K {
    fn kernel_name(&self) -> String {
        Kernel::name(self)
    }

    fn bench(&self, harness: &Harness) -> Result<BenchmarkResult> {
        harness.run(self)
    }
}

/// One line of a suite report
#[derive(Debug, Clone, PartialEq)]
pub enum SuiteEntry {
    /// The kernel ran
    Completed(BenchmarkResult),
    /// The kernel's precondition failed
    Skipped {
        /// Kernel name
        name: String,
        /// Why it did not run
        reason: KernelError,
    },
}

impl SuiteEntry {
    /// The result, when the kernel ran
    pub fn result(&self) -> Option<&BenchmarkResult> {
        match self {
            SuiteEntry::Completed(result) => Some(result),
            SuiteEntry::Skipped { .. } => None,
        }
    }
}

/// Sequential benchmark runner
#[derive(Debug, Clone, Default)]
pub struct Harness {
    config: KernelConfig,
}

impl Harness {
    /// Harness with a validated configuration
    pub fn new(config: KernelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Active configuration
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Blend kernel weighted by the configured `blend_weight`
    pub fn blend_kernel(&self, src1: ByteImage, src2: ByteImage) -> ElementwiseKernel {
        ElementwiseKernel::blend(src1, src2, self.config.blend_weight)
    }

    /// Statistics kernel counting against the configured `outlier_threshold`
    pub fn stats_kernel(&self, data: Vec<f32>) -> StatsKernel {
        StatsKernel::new(data).with_threshold(self.config.outlier_threshold)
    }

    /// Warm up, time the scalar phase, then time the vector phase
    #[instrument(skip_all, fields(kernel = %kernel.name()))]
    pub fn run<K: Kernel>(&self, kernel: &K) -> Result<BenchmarkResult> {
        kernel.check()?;
        let backend = resolve_backend(self.config.backend)?;

        for _ in 0..self.config.warmup_iterations {
            black_box(kernel.run_scalar()?);
            black_box(kernel.run_vector(backend)?);
        }

        let (scalar_out, scalar) = time_phase(self.config.iterations, || kernel.run_scalar())?;
        debug!(micros = scalar.micros(), "scalar phase done");
        let (vector_out, vector) =
            time_phase(self.config.iterations, || kernel.run_vector(backend))?;
        debug!(micros = vector.micros(), ?backend, "vector phase done");

        let divergence = kernel.divergence(&scalar_out, &vector_out);
        if let Some(detail) = &divergence {
            warn!(%detail, "scalar and vector outputs diverge");
        }
        let result = BenchmarkResult {
            name: kernel.name(),
            backend,
            speedup_ratio: speedup_ratio(&scalar, &vector),
            scalar,
            vector,
            outputs_equal: divergence.is_none(),
            divergence,
        };
        info!(
            speedup = result.speedup_ratio,
            equal = result.outputs_equal,
            "benchmark complete"
        );
        Ok(result)
    }

    /// Run every kernel in order, skipping those whose precondition fails
    #[instrument(skip_all, fields(kernels = kernels.len()))]
    pub fn run_suite(&self, kernels: &[&dyn Benchmark]) -> Vec<SuiteEntry> {
        kernels
            .iter()
            .map(|kernel| match kernel.bench(self) {
                Ok(result) => SuiteEntry::Completed(result),
                Err(reason) => {
                    warn!(kernel = %kernel.kernel_name(), %reason, "skipping benchmark");
                    SuiteEntry::Skipped {
                        name: kernel.kernel_name(),
                        reason,
                    }
                }
            })
            .collect()
    }
}

fn time_phase<T>(
    iterations: usize,
    mut run: impl FnMut() -> Result<T>,
) -> Result<(T, PhaseTiming)> {
    let iterations = iterations.max(1);
    let start = Instant::now();
    let mut output = black_box(run()?);
    for _ in 1..iterations {
        output = black_box(run()?);
    }
    let timing = PhaseTiming {
        elapsed: start.elapsed(),
        iterations,
    };
    Ok((output, timing))
}

/// Position and values of the first differing byte
fn byte_divergence(scalar: &[u8], vector: &[u8]) -> Option<String> {
    if scalar.len() != vector.len() {
        return Some(format!(
            "length {} vs {}",
            scalar.len(),
            vector.len()
        ));
    }
    scalar
        .iter()
        .zip(vector)
        .position(|(s, v)| s != v)
        .map(|i| format!("byte {i}: scalar {} vector {}", scalar[i], vector[i]))
}

/// Blend or absolute difference of two images
#[derive(Debug, Clone)]
pub struct ElementwiseKernel {
    op: Transform,
    src1: ByteImage,
    src2: ByteImage,
    weights: ChannelWeights,
}

impl ElementwiseKernel {
    /// Weighted blend `src1 + alpha * src2`
    pub fn blend(src1: ByteImage, src2: ByteImage, weights: impl Into<ChannelWeights>) -> Self {
        Self {
            op: Transform::Blend,
            src1,
            src2,
            weights: weights.into(),
        }
    }

    /// Plain absolute difference `|src1 - src2|`
    pub fn abs_diff(src1: ByteImage, src2: ByteImage) -> Self {
        Self {
            op: Transform::AbsDiff,
            src1,
            src2,
            weights: ChannelWeights::Uniform(1.0),
        }
    }

    fn apply(&self, backend: Backend) -> Result<ByteImage> {
        transform(self.op, &self.src1, &self.src2, self.weights.clone(), backend)
    }
}

impl Kernel for ElementwiseKernel {
    type Output = ByteImage;

    fn name(&self) -> String {
        match self.op {
            Transform::Blend => "blend".to_string(),
            Transform::AbsDiff => "abs_diff".to_string(),
        }
    }

    fn check(&self) -> Result<()> {
        self.src1.check_compatible(&self.src2)
    }

    fn run_scalar(&self) -> Result<ByteImage> {
        self.apply(Backend::Scalar)
    }

    fn run_vector(&self, backend: Backend) -> Result<ByteImage> {
        self.apply(backend)
    }

    fn divergence(&self, scalar: &ByteImage, vector: &ByteImage) -> Option<String> {
        byte_divergence(scalar.as_slice(), vector.as_slice())
    }
}

/// Mean, standard deviation and outlier count of one buffer
#[derive(Debug, Clone)]
pub struct StatsKernel {
    data: Vec<f32>,
    threshold: f32,
}

impl StatsKernel {
    /// Kernel with [`DEFAULT_OUTLIER_THRESHOLD`]; see [`Harness::stats_kernel`]
    /// for one that follows the harness configuration
    pub fn new(data: Vec<f32>) -> Self {
        Self {
            data,
            threshold: DEFAULT_OUTLIER_THRESHOLD,
        }
    }

    /// Override the outlier threshold
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Scalar outlier count at `stats`, zero for a buffer with no spread
    fn outliers_at(&self, stats: Stats) -> Result<usize> {
        if stats.std_dev == 0.0 {
            return Ok(0);
        }
        count_outliers(
            &self.data,
            stats.mean,
            stats.std_dev,
            self.threshold,
            Backend::Scalar,
        )
    }
}

impl Kernel for StatsKernel {
    type Output = OutlierReport;

    fn name(&self) -> String {
        "stats".to_string()
    }

    fn check(&self) -> Result<()> {
        if self.data.is_empty() {
            return Err(KernelError::InvalidDomain(
                "statistics of an empty buffer are undefined".to_string(),
            ));
        }
        Ok(())
    }

    fn run_scalar(&self) -> Result<OutlierReport> {
        analyze(&self.data, self.threshold, Backend::Scalar)
    }

    fn run_vector(&self, backend: Backend) -> Result<OutlierReport> {
        analyze(&self.data, self.threshold, backend)
    }

    fn divergence(&self, scalar: &OutlierReport, vector: &OutlierReport) -> Option<String> {
        let (s, v) = (scalar.stats, vector.stats);
        let spread = s.std_dev.max(s.mean.abs()).max(1.0);
        if (s.mean - v.mean).abs() > STATS_TOLERANCE * spread {
            return Some(format!("mean: scalar {} vector {}", s.mean, v.mean));
        }
        if !approx_eq(s.std_dev, v.std_dev, STATS_TOLERANCE) {
            return Some(format!("std_dev: scalar {} vector {}", s.std_dev, v.std_dev));
        }
        // Samples within rounding of the threshold may flip between the two
        // phases' statistics, so the vector count is checked exactly against
        // the scalar count at the vector's own mean and std_dev.
        match self.outliers_at(v) {
            Ok(expected) if expected == vector.outliers => None,
            Ok(expected) => Some(format!(
                "outliers: vector {} expected {expected} (scalar phase counted {})",
                vector.outliers, scalar.outliers
            )),
            Err(err) => Some(format!("outliers: {err}")),
        }
    }
}

/// Run-length encoding of one byte string
#[derive(Debug, Clone)]
pub struct RunEncodeKernel {
    input: Vec<u8>,
}

impl RunEncodeKernel {
    /// Kernel over `input`
    pub fn new(input: Vec<u8>) -> Self {
        Self { input }
    }
}

impl Kernel for RunEncodeKernel {
    type Output = RunEncoding;

    fn name(&self) -> String {
        "rle".to_string()
    }

    fn check(&self) -> Result<()> {
        Ok(())
    }

    fn run_scalar(&self) -> Result<RunEncoding> {
        encode_with_backend(&self.input, Backend::Scalar)
    }

    fn run_vector(&self, backend: Backend) -> Result<RunEncoding> {
        encode_with_backend(&self.input, backend)
    }

    fn divergence(&self, scalar: &RunEncoding, vector: &RunEncoding) -> Option<String> {
        if scalar.expand() != vector.expand() {
            return Some("expansions differ".to_string());
        }
        scalar
            .runs()
            .iter()
            .zip(vector.runs())
            .position(|(s, v)| s != v)
            .map(|i| format!("run {i}: scalar {:?} vector {:?}", scalar.runs()[i], vector.runs()[i]))
            .or_else(|| {
                (scalar.len() != vector.len())
                    .then(|| format!("run count {} vs {}", scalar.len(), vector.len()))
            })
    }
}

/// Julia set render, serial loop vs one parallel task per row
///
/// The "vector" phase here is the parallel-for; the backend is not used.
#[derive(Debug, Clone)]
pub struct JuliaKernel {
    params: JuliaParams,
}

impl JuliaKernel {
    /// Kernel over `params`
    pub fn new(params: JuliaParams) -> Self {
        Self { params }
    }
}

impl Kernel for JuliaKernel {
    type Output = ByteImage;

    fn name(&self) -> String {
        "julia".to_string()
    }

    fn check(&self) -> Result<()> {
        if self.params.width < 2 || self.params.height < 2 {
            return Err(KernelError::InvalidInput(format!(
                "julia image must be at least 2x2, got {}x{}",
                self.params.width, self.params.height
            )));
        }
        Ok(())
    }

    fn run_scalar(&self) -> Result<ByteImage> {
        render_serial(&self.params)
    }

    fn run_vector(&self, _backend: Backend) -> Result<ByteImage> {
        render_parallel(&self.params)
    }

    fn divergence(&self, scalar: &ByteImage, vector: &ByteImage) -> Option<String> {
        byte_divergence(scalar.as_slice(), vector.as_slice())
    }
}
