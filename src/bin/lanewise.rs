//! lanewise: scalar vs SIMD-lane kernel benchmark
//!
//! Generates seeded inputs for each kernel family, runs the scalar reference
//! and the vector path back to back, and prints timings, speedup and whether
//! the outputs agree.
//!
//! Run: `lanewise --kernel blend --kernel rle --iterations 10`

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use lanewise::config::KernelConfig;
use lanewise::fractal::JuliaParams;
use lanewise::harness::{
    Benchmark, ElementwiseKernel, Harness, JuliaKernel, RunEncodeKernel, SuiteEntry,
};
use lanewise::{Backend, ByteImage, Channels};

#[derive(Parser, Debug)]
#[command(name = "lanewise")]
#[command(author = "PAIML Team")]
#[command(version)]
#[command(about = "Scalar reference vs SIMD-lane kernel benchmark", long_about = None)]
struct Cli {
    /// Kernels to run (repeatable); all when omitted
    #[arg(short, long, value_enum)]
    kernel: Vec<KernelArg>,

    /// Backend for the vector phase
    #[arg(short, long, value_enum, default_value = "auto")]
    backend: BackendArg,

    /// Seed for input generation
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Timed runs per phase
    #[arg(short, long, default_value = "3")]
    iterations: usize,

    /// Untimed runs per phase before timing
    #[arg(long, default_value = "1")]
    warmup: usize,

    /// Image width for the elementwise kernels
    #[arg(long, default_value = "1280")]
    width: usize,

    /// Image height for the elementwise kernels
    #[arg(long, default_value = "720")]
    height: usize,

    /// Weight applied to the second image in the blend
    #[arg(long, default_value = "0.625")]
    alpha: f32,

    /// Number of samples for the statistics kernel
    #[arg(long, default_value = "1048576")]
    samples: usize,

    /// Z-score threshold for outlier counting
    #[arg(long, default_value = "2.5")]
    threshold: f32,

    /// Text for the run encoder; random runs when omitted
    #[arg(long)]
    text: Option<String>,

    /// Length of generated run-encoder input
    #[arg(long, default_value = "1048576")]
    text_len: usize,

    /// Julia set resolution (square)
    #[arg(long, default_value = "800")]
    julia_size: usize,

    /// Exit with an error if any kernel's outputs diverge
    #[arg(long)]
    strict: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum KernelArg {
    Blend,
    AbsDiff,
    Stats,
    Rle,
    Julia,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BackendArg {
    Auto,
    Scalar,
    Sse2,
    Portable,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => Backend::Auto,
            BackendArg::Scalar => Backend::Scalar,
            BackendArg::Sse2 => Backend::SSE2,
            BackendArg::Portable => Backend::Portable,
        }
    }
}

fn random_image(rng: &mut StdRng, width: usize, height: usize, channels: Channels) -> Result<ByteImage> {
    let mut data = vec![0u8; width * height * channels.count()];
    rng.fill(data.as_mut_slice());
    ByteImage::from_vec(width, height, channels, data).context("generating image")
}

/// Uniform samples in [-1e6, 1e6]
fn random_samples(rng: &mut StdRng, n: usize) -> Vec<f32> {
    (0..n).map(|_| rng.gen_range(-1_000_000.0f32..=1_000_000.0)).collect()
}

/// Runs of random length over a small alphabet
fn random_runs(rng: &mut StdRng, len: usize) -> Vec<u8> {
    let mut text = Vec::with_capacity(len);
    while text.len() < len {
        let symbol = rng.gen_range(b'a'..=b'h');
        let run = rng.gen_range(1..=24).min(len - text.len());
        text.extend(std::iter::repeat(symbol).take(run));
    }
    text
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = KernelConfig::new()
        .with_backend(cli.backend.into())
        .with_iterations(cli.iterations)
        .with_warmup(cli.warmup)
        .with_blend_weight(cli.alpha)
        .with_outlier_threshold(cli.threshold)
        .build();
    let harness = Harness::new(config).context("invalid configuration")?;

    let selected = if cli.kernel.is_empty() {
        vec![
            KernelArg::Blend,
            KernelArg::AbsDiff,
            KernelArg::Stats,
            KernelArg::Rle,
            KernelArg::Julia,
        ]
    } else {
        cli.kernel.clone()
    };

    let mut rng = StdRng::seed_from_u64(cli.seed);
    let mut kernels: Vec<Box<dyn Benchmark>> = Vec::with_capacity(selected.len());
    for kind in selected {
        let kernel: Box<dyn Benchmark> = match kind {
            KernelArg::Blend => Box::new(harness.blend_kernel(
                random_image(&mut rng, cli.width, cli.height, Channels::Rgb)?,
                random_image(&mut rng, cli.width, cli.height, Channels::Rgb)?,
            )),
            KernelArg::AbsDiff => Box::new(ElementwiseKernel::abs_diff(
                random_image(&mut rng, cli.width, cli.height, Channels::Gray)?,
                random_image(&mut rng, cli.width, cli.height, Channels::Gray)?,
            )),
            KernelArg::Stats => {
                Box::new(harness.stats_kernel(random_samples(&mut rng, cli.samples)))
            }
            KernelArg::Rle => {
                let input = match &cli.text {
                    Some(text) => text.as_bytes().to_vec(),
                    None => random_runs(&mut rng, cli.text_len),
                };
                Box::new(RunEncodeKernel::new(input))
            }
            KernelArg::Julia => Box::new(JuliaKernel::new(JuliaParams::with_size(
                cli.julia_size,
                cli.julia_size,
            ))),
        };
        kernels.push(kernel);
    }

    info!(kernels = kernels.len(), seed = cli.seed, "running suite");
    let refs: Vec<&dyn Benchmark> = kernels.iter().map(|k| &**k).collect();
    let entries = harness.run_suite(&refs);

    println!("lanewise: scalar reference vs vector lanes");
    println!("{}", "=".repeat(96));
    let mut diverged = Vec::new();
    for entry in &entries {
        match entry {
            SuiteEntry::Completed(result) => {
                println!("{result}");
                if let Err(err) = result.ensure_equivalent() {
                    println!("    {err}");
                    diverged.push(result.name.clone());
                }
            }
            SuiteEntry::Skipped { name, reason } => {
                println!("{name:<12} skipped: {reason}");
            }
        }
    }
    println!("{}", "=".repeat(96));

    if let Some(text) = &cli.text {
        let encoding = lanewise::rle::encode(text.as_bytes())?;
        println!(
            "rle \"{text}\" -> {encoding} (ratio {:.2})",
            encoding.compression_ratio()
        );
    }

    if cli.strict && !diverged.is_empty() {
        bail!("outputs diverged for: {}", diverged.join(", "));
    }
    Ok(())
}
