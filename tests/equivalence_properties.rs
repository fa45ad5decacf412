//! Property tests: vector kernels against the scalar reference
//!
//! Byte kernels and the run encoder must be bit-exact for every length in
//! 0..4096, including lengths that leave a partial lane. Float reductions
//! must agree within a relative tolerance, and be exact for constant
//! buffers; outlier counts at given statistics must agree exactly.

use lanewise::elementwise::{transform_slices, Transform};
use lanewise::rle::encode_with_backend;
use lanewise::stats::{analyze, approx_eq, count_outliers, mean_and_std_dev};
use lanewise::{resolve_backend, Backend};
use proptest::prelude::*;

fn vector_backends() -> Vec<Backend> {
    let mut all = vec![Backend::Portable];
    if resolve_backend(Backend::SSE2).is_ok() {
        all.push(Backend::SSE2);
    }
    all
}

/// Two equal-length byte buffers
fn byte_pair() -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
    (0usize..4096).prop_flat_map(|len| {
        (
            prop::collection::vec(any::<u8>(), len),
            prop::collection::vec(any::<u8>(), len),
        )
    })
}

fn weight() -> impl Strategy<Value = f32> {
    prop_oneof![
        Just(1.0f32),
        Just(0.625f32),
        Just(0.0f32),
        -4.0f32..4.0,
        -255.0f32..255.0,
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn blend_bit_exact((a, b) in byte_pair(), alpha in weight()) {
        let reference = transform_slices(Transform::Blend, &a, &b, alpha, Backend::Scalar)
            .expect("scalar blend");
        for backend in vector_backends() {
            let out = transform_slices(Transform::Blend, &a, &b, alpha, backend)
                .expect("vector blend");
            prop_assert_eq!(&out, &reference, "backend {:?} len {} alpha {}", backend, a.len(), alpha);
        }
    }

    #[test]
    fn abs_diff_bit_exact((a, b) in byte_pair(), alpha in weight()) {
        let reference = transform_slices(Transform::AbsDiff, &a, &b, alpha, Backend::Scalar)
            .expect("scalar abs diff");
        for backend in vector_backends() {
            let out = transform_slices(Transform::AbsDiff, &a, &b, alpha, backend)
                .expect("vector abs diff");
            prop_assert_eq!(&out, &reference, "backend {:?} len {} alpha {}", backend, a.len(), alpha);
        }
    }

    #[test]
    fn rle_runs_identical(
        input in prop::collection::vec(prop_oneof![3 => 0u8..2, 1 => any::<u8>()], 0..4096)
    ) {
        let reference = encode_with_backend(&input, Backend::Scalar).expect("scalar encode");
        prop_assert_eq!(reference.expand(), input.clone());
        for backend in vector_backends() {
            let encoding = encode_with_backend(&input, backend).expect("vector encode");
            prop_assert_eq!(&encoding, &reference);
        }
    }

    #[test]
    fn stats_within_tolerance(
        data in prop::collection::vec(-1.0e4f32..1.0e4, 1..4096)
    ) {
        let reference = mean_and_std_dev(&data, Backend::Scalar).expect("scalar stats");
        for backend in vector_backends() {
            let stats = mean_and_std_dev(&data, backend).expect("vector stats");
            let spread = reference.std_dev.max(1.0);
            prop_assert!((stats.mean - reference.mean).abs() <= 1e-3 * spread);
            prop_assert!(approx_eq(stats.std_dev, reference.std_dev, 1e-3));
        }
    }

    #[test]
    fn constant_buffer_exact(
        value in -1.0e5f32..1.0e5,
        len in 1usize..200_000,
        threshold in 0.0f32..1.0
    ) {
        let data = vec![value; len];
        for backend in [Backend::Scalar].into_iter().chain(vector_backends()) {
            let report = analyze(&data, threshold, backend).expect("constant stats");
            prop_assert_eq!(report.stats.mean, value, "backend {:?} len {}", backend, len);
            prop_assert_eq!(report.stats.std_dev, 0.0, "backend {:?} len {}", backend, len);
            prop_assert_eq!(report.outliers, 0);
        }
    }

    #[test]
    fn outlier_count_exact(
        data in prop::collection::vec(-1.0e3f32..1.0e3, 0..4096),
        mean in -50.0f32..50.0,
        std_dev in 10.0f32..400.0,
        threshold in 0.0f32..4.0
    ) {
        let reference = count_outliers(&data, mean, std_dev, threshold, Backend::Scalar)
            .expect("scalar count");
        for backend in vector_backends() {
            let count = count_outliers(&data, mean, std_dev, threshold, backend)
                .expect("vector count");
            prop_assert_eq!(count, reference);
        }
    }
}

/// Deterministic spread over roughly [-1e6, 1e6]
fn wide_samples(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| ((i * 7919 + i / 3) % 2_000_001) as f32 - 1_000_000.0)
        .collect()
}

#[test]
fn stats_within_tolerance_over_a_million_samples() {
    let data = wide_samples(1_048_579);
    let reference = mean_and_std_dev(&data, Backend::Scalar).expect("scalar stats");
    for backend in vector_backends() {
        let stats = mean_and_std_dev(&data, backend).expect("vector stats");
        let spread = reference.std_dev.max(1.0);
        assert!(
            (stats.mean - reference.mean).abs() <= 1e-6 * spread,
            "mean {} vs {} on {backend:?}",
            stats.mean,
            reference.mean
        );
        assert!(
            approx_eq(stats.std_dev, reference.std_dev, 1e-6),
            "std_dev {} vs {} on {backend:?}",
            stats.std_dev,
            reference.std_dev
        );
        for threshold in [1.5, 2.5] {
            let expected =
                count_outliers(&data, stats.mean, stats.std_dev, threshold, Backend::Scalar)
                    .expect("scalar count");
            let count = count_outliers(&data, stats.mean, stats.std_dev, threshold, backend)
                .expect("vector count");
            assert_eq!(count, expected, "threshold {threshold} on {backend:?}");
        }
    }
}

#[test]
fn tail_lengths_around_lane_width() {
    for len in [0usize, 1, 15, 16, 17, 31, 32, 33, 47, 4095] {
        let a: Vec<u8> = (0..len).map(|i| (i * 13 % 256) as u8).collect();
        let b: Vec<u8> = (0..len).map(|i| (255 - i * 7 % 256) as u8).collect();
        let reference = transform_slices(Transform::Blend, &a, &b, 0.625, Backend::Scalar)
            .expect("scalar blend");
        for backend in vector_backends() {
            let out = transform_slices(Transform::Blend, &a, &b, 0.625, backend)
                .expect("vector blend");
            assert_eq!(out, reference, "len {len} backend {backend:?}");
        }
    }
}
