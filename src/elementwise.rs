//! Elementwise saturating transforms over 8-bit images
//!
//! `out[i] = saturate8(f(src1[i], trunc(src2[i] * alpha)))` where `f` is
//! addition ([`Transform::Blend`]) or absolute difference
//! ([`Transform::AbsDiff`]). Results clamp to `[0, 255]`; nothing wraps.
//!
//! Vector output is bit-identical to the scalar reference for every input
//! length and channel layout.

use tracing::debug;

use crate::backends::{abs_diff_element, blend_element, dispatch};
use crate::config::validate_blend_weight;
use crate::image::deinterleave;
use crate::{resolve_backend, Backend, ByteImage, KernelError, Result};

/// Per-element operation of an elementwise kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// `src1 + weighted(src2)`
    Blend,
    /// `|src1 - weighted(src2)|`
    AbsDiff,
}

impl Transform {
    fn apply(self, p1: u8, p2: u8, alpha: f32) -> u8 {
        match self {
            Transform::Blend => blend_element(p1, p2, alpha),
            Transform::AbsDiff => abs_diff_element(p1, p2, alpha),
        }
    }
}

/// Weight applied to the second operand, one for all channels or one per channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelWeights {
    /// Same weight for every channel
    Uniform(f32),
    /// One weight per channel, in interleave order
    PerChannel(Vec<f32>),
}

impl From<f32> for ChannelWeights {
    fn from(alpha: f32) -> Self {
        ChannelWeights::Uniform(alpha)
    }
}

impl<const N: usize> From<[f32; N]> for ChannelWeights {
    fn from(weights: [f32; N]) -> Self {
        ChannelWeights::PerChannel(weights.to_vec())
    }
}

impl ChannelWeights {
    /// Collapse to a single weight when every channel shares it
    fn uniform(&self) -> Option<f32> {
        match self {
            ChannelWeights::Uniform(alpha) => Some(*alpha),
            ChannelWeights::PerChannel(w) => match w.split_first() {
                Some((first, rest)) if rest.iter().all(|x| x.to_bits() == first.to_bits()) => {
                    Some(*first)
                }
                _ => None,
            },
        }
    }

    fn validate(&self, channels: usize) -> Result<()> {
        match self {
            ChannelWeights::Uniform(alpha) => validate_blend_weight(*alpha),
            ChannelWeights::PerChannel(w) => {
                if w.len() != channels {
                    return Err(KernelError::InvalidInput(format!(
                        "expected {channels} channel weights, got {}",
                        w.len()
                    )));
                }
                w.iter().try_for_each(|&alpha| validate_blend_weight(alpha))
            }
        }
    }
}

/// Run one transform over two equal-length byte slices
fn run_slices(
    op: Transform,
    a: &[u8],
    b: &[u8],
    alpha: f32,
    out: &mut [u8],
    backend: Backend,
) -> Result<()> {
    match op {
        Transform::Blend => dispatch!(backend, blend(a, b, alpha, out)),
        Transform::AbsDiff => dispatch!(backend, abs_diff(a, b, alpha, out)),
    }
}

/// Apply `op` over raw byte slices with a single weight
///
/// # Examples
///
/// ```
/// use lanewise::elementwise::{transform_slices, Transform};
/// use lanewise::Backend;
///
/// let out = transform_slices(Transform::AbsDiff, &[10, 200], &[30, 100], 1.0, Backend::Auto).unwrap();
/// assert_eq!(out, vec![20, 100]);
/// ```
pub fn transform_slices(
    op: Transform,
    a: &[u8],
    b: &[u8],
    alpha: f32,
    backend: Backend,
) -> Result<Vec<u8>> {
    if a.len() != b.len() {
        return Err(KernelError::SizeMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    validate_blend_weight(alpha)?;
    let mut out = vec![0u8; a.len()];
    run_slices(op, a, b, alpha, &mut out, backend)?;
    Ok(out)
}

/// Apply `op` to two images with uniform or per-channel weights
///
/// Uniform weights run one lane kernel over all bytes: the op is the same for
/// every channel, so lane boundaries cannot misalign channels. Distinct
/// per-channel weights deinterleave both images into planes, run the lane
/// kernel per plane, and reinterleave. The scalar backend always uses the
/// per-pixel, per-channel reference loop.
pub fn transform(
    op: Transform,
    src1: &ByteImage,
    src2: &ByteImage,
    weights: impl Into<ChannelWeights>,
    backend: Backend,
) -> Result<ByteImage> {
    src1.check_compatible(src2)?;
    let weights = weights.into();
    let channels = src1.channels();
    weights.validate(channels.count())?;
    let backend = resolve_backend(backend)?;

    let (width, height) = src1.shape();
    let data = match (&weights, weights.uniform()) {
        (_, Some(alpha)) => {
            let mut out = vec![0u8; src1.len()];
            run_slices(op, src1.as_slice(), src2.as_slice(), alpha, &mut out, backend)?;
            out
        }
        (ChannelWeights::PerChannel(w), None) if backend != Backend::Scalar => {
            debug!(?op, ?backend, channels = channels.count(), "per-channel plane pipeline");
            let planes1 = deinterleave(src1.as_slice(), channels.count());
            let planes2 = deinterleave(src2.as_slice(), channels.count());
            let mut out_planes = Vec::with_capacity(planes1.len());
            for ((p1, p2), &alpha) in planes1.iter().zip(&planes2).zip(w) {
                let mut plane = vec![0u8; p1.len()];
                run_slices(op, p1, p2, alpha, &mut plane, backend)?;
                out_planes.push(plane);
            }
            return ByteImage::from_planes(width, height, channels, &out_planes);
        }
        _ => scalar_per_channel(op, src1, src2, &weights),
    };
    ByteImage::from_vec(width, height, channels, data)
}

fn scalar_per_channel(
    op: Transform,
    src1: &ByteImage,
    src2: &ByteImage,
    weights: &ChannelWeights,
) -> Vec<u8> {
    let c = src1.channels().count();
    let w: Vec<f32> = match weights {
        ChannelWeights::Uniform(alpha) => vec![*alpha; c],
        ChannelWeights::PerChannel(w) => w.clone(),
    };
    src1.as_slice()
        .iter()
        .zip(src2.as_slice())
        .enumerate()
        .map(|(i, (&p1, &p2))| op.apply(p1, p2, w[i % c]))
        .collect()
}

/// Saturating weighted blend with the auto-selected backend
///
/// # Examples
///
/// ```
/// use lanewise::elementwise::blend;
/// use lanewise::{ByteImage, Channels};
///
/// let a = ByteImage::filled(4, 1, Channels::Rgb, 255);
/// let b = ByteImage::filled(4, 1, Channels::Rgb, 255);
/// let out = blend(&a, &b, 1.0).unwrap();
/// assert!(out.as_slice().iter().all(|&p| p == 255));
/// ```
pub fn blend(src1: &ByteImage, src2: &ByteImage, alpha: f32) -> Result<ByteImage> {
    blend_with_backend(src1, src2, alpha, Backend::Auto)
}

/// Saturating weighted blend with an explicit backend
pub fn blend_with_backend(
    src1: &ByteImage,
    src2: &ByteImage,
    weights: impl Into<ChannelWeights>,
    backend: Backend,
) -> Result<ByteImage> {
    transform(Transform::Blend, src1, src2, weights, backend)
}

/// Plain 8-bit absolute difference with the auto-selected backend
pub fn abs_diff(src1: &ByteImage, src2: &ByteImage) -> Result<ByteImage> {
    abs_diff_with_backend(src1, src2, 1.0, Backend::Auto)
}

/// Saturating weighted absolute difference with an explicit backend
pub fn abs_diff_with_backend(
    src1: &ByteImage,
    src2: &ByteImage,
    weights: impl Into<ChannelWeights>,
    backend: Backend,
) -> Result<ByteImage> {
    transform(Transform::AbsDiff, src1, src2, weights, backend)
}

/// Motion frames of a grayscale sequence: `|frame[k] - frame[k - 1]|`
///
/// Returns one frame fewer than given; fewer than two frames yields none.
pub fn motion_frames(frames: &[ByteImage], backend: Backend) -> Result<Vec<ByteImage>> {
    frames
        .windows(2)
        .map(|pair| abs_diff_with_backend(&pair[1], &pair[0], 1.0, backend))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Channels;

    fn gray(data: Vec<u8>) -> ByteImage {
        let w = data.len();
        ByteImage::from_vec(w, 1, Channels::Gray, data).unwrap()
    }

    fn backends() -> Vec<Backend> {
        let mut all = vec![Backend::Scalar, Backend::Portable, Backend::Auto];
        if resolve_backend(Backend::SSE2).is_ok() {
            all.push(Backend::SSE2);
        }
        all
    }

    #[test]
    fn test_blend_saturation_boundary() {
        for backend in backends() {
            let out = blend_with_backend(&gray(vec![255, 254]), &gray(vec![255, 2]), 1.0, backend)
                .unwrap();
            assert_eq!(out.as_slice(), &[255, 255], "backend {backend:?}");
        }
    }

    #[test]
    fn test_blend_length_17_processes_tail() {
        let a = gray((0..17).map(|i| i * 10).collect());
        let b = gray((0..17).map(|i| 200 - i * 5).collect());
        let reference = blend_with_backend(&a, &b, 0.625, Backend::Scalar).unwrap();
        for backend in backends() {
            let out = blend_with_backend(&a, &b, 0.625, backend).unwrap();
            assert_eq!(out, reference, "backend {backend:?}");
        }
        // element 16 is the tail: 160 + trunc(120 * 0.625) = 235
        assert_eq!(reference.as_slice()[16], 235);
    }

    #[test]
    fn test_abs_diff_basic() {
        let out = abs_diff(&gray(vec![10, 200, 0, 255]), &gray(vec![30, 100, 255, 0])).unwrap();
        assert_eq!(out.as_slice(), &[20, 100, 255, 255]);
    }

    #[test]
    fn test_shape_mismatch_is_reported() {
        let a = ByteImage::filled(4, 2, Channels::Gray, 1);
        let b = ByteImage::filled(2, 4, Channels::Gray, 1);
        let err = blend(&a, &b, 0.5).unwrap_err();
        assert!(matches!(err, KernelError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_layout_mismatch_is_reported() {
        let a = ByteImage::filled(2, 2, Channels::Rgb, 1);
        let b = ByteImage::filled(2, 2, Channels::Gray, 1);
        let err = abs_diff(&a, &b).unwrap_err();
        assert!(matches!(err, KernelError::LayoutMismatch { .. }));
    }

    #[test]
    fn test_invalid_weight_rejected() {
        let a = gray(vec![1, 2]);
        assert!(blend(&a, &a, f32::NAN).is_err());
        assert!(blend(&a, &a, 1000.0).is_err());
    }

    #[test]
    fn test_per_channel_weights_preserve_alignment() {
        // 7 pixels = 21 bytes, so lane edges fall mid-pixel
        let a = ByteImage::from_vec(7, 1, Channels::Rgb, vec![100; 21]).unwrap();
        let b = ByteImage::from_vec(7, 1, Channels::Rgb, vec![100; 21]).unwrap();
        let weights = [1.0, 0.5, 0.0];

        let reference = blend_with_backend(&a, &b, weights, Backend::Scalar).unwrap();
        for px in 0..7 {
            assert_eq!(reference.pixel(px, 0), Some(&[200u8, 150, 100][..]));
        }
        for backend in backends() {
            let out = blend_with_backend(&a, &b, weights, backend).unwrap();
            assert_eq!(out, reference, "backend {backend:?}");
        }
    }

    #[test]
    fn test_per_channel_weight_count_checked() {
        let a = ByteImage::filled(2, 2, Channels::Rgb, 1);
        let err = blend_with_backend(&a, &a, [1.0, 1.0], Backend::Auto).unwrap_err();
        assert!(matches!(err, KernelError::InvalidInput(_)));
    }

    #[test]
    fn test_equal_per_channel_weights_collapse() {
        assert_eq!(ChannelWeights::from([0.5, 0.5, 0.5]).uniform(), Some(0.5));
        assert_eq!(ChannelWeights::from([0.5, 0.25, 0.5]).uniform(), None);
        assert_eq!(ChannelWeights::from(0.75).uniform(), Some(0.75));
    }

    #[test]
    fn test_transform_slices_size_mismatch() {
        let err = transform_slices(Transform::Blend, &[1, 2, 3], &[1, 2], 1.0, Backend::Auto)
            .unwrap_err();
        assert_eq!(
            err,
            KernelError::SizeMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_motion_frames() {
        let frames = vec![gray(vec![0, 10, 20]), gray(vec![5, 10, 0]), gray(vec![5, 12, 0])];
        let motion = motion_frames(&frames, Backend::Auto).unwrap();
        assert_eq!(motion.len(), 2);
        assert_eq!(motion[0].as_slice(), &[5, 0, 20]);
        assert_eq!(motion[1].as_slice(), &[0, 2, 0]);

        assert!(motion_frames(&frames[..1], Backend::Auto).unwrap().is_empty());
    }

    #[test]
    fn test_empty_images() {
        let a = ByteImage::filled(0, 0, Channels::Rgb, 0);
        let out = blend(&a, &a, 0.5).unwrap();
        assert!(out.is_empty());
    }
}
