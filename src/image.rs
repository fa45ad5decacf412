//! Owned 8-bit image buffers and channel (de)interleaving
//!
//! Pixels are stored row-major with channels interleaved
//! (`[R0, G0, B0, R1, G1, B1, ...]` for colour). Kernels that need a
//! different weight per channel split the buffer into planes, run a lane
//! kernel per plane and interleave the results back, so channel alignment
//! never depends on the vector width.

use crate::{KernelError, Result};

/// Channel layout of a [`ByteImage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channels {
    /// One channel per pixel
    Gray,
    /// Three interleaved channels per pixel
    Rgb,
}

impl Channels {
    /// Bytes per pixel
    pub const fn count(self) -> usize {
        match self {
            Channels::Gray => 1,
            Channels::Rgb => 3,
        }
    }
}

/// Row-major 8-bit image with interleaved channels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteImage {
    width: usize,
    height: usize,
    channels: Channels,
    data: Vec<u8>,
}

/// `width * height * channels`, or `InvalidInput` on overflow
fn buffer_len(width: usize, height: usize, channels: Channels) -> Result<usize> {
    width
        .checked_mul(height)
        .and_then(|px| px.checked_mul(channels.count()))
        .ok_or_else(|| KernelError::InvalidInput(format!("image {width}x{height} overflows usize")))
}

impl ByteImage {
    /// Wrap an existing buffer; its length must be `width * height * channels`
    ///
    /// # Examples
    ///
    /// ```
    /// use lanewise::{ByteImage, Channels};
    ///
    /// let img = ByteImage::from_vec(2, 2, Channels::Gray, vec![0, 1, 2, 3]).unwrap();
    /// assert_eq!(img.len(), 4);
    ///
    /// assert!(ByteImage::from_vec(2, 2, Channels::Rgb, vec![0; 4]).is_err());
    /// ```
    pub fn from_vec(width: usize, height: usize, channels: Channels, data: Vec<u8>) -> Result<Self> {
        let expected = buffer_len(width, height, channels)?;
        if data.len() != expected {
            return Err(KernelError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Image with every byte set to `value`
    ///
    /// # Panics
    ///
    /// Panics if `width * height * channels` overflows `usize`; use
    /// [`ByteImage::try_filled`] to get an error instead.
    pub fn filled(width: usize, height: usize, channels: Channels, value: u8) -> Self {
        match Self::try_filled(width, height, channels, value) {
            Ok(image) => image,
            Err(err) => panic!("{err}"),
        }
    }

    /// Image with every byte set to `value`, checking the buffer size
    pub fn try_filled(width: usize, height: usize, channels: Channels, value: u8) -> Result<Self> {
        let len = buffer_len(width, height, channels)?;
        Ok(Self {
            width,
            height,
            channels,
            data: vec![value; len],
        })
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`
    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Channel layout
    pub fn channels(&self) -> Channels {
        self.channels
    }

    /// Raw interleaved bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the image, returning its bytes
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Number of bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the image holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes of one pixel, `None` when out of bounds
    pub fn pixel(&self, x: usize, y: usize) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let c = self.channels.count();
        let start = (y * self.width + x) * c;
        self.data.get(start..start + c)
    }

    /// Same shape and channel layout as `other`, otherwise the matching error
    pub fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(KernelError::ShapeMismatch {
                expected: self.shape(),
                actual: other.shape(),
            });
        }
        if self.channels != other.channels {
            return Err(KernelError::LayoutMismatch {
                expected: self.channels,
                actual: other.channels,
            });
        }
        Ok(())
    }

    /// Split into one contiguous plane per channel
    pub fn planes(&self) -> Vec<Vec<u8>> {
        deinterleave(&self.data, self.channels.count())
    }

    /// Rebuild an image from per-channel planes
    pub fn from_planes(
        width: usize,
        height: usize,
        channels: Channels,
        planes: &[Vec<u8>],
    ) -> Result<Self> {
        if planes.len() != channels.count() {
            return Err(KernelError::LayoutMismatch {
                expected: channels,
                actual: if planes.len() == 1 {
                    Channels::Gray
                } else {
                    Channels::Rgb
                },
            });
        }
        let pixels = width * height;
        if let Some(bad) = planes.iter().find(|p| p.len() != pixels) {
            return Err(KernelError::SizeMismatch {
                expected: pixels,
                actual: bad.len(),
            });
        }
        Self::from_vec(width, height, channels, interleave(planes))
    }
}

/// Split interleaved bytes into `channels` planes
///
/// A trailing partial pixel is ignored.
///
/// # Examples
///
/// ```
/// use lanewise::image::deinterleave;
///
/// let planes = deinterleave(&[1, 2, 3, 4, 5, 6], 3);
/// assert_eq!(planes, vec![vec![1, 4], vec![2, 5], vec![3, 6]]);
/// ```
pub fn deinterleave(data: &[u8], channels: usize) -> Vec<Vec<u8>> {
    if channels == 0 {
        return Vec::new();
    }
    let pixels = data.len() / channels;
    let mut planes: Vec<Vec<u8>> = (0..channels).map(|_| Vec::with_capacity(pixels)).collect();
    for pixel in data.chunks_exact(channels) {
        for (plane, &byte) in planes.iter_mut().zip(pixel) {
            plane.push(byte);
        }
    }
    planes
}

/// Interleave equal-length planes back into pixel order
///
/// Stops at the shortest plane.
///
/// # Examples
///
/// ```
/// use lanewise::image::interleave;
///
/// let data = interleave(&[vec![1, 4], vec![2, 5], vec![3, 6]]);
/// assert_eq!(data, vec![1, 2, 3, 4, 5, 6]);
/// ```
pub fn interleave(planes: &[Vec<u8>]) -> Vec<u8> {
    let pixels = planes.iter().map(Vec::len).min().unwrap_or(0);
    let mut data = Vec::with_capacity(pixels * planes.len());
    for i in 0..pixels {
        for plane in planes {
            data.push(plane[i]);
        }
    }
    data
}
