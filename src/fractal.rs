//! Point-wise Julia set generator
//!
//! Each pixel is a pure function of its coordinates, so rows can be computed
//! in any order. [`render_serial`] walks rows in order; [`render_parallel`]
//! hands each row to a rayon worker. Every row writes only its own slice of
//! the output, so no locking is needed and both produce identical bytes.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::{ByteImage, Channels, KernelError, Result};

/// Parameters of `z(k+1) = z(k)^2 + c` over a rectangular window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JuliaParams {
    /// Image width in pixels (>= 2)
    pub width: usize,
    /// Image height in pixels (>= 2)
    pub height: usize,
    /// Real range `(min, max)` mapped onto columns
    pub x_range: (f32, f32),
    /// Imaginary range `(min, max)` mapped onto rows
    pub y_range: (f32, f32),
    /// Constant `c` as `(re, im)`
    pub c: (f32, f32),
    /// Iteration cap; points that never escape are coloured black
    pub max_iterations: u32,
}

impl Default for JuliaParams {
    fn default() -> Self {
        Self {
            width: 800,
            height: 800,
            x_range: (-2.0, 2.0),
            y_range: (-2.0, 2.0),
            c: (0.355, 0.355),
            max_iterations: 1000,
        }
    }
}

impl JuliaParams {
    /// Default window and constant at a different resolution
    pub fn with_size(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.width < 2 || self.height < 2 {
            return Err(KernelError::InvalidInput(format!(
                "julia image must be at least 2x2, got {}x{}",
                self.width, self.height
            )));
        }
        if self.max_iterations == 0 {
            return Err(KernelError::InvalidInput(
                "max_iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Escape iteration of pixel `(x, y)`, `max_iterations` if it never escapes
    pub fn escape_iteration(&self, x: usize, y: usize) -> u32 {
        let (x_min, x_max) = self.x_range;
        let (y_min, y_max) = self.y_range;
        let (w, h) = (self.width as f32, self.height as f32);
        let (xf, yf) = (x as f32, y as f32);

        let mut re = ((w - xf - 1.0) * x_min + xf * x_max) / (w - 1.0);
        let mut im = ((h - yf - 1.0) * y_min + yf * y_max) / (h - 1.0);

        for iteration in 0..self.max_iterations {
            if re * re + im * im > 4.0 {
                return iteration;
            }
            let next_re = re * re - im * im + self.c.0;
            im = 2.0 * re * im + self.c.1;
            re = next_re;
        }
        self.max_iterations
    }

    fn fill_row(&self, y: usize, row: &mut [u8]) {
        for (x, px) in row.chunks_exact_mut(3).enumerate() {
            px.copy_from_slice(&colorize(self.escape_iteration(x, y), self.max_iterations));
        }
    }
}

/// Polynomial colour ramp; black for points inside the set
pub fn colorize(iteration: u32, max_iterations: u32) -> [u8; 3] {
    if iteration >= max_iterations {
        return [0, 0, 0];
    }
    let t = iteration as f32 / max_iterations as f32;
    let u = 1.0 - t;
    [
        (9.0 * u * t * t * t * 255.0) as u8,
        (15.0 * u * u * t * t * 255.0) as u8,
        (8.5 * u * u * u * t * 255.0) as u8,
    ]
}

/// Render row by row on the calling thread
pub fn render_serial(params: &JuliaParams) -> Result<ByteImage> {
    params.validate()?;
    let stride = params.width * 3;
    let mut data = vec![0u8; stride * params.height];
    for (y, row) in data.chunks_exact_mut(stride).enumerate() {
        params.fill_row(y, row);
    }
    ByteImage::from_vec(params.width, params.height, Channels::Rgb, data)
}

/// Render with one parallel task per row
///
/// Without the `parallel` feature this runs the serial loop.
pub fn render_parallel(params: &JuliaParams) -> Result<ByteImage> {
    params.validate()?;
    let stride = params.width * 3;
    let mut data = vec![0u8; stride * params.height];

    #[cfg(feature = "parallel")]
    {
        debug!(threads = rayon::current_num_threads(), rows = params.height, "parallel render");
        data.par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row)| params.fill_row(y, row));
    }

    #[cfg(not(feature = "parallel"))]
    {
        debug!(rows = params.height, "parallel feature disabled, rendering serially");
        for (y, row) in data.chunks_exact_mut(stride).enumerate() {
            params.fill_row(y, row);
        }
    }

    ByteImage::from_vec(params.width, params.height, Channels::Rgb, data)
}
