//! Run-boundary encoder for run-length encoding
//!
//! Turns a byte sequence into maximal `(symbol, count)` runs. The scalar
//! encoder extends the current run while the next byte matches. Vector
//! encoders load 16-byte windows, compare each lane with its right
//! neighbour once per window, and walk the resulting boundary mask; the
//! in-progress run carries across windows, so a run that straddles a window
//! edge is still emitted once.
//!
//! # Examples
//!
//! ```
//! use lanewise::rle::{encode, Run};
//!
//! let encoding = encode(b"aaabccccd").unwrap();
//! assert_eq!(encoding.runs(), &[
//!     Run { symbol: b'a', count: 3 },
//!     Run { symbol: b'b', count: 1 },
//!     Run { symbol: b'c', count: 4 },
//!     Run { symbol: b'd', count: 1 },
//! ]);
//! assert_eq!(encoding.to_string(), "a3b1c4d1");
//! assert_eq!(encoding.expand(), b"aaabccccd");
//! ```

use std::fmt;

use crate::backends::dispatch;
use crate::{Backend, Result};

/// One maximal run: `symbol` repeated `count` times (`count >= 1`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Run {
    /// Repeated byte
    pub symbol: u8,
    /// Repetitions
    pub count: usize,
}

/// Runs of one input, in order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunEncoding {
    runs: Vec<Run>,
    original_len: usize,
}

impl RunEncoding {
    /// The runs in input order
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Number of runs
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// True for an empty input
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Length of the input the runs were taken from
    pub fn original_len(&self) -> usize {
        self.original_len
    }

    /// Re-expand every run and concatenate
    pub fn expand(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.original_len);
        for run in &self.runs {
            out.extend(std::iter::repeat(run.symbol).take(run.count));
        }
        out
    }

    /// Length of the text form: one byte per symbol plus the decimal digits of each count
    pub fn encoded_len(&self) -> usize {
        self.runs.iter().map(|r| 1 + decimal_digits(r.count)).sum()
    }

    /// `original_len / encoded_len`, 1.0 when both are zero
    ///
    /// # Examples
    ///
    /// ```
    /// use lanewise::rle::encode;
    ///
    /// // "x20" is 3 bytes for 20 input bytes
    /// let ratio = encode(&[b'x'; 20]).unwrap().compression_ratio();
    /// assert!((ratio - 20.0 / 3.0).abs() < 1e-12);
    /// ```
    pub fn compression_ratio(&self) -> f64 {
        let encoded = self.encoded_len();
        if encoded == 0 {
            return 1.0;
        }
        self.original_len as f64 / encoded as f64
    }
}

impl fmt::Display for RunEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for run in &self.runs {
            write!(f, "{}{}", char::from(run.symbol), run.count)?;
        }
        Ok(())
    }
}

fn decimal_digits(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Encode with an explicit backend
pub fn encode_with_backend(input: &[u8], backend: Backend) -> Result<RunEncoding> {
    let mut runs = Vec::new();
    dispatch!(backend, encode_runs(input, &mut runs))?;
    Ok(RunEncoding {
        runs,
        original_len: input.len(),
    })
}

/// Encode with the auto-selected backend
pub fn encode(input: &[u8]) -> Result<RunEncoding> {
    encode_with_backend(input, Backend::Auto)
}
