//! Goertzel resonator for single-frequency power estimation
//!
//! A second-order recursive filter that measures the power of one target
//! frequency over a fixed-length sample window, far cheaper than a full
//! spectral transform when only the eight DTMF tones are of interest.

use std::f64::consts::PI;

/// Sample rate of the linear PCM telephony streams this crate operates on.
pub const SAMPLE_RATE: u32 = 8000;

/// Power estimator for a single target frequency.
///
/// Constructed once per tone at detector build time. `power` is a pure
/// function of the window it is given; no filter state survives between
/// calls, so one filter can be reused across windows and streams.
#[derive(Debug, Clone)]
pub struct GoertzelFilter {
    frequency: f64,
    n: usize,
    scale: f64,
    coeff: f64,
}

impl GoertzelFilter {
    /// Creates a filter for `frequency` Hz over windows of `n` samples.
    /// `scale` is the window duration in seconds, folded into the output
    /// normalization.
    pub fn new(frequency: f64, n: usize, scale: f64) -> Self {
        let bin = (0.5 + n as f64 * frequency / SAMPLE_RATE as f64).floor();
        let coeff = 2.0 * (2.0 * PI * bin / n as f64).cos();

        Self {
            frequency,
            n,
            scale,
            coeff,
        }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn window_len(&self) -> usize {
        self.n
    }

    /// Power at the target frequency over one full window of samples
    /// starting at `offset`.
    ///
    /// Runs the recursion `s0 = x + k*s1 - s2` over exactly `n` samples,
    /// then evaluates the squared magnitude `s1^2 + s2^2 - k*s1*s2`. The
    /// normalization uses the same `n` for every filter in a bank, so
    /// powers from different target frequencies are directly comparable.
    pub fn power(&self, signal: &[f64], offset: usize) -> f64 {
        let mut s1 = 0.0;
        let mut s2 = 0.0;

        for &x in &signal[offset..offset + self.n] {
            let s0 = x + self.coeff * s1 - s2;
            s2 = s1;
            s1 = s0;
        }

        (s1 * s1 + s2 * s2 - self.coeff * s1 * s2) * self.scale / self.n as f64
    }
}
