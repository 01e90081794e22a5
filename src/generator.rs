//! Synthetic DTMF tone generation
//!
//! Produces the dual-sinusoid sample sequences used for loopback testing
//! of the detector; real call audio arrives from the RTP/codec layer.

use std::f64::consts::PI;

/// DTMF tone generator producing 16-bit linear PCM.
pub struct DtmfGenerator {
    pub sample_rate: u32,
}

impl DtmfGenerator {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    /// Generates `duration_ms` of the dual tone for `digit`, or an empty
    /// vector for a character outside the 16-symbol DTMF alphabet.
    pub fn generate_tone(&self, digit: char, duration_ms: u32) -> Vec<i16> {
        let (low_freq, high_freq) = match digit {
            '1' => (697.0, 1209.0),
            '2' => (697.0, 1336.0),
            '3' => (697.0, 1477.0),
            'A' => (697.0, 1633.0),
            '4' => (770.0, 1209.0),
            '5' => (770.0, 1336.0),
            '6' => (770.0, 1477.0),
            'B' => (770.0, 1633.0),
            '7' => (852.0, 1209.0),
            '8' => (852.0, 1336.0),
            '9' => (852.0, 1477.0),
            'C' => (852.0, 1633.0),
            '*' => (941.0, 1209.0),
            '0' => (941.0, 1336.0),
            '#' => (941.0, 1477.0),
            'D' => (941.0, 1633.0),
            _ => return Vec::new(),
        };

        let sample_count = (self.sample_rate as f64 * duration_ms as f64 / 1000.0) as usize;
        let mut samples = Vec::with_capacity(sample_count);

        for i in 0..sample_count {
            let t = i as f64 / self.sample_rate as f64;
            let sample = (2.0 * PI * low_freq * t).sin() + (2.0 * PI * high_freq * t).sin();
            samples.push((sample * 16383.0) as i16); // Scale to 16-bit
        }

        samples
    }

    pub fn silence(&self, duration_ms: u32) -> Vec<i16> {
        let sample_count = (self.sample_rate as f64 * duration_ms as f64 / 1000.0) as usize;
        vec![0; sample_count]
    }

    /// Encodes samples as the little-endian byte stream the detector consumes.
    pub fn to_bytes(samples: &[i16]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }
}
